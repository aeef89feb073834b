// Command-line parsing.
//
// Simple `std::env::args()` matching with no clap dependency. Each subcommand
// takes its positional paths first, then `--flag value` pairs. Parse errors
// are returned as strings for `main` to print alongside the usage text.

use std::path::PathBuf;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainArgs {
    pub corpus_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub seq_len: Option<usize>,
    pub max_resident: Option<usize>,
    pub loading_rate: Option<f64>,
    pub generate: Option<PathBuf>,
    pub steps: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Inspect { file: PathBuf },
    Scan { dir: PathBuf },
    Reencode {
        input: PathBuf,
        output: PathBuf,
        time_scale: f64,
    },
    Train(TrainArgs),
    Help,
}

/// Generated steps when `--generate` is given without `--steps`.
const DEFAULT_GENERATE_STEPS: usize = 512;

pub fn parse(args: &[String]) -> Result<Command, String> {
    let Some(sub) = args.get(1) else {
        return Ok(Command::Help);
    };
    let rest = &args[2..];
    match sub.as_str() {
        "inspect" => Ok(Command::Inspect {
            file: positional(rest, 0, "inspect <FILE>")?,
        }),
        "scan" => Ok(Command::Scan {
            dir: positional(rest, 0, "scan <DIR>")?,
        }),
        "reencode" => {
            let input = positional(rest, 0, "reencode <IN> <OUT>")?;
            let output = positional(rest, 1, "reencode <IN> <OUT>")?;
            let mut time_scale = 1.0;
            let mut i = 2;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--time-scale" => time_scale = flag_value(rest, &mut i)?,
                    other => return Err(format!("Unknown argument: {other}")),
                }
                i += 1;
            }
            Ok(Command::Reencode {
                input,
                output,
                time_scale,
            })
        }
        "train" => parse_train(rest),
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(format!("Unknown command: {other}")),
    }
}

fn parse_train(rest: &[String]) -> Result<Command, String> {
    let mut train = TrainArgs {
        corpus_dir: positional(rest, 0, "train <DIR>")?,
        steps: DEFAULT_GENERATE_STEPS,
        ..TrainArgs::default()
    };
    let mut i = 1;
    while i < rest.len() {
        match rest[i].as_str() {
            "--config" => train.config = Some(flag_value(rest, &mut i)?),
            "--iterations" => train.iterations = Some(flag_value(rest, &mut i)?),
            "--seed" => train.seed = Some(flag_value(rest, &mut i)?),
            "--seq-len" => train.seq_len = Some(flag_value(rest, &mut i)?),
            "--max-resident" => train.max_resident = Some(flag_value(rest, &mut i)?),
            "--loading-rate" => train.loading_rate = Some(flag_value(rest, &mut i)?),
            "--generate" => train.generate = Some(flag_value(rest, &mut i)?),
            "--steps" => train.steps = flag_value(rest, &mut i)?,
            other => return Err(format!("Unknown argument: {other}")),
        }
        i += 1;
    }
    Ok(Command::Train(train))
}

fn positional(rest: &[String], index: usize, usage: &str) -> Result<PathBuf, String> {
    match rest.get(index) {
        Some(arg) if !arg.starts_with("--") => Ok(PathBuf::from(arg)),
        _ => Err(format!("missing argument; usage: midiloom {usage}")),
    }
}

/// Consume the value following the flag at `*i`.
fn flag_value<T: std::str::FromStr>(rest: &[String], i: &mut usize) -> Result<T, String> {
    let flag = &rest[*i];
    *i += 1;
    rest.get(*i)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| format!("{flag} requires a valid value"))
}

pub fn print_usage() {
    println!("Usage: midiloom <COMMAND> [ARGS]");
    println!();
    println!("Commands:");
    println!("  inspect <FILE>                 Load a file and print record statistics");
    println!("  scan <DIR>                     Count compatible MIDI files under DIR");
    println!("  reencode <IN> <OUT>            Encode to records and decode back to a file");
    println!("      --time-scale <X>           Record time to output ticks (default: 1.0)");
    println!("  train <DIR>                    Train the baseline model over a corpus");
    println!("      --config <FILE>            JSON training config");
    println!("      --iterations <N>           Training iterations");
    println!("      --seed <N>                 Scheduler seed");
    println!("      --seq-len <N>              Window length");
    println!("      --max-resident <N>         Streams held in memory");
    println!("      --loading-rate <P>         Probability an exhausted stream is replayed");
    println!("      --generate <OUT>           Write a generated file after training");
    println!("      --steps <N>                Generated steps (default: {DEFAULT_GENERATE_STEPS})");
    println!();
    println!("Logging is controlled with RUST_LOG (default: midiloom=info).");
}
