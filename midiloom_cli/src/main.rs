// CLI entry point for midiloom.
//
// Front end over the codec and corpus crates: inspect a single file, scan a
// corpus directory, round-trip a file through the record codec, or run the
// training scheduler with the baseline model (optionally writing a generated
// file afterwards). See `args.rs` for the flags and `commands.rs` for what
// each subcommand does.
//
// Usage:
//   midiloom inspect <FILE>
//   midiloom scan <DIR>
//   midiloom reencode <IN> <OUT> [--time-scale X]
//   midiloom train <DIR> [--config FILE] [--iterations N] [--seed N]
//     [--seq-len N] [--max-resident N] [--loading-rate P]
//     [--generate OUT] [--steps N]

mod args;
mod commands;

use args::Command;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("midiloom=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().collect();
    let command = match args::parse(&argv) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            args::print_usage();
            std::process::exit(1);
        }
    };

    let result = match command {
        Command::Inspect { file } => commands::inspect(&file),
        Command::Scan { dir } => commands::scan_dir(&dir),
        Command::Reencode {
            input,
            output,
            time_scale,
        } => commands::reencode(&input, &output, time_scale),
        Command::Train(train) => commands::train(&train),
        Command::Help => {
            args::print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}
