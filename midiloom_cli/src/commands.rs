// Subcommand implementations.
//
// Each command returns a boxed error so `main` can report any failure the
// same way. Summaries go to stdout; progress and per-file problems go through
// `tracing`.

use std::error::Error;
use std::path::Path;

use midiloom_codec::{FileStore, RecordBits, decode, is_compatible, load, scan, write_events};
use midiloom_corpus::{CorpusPool, PersistenceModel, Trainer, TrainingConfig, generate};
use midiloom_prng::{LoomRng, RandomSource};

use crate::args::TrainArgs;

type CmdResult = Result<(), Box<dyn Error>>;

pub fn inspect(file: &Path) -> CmdResult {
    let loaded = load(file)?;
    println!("File:              {}", file.display());
    println!("Ticks per beat:    {}", loaded.ticks_per_beat);
    println!("Records:           {}", loaded.len());
    println!("Continuation recs: {}", loaded.continuation_count());
    println!("Longest event:     {} bytes", loaded.max_event_len);
    Ok(())
}

pub fn scan_dir(dir: &Path) -> CmdResult {
    let candidates = scan(dir)?;
    let compatible = candidates.iter().filter(|p| is_compatible(p)).count();
    println!("Found {} MIDI files under {}", candidates.len(), dir.display());
    println!("  {compatible} single-track (compatible)");
    println!("  {} incompatible or unreadable", candidates.len() - compatible);
    Ok(())
}

pub fn reencode(input: &Path, output: &Path, time_scale: f64) -> CmdResult {
    let loaded = load(input)?;
    let bits: Vec<RecordBits> = loaded.records.iter().map(|r| r.record.to_bits()).collect();
    let decoded = decode(
        bits.iter().zip(loaded.records.iter().map(|r| r.time)),
        time_scale,
    );
    write_events(&decoded.events, loaded.ticks_per_beat, output)?;
    println!(
        "{} records -> {} events ({} rejected, {} trailing bytes dropped)",
        loaded.len(),
        decoded.events.len(),
        decoded.rejected.len(),
        decoded.dropped_tail
    );
    Ok(())
}

pub fn train(args: &TrainArgs) -> CmdResult {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::load(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(n) = args.iterations {
        config.iterations = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(n) = args.seq_len {
        config.seq_len = n;
    }
    if let Some(n) = args.max_resident {
        config.max_resident = n;
    }
    if let Some(p) = args.loading_rate {
        config.loading_rate = p;
    }
    config.validate()?;

    let candidates = scan(&args.corpus_dir)?;
    tracing::info!(
        "{} candidate files under {}",
        candidates.len(),
        args.corpus_dir.display()
    );

    let pool = CorpusPool::new(FileStore, candidates, config.pool_config());
    let rng = LoomRng::new(config.seed);
    let mut trainer = Trainer::new(PersistenceModel::default(), pool, rng, config.clone())?;
    let summary = trainer.run(config.iterations)?;

    println!("Iterations: {}", summary.iterations);
    println!("Mean loss:  {:.5}", summary.mean_loss);
    println!(
        "Pool:       {} resident, {} admitted, {} rejected, {} rotations, {} evictions, {} recycles",
        summary.pool.resident,
        summary.pool.admitted,
        summary.pool.rejected,
        summary.pool.rotations,
        summary.pool.evictions,
        summary.pool.recycles
    );

    if let Some(out) = &args.generate {
        let (mut model, pool, mut rng) = trainer.into_parts();
        let index = rng.range_usize(0, pool.len());
        let Some(stream) = pool.stream(index) else {
            return Err("no resident stream to prime generation".into());
        };
        let (primer_records, primer_times) = stream.slice_bits(0, config.seq_len);
        let generated = generate(
            &mut model,
            &primer_records,
            &primer_times,
            config.seq_len,
            args.steps,
        )?;
        let decoded = decode(
            generated.iter().map(|(bits, time)| (bits, *time)),
            config.decode_time_scale,
        );
        write_events(&decoded.events, stream.ticks_per_beat(), out)?;
        println!(
            "Generated {} steps from {} -> {} events",
            generated.len(),
            stream.source().display(),
            decoded.events.len()
        );
    }
    Ok(())
}
