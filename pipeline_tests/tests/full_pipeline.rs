// End-to-end tests for the corpus pipeline.
//
// Each test writes a synthetic corpus of real MIDI files to a temp directory,
// scans it, and drives the real `FileStore` + `CorpusPool` + `Trainer` stack
// with the `PersistenceModel` baseline. Paths covered: scan -> admit ->
// window -> train -> rotate/evict, and load -> encode -> decode -> write ->
// reload.

use midiloom_codec::{FileStore, RecordBits, decode, is_compatible, load, scan, write_events};
use midiloom_corpus::{
    CorpusPool, PersistenceModel, StatePair, Trainer, TrainingConfig, generate,
};
use midiloom_prng::LoomRng;
use pipeline_tests::{
    Corpus, FIXTURE_DELTA, FIXTURE_TPB, write_garbage, write_multi_track, write_notes,
};

fn small_config(seed: u64) -> TrainingConfig {
    TrainingConfig {
        seq_len: 8,
        max_resident: 2,
        loading_rate: 0.5,
        noise_std: 0.05,
        iterations: 200,
        seed,
        log_every: 0,
        ..TrainingConfig::default()
    }
}

fn build_trainer(
    corpus: &Corpus,
    config: &TrainingConfig,
) -> Trainer<PersistenceModel, FileStore, LoomRng> {
    let candidates = scan(corpus.path()).unwrap();
    let pool = CorpusPool::new(FileStore, candidates, config.pool_config());
    Trainer::new(
        PersistenceModel::default(),
        pool,
        LoomRng::new(config.seed),
        config.clone(),
    )
    .unwrap()
}

fn five_file_corpus() -> Corpus {
    Corpus::new(&[
        ("a.mid", 40),
        ("b.mid", 33),
        ("c.mid", 50),
        ("d.mid", 40),
        ("e.midi", 27),
    ])
}

#[test]
fn training_over_disk_corpus_respects_capacity() {
    let corpus = five_file_corpus();
    let config = small_config(7);
    let mut trainer = build_trainer(&corpus, &config);
    assert_eq!(trainer.pool().len(), 2);

    let summary = trainer.run(config.iterations).unwrap();
    let stats = summary.pool;

    assert_eq!(summary.iterations, 200);
    assert!(summary.mean_loss.is_finite());
    assert_eq!(stats.resident, 2);
    assert_eq!(stats.rejected, 0);
    // The pool started full, so every rotation evicted exactly one stream.
    assert_eq!(stats.evictions, stats.rotations);
    assert_eq!(stats.admitted, 2 + stats.rotations);
    assert!(stats.admitted <= 5);
    assert!(stats.recycles > 0);
    assert_eq!(trainer.model().windows_seen, 200);

    let sources = trainer.pool().resident_sources();
    assert_ne!(sources[0], sources[1]);
}

#[test]
fn same_seed_same_schedule() {
    let corpus = five_file_corpus();
    let config = small_config(42);

    let mut first = build_trainer(&corpus, &config);
    let mut second = build_trainer(&corpus, &config);
    for _ in 0..100 {
        assert_eq!(first.step().unwrap(), second.step().unwrap());
    }
    assert_eq!(first.pool().stats(), second.pool().stats());
    assert_eq!(
        first.pool().resident_sources(),
        second.pool().resident_sources()
    );
}

#[test]
fn rotation_evicts_oldest_stream() {
    let corpus = five_file_corpus();
    let config = small_config(3);
    let mut pool: CorpusPool<u64, FileStore> = CorpusPool::new(
        FileStore,
        scan(corpus.path()).unwrap(),
        config.pool_config(),
    );
    let mut rng = LoomRng::new(3);
    let zero = || StatePair::splat(0u64);
    pool.fill(&mut rng, &zero).unwrap();

    for _ in 0..3 {
        let before: Vec<_> = pool
            .resident_sources()
            .iter()
            .map(|p| p.to_path_buf())
            .collect();
        let active = pool.rotate(&mut rng, &zero).unwrap();
        let after = pool.resident_sources();

        assert_eq!(pool.len(), 2);
        assert_eq!(active, 1);
        assert_eq!(after[0], before[1].as_path());
        assert!(!before.iter().any(|p| p.as_path() == after[1]));
    }
    // All five candidates used; nothing left to admit.
    assert!(pool.rotate(&mut rng, &zero).is_err());
    assert_eq!(pool.stats().admitted, 5);
    assert_eq!(pool.stats().evictions, 3);
}

#[test]
fn exhausted_stream_recycles_without_rotation() {
    // 33 records fit four 8-step windows (each needs one extra target step).
    let corpus = Corpus::new(&[("only.mid", 33)]);
    let config = TrainingConfig {
        max_resident: 1,
        loading_rate: 1.0,
        ..small_config(11)
    };
    let mut trainer = build_trainer(&corpus, &config);

    trainer.run(20).unwrap();
    let stats = trainer.pool().stats();
    assert_eq!(stats.recycles, 4);
    assert_eq!(stats.rotations, 0);
    assert_eq!(trainer.pool().stream(0).unwrap().cursor(), 32);
}

#[test]
fn incompatible_and_short_files_are_rejected() {
    let corpus = Corpus::new(&[("good.mid", 40), ("short.mid", 5)]);
    write_multi_track(&corpus.file("multi.mid"), 40);
    write_garbage(&corpus.file("junk.mid"));
    write_notes(&corpus.file("notes.txt"), 40);

    let candidates = scan(corpus.path()).unwrap();
    assert_eq!(candidates.len(), 4);
    assert!(is_compatible(&corpus.file("good.mid")));
    assert!(!is_compatible(&corpus.file("multi.mid")));
    assert!(!is_compatible(&corpus.file("junk.mid")));

    let config = TrainingConfig {
        max_resident: 4,
        ..small_config(5)
    };
    let mut trainer = build_trainer(&corpus, &config);
    let stats = trainer.pool().stats();
    assert_eq!(stats.resident, 1);
    assert_eq!(stats.rejected, 3);
    assert_eq!(
        trainer.pool().resident_sources(),
        vec![corpus.file("good.mid").as_path()]
    );

    // With a single stream, training keeps recycling it.
    trainer.run(30).unwrap();
    assert_eq!(trainer.pool().len(), 1);
}

#[test]
fn windows_have_one_blank_input_step() {
    let corpus = Corpus::new(&[("a.mid", 40)]);
    let config = TrainingConfig {
        noise_std: 0.0,
        ..small_config(9)
    };
    let mut pool: CorpusPool<u64, FileStore> = CorpusPool::new(
        FileStore,
        scan(corpus.path()).unwrap(),
        config.pool_config(),
    );
    let mut rng = LoomRng::new(9);
    let zero = || StatePair::splat(0u64);
    pool.fill(&mut rng, &zero).unwrap();

    let window = pool.pick_window(8, &mut rng, &zero).unwrap();
    let (clean_records, clean_times) = pool.stream(0).unwrap().slice_bits(0, 9);
    assert_eq!(window.target_records, clean_records[1..].to_vec());
    assert_eq!(window.target_times, clean_times[1..].to_vec());

    for i in 0..8 {
        if i == window.gap_index {
            assert!(window.input_records[i].iter().all(|&b| b == 0.0));
            assert_eq!(window.input_times[i], 0.0);
        } else {
            assert_eq!(window.input_records[i], clean_records[i]);
            assert_eq!(window.input_times[i], clean_times[i]);
        }
    }
    // Picking does not move the cursor.
    assert_eq!(pool.stream(0).unwrap().cursor(), 0);
}

#[test]
fn reencode_round_trip_preserves_records() {
    let corpus = Corpus::new(&[("in.mid", 30)]);
    let out = corpus.file("out.mid");

    let original = load(&corpus.file("in.mid")).unwrap();
    assert_eq!(original.len(), 30);
    assert_eq!(original.ticks_per_beat, FIXTURE_TPB);

    let bits: Vec<RecordBits> = original.records.iter().map(|r| r.record.to_bits()).collect();
    let decoded = decode(
        bits.iter().zip(original.records.iter().map(|r| r.time)),
        1.0,
    );
    assert!(decoded.rejected.is_empty());
    assert_eq!(decoded.dropped_tail, 0);
    assert_eq!(decoded.events.len(), 30);
    assert_eq!(decoded.events[0].delta_ticks, 0);
    assert!(decoded.events[1..].iter().all(|e| e.delta_ticks == FIXTURE_DELTA));

    write_events(&decoded.events, original.ticks_per_beat, &out).unwrap();
    let reloaded = load(&out).unwrap();
    assert_eq!(reloaded.ticks_per_beat, FIXTURE_TPB);
    assert_eq!(reloaded.len(), original.len());
    for (a, b) in original.records.iter().zip(&reloaded.records) {
        assert_eq!(a.record, b.record);
        assert!((a.time - b.time).abs() < 1e-3);
    }
}

#[test]
fn generated_sequence_writes_loadable_file() {
    let corpus = five_file_corpus();
    let config = small_config(21);
    let mut trainer = build_trainer(&corpus, &config);
    trainer.run(50).unwrap();

    let (mut model, pool, _rng) = trainer.into_parts();
    let stream = pool.stream(0).unwrap();
    let (primer_records, primer_times) = stream.slice_bits(0, config.seq_len);
    let generated = generate(
        &mut model,
        &primer_records,
        &primer_times,
        config.seq_len,
        16,
    )
    .unwrap();
    assert_eq!(generated.len(), 16);

    let decoded = decode(
        generated.iter().map(|(bits, time)| (bits, *time)),
        config.decode_time_scale,
    );
    assert_eq!(decoded.events.len(), 16);

    let out = corpus.file("generated.mid");
    write_events(&decoded.events, stream.ticks_per_beat(), &out).unwrap();
    let reloaded = load(&out).unwrap();
    assert_eq!(reloaded.len(), 16);
    // The baseline repeats the last primer step.
    let last = primer_records.last().unwrap();
    assert!(reloaded.records.iter().all(|r| r.record.to_bits() == *last));
}
