// Training driver loop.
//
// Each iteration is one indivisible unit: pick a window from the pool, run
// the model forward, hand the output and targets to `learn`, then commit the
// returned recurrent state and advance the stream's cursor. Commit happens
// only after the model call succeeds, so a failing or interrupted model call
// leaves every cursor and state as it was.
//
// Per-record and per-file problems are absorbed below this layer (the codec
// skips, the pool retries other candidates). The loop stops only on a model
// failure or when the pool cannot serve any stream.

use midiloom_codec::SourceLoader;
use midiloom_prng::RandomSource;
use thiserror::Error;

use crate::config::{ConfigError, TrainingConfig};
use crate::model::{ModelError, SequenceModel};
use crate::pool::{CorpusPool, PoolError, PoolStats};

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("corpus pool: {0}")]
    Pool(#[from] PoolError),

    #[error("model: {0}")]
    Model(#[from] ModelError),
}

/// Outcome of one iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub stream_index: usize,
    pub loss: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub mean_loss: f32,
    pub pool: PoolStats,
}

pub struct Trainer<M: SequenceModel, L, R> {
    pool: CorpusPool<M::State, L>,
    model: M,
    rng: R,
    config: TrainingConfig,
}

impl<M, L, R> Trainer<M, L, R>
where
    M: SequenceModel,
    L: SourceLoader,
    R: RandomSource,
{
    /// Build a trainer and fill its pool from `pool`'s candidates.
    ///
    /// The pool must admit windows of `config.seq_len`: its `max_seq_len`
    /// sets both the admission minimum and the largest window it serves.
    pub fn new(
        model: M,
        mut pool: CorpusPool<M::State, L>,
        mut rng: R,
        config: TrainingConfig,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        pool.config().validate()?;
        if pool.config().max_seq_len < config.seq_len {
            return Err(ConfigError::Invalid(format!(
                "seq_len {} exceeds the pool's max_seq_len {}",
                config.seq_len,
                pool.config().max_seq_len
            ))
            .into());
        }
        if pool.is_empty() {
            let zero = || model.zero_pair();
            pool.fill(&mut rng, &zero)?;
        }
        Ok(Self {
            pool,
            model,
            rng,
            config,
        })
    }

    pub fn pool(&self) -> &CorpusPool<M::State, L> {
        &self.pool
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run one pick/forward/learn/commit iteration.
    pub fn step(&mut self) -> Result<StepReport, TrainError> {
        let seq_len = self.config.seq_len;
        let model = &self.model;
        let zero = || model.zero_pair();
        let window = self.pool.pick_window(seq_len, &mut self.rng, &zero)?;

        let output = self.model.forward(
            &window.input_records,
            &window.input_times,
            &window.state,
            seq_len,
        )?;
        if output.records.len() != seq_len || output.times.len() != seq_len {
            return Err(ModelError::OutputShape {
                expected: seq_len,
                got: output.records.len().min(output.times.len()),
            }
            .into());
        }
        let loss = self
            .model
            .learn(&output, &window.target_records, &window.target_times)?;

        self.pool.commit(window.stream_index, output.state, seq_len)?;
        tracing::debug!(
            "Step on stream {} (gap at {}), loss {loss:.5}",
            window.stream_index,
            window.gap_index
        );
        Ok(StepReport {
            stream_index: window.stream_index,
            loss,
        })
    }

    /// Run `iterations` steps, logging progress every `log_every`.
    pub fn run(&mut self, iterations: usize) -> Result<TrainingSummary, TrainError> {
        let mut total_loss = 0.0f64;
        let mut interval_loss = 0.0f64;
        for i in 1..=iterations {
            let report = self.step()?;
            total_loss += f64::from(report.loss);
            interval_loss += f64::from(report.loss);

            let log_every = self.config.log_every;
            if log_every > 0 && i % log_every == 0 {
                let stats = self.pool.stats();
                tracing::info!(
                    "Iteration {i}/{iterations}: mean loss {:.5}, {} resident, {} rotations, {} evictions",
                    interval_loss / log_every as f64,
                    stats.resident,
                    stats.rotations,
                    stats.evictions
                );
                interval_loss = 0.0;
            }
        }
        let mean_loss = if iterations == 0 {
            0.0
        } else {
            (total_loss / iterations as f64) as f32
        };
        Ok(TrainingSummary {
            iterations,
            mean_loss,
            pool: self.pool.stats(),
        })
    }

    /// Give back the model and pool, e.g. for generation after training.
    pub fn into_parts(self) -> (M, CorpusPool<M::State, L>, R) {
        (self.model, self.pool, self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelOutput, PersistenceModel, StatePair};
    use crate::pool::PoolConfig;
    use midiloom_codec::{FileError, LoadedFile, Record, RecordBits, TimedRecord};
    use midiloom_prng::LoomRng;
    use std::path::{Path, PathBuf};

    /// Every path loads as `len` records.
    struct FixedLoader {
        len: usize,
    }

    impl SourceLoader for FixedLoader {
        fn is_compatible(&self, _path: &Path) -> bool {
            true
        }

        fn load(&self, _path: &Path) -> Result<LoadedFile, FileError> {
            let record = TimedRecord {
                record: Record {
                    continuation: false,
                    bytes: [0x90, 60, 64],
                    chunk_len: 3,
                },
                time: 1.0,
            };
            Ok(LoadedFile {
                records: vec![record; self.len],
                ticks_per_beat: 96,
                max_event_len: 3,
            })
        }
    }

    /// Fails every forward pass.
    struct BrokenModel;

    impl SequenceModel for BrokenModel {
        type State = u64;

        fn zero_state(&self) -> u64 {
            0
        }

        fn forward(
            &mut self,
            _input_records: &[RecordBits],
            _input_times: &[f32],
            _state: &StatePair<u64>,
            _active_len: usize,
        ) -> Result<ModelOutput<u64>, ModelError> {
            Err(ModelError::Backend("device lost".into()))
        }
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            seq_len: 4,
            max_resident: 2,
            loading_rate: 0.5,
            log_every: 5,
            ..TrainingConfig::default()
        }
    }

    fn candidates(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("song{i}.mid"))).collect()
    }

    #[test]
    fn state_carries_across_windows() {
        let config = TrainingConfig {
            max_resident: 1,
            loading_rate: 1.0,
            ..small_config()
        };
        let pool = CorpusPool::new(FixedLoader { len: 100 }, candidates(1), config.pool_config());
        let mut trainer =
            Trainer::new(PersistenceModel::default(), pool, LoomRng::new(1), config).unwrap();

        for _ in 0..3 {
            trainer.step().unwrap();
        }
        let stream = trainer.pool().stream(0).unwrap();
        assert_eq!(stream.cursor(), 12);
        assert_eq!(stream.state(), &StatePair { stage0: 12, stage1: 12 });
    }

    #[test]
    fn run_summarizes_and_respects_capacity() {
        let config = small_config();
        let pool = CorpusPool::new(FixedLoader { len: 9 }, candidates(20), config.pool_config());
        let mut trainer =
            Trainer::new(PersistenceModel::default(), pool, LoomRng::new(2), config).unwrap();

        let summary = trainer.run(60).unwrap();
        assert_eq!(summary.iterations, 60);
        assert!(summary.pool.resident <= 2);
        assert!(summary.pool.rotations > 0);
        assert_eq!(summary.pool.evictions, summary.pool.rotations);
        assert!(summary.mean_loss >= 0.0);
        assert_eq!(trainer.model().windows_seen, 60);
    }

    #[test]
    fn model_failure_leaves_pool_untouched() {
        let config = TrainingConfig {
            max_resident: 1,
            ..small_config()
        };
        let pool = CorpusPool::new(FixedLoader { len: 50 }, candidates(1), config.pool_config());
        let mut trainer = Trainer::new(BrokenModel, pool, LoomRng::new(3), config).unwrap();

        let err = trainer.step().unwrap_err();
        assert!(matches!(err, TrainError::Model(ModelError::Backend(_))));
        let stream = trainer.pool().stream(0).unwrap();
        assert_eq!(stream.cursor(), 0);
        assert_eq!(stream.state(), &StatePair::splat(0));
    }

    #[test]
    fn empty_corpus_is_fatal() {
        let config = small_config();
        let pool = CorpusPool::new(FixedLoader { len: 2 }, candidates(3), config.pool_config());
        let result = Trainer::new(PersistenceModel::default(), pool, LoomRng::new(4), config);
        assert!(matches!(
            result,
            Err(TrainError::Pool(PoolError::NoCandidateAvailable { .. }))
        ));
    }

    #[test]
    fn pool_with_shorter_windows_is_rejected() {
        let config = TrainingConfig {
            seq_len: 8,
            ..small_config()
        };
        let pool_config = PoolConfig {
            max_seq_len: 4,
            ..config.pool_config()
        };
        let pool = CorpusPool::new(FixedLoader { len: 50 }, candidates(2), pool_config);
        let result = Trainer::new(PersistenceModel::default(), pool, LoomRng::new(6), config);
        assert!(matches!(result, Err(TrainError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn invalid_pool_config_is_rejected() {
        let config = small_config();
        let pool_config = PoolConfig {
            max_resident: 0,
            loading_rate: 2.0,
            ..config.pool_config()
        };
        let pool = CorpusPool::new(FixedLoader { len: 50 }, candidates(2), pool_config);
        let result = Trainer::new(PersistenceModel::default(), pool, LoomRng::new(7), config);
        assert!(matches!(
            result,
            Err(TrainError::Pool(PoolError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TrainingConfig {
            loading_rate: -1.0,
            ..small_config()
        };
        let pool = CorpusPool::new(FixedLoader { len: 50 }, candidates(1), small_config().pool_config());
        let result = Trainer::new(PersistenceModel::default(), pool, LoomRng::new(5), config);
        assert!(matches!(result, Err(TrainError::Config(_))));
    }
}
