// midiloom_corpus: streaming corpus scheduler for MIDI sequence models.
//
// Serves bounded, stateful training windows from a rotating in-memory pool of
// MIDI files and drives an external sequence model over them. The model is
// consumed through the `SequenceModel` trait; the loss and optimizer live
// behind its `learn` hook.
//
// Module overview:
// - `pool.rs`:     `CorpusPool`: resident streams, cursors, recurrent-state
//                  carry-over, probabilistic rotation, FIFO eviction.
// - `augment.rs`:  Gaussian input noise and the blanked gap timestep.
// - `model.rs`:    `SequenceModel`, `StatePair`, `ModelOutput`, and the
//                  `PersistenceModel` baseline.
// - `trainer.rs`:  `Trainer`, the pick / forward / learn / commit loop.
// - `generate.rs`: Primed autoregressive generation.
// - `config.rs`:   `TrainingConfig`, JSON-loadable with defaults.
//
// Dependencies: `midiloom_codec` for records and file loading,
// `midiloom_prng` for every random decision.
//
// Concurrency: none. One loop owns the pool; at most one window per stream is
// outstanding, and state is only written after the model call returns.

pub mod augment;
pub mod config;
pub mod generate;
pub mod model;
pub mod pool;
pub mod trainer;

pub use config::{ConfigError, TrainingConfig};
pub use generate::generate;
pub use model::{ModelError, ModelOutput, PersistenceModel, SequenceModel, StatePair};
pub use pool::{CorpusPool, PoolConfig, PoolError, PoolStats, ResidentStream, Window};
pub use trainer::{StepReport, TrainError, Trainer, TrainingSummary};
