// Data-driven training configuration.
//
// All tunable scheduler parameters live in `TrainingConfig`, loaded from JSON
// and overridable from the command line. Missing fields take their defaults,
// so a config file only needs the values it changes.
//
// `validate` runs before any file is admitted; the pool and trainer assume a
// validated config.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::PoolConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Steps per training window.
    pub seq_len: usize,

    /// Maximum number of streams held in memory at once.
    pub max_resident: usize,

    /// Probability that an exhausted stream is simply replayed from the start
    /// instead of triggering a rotation.
    pub loading_rate: f64,

    /// Standard deviation of the Gaussian noise added to window inputs.
    pub noise_std: f32,

    /// Training iterations for `Trainer::run`.
    pub iterations: usize,

    /// Seed for the scheduler's random source.
    pub seed: u64,

    /// Multiplier from record time values to output ticks when decoding.
    pub decode_time_scale: f64,

    /// Emit a progress line every this many iterations (0 disables).
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seq_len: 128,
            max_resident: 8,
            loading_rate: 0.8,
            noise_std: 0.1,
            iterations: 1000,
            seed: 0,
            decode_time_scale: 1.0,
            log_every: 100,
        }
    }
}

impl TrainingConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: TrainingConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seq_len == 0 {
            return Err(ConfigError::Invalid("seq_len must be at least 1".into()));
        }
        if self.max_resident == 0 {
            return Err(ConfigError::Invalid("max_resident must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.loading_rate) {
            return Err(ConfigError::Invalid(format!(
                "loading_rate must be in [0, 1], got {}",
                self.loading_rate
            )));
        }
        if self.noise_std.is_nan() || self.noise_std < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "noise_std must be non-negative, got {}",
                self.noise_std
            )));
        }
        if !(self.decode_time_scale.is_finite() && self.decode_time_scale >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "decode_time_scale must be finite and non-negative, got {}",
                self.decode_time_scale
            )));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_resident: self.max_resident,
            loading_rate: self.loading_rate,
            max_seq_len: self.seq_len,
            noise_std: self.noise_std,
        }
    }
}
