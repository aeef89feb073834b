// Bounded, rotating pool of resident training streams.
//
// `CorpusPool` is the central data structure the trainer drives. It owns every
// resident stream (one loaded file with a cursor and two recurrent states),
// the candidate list, and the bookkeeping that keeps each candidate from being
// admitted twice in a session. All mutation happens through its methods from
// the trainer's single-threaded loop, with no internal locking.
//
// Key responsibilities:
// - Window extraction: `pick_window` chooses a uniformly random stream and
//   slices `seq_len` input steps at its cursor, with targets shifted by one.
//   Inputs are augmented (see `augment.rs`); targets are not. The cursor does
//   not move until `commit`.
// - Exhaustion: a stream whose cursor cannot fit another window is recycled
//   to offset 0 with zero state. With probability `1 - loading_rate` this
//   also triggers a rotation.
// - Rotation: admit one untried candidate (validated through the loader,
//   retried across candidates) and, if the pool is now over capacity, evict
//   the oldest resident stream. Eviction is strictly FIFO by admission order.
// - State carry-over: `commit` stores the model's returned states and
//   advances the cursor. Nothing else writes either.
//
// Every random choice draws from the caller's `RandomSource`, so a fixed seed
// (or a scripted source) yields a fixed schedule.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use midiloom_codec::{RecordBits, SourceLoader, TimedRecord};
use midiloom_prng::RandomSource;
use thiserror::Error;

use crate::augment::augment;
use crate::model::StatePair;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Every candidate has been admitted or rejected.
    #[error("no admissible candidate left ({admitted} admitted, {rejected} rejected)")]
    NoCandidateAvailable { admitted: usize, rejected: usize },

    #[error("window length {seq_len} outside 1..={max}")]
    InvalidWindow { seq_len: usize, max: usize },

    #[error("pool has no resident streams")]
    Empty,

    #[error("stream index {index} is not resident (pool holds {resident})")]
    UnknownStream { index: usize, resident: usize },

    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
}

/// Capacity and sampling parameters for a `CorpusPool`.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    pub max_resident: usize,
    pub loading_rate: f64,
    /// Longest window ever requested. Files too short for one such window are
    /// rejected at admission.
    pub max_seq_len: usize,
    pub noise_std: f32,
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_resident == 0 {
            return Err(PoolError::InvalidConfig("max_resident must be at least 1".into()));
        }
        if self.max_seq_len == 0 {
            return Err(PoolError::InvalidConfig("max_seq_len must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.loading_rate) {
            return Err(PoolError::InvalidConfig(format!(
                "loading_rate must be in [0, 1], got {}",
                self.loading_rate
            )));
        }
        if self.noise_std.is_nan() || self.noise_std < 0.0 {
            return Err(PoolError::InvalidConfig(format!(
                "noise_std must be non-negative, got {}",
                self.noise_std
            )));
        }
        Ok(())
    }
}

/// Counters for progress reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub resident: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub rotations: usize,
    pub evictions: usize,
    pub recycles: usize,
}

/// One file held in the pool.
#[derive(Clone, Debug)]
pub struct ResidentStream<S> {
    source: PathBuf,
    records: Vec<TimedRecord>,
    ticks_per_beat: u16,
    cursor: usize,
    state: StatePair<S>,
}

impl<S: Clone> ResidentStream<S> {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> &StatePair<S> {
        &self.state
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// True when no window of `seq_len` (plus its shifted target) fits.
    pub fn is_exhausted(&self, seq_len: usize) -> bool {
        self.cursor + seq_len + 1 > self.records.len()
    }

    /// Bit-expanded records and times for `len` steps from `start`, clipped to
    /// the stream end.
    pub fn slice_bits(&self, start: usize, len: usize) -> (Vec<RecordBits>, Vec<f32>) {
        let end = (start + len).min(self.records.len());
        let slice = self.records.get(start..end).unwrap_or_default();
        (
            slice.iter().map(|r| r.record.to_bits()).collect(),
            slice.iter().map(|r| r.time).collect(),
        )
    }

    fn recycle(&mut self, zero: StatePair<S>) {
        self.cursor = 0;
        self.state = zero;
    }
}

/// A training window served from one resident stream.
#[derive(Clone, Debug)]
pub struct Window<S> {
    pub stream_index: usize,
    pub input_records: Vec<RecordBits>,
    pub input_times: Vec<f32>,
    pub target_records: Vec<RecordBits>,
    pub target_times: Vec<f32>,
    /// The stream's recurrent states, to be fed to the model unchanged.
    pub state: StatePair<S>,
    /// Input timestep blanked by augmentation.
    pub gap_index: usize,
}

pub struct CorpusPool<S, L> {
    loader: L,
    config: PoolConfig,
    streams: VecDeque<ResidentStream<S>>,
    /// Candidates never tried this session.
    untried: Vec<PathBuf>,
    admitted: BTreeSet<PathBuf>,
    rejected: BTreeSet<PathBuf>,
    rotations: usize,
    evictions: usize,
    recycles: usize,
}

impl<S: Clone, L: SourceLoader> CorpusPool<S, L> {
    /// Create an empty pool over `candidates`. Duplicate paths collapse.
    pub fn new(loader: L, candidates: Vec<PathBuf>, config: PoolConfig) -> Self {
        let untried: BTreeSet<PathBuf> = candidates.into_iter().collect();
        Self {
            loader,
            config,
            streams: VecDeque::new(),
            untried: untried.into_iter().collect(),
            admitted: BTreeSet::new(),
            rejected: BTreeSet::new(),
            rotations: 0,
            evictions: 0,
            recycles: 0,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn stream(&self, index: usize) -> Option<&ResidentStream<S>> {
        self.streams.get(index)
    }

    /// Sources of resident streams, oldest admission first.
    pub fn resident_sources(&self) -> Vec<&Path> {
        self.streams.iter().map(|s| s.source()).collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            resident: self.streams.len(),
            admitted: self.admitted.len(),
            rejected: self.rejected.len(),
            rotations: self.rotations,
            evictions: self.evictions,
            recycles: self.recycles,
        }
    }

    /// Admit candidates until the pool is full or candidates run out.
    ///
    /// Returns the resident count. Fails on an invalid config, or if the
    /// pool is still empty once candidates run out.
    pub fn fill<R, F>(&mut self, rng: &mut R, zero: &F) -> Result<usize, PoolError>
    where
        R: RandomSource + ?Sized,
        F: Fn() -> StatePair<S>,
    {
        self.config.validate()?;
        while self.streams.len() < self.config.max_resident {
            match self.admit_next(rng, zero) {
                Ok(_) => {}
                Err(e @ PoolError::NoCandidateAvailable { .. }) => {
                    if self.streams.is_empty() {
                        return Err(e);
                    }
                    tracing::warn!(
                        "Candidates exhausted with {} of {} streams resident",
                        self.streams.len(),
                        self.config.max_resident
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if self.streams.is_empty() {
            return Err(PoolError::NoCandidateAvailable {
                admitted: self.admitted.len(),
                rejected: self.rejected.len(),
            });
        }
        tracing::info!(
            "Pool filled: {} resident, {} rejected, {} untried",
            self.streams.len(),
            self.rejected.len(),
            self.untried.len()
        );
        Ok(self.streams.len())
    }

    /// Serve a window of `seq_len` steps from a random resident stream.
    ///
    /// Exhausted streams are recycled (and may trigger a rotation) until the
    /// chosen stream can serve the window. The cursor is not advanced; call
    /// `commit` once the model has run.
    pub fn pick_window<R, F>(
        &mut self,
        seq_len: usize,
        rng: &mut R,
        zero: &F,
    ) -> Result<Window<S>, PoolError>
    where
        R: RandomSource + ?Sized,
        F: Fn() -> StatePair<S>,
    {
        self.check_seq_len(seq_len)?;
        if self.streams.is_empty() {
            return Err(PoolError::Empty);
        }

        let mut index = rng.range_usize(0, self.streams.len());
        while self.streams[index].is_exhausted(seq_len) {
            self.streams[index].recycle(zero());
            self.recycles += 1;
            tracing::debug!(
                "Stream {} exhausted, recycled to offset 0",
                self.streams[index].source.display()
            );

            if rng.random_bool(1.0 - self.config.loading_rate) {
                match self.rotate(rng, zero) {
                    Ok(active) => {
                        index = active;
                        continue;
                    }
                    Err(e) => tracing::warn!("Rotation skipped: {e}"),
                }
            }
            index = rng.range_usize(0, self.streams.len());
        }

        let stream = &self.streams[index];
        let cursor = stream.cursor;
        let (mut input_records, mut input_times) = stream.slice_bits(cursor, seq_len);
        let (target_records, target_times) = stream.slice_bits(cursor + 1, seq_len);
        let state = stream.state.clone();

        let gap_index = augment(
            &mut input_records,
            &mut input_times,
            self.config.noise_std,
            rng,
        )
        .unwrap_or(0);

        Ok(Window {
            stream_index: index,
            input_records,
            input_times,
            target_records,
            target_times,
            state,
            gap_index,
        })
    }

    /// Store the model's returned state and advance the stream's cursor.
    pub fn commit(
        &mut self,
        stream_index: usize,
        new_state: StatePair<S>,
        seq_len: usize,
    ) -> Result<(), PoolError> {
        self.check_seq_len(seq_len)?;
        let resident = self.streams.len();
        let stream = self
            .streams
            .get_mut(stream_index)
            .ok_or(PoolError::UnknownStream {
                index: stream_index,
                resident,
            })?;
        stream.state = new_state;
        stream.cursor += seq_len;
        Ok(())
    }

    /// Admit one new candidate and evict the oldest stream if over capacity.
    ///
    /// Returns the index of the admitted stream, always the last one.
    pub fn rotate<R, F>(&mut self, rng: &mut R, zero: &F) -> Result<usize, PoolError>
    where
        R: RandomSource + ?Sized,
        F: Fn() -> StatePair<S>,
    {
        self.admit_next(rng, zero)?;
        self.rotations += 1;
        if self.streams.len() > self.config.max_resident {
            if let Some(evicted) = self.streams.pop_front() {
                self.evictions += 1;
                tracing::info!(
                    "Evicted {} ({} records)",
                    evicted.source.display(),
                    evicted.len()
                );
            }
        }
        Ok(self.streams.len() - 1)
    }

    /// Try untried candidates in random order until one loads. Each candidate
    /// is tried at most once per session, which bounds the retries.
    fn admit_next<R, F>(&mut self, rng: &mut R, zero: &F) -> Result<usize, PoolError>
    where
        R: RandomSource + ?Sized,
        F: Fn() -> StatePair<S>,
    {
        let min_len = self.config.max_seq_len + 1;
        while !self.untried.is_empty() {
            let pick = rng.range_usize(0, self.untried.len());
            let path = self.untried.swap_remove(pick);

            let loaded = match self.loader.admit(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!("Rejected {}: {e}", path.display());
                    self.rejected.insert(path);
                    continue;
                }
            };
            if loaded.len() < min_len {
                tracing::warn!(
                    "Rejected {}: {} records, need at least {min_len}",
                    path.display(),
                    loaded.len()
                );
                self.rejected.insert(path);
                continue;
            }

            tracing::info!(
                "Admitted {} ({} records, max event {} bytes)",
                path.display(),
                loaded.len(),
                loaded.max_event_len
            );
            self.admitted.insert(path.clone());
            self.streams.push_back(ResidentStream {
                source: path,
                records: loaded.records,
                ticks_per_beat: loaded.ticks_per_beat,
                cursor: 0,
                state: zero(),
            });
            return Ok(self.streams.len() - 1);
        }
        Err(PoolError::NoCandidateAvailable {
            admitted: self.admitted.len(),
            rejected: self.rejected.len(),
        })
    }

    fn check_seq_len(&self, seq_len: usize) -> Result<(), PoolError> {
        if seq_len == 0 || seq_len > self.config.max_seq_len {
            return Err(PoolError::InvalidWindow {
                seq_len,
                max: self.config.max_seq_len,
            });
        }
        Ok(())
    }
}
