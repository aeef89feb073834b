// Interface to the external sequence model.
//
// The model is opaque to this crate: it receives a window of bit-expanded
// records and times plus two recurrent-state values (one per network stage),
// and returns a window of predictions with two updated states. The pool stores
// those states verbatim between windows of the same stream and never looks
// inside them; the model alone knows how to build a zero state.
//
// `learn` is the hook an optimizer plugs into. Its default does nothing and
// reports a zero loss, so pure inference models only implement `forward`.
//
// `PersistenceModel` is a dependency-free baseline that predicts "the next
// step equals this step". The CLI and the integration tests drive the full
// training loop with it.

use midiloom_codec::RecordBits;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model returned {got} steps, expected {expected}")]
    OutputShape { expected: usize, got: usize },

    #[error("active length {active_len} outside 1..={seq_len}")]
    ActiveLength { active_len: usize, seq_len: usize },

    #[error("model backend failure: {0}")]
    Backend(String),
}

/// Recurrent state for the two network stages of one logical stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StatePair<S> {
    pub stage0: S,
    pub stage1: S,
}

impl<S: Clone> StatePair<S> {
    /// Both stages set to the same value.
    pub fn splat(state: S) -> Self {
        Self {
            stage0: state.clone(),
            stage1: state,
        }
    }
}

/// Predictions for one window plus the states to carry forward.
#[derive(Clone, Debug)]
pub struct ModelOutput<S> {
    pub records: Vec<RecordBits>,
    pub times: Vec<f32>,
    pub state: StatePair<S>,
}

pub trait SequenceModel {
    type State: Clone;

    /// A fresh state for one stage, used for new and recycled streams.
    fn zero_state(&self) -> Self::State;

    /// Run one window. Inputs hold `seq_len` steps of which the first
    /// `active_len` are meaningful.
    fn forward(
        &mut self,
        input_records: &[RecordBits],
        input_times: &[f32],
        state: &StatePair<Self::State>,
        active_len: usize,
    ) -> Result<ModelOutput<Self::State>, ModelError>;

    /// Update parameters from a forward pass and its targets. Returns the loss.
    fn learn(
        &mut self,
        _output: &ModelOutput<Self::State>,
        _target_records: &[RecordBits],
        _target_times: &[f32],
    ) -> Result<f32, ModelError> {
        Ok(0.0)
    }

    /// Zero state for both stages.
    fn zero_pair(&self) -> StatePair<Self::State> {
        StatePair::splat(self.zero_state())
    }
}

/// Baseline that repeats each input step as its prediction.
///
/// Its state counts the steps each stage has seen, which makes state
/// carry-over observable in tests.
#[derive(Clone, Debug, Default)]
pub struct PersistenceModel {
    pub windows_seen: u64,
}

impl SequenceModel for PersistenceModel {
    type State = u64;

    fn zero_state(&self) -> u64 {
        0
    }

    fn forward(
        &mut self,
        input_records: &[RecordBits],
        input_times: &[f32],
        state: &StatePair<u64>,
        active_len: usize,
    ) -> Result<ModelOutput<u64>, ModelError> {
        let seq_len = input_records.len();
        if active_len == 0 || active_len > seq_len {
            return Err(ModelError::ActiveLength {
                active_len,
                seq_len,
            });
        }
        self.windows_seen += 1;
        let steps = active_len as u64;
        Ok(ModelOutput {
            records: input_records.to_vec(),
            times: input_times.to_vec(),
            state: StatePair {
                stage0: state.stage0 + steps,
                stage1: state.stage1 + steps,
            },
        })
    }

    /// Mean squared error over record bits and times.
    fn learn(
        &mut self,
        output: &ModelOutput<u64>,
        target_records: &[RecordBits],
        target_times: &[f32],
    ) -> Result<f32, ModelError> {
        if output.records.len() != target_records.len() {
            return Err(ModelError::OutputShape {
                expected: target_records.len(),
                got: output.records.len(),
            });
        }
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for (out, target) in output.records.iter().zip(target_records) {
            for (a, b) in out.iter().zip(target) {
                sum += (a - b) * (a - b);
                count += 1;
            }
        }
        for (a, b) in output.times.iter().zip(target_times) {
            sum += (a - b) * (a - b);
            count += 1;
        }
        Ok(if count == 0 { 0.0 } else { sum / count as f32 })
    }
}
