// Record stream -> event stream.
//
// The decoder is a single pass over (record, time) pairs carrying one piece of
// state: an aggregation buffer for continuation chunks.
//
// - A record with the continuation flag set appends its valid bytes and its
//   time to the buffer and emits nothing.
// - A record with the flag clear first flushes the buffer (if non-empty) as
//   one event, timed by the mean of the buffered times, then emits a second,
//   independent event from its own bytes.
// - Whatever remains buffered at end of stream is dropped.
//
// Every emitted byte sequence goes through `validate_message`; invalid ones
// are returned as `CodecError::InvalidMessageBytes` and decoding carries on
// with the next record.

use crate::error::CodecError;
use crate::event::validate_message;
use crate::record::{Record, RecordBits};

/// Largest delta an SMF track event can store (28-bit variable length).
pub const MAX_DELTA_TICKS: u32 = 0x0FFF_FFFF;

/// A reconstructed message with its delta in output ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEvent {
    pub bytes: Vec<u8>,
    pub delta_ticks: u32,
}

/// Result of decoding a whole stream.
#[derive(Debug, Default)]
pub struct Decoded {
    pub events: Vec<OutputEvent>,
    pub rejected: Vec<CodecError>,
    /// Bytes of a trailing multi-chunk event that never saw a terminating
    /// non-continuation record.
    pub dropped_tail: usize,
}

/// Stateful record decoder.
#[derive(Debug)]
pub struct Decoder {
    time_scale: f64,
    pending_bytes: Vec<u8>,
    pending_times: Vec<f32>,
}

impl Decoder {
    /// `time_scale` converts record time values to output ticks.
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale,
            pending_bytes: Vec::new(),
            pending_times: Vec::new(),
        }
    }

    /// Feed one record. Returns zero, one or two decoded messages, in order.
    pub fn push(&mut self, record: &Record, time: f32) -> Vec<Result<OutputEvent, CodecError>> {
        let time = clamp_time(time);
        if record.continuation {
            self.pending_bytes.extend_from_slice(record.valid_bytes());
            self.pending_times.push(time);
            return Vec::new();
        }

        let mut out = Vec::with_capacity(2);
        if !self.pending_times.is_empty() {
            let bytes = std::mem::take(&mut self.pending_bytes);
            let times = std::mem::take(&mut self.pending_times);
            out.push(self.build(bytes, &times));
        }
        out.push(self.build(record.valid_bytes().to_vec(), &[time]));
        out
    }

    /// Feed one bit-expanded record as produced by the model.
    pub fn push_bits(&mut self, bits: &RecordBits, time: f32) -> Vec<Result<OutputEvent, CodecError>> {
        self.push(&Record::from_bits(bits), time)
    }

    /// Number of buffered continuation bytes not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.pending_bytes.len()
    }

    /// End the stream, discarding any partial multi-chunk event. Returns the
    /// number of dropped bytes.
    pub fn finish(self) -> usize {
        self.pending_bytes.len()
    }

    fn build(&self, bytes: Vec<u8>, times: &[f32]) -> Result<OutputEvent, CodecError> {
        validate_message(&bytes)?;
        let mean = times.iter().map(|&t| f64::from(t)).sum::<f64>() / times.len() as f64;
        let ticks = (mean * self.time_scale).round();
        let delta_ticks = if ticks.is_finite() {
            ticks.clamp(0.0, f64::from(MAX_DELTA_TICKS)) as u32
        } else {
            0
        };
        Ok(OutputEvent { bytes, delta_ticks })
    }
}

fn clamp_time(time: f32) -> f32 {
    if time.is_nan() { 0.0 } else { time.max(0.0) }
}

/// Decode a complete stream of bit-expanded records and times.
///
/// Rejected messages are logged and collected; they never abort the pass.
pub fn decode<'a, I>(pairs: I, time_scale: f64) -> Decoded
where
    I: IntoIterator<Item = (&'a RecordBits, f32)>,
{
    let mut decoder = Decoder::new(time_scale);
    let mut decoded = Decoded::default();
    for (bits, time) in pairs {
        for result in decoder.push_bits(bits, time) {
            match result {
                Ok(event) => decoded.events.push(event),
                Err(e) => {
                    tracing::warn!("Dropping decoded message: {e}");
                    decoded.rejected.push(e);
                }
            }
        }
    }
    decoded.dropped_tail = decoder.finish();
    if decoded.dropped_tail > 0 {
        tracing::debug!(
            "Discarded {} bytes of an unterminated multi-chunk event",
            decoded.dropped_tail
        );
    }
    decoded
}
