// Autoregressive generation.
//
// The model is first primed with a window of real records (all steps active)
// to build up its recurrent state. After that each predicted step is fed back
// as the only active input step of the next call, with both states carried
// from call to call. The result is a raw (record bits, time) stream; decode it
// with `midiloom_codec::decode` and write it with `write_events`.

use midiloom_codec::{RECORD_BITS, RecordBits};

use crate::model::{ModelError, SequenceModel};

/// Generate `steps` records after priming with `primer_records`.
///
/// `seq_len` is the window width the model expects; the primer is truncated
/// to it. With an empty primer generation starts from a blank step.
pub fn generate<M: SequenceModel>(
    model: &mut M,
    primer_records: &[RecordBits],
    primer_times: &[f32],
    seq_len: usize,
    steps: usize,
) -> Result<Vec<(RecordBits, f32)>, ModelError> {
    if seq_len == 0 {
        return Err(ModelError::ActiveLength {
            active_len: 0,
            seq_len,
        });
    }

    let mut state = model.zero_pair();
    let mut input_records = vec![[0.0; RECORD_BITS]; seq_len];
    let mut input_times = vec![0.0f32; seq_len];

    let primed = primer_records.len().min(primer_times.len()).min(seq_len);
    let mut next = ([0.0; RECORD_BITS], 0.0f32);
    if primed > 0 {
        input_records[..primed].copy_from_slice(&primer_records[..primed]);
        input_times[..primed].copy_from_slice(&primer_times[..primed]);
        let output = model.forward(&input_records, &input_times, &state, primed)?;
        next = last_active(&output.records, &output.times, primed)?;
        state = output.state;
    }

    let mut generated = Vec::with_capacity(steps);
    for _ in 0..steps {
        input_records.fill([0.0; RECORD_BITS]);
        input_times.fill(0.0);
        input_records[0] = next.0;
        input_times[0] = next.1;

        let output = model.forward(&input_records, &input_times, &state, 1)?;
        next = last_active(&output.records, &output.times, 1)?;
        state = output.state;
        generated.push(next);
    }
    tracing::debug!("Generated {} steps after a {primed}-step primer", generated.len());
    Ok(generated)
}

fn last_active(
    records: &[RecordBits],
    times: &[f32],
    active_len: usize,
) -> Result<(RecordBits, f32), ModelError> {
    match (records.get(active_len - 1), times.get(active_len - 1)) {
        (Some(record), Some(&time)) => Ok((*record, time)),
        _ => Err(ModelError::OutputShape {
            expected: active_len,
            got: records.len().min(times.len()),
        }),
    }
}
