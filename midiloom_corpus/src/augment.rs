// Input-side window augmentation.
//
// Applied to a copy of the window inputs only; targets are never touched.
// Every scalar receives independent zero-mean Gaussian noise and is clamped to
// be non-negative. Then one uniformly chosen timestep is blanked (record and
// time set to zero) to simulate a gap in the data.

use midiloom_codec::{RECORD_BITS, RecordBits};
use midiloom_prng::RandomSource;

/// Augment `records`/`times` in place. Returns the blanked timestep, or
/// `None` for an empty window.
pub fn augment<R: RandomSource + ?Sized>(
    records: &mut [RecordBits],
    times: &mut [f32],
    noise_std: f32,
    rng: &mut R,
) -> Option<usize> {
    debug_assert_eq!(records.len(), times.len());
    if records.is_empty() {
        return None;
    }

    for (record, time) in records.iter_mut().zip(times.iter_mut()) {
        for bit in record.iter_mut() {
            *bit = (*bit + rng.gaussian(0.0, noise_std)).max(0.0);
        }
        *time = (*time + rng.gaussian(0.0, noise_std)).max(0.0);
    }

    let gap = rng.range_usize(0, records.len());
    records[gap] = [0.0; RECORD_BITS];
    times[gap] = 0.0;
    Some(gap)
}
