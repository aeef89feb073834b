// MIDI output from decoded event streams.
//
// Converts a sequence of `OutputEvent`s into a Standard MIDI File for
// playback and evaluation. Output is always SMF format 0: one track holding
// the events in order, closed by an `EndOfTrack` meta event. No tempo event is
// written, so players use the default 120 BPM, matching the tick scaling the
// file store applies on load.
//
// Uses the `midly` crate for MIDI writing. Events whose bytes do not validate
// are skipped; their delta ticks roll into the next written event so the
// surviving events keep their absolute positions.

use std::path::Path;

use midly::num::{u15, u28};
use midly::{Format, Header, MetaMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::decode::{MAX_DELTA_TICKS, OutputEvent};
use crate::error::FileError;
use crate::event::validate_message;

/// Ticks per quarter note when generating without a source file.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// Convert decoded events to MIDI and write them to a file.
pub fn write_events(events: &[OutputEvent], ticks_per_beat: u16, path: &Path) -> Result<(), FileError> {
    let buf = to_smf_bytes(events, ticks_per_beat).map_err(|source| FileError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, &buf).map_err(|source| FileError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Wrote {} events to {}", events.len(), path.display());
    Ok(())
}

/// Serialize decoded events to an in-memory SMF image.
pub fn to_smf_bytes(events: &[OutputEvent], ticks_per_beat: u16) -> std::io::Result<Vec<u8>> {
    let smf = events_to_smf(events, ticks_per_beat);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Build a format 0 SMF borrowing message bytes from `events`.
fn events_to_smf(events: &[OutputEvent], ticks_per_beat: u16) -> Smf<'_> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(ticks_per_beat.clamp(1, 0x7FFF))),
    ));

    let mut track: Track<'_> = Vec::with_capacity(events.len() + 1);
    let mut carried: u32 = 0;
    for event in events {
        let delta = carried.saturating_add(event.delta_ticks).min(MAX_DELTA_TICKS);
        match validate_message(&event.bytes) {
            Ok(kind) => {
                track.push(TrackEvent {
                    delta: u28::new(delta),
                    kind,
                });
                carried = 0;
            }
            Err(e) => {
                tracing::warn!("Not writing event: {e}");
                carried = delta;
            }
        }
    }

    track.push(TrackEvent {
        delta: u28::new(carried),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    smf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_bytes;

    fn ev(bytes: &[u8], delta_ticks: u32) -> OutputEvent {
        OutputEvent {
            bytes: bytes.to_vec(),
            delta_ticks,
        }
    }

    #[test]
    fn writes_single_track_file() {
        let events = vec![ev(&[0x90, 60, 80], 0), ev(&[0x80, 60, 0], 480)];
        let smf = events_to_smf(&events, 480);
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);
        // Two messages plus end of track.
        assert_eq!(smf.tracks[0].len(), 3);
    }

    #[test]
    fn invalid_events_are_skipped_and_their_delta_carried() {
        let events = vec![ev(&[0x90, 60, 80], 10), ev(&[0x12], 20), ev(&[0x80, 60, 0], 30)];
        let smf = events_to_smf(&events, 96);
        let track = &smf.tracks[0];
        assert_eq!(track.len(), 3);
        assert_eq!(track[0].delta.as_int(), 10);
        assert_eq!(track[1].delta.as_int(), 50);
    }

    #[test]
    fn written_file_loads_back() {
        let events = vec![
            ev(&[0x90, 60, 80], 0),
            ev(&[0xF0, 0x7E, 0x01, 0x02, 0xF7], 240),
            ev(&[0x80, 60, 0], 480),
        ];
        let bytes = to_smf_bytes(&events, 480).unwrap();
        let loaded = load_bytes(Path::new("out.mid"), &bytes).unwrap();
        assert_eq!(loaded.ticks_per_beat, 480);
        // Note, two SysEx chunks, note.
        assert_eq!(loaded.len(), 4);
        // Output ticks equal record times at the default tempo.
        assert!((loaded.records[1].time - 240.0).abs() < 1e-3);
        assert!((loaded.records[3].time - 480.0).abs() < 1e-3);
    }

    #[test]
    fn write_events_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("out.mid");
        let err = write_events(&[ev(&[0x90, 60, 80], 0)], 480, &path).unwrap_err();
        assert!(matches!(err, FileError::WriteFailed { .. }));
    }
}
