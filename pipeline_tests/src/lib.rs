// Synthetic corpus fixtures for pipeline integration tests.
//
// Writes real Standard MIDI Files to a temporary directory with `midly`, so
// the tests in `tests/full_pipeline.rs` go through the same `FileStore`,
// `scan` and `CorpusPool` code paths as a real corpus on disk. Nothing here
// bypasses the codec; the only test-specific code is the file generation.

use std::fs;
use std::path::{Path, PathBuf};

use midly::num::{u4, u7, u15, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use tempfile::TempDir;

/// Ticks per beat used by every fixture file.
pub const FIXTURE_TPB: u16 = 96;

/// Delta between consecutive fixture notes, in ticks.
pub const FIXTURE_DELTA: u32 = 24;

/// Alternating note-on / note-off messages, one record each.
fn note_track(events: usize) -> Track<'static> {
    let mut track: Track<'static> = (0..events)
        .map(|i| {
            let key = u7::new(48 + (i / 2 % 24) as u8);
            let message = if i % 2 == 0 {
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new(90),
                }
            } else {
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                }
            };
            TrackEvent {
                delta: u28::new(if i == 0 { 0 } else { FIXTURE_DELTA }),
                kind: TrackEventKind::Midi {
                    channel: u4::new((i % 3) as u8),
                    message,
                },
            }
        })
        .collect();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn write_smf(path: &Path, format: Format, tracks: Vec<Track<'static>>) {
    let mut smf = Smf::new(Header::new(format, Timing::Metrical(u15::new(FIXTURE_TPB))));
    smf.tracks = tracks;
    let mut buf = Vec::new();
    smf.write_std(&mut buf).expect("serialize fixture");
    fs::write(path, buf).expect("write fixture");
}

/// Format 0 file with `events` channel messages (= `events` records).
pub fn write_notes(path: &Path, events: usize) {
    write_smf(path, Format::SingleTrack, vec![note_track(events)]);
}

/// Format 1 file with two tracks; never admissible.
pub fn write_multi_track(path: &Path, events: usize) {
    write_smf(
        path,
        Format::Parallel,
        vec![note_track(events), note_track(events)],
    );
}

/// A `.mid` file that is not MIDI at all.
pub fn write_garbage(path: &Path) {
    fs::write(path, b"definitely not a midi file").expect("write garbage");
}

/// A corpus directory with one single-track file per `(name, events)` entry.
pub struct Corpus {
    pub dir: TempDir,
}

impl Corpus {
    pub fn new(files: &[(&str, usize)]) -> Self {
        let dir = tempfile::tempdir().expect("create corpus dir");
        for &(name, events) in files {
            write_notes(&dir.path().join(name), events);
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
