// File store: Standard MIDI Files in, timed records out.
//
// `load` parses a format 0 (single track) file with `midly`, walks its events
// in order and encodes every channel and SysEx message through
// `event::encode`. Meta events (tempo, names, end of track) and escape
// sequences are not encoded, but their delta ticks are carried forward so
// timing stays aligned. Tempo events update the tick-to-seconds conversion.
//
// Time scaling: an event's delta in seconds is multiplied by
// `ticks_per_beat * 2`, applied identically to every record cut from that
// event. At the default tempo (120 BPM) this reproduces the tick delta.
//
// `is_compatible` is a pure filter: any parse or I/O error reads as "not
// compatible" and is never surfaced to the caller.
//
// `SourceLoader` is the seam the corpus pool admits files through; `FileStore`
// is its on-disk implementation.

use std::fs;
use std::path::{Path, PathBuf};

use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};

use crate::error::{FileError, LoadFailure};
use crate::event::{Event, channel_message_bytes, encode, sysex_bytes};
use crate::record::TimedRecord;

/// Tempo assumed until the first tempo event (microseconds per beat).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// A source file converted to records.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedFile {
    pub records: Vec<TimedRecord>,
    pub ticks_per_beat: u16,
    /// Longest encoded event in bytes. Bookkeeping only.
    pub max_event_len: usize,
}

impl LoadedFile {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that belong to multi-chunk events.
    pub fn continuation_count(&self) -> usize {
        self.records.iter().filter(|r| r.record.continuation).count()
    }
}

/// Source of candidate files for the corpus pool.
pub trait SourceLoader {
    /// Cheap format check. Must never fail; errors read as `false`.
    fn is_compatible(&self, path: &Path) -> bool;

    fn load(&self, path: &Path) -> Result<LoadedFile, FileError>;

    /// Check and load in one call, as the pool does at admission. An
    /// incompatible source is an error, never a panic.
    ///
    /// The default runs `is_compatible` then `load`. Loaders whose `load`
    /// already enforces the format override it to read the source once.
    fn admit(&self, path: &Path) -> Result<LoadedFile, FileError> {
        if !self.is_compatible(path) {
            return Err(FileError::NotCompatible {
                path: path.to_path_buf(),
            });
        }
        self.load(path)
    }
}

/// Loads Standard MIDI Files from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStore;

impl SourceLoader for FileStore {
    fn is_compatible(&self, path: &Path) -> bool {
        is_compatible(path)
    }

    fn load(&self, path: &Path) -> Result<LoadedFile, FileError> {
        load(path)
    }

    /// `load` rejects non-format-0 files itself, so one read and parse covers
    /// both checks.
    fn admit(&self, path: &Path) -> Result<LoadedFile, FileError> {
        load(path)
    }
}

/// Load a single-track MIDI file from disk.
pub fn load(path: &Path) -> Result<LoadedFile, FileError> {
    let data = fs::read(path).map_err(|e| FileError::load_failed(path, e))?;
    let loaded = load_bytes(path, &data)?;
    tracing::debug!(
        "Loaded {}: {} records, ticks_per_beat={}, max event {} bytes",
        path.display(),
        loaded.len(),
        loaded.ticks_per_beat,
        loaded.max_event_len
    );
    Ok(loaded)
}

/// Parse an in-memory SMF image. `path` is only used for error reporting.
pub fn load_bytes(path: &Path, data: &[u8]) -> Result<LoadedFile, FileError> {
    let smf = Smf::parse(data).map_err(|e| FileError::load_failed(path, e))?;
    if smf.header.format != Format::SingleTrack {
        return Err(FileError::IncompatibleFormat {
            path: path.to_path_buf(),
            format: smf.header.format,
        });
    }
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(..) => {
            return Err(FileError::load_failed(path, LoadFailure::TimecodeTiming));
        }
    };
    // A zero division would turn every delta into NaN.
    if ticks_per_beat == 0 {
        return Err(FileError::load_failed(path, LoadFailure::TimecodeTiming));
    }

    let time_scale = f64::from(ticks_per_beat) * 2.0;
    let mut tempo_us = DEFAULT_TEMPO_US;
    let mut pending_seconds = 0.0f64;
    let mut records = Vec::new();
    let mut max_event_len = 0;

    // Format 0 guarantees exactly one track.
    for event in smf.tracks.iter().flatten() {
        pending_seconds += f64::from(event.delta.as_int()) * f64::from(tempo_us)
            / (f64::from(ticks_per_beat) * 1_000_000.0);

        let bytes = match event.kind {
            TrackEventKind::Midi { channel, message } => channel_message_bytes(channel, message)
                .map_err(|e| FileError::load_failed(path, e))?,
            TrackEventKind::SysEx(data) => sysex_bytes(data),
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                tempo_us = t.as_int();
                continue;
            }
            TrackEventKind::Meta(_) | TrackEventKind::Escape(_) => continue,
        };

        let event = Event::new(bytes, pending_seconds);
        match encode(&event) {
            Ok(chunks) => {
                max_event_len = max_event_len.max(event.bytes.len());
                let time = (event.delta_time * time_scale) as f32;
                records.extend(chunks.into_iter().map(|record| TimedRecord { record, time }));
                pending_seconds = 0.0;
            }
            // Fatal to the event only.
            Err(e) => tracing::warn!("Skipping event in {}: {e}", path.display()),
        }
    }

    if records.is_empty() {
        return Err(FileError::load_failed(path, LoadFailure::Empty));
    }

    Ok(LoadedFile {
        records,
        ticks_per_beat,
        max_event_len,
    })
}

/// True if `path` is a readable, well-formed, single-track MIDI file.
pub fn is_compatible(path: &Path) -> bool {
    let Ok(data) = fs::read(path) else {
        return false;
    };
    match Smf::parse(&data) {
        Ok(smf) => smf.header.format == Format::SingleTrack,
        Err(_) => false,
    }
}

/// Recursively list `.mid` / `.midi` files under `dir`, sorted.
pub fn scan(dir: &Path) -> Result<Vec<PathBuf>, FileError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|e| FileError::load_failed(&current, e))?;
        for entry in entries {
            let path = entry.map_err(|e| FileError::load_failed(&current, e))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_midi_extension(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn has_midi_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}
