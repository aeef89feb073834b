// Error taxonomy for the codec and the file store.
//
// Codec errors are local: a `MalformedEvent` drops one event at encode time,
// an `InvalidMessageBytes` drops one reconstructed message at decode time.
// File errors reject one candidate file; the corpus pool retries another.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An event with no bytes cannot be chunked into records.
    #[error("malformed event: an event must carry at least one byte")]
    MalformedEvent,

    /// Decoded bytes do not form exactly one valid channel or SysEx message.
    #[error("invalid message bytes {bytes:02X?}: {reason}")]
    InvalidMessageBytes { bytes: Vec<u8>, reason: &'static str },
}

/// Why a file could not be turned into records.
#[derive(Error, Debug)]
pub enum LoadFailure {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed MIDI data: {0}")]
    Parse(#[from] midly::Error),

    #[error("timecode (SMPTE) timing has no ticks-per-beat")]
    TimecodeTiming,

    #[error("file contains no encodable events")]
    Empty,
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to load {}: {source}", path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: LoadFailure,
    },

    /// Only format 0 (single track) files are accepted.
    #[error("{} is {format:?}, expected a single-track file", path.display())]
    IncompatibleFormat { path: PathBuf, format: midly::Format },

    /// A loader's compatibility check turned the source down.
    #[error("{} failed the compatibility check", path.display())]
    NotCompatible { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    pub(crate) fn load_failed(path: impl Into<PathBuf>, source: impl Into<LoadFailure>) -> Self {
        FileError::LoadFailed {
            path: path.into(),
            source: source.into(),
        }
    }
}
