// midiloom_codec: MIDI events <-> fixed-width model records.
//
// This crate owns everything that touches the binary protocol. It has no
// knowledge of the corpus pool or the model; `midiloom_corpus` builds on it.
//
// Module overview:
// - `record.rs`: `Record` (flag, three bytes, chunk length), its 40-bit
//                expansion for the model, and `TimedRecord`.
// - `event.rs`:  `Event`, chunking `encode`, and `validate_message`, the gate
//                every decoded byte sequence must pass.
// - `decode.rs`: Stateful `Decoder` with the continuation aggregation buffer,
//                plus the whole-stream `decode` convenience.
// - `store.rs`:  SMF loading (`load`, `is_compatible`, `scan`) and the
//                `SourceLoader` seam the corpus pool admits files through.
// - `writer.rs`: Format 0 SMF output from decoded events.
// - `error.rs`:  `CodecError`, `FileError`, `LoadFailure`.
//
// Design decisions:
// - **Parsing and writing via `midly`.** Channel messages are serialized
//   through `midly::live::LiveEvent` so the encoder and the decode-side
//   validator agree byte for byte.
// - **Explicit decoder state.** The continuation buffer lives in a `Decoder`
//   value owned by the caller, never in shared state.

pub mod decode;
pub mod error;
pub mod event;
pub mod record;
pub mod store;
pub mod writer;

pub use decode::{Decoded, Decoder, OutputEvent, decode};
pub use error::{CodecError, FileError, LoadFailure};
pub use event::{Event, encode, validate_message};
pub use record::{RECORD_BITS, Record, RecordBits, TimedRecord};
pub use store::{FileStore, LoadedFile, SourceLoader, is_compatible, load, scan};
pub use writer::{DEFAULT_TICKS_PER_BEAT, to_smf_bytes, write_events};
