// Event encoding and message validation.
//
// `encode` cuts one event into records: consecutive chunks of at most three
// bytes, the last chunk carrying the remainder. Every chunk of an event longer
// than three bytes carries `continuation = true`; shorter events produce a
// single record with the flag clear.
//
// `validate_message` is the decode-side gate: a byte sequence is accepted only
// if it is exactly one channel message or exactly one SysEx message, the two
// message kinds the encoder emits and the SMF writer can store.

use std::io;

use midly::live::LiveEvent;
use midly::num::u4;
use midly::{MidiMessage, TrackEventKind};

use crate::error::CodecError;
use crate::record::{CHUNK_BYTES, Record};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// One message of the source protocol with its delta time in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub bytes: Vec<u8>,
    pub delta_time: f64,
}

impl Event {
    pub fn new(bytes: impl Into<Vec<u8>>, delta_time: f64) -> Self {
        Self {
            bytes: bytes.into(),
            delta_time,
        }
    }
}

/// Split an event into `ceil(len / 3)` records.
pub fn encode(event: &Event) -> Result<Vec<Record>, CodecError> {
    if event.bytes.is_empty() {
        return Err(CodecError::MalformedEvent);
    }
    let continuation = event.bytes.len() > CHUNK_BYTES;
    let records = event
        .bytes
        .chunks(CHUNK_BYTES)
        .map(|chunk| {
            let mut bytes = [0u8; CHUNK_BYTES];
            bytes[..chunk.len()].copy_from_slice(chunk);
            Record {
                continuation,
                bytes,
                chunk_len: chunk.len() as u8,
            }
        })
        .collect();
    Ok(records)
}

/// Serialize a channel message to its wire bytes (status byte first, no
/// running status).
pub fn channel_message_bytes(channel: u4, message: MidiMessage) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(CHUNK_BYTES);
    LiveEvent::Midi { channel, message }.write_std(&mut buf)?;
    Ok(buf)
}

/// Raw bytes of a SysEx track event: the leading `F0` plus the stored data,
/// which by SMF convention already ends in `F7`.
pub fn sysex_bytes(data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 1);
    bytes.push(SYSEX_START);
    bytes.extend_from_slice(data);
    bytes
}

/// Check that `bytes` is exactly one storable message and return it as a
/// track event borrowing from `bytes`.
pub fn validate_message(bytes: &[u8]) -> Result<TrackEventKind<'_>, CodecError> {
    let invalid = |reason| CodecError::InvalidMessageBytes {
        bytes: bytes.to_vec(),
        reason,
    };
    let Some(&status) = bytes.first() else {
        return Err(invalid("empty message"));
    };
    match status {
        0x80..=0xEF => {
            let Ok(LiveEvent::Midi { channel, message }) = LiveEvent::parse(bytes) else {
                return Err(invalid("not a complete channel message"));
            };
            // Re-serializing catches trailing bytes and masked data bytes.
            match channel_message_bytes(channel, message) {
                Ok(written) if written == bytes => {}
                _ => return Err(invalid("channel message has stray bytes")),
            }
            Ok(TrackEventKind::Midi { channel, message })
        }
        SYSEX_START => {
            if bytes.len() < 2 || bytes[bytes.len() - 1] != SYSEX_END {
                return Err(invalid("unterminated SysEx"));
            }
            if bytes[1..bytes.len() - 1].iter().any(|&b| b >= 0x80) {
                return Err(invalid("SysEx data byte has the high bit set"));
            }
            Ok(TrackEventKind::SysEx(&bytes[1..]))
        }
        0x00..=0x7F => Err(invalid("data byte in status position")),
        _ => Err(invalid("system message cannot be stored in a track")),
    }
}
