// Fixed-width record representation of one message chunk.
//
// A `Record` holds five byte-sized fields:
//
//   [continuation_flag, byte_0, byte_1, byte_2, chunk_len]
//
// For model consumption each field expands to its 8-bit representation,
// most-significant bit first, giving `RECORD_BITS` (40) scalars of 0.0/1.0.
// `Record::from_bits` is the inverse on model output: every scalar is rounded
// to the nearer bit and the bits are packed back into bytes.
//
// A `TimedRecord` pairs a record with the scaled delta time of the event it
// was cut from (see `store.rs` for the scaling).

/// Number of byte-sized fields in a record.
pub const RECORD_FIELDS: usize = 5;

/// Width of the bit-expanded record fed to and produced by the model.
pub const RECORD_BITS: usize = RECORD_FIELDS * 8;

/// Maximum number of message bytes a single record carries.
pub const CHUNK_BYTES: usize = 3;

/// Bit-expanded record, one scalar per bit.
pub type RecordBits = [f32; RECORD_BITS];

/// One chunk of at most three message bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Record {
    /// True when the originating event spans more than one chunk.
    pub continuation: bool,
    /// Chunk bytes; unused trailing positions are zero.
    pub bytes: [u8; CHUNK_BYTES],
    /// Declared number of valid bytes. Encoded records always hold 1..=3;
    /// records recovered from model output may hold any byte value.
    pub chunk_len: u8,
}

impl Record {
    /// The valid bytes of this chunk, `min(3, chunk_len)` of them.
    pub fn valid_bytes(&self) -> &[u8] {
        let n = (self.chunk_len as usize).min(CHUNK_BYTES);
        &self.bytes[..n]
    }

    fn fields(&self) -> [u8; RECORD_FIELDS] {
        [
            u8::from(self.continuation),
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.chunk_len,
        ]
    }

    /// Expand into 40 bit scalars.
    pub fn to_bits(&self) -> RecordBits {
        let mut bits = [0.0; RECORD_BITS];
        for (f, byte) in self.fields().into_iter().enumerate() {
            for b in 0..8 {
                if byte & (0x80 >> b) != 0 {
                    bits[f * 8 + b] = 1.0;
                }
            }
        }
        bits
    }

    /// Pack continuous model output back into a record.
    ///
    /// Scalars `>= 0.5` become 1 bits (this also clamps out-of-range values
    /// and treats NaN as 0). The continuation flag is set when its byte is
    /// non-zero.
    pub fn from_bits(bits: &RecordBits) -> Self {
        let mut fields = [0u8; RECORD_FIELDS];
        for (f, field) in fields.iter_mut().enumerate() {
            for b in 0..8 {
                if bits[f * 8 + b] >= 0.5 {
                    *field |= 0x80 >> b;
                }
            }
        }
        Record {
            continuation: fields[0] != 0,
            bytes: [fields[1], fields[2], fields[3]],
            chunk_len: fields[4],
        }
    }
}

/// A record paired with its scaled delta time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedRecord {
    pub record: Record,
    pub time: f32,
}
