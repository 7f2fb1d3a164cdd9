//! Checksummed key/value block codec
//!
//! Every slot holds one fixed-size block:
//!
//! ```text
//! +----------------+---------------------------------------+--------------+
//! | crc32 (u32 LE) | key=value\0key=value\0 ... key=value\0\0 | zero padding |
//! +----------------+---------------------------------------+--------------+
//!  \____ 4 bytes _/ \_________________ payload (block_len - 4) ___________/
//! ```
//!
//! The CRC-32 (IEEE 802.3) covers the whole payload, padding included. Records
//! are written in key order and terminated by an empty record.
//!
//! Decoding a verified block never fails on record contents: bytes that are
//! not UTF-8 are replaced with U+FFFD, a bare `name` record deletes `name`,
//! and a record with an empty key is skipped. `name=` keeps an empty value.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::CodecError;

/// Size of the checksum header in bytes
pub const HEADER_LEN: usize = 4;

/// Reserved key carrying the active flag
pub const ACTIVE_KEY: &str = "activeset";

/// Active flag value for the selected slot
pub const ACTIVE_ON: &str = "1";

/// Active flag value for every other slot
pub const ACTIVE_OFF: &str = "0";

/// Decoded contents of a config block. Duplicate keys collapse with the last
/// record winning.
pub type Mapping = BTreeMap<String, String>;

/// Whether a mapping carries the active flag.
///
/// Only the exact value `"1"` counts; `"0"`, any other value, or a missing key
/// reads as inactive.
pub fn is_active(mapping: &Mapping) -> bool {
    mapping.get(ACTIVE_KEY).is_some_and(|value| value == ACTIVE_ON)
}

/// Set or clear the active flag.
pub fn set_active_flag(mapping: &mut Mapping, active: bool) {
    let value = if active { ACTIVE_ON } else { ACTIVE_OFF };
    mapping.insert(ACTIVE_KEY.to_string(), value.to_string());
}

/// Encoder/decoder for one fixed block length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCodec {
    block_len: usize,
}

impl ConfigCodec {
    /// Create a codec for blocks of `block_len` bytes, header included.
    pub fn new(block_len: usize) -> Result<Self, CodecError> {
        if block_len <= HEADER_LEN {
            return Err(CodecError::BlockTooSmall(block_len));
        }
        Ok(Self { block_len })
    }

    /// Total on-media length of a block
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Bytes available for records, terminator included
    pub fn payload_capacity(&self) -> usize {
        self.block_len.saturating_sub(HEADER_LEN)
    }

    /// Verify and decode a block.
    ///
    /// The block is only decoded once the stored checksum matches; a
    /// mismatch yields no data at all.
    pub fn parse(&self, block: &[u8]) -> Result<Mapping, CodecError> {
        if block.len() != self.block_len {
            return Err(CodecError::InvalidLength {
                expected: self.block_len,
                actual: block.len(),
            });
        }

        let (header, payload) =
            block
                .split_first_chunk::<HEADER_LEN>()
                .ok_or(CodecError::InvalidLength {
                    expected: self.block_len,
                    actual: block.len(),
                })?;

        let stored = u32::from_le_bytes(*header);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(CodecError::ChecksumMismatch { stored, computed });
        }

        Ok(decode_records(payload))
    }

    /// Encode a mapping into a full block.
    pub fn serialize(&self, mapping: &Mapping) -> Result<Vec<u8>, CodecError> {
        let needed = encoded_len(mapping)?;
        let capacity = self.payload_capacity();
        if needed > capacity {
            return Err(CodecError::PayloadTooLarge { needed, capacity });
        }

        let mut block = Vec::with_capacity(self.block_len);
        block.extend_from_slice(&[0u8; HEADER_LEN]);
        for (key, value) in mapping {
            block.extend_from_slice(key.as_bytes());
            block.push(b'=');
            block.extend_from_slice(value.as_bytes());
            block.push(0);
        }
        // Terminating empty record and padding are both zero.
        block.resize(self.block_len, 0);

        let (header, payload) = block
            .split_first_chunk_mut::<HEADER_LEN>()
            .ok_or(CodecError::BlockTooSmall(self.block_len))?;
        *header = crc32fast::hash(payload).to_le_bytes();

        Ok(block)
    }
}

/// Bytes needed to encode `mapping`, terminating record included.
fn encoded_len(mapping: &Mapping) -> Result<usize, CodecError> {
    let mut len: usize = 1;
    for (key, value) in mapping {
        if key.is_empty() || key.contains(['=', '\0']) {
            return Err(CodecError::InvalidKey(key.clone()));
        }
        if value.contains('\0') {
            return Err(CodecError::InvalidValue { key: key.clone() });
        }
        // key '=' value NUL
        len = len
            .saturating_add(key.len())
            .saturating_add(value.len())
            .saturating_add(2);
    }
    Ok(len)
}

fn decode_records(payload: &[u8]) -> Mapping {
    let mut mapping = Mapping::new();
    let mut offset = 0usize;

    for record in payload.split(|&b| b == 0) {
        if record.is_empty() {
            break;
        }
        let start = offset;
        offset = offset.saturating_add(record.len()).saturating_add(1);

        let text = String::from_utf8_lossy(record);
        match text.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                mapping.insert(key.to_string(), value.to_string());
            }
            // A bare name removes any earlier value.
            None => {
                if mapping.remove(text.as_ref()).is_some() {
                    debug!(offset = start, key = %text, "Record deletes key");
                }
            }
            Some(_) => warn!(offset = start, "Skipping record with empty key"),
        }
    }

    mapping
}
