//! Error types for active-set storage operations

use std::path::PathBuf;

use thiserror::Error;

use crate::flash::FlashOp;

/// Errors raised by a block store adapter
#[derive(Error, Debug)]
pub enum FlashError {
    /// The medium could not be probed or opened
    #[error("Flash probe failed: {0}")]
    ProbeFailed(String),

    /// Access outside the medium
    #[error("Access out of bounds: offset {offset:#x}, len {len:#x}, device size {size:#x}")]
    OutOfBounds {
        /// Start of the access
        offset: u64,
        /// Length of the access
        len: usize,
        /// Total device size
        size: u64,
    },

    /// Underlying I/O error
    #[error("Flash I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fault injected by a test medium
    #[error("Injected {op} fault at offset {offset:#x}")]
    Injected {
        /// Operation that failed
        op: FlashOp,
        /// Region offset the fault was armed for
        offset: u64,
    },

    /// Power was lost part-way through an erase or write
    #[error("Power lost during {op} at offset {offset:#x} after {done} of {len} bytes")]
    PowerCut {
        /// Operation that was interrupted
        op: FlashOp,
        /// Region offset
        offset: u64,
        /// Bytes processed before the cut
        done: usize,
        /// Bytes requested
        len: usize,
    },
}

/// Errors from encoding or decoding a config block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Block length does not match the configured region length
    #[error("Invalid block length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Configured block length
        expected: usize,
        /// Length handed to the codec
        actual: usize,
    },

    /// Block length leaves no room for a payload
    #[error("Block length {0} leaves no room for a payload")]
    BlockTooSmall(usize),

    /// Stored checksum does not match the payload
    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum found in the header
        stored: u32,
        /// Checksum recomputed over the payload
        computed: u32,
    },

    /// Encoded records do not fit the payload
    #[error("Encoded records need {needed} bytes but the payload holds {capacity}")]
    PayloadTooLarge {
        /// Bytes required including the terminating record
        needed: usize,
        /// Payload capacity of the block
        capacity: usize,
    },

    /// Key cannot be represented in the record format
    #[error("Invalid key {0:?}: keys must be non-empty and contain neither '=' nor NUL")]
    InvalidKey(String),

    /// Value cannot be represented in the record format
    #[error("Invalid value for key {key:?}: values must not contain NUL")]
    InvalidValue {
        /// Key the value belongs to
        key: String,
    },
}

/// Errors from loading or saving a single slot
#[derive(Error, Debug)]
pub enum SlotError {
    /// Slot index outside the layout
    #[error("Slot {slot} does not exist (layout has {count} slots)")]
    NoSuchSlot {
        /// Requested slot
        slot: usize,
        /// Number of slots in the layout
        count: usize,
    },

    /// Device probe or read failed
    #[error("Slot {slot} could not be read")]
    Io {
        /// Slot index
        slot: usize,
        /// Adapter error
        #[source]
        source: FlashError,
    },

    /// Slot contents failed verification
    #[error("Slot {slot} is corrupt")]
    Corrupt {
        /// Slot index
        slot: usize,
        /// Codec error
        #[source]
        source: CodecError,
    },

    /// Mapping could not be encoded for this slot
    #[error("Slot {slot} could not be encoded")]
    Encode {
        /// Slot index
        slot: usize,
        /// Codec error
        #[source]
        source: CodecError,
    },

    /// Erase before write failed
    #[error("Slot {slot} erase failed")]
    Erase {
        /// Slot index
        slot: usize,
        /// Adapter error
        #[source]
        source: FlashError,
    },

    /// Write failed
    #[error("Slot {slot} write failed")]
    Write {
        /// Slot index
        slot: usize,
        /// Adapter error
        #[source]
        source: FlashError,
    },
}

impl SlotError {
    /// Slot the error refers to
    pub fn slot(&self) -> usize {
        match self {
            SlotError::NoSuchSlot { slot, .. }
            | SlotError::Io { slot, .. }
            | SlotError::Corrupt { slot, .. }
            | SlotError::Encode { slot, .. }
            | SlotError::Erase { slot, .. }
            | SlotError::Write { slot, .. } => *slot,
        }
    }

    /// Whether the error only makes the slot unusable for this boot.
    ///
    /// Read failures and corrupt contents are skipped while scanning for the
    /// active slot; everything else points at a caller or layout problem.
    pub fn is_unusable(&self) -> bool {
        matches!(self, SlotError::Io { .. } | SlotError::Corrupt { .. })
    }
}

/// Errors from active-set selection and update
#[derive(Error, Debug)]
pub enum SelectorError {
    /// Requested index outside `0..count`
    #[error("Invalid set index {index}: expected 0..{count}")]
    InvalidIndex {
        /// Requested index
        index: i64,
        /// Number of slots
        count: usize,
    },

    /// No readable slot carries the active flag
    #[error("No slot is flagged active")]
    NotFound,

    /// A targeted slot operation failed
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// Target was marked active, clearing another slot failed
    #[error("Slot {active} is now active but slot {slot} could not be cleared")]
    PartialUpdate {
        /// Slot durably marked active
        active: usize,
        /// Slot whose flag could not be cleared
        slot: usize,
        /// Underlying slot error
        #[source]
        source: SlotError,
    },
}

/// Errors from loading or validating a slot layout
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Layout values are inconsistent
    #[error("Invalid layout: {0}")]
    Invalid(String),

    /// Layout file could not be read
    #[error("Failed to read layout file {path:?}")]
    Io {
        /// File path
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// Layout file is not valid JSON for a layout
    #[error("Failed to parse layout file {path:?}")]
    Json {
        /// File path
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from reading a reset cause
#[derive(Error, Debug)]
pub enum ResetCauseError {
    /// Cause file could not be read
    #[error("Failed to read reset cause from {path:?}")]
    Io {
        /// File path
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// Cause text is not a decimal or `0x` hex number
    #[error("Invalid reset cause value: {value:?}")]
    Parse {
        /// Text that failed to parse
        value: String,
        /// Integer parse error
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Result of a flash adapter operation
pub type FlashResult<T> = Result<T, FlashError>;

/// Result of a slot operation
pub type SlotResult<T> = Result<T, SlotError>;

/// Result of a selector or failover operation
pub type SelectorResult<T> = Result<T, SelectorError>;
