//! Error types for activesetctl

use activeset::{ConfigError, ResetCauseError, SelectorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid set index: {index}")]
    InvalidIndex {
        index: i64,
        #[source]
        source: SelectorError,
    },

    #[error("failed to get current index")]
    NoActiveSlot,

    #[error("Invalid configuration")]
    Config(#[from] ConfigError),

    #[error("Invalid reset cause")]
    ResetCause(#[from] ResetCauseError),

    #[error("active set idx set to: {active}, but slot {slot} still carries the flag")]
    PartialUpdate {
        active: usize,
        slot: usize,
        #[source]
        source: SelectorError,
    },

    #[error("Storage error")]
    Storage(#[source] SelectorError),
}

impl From<SelectorError> for CliError {
    fn from(err: SelectorError) -> Self {
        match err {
            SelectorError::InvalidIndex { index, .. } => Self::InvalidIndex { index, source: err },
            SelectorError::NotFound => Self::NoActiveSlot,
            SelectorError::PartialUpdate { active, slot, .. } => Self::PartialUpdate {
                active,
                slot,
                source: err,
            },
            SelectorError::Slot(_) => Self::Storage(err),
        }
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidIndex { .. } => 2,
            Self::NoActiveSlot => 3,
            Self::Config(_) | Self::ResetCause(_) => 4,
            Self::Storage(_) => 5,
            Self::PartialUpdate { .. } => 6,
        }
    }

    /// Short machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIndex { .. } => "invalid_index",
            Self::NoActiveSlot => "no_active_slot",
            Self::Config(_) => "config",
            Self::ResetCause(_) => "reset_cause",
            Self::Storage(_) => "storage",
            Self::PartialUpdate { .. } => "partial_update",
        }
    }
}
