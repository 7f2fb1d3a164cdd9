//! Slot layout configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::HEADER_LEN;
use crate::error::ConfigError;
use crate::failover::WATCHDOG_RESET_CAUSE;

/// Slot offsets of the reference deployment
pub const DEFAULT_SLOT_OFFSETS: [u64; 2] = [0xD_0000, 0xE_0000];

/// Region length of the reference deployment
pub const DEFAULT_SLOT_LEN: usize = 0x1_0000;

/// Where the redundant slots live on the medium and how a watchdog reset is
/// recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Start offset of each slot, in slot index order
    pub slot_offsets: Vec<u64>,
    /// Length of every slot region in bytes, checksum header included
    pub slot_len: usize,
    /// Reset cause value that means "previous reset was the watchdog"
    pub watchdog_sentinel: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slot_offsets: DEFAULT_SLOT_OFFSETS.to_vec(),
            slot_len: DEFAULT_SLOT_LEN,
            watchdog_sentinel: WATCHDOG_RESET_CAUSE,
        }
    }
}

impl LayoutConfig {
    /// Layout with `count` back-to-back slots of `slot_len` bytes from
    /// offset zero.
    pub fn contiguous(count: usize, slot_len: usize) -> Self {
        let slot_offsets = (0..count)
            .map(|i| (i as u64).saturating_mul(slot_len as u64))
            .collect();
        Self {
            slot_offsets,
            slot_len,
            ..Self::default()
        }
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slot_offsets.len()
    }

    /// Smallest medium size that holds every slot.
    pub fn required_size(&self) -> u64 {
        self.slot_offsets
            .iter()
            .map(|offset| offset.saturating_add(self.slot_len as u64))
            .max()
            .unwrap_or(0)
    }

    /// Validate the layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when there are no slots, a region
    /// cannot hold a header and payload, a region runs past `u64::MAX`, or
    /// two regions overlap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_offsets.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one slot offset is required".to_string(),
            ));
        }
        if self.slot_len <= HEADER_LEN {
            return Err(ConfigError::Invalid(format!(
                "slot_len must exceed the {HEADER_LEN}-byte checksum header, got {}",
                self.slot_len
            )));
        }

        let len = self.slot_len as u64;
        let mut regions = Vec::with_capacity(self.slot_offsets.len());
        for (slot, &offset) in self.slot_offsets.iter().enumerate() {
            let end = offset.checked_add(len).ok_or_else(|| {
                ConfigError::Invalid(format!("slot {slot} at {offset:#x} overflows the medium"))
            })?;
            regions.push((offset, end, slot));
        }

        regions.sort_unstable();
        for pair in regions.windows(2) {
            let [(_, prev_end, prev), (start, _, next)] = pair else {
                continue;
            };
            if start < prev_end {
                return Err(ConfigError::Invalid(format!(
                    "slot {prev} and slot {next} overlap"
                )));
            }
        }

        Ok(())
    }

    /// Load and validate a layout from a JSON file.
    ///
    /// Missing fields fall back to the reference layout.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: LayoutConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(path = %path.display(), slots = config.slot_count(), "Loaded slot layout");
        Ok(config)
    }
}
