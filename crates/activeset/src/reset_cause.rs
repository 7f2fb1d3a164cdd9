//! Reset cause sources
//!
//! How the cause of the current boot is latched is platform specific; the
//! failover policy only sees a raw `u32` through [`ResetCauseProvider`].
//! The bit names below follow the i.MX6 SRC reset status register, which is
//! where the reference deployment's value comes from.

use std::path::Path;

use crate::error::ResetCauseError;

/// Source of the raw reset cause for the current boot.
pub trait ResetCauseProvider {
    /// Raw reset cause value.
    fn reset_cause(&self) -> u32;
}

impl<F: Fn() -> u32> ResetCauseProvider for F {
    fn reset_cause(&self) -> u32 {
        self()
    }
}

/// Reset cause known up front, e.g. passed by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedResetCause(pub u32);

impl ResetCauseProvider for FixedResetCause {
    fn reset_cause(&self) -> u32 {
        self.0
    }
}

/// Reset cause read once from a text file holding a decimal or `0x` hex
/// number, e.g. a value exported by the bootloader or a sysfs attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileResetCause {
    value: u32,
}

impl FileResetCause {
    /// Read and parse the cause from `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ResetCauseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ResetCauseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            value: parse_reset_cause(&text)?,
        })
    }
}

impl ResetCauseProvider for FileResetCause {
    fn reset_cause(&self) -> u32 {
        self.value
    }
}

/// Parse a decimal or `0x`-prefixed hex reset cause.
pub fn parse_reset_cause(text: &str) -> Result<u32, ResetCauseError> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };
    parsed.map_err(|source| ResetCauseError::Parse {
        value: trimmed.to_string(),
        source,
    })
}

/// i.MX6 SRC_SRSR reset status bits
const SRSR_BITS: [(u32, &str); 7] = [
    (1 << 0, "power-on"),
    (1 << 2, "csu"),
    (1 << 3, "user"),
    (1 << 4, "watchdog"),
    (1 << 5, "jtag"),
    (1 << 6, "jtag-sw"),
    (1 << 16, "warm-boot"),
];

/// Names of the reset status bits set in `cause`, for diagnostics.
pub fn describe_reset_cause(cause: u32) -> Vec<&'static str> {
    SRSR_BITS
        .iter()
        .filter(|(bit, _)| cause & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}
