//! Redundant active-set store with watchdog-triggered A/B failover
//!
//! A device keeps N copies ("slots") of a small key/value configuration
//! block in non-volatile memory. Exactly one slot is meant to be the
//! *active set*, marked by the reserved key `activeset=1`. This crate:
//!
//! - encodes and verifies slot blocks (CRC-32 header plus NUL separated
//!   `key=value` records)
//! - finds the active slot, tolerating unreadable and corrupt slots
//! - switches the active slot with a set-then-clear sequence that never
//!   leaves zero slots flagged
//! - rotates to the next slot after a watchdog reset
//!
//! # Architecture
//!
//! - [`codec`]: block format and the active-flag helpers
//! - [`flash`]: block store traits plus in-memory and file-backed adapters
//! - [`slot_store`]: per-slot load and save with a lazily probed device
//! - [`selector`]: active slot lookup, transition and scan
//! - [`failover`]: boot-time watchdog rotation policy
//! - [`reset_cause`]: reset cause providers
//! - [`config`]: slot layout
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use activeset::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = LayoutConfig::contiguous(2, 4096);
//! let flash = MemFlash::new(8192);
//! let mut selector = ActiveSetSelector::open(flash, &layout)?;
//!
//! // Provision slot 0 as active and slot 1 as standby.
//! let mut mapping = Mapping::new();
//! set_active_flag(&mut mapping, true);
//! selector.slots().save(0, &mapping)?;
//! set_active_flag(&mut mapping, false);
//! selector.slots().save(1, &mapping)?;
//!
//! // The previous boot ended in a watchdog reset.
//! let policy = WatchdogFailover::from_layout(&layout);
//! let rotated = policy.on_boot(&mut selector, &FixedResetCause(WATCHDOG_RESET_CAUSE))?;
//! assert_eq!(rotated, Some(1));
//! assert_eq!(selector.get_active_index()?, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod config;
pub mod error;
pub mod failover;
pub mod flash;
pub mod prelude;
pub mod reset_cause;
pub mod selector;
pub mod slot_store;

pub use codec::{ACTIVE_KEY, ConfigCodec, HEADER_LEN, Mapping, is_active, set_active_flag};
pub use config::{DEFAULT_SLOT_LEN, DEFAULT_SLOT_OFFSETS, LayoutConfig};
pub use error::{
    CodecError, ConfigError, FlashError, ResetCauseError, SelectorError, SelectorResult,
    SlotError, SlotResult,
};
pub use failover::{WATCHDOG_RESET_CAUSE, WatchdogFailover};
pub use flash::{BlockStore, Fault, FileFlash, FlashDevice, FlashOp, MemFlash};
pub use reset_cause::{
    FileResetCause, FixedResetCause, ResetCauseProvider, describe_reset_cause, parse_reset_cause,
};
pub use selector::{ActiveSetSelector, SlotReport, SlotState};
pub use slot_store::SlotStore;
