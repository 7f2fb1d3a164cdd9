//! Convenience re-exports for common active-set types

pub use crate::codec::{ConfigCodec, Mapping, is_active, set_active_flag};
pub use crate::config::LayoutConfig;
pub use crate::error::{
    CodecError, ConfigError, FlashError, SelectorError, SelectorResult, SlotError, SlotResult,
};
pub use crate::failover::{WATCHDOG_RESET_CAUSE, WatchdogFailover};
pub use crate::flash::{BlockStore, FileFlash, FlashDevice, MemFlash};
pub use crate::reset_cause::{FileResetCause, FixedResetCause, ResetCauseProvider};
pub use crate::selector::{ActiveSetSelector, SlotReport, SlotState};
pub use crate::slot_store::SlotStore;
