//! Watchdog-triggered A/B failover
//!
//! A watchdog reset means the active set booted, then hung or crashed. On
//! the next boot the policy rotates to the following slot without needing
//! the failed firmware to report anything.

use tracing::{debug, info};

use crate::config::LayoutConfig;
use crate::error::SelectorResult;
use crate::flash::BlockStore;
use crate::reset_cause::ResetCauseProvider;
use crate::selector::ActiveSetSelector;

/// Reset cause of a watchdog reset in the reference deployment
/// (i.MX6 `SRC_SRSR.wdog_rst_b`).
pub const WATCHDOG_RESET_CAUSE: u32 = 0x10;

/// Rotation policy keyed on a single reset cause value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogFailover {
    sentinel: u32,
}

impl Default for WatchdogFailover {
    fn default() -> Self {
        Self::new(WATCHDOG_RESET_CAUSE)
    }
}

impl WatchdogFailover {
    /// Policy that rotates when the reset cause equals `sentinel`.
    pub fn new(sentinel: u32) -> Self {
        Self { sentinel }
    }

    /// Policy using the layout's sentinel.
    pub fn from_layout(layout: &LayoutConfig) -> Self {
        Self::new(layout.watchdog_sentinel)
    }

    /// Sentinel this policy reacts to
    pub fn sentinel(&self) -> u32 {
        self.sentinel
    }

    /// Whether `cause` denotes a watchdog reset. The match is exact.
    pub fn is_watchdog_reset(&self, cause: u32) -> bool {
        cause == self.sentinel
    }

    /// Run the boot-time check.
    ///
    /// Returns `None` without touching storage unless the reset cause is
    /// the watchdog sentinel. Otherwise rotates to
    /// `(active + 1) % slot_count` and returns the new index.
    ///
    /// # Errors
    ///
    /// Any error from locating the current slot or from
    /// [`ActiveSetSelector::set_active`]. After an error the caller must not
    /// assume a defined active slot.
    pub fn on_boot<S, P>(
        &self,
        selector: &mut ActiveSetSelector<S>,
        provider: &P,
    ) -> SelectorResult<Option<usize>>
    where
        S: BlockStore,
        P: ResetCauseProvider + ?Sized,
    {
        let cause = provider.reset_cause();
        if !self.is_watchdog_reset(cause) {
            debug!(cause = format_args!("{cause:#x}"), "Reset was not a watchdog reset");
            return Ok(None);
        }

        let current = selector.get_active_index()?;
        let next = current.saturating_add(1) % selector.slot_count().max(1);
        info!(from = current, to = next, "Watchdog reset, rotating active set");

        selector.set_active(next)?;
        info!(slot = next, "Active set rotated");
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, Mapping};
    use crate::error::{ConfigError, SelectorError};
    use crate::flash::{Fault, FlashOp, MemFlash};
    use crate::reset_cause::FixedResetCause;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn provisioned(
        active: Option<usize>,
        count: usize,
    ) -> Result<(MemFlash, ActiveSetSelector<MemFlash>), Box<dyn std::error::Error>> {
        let layout = LayoutConfig::contiguous(count, 128);
        let flash = MemFlash::new(128 * count);
        let mut selector = ActiveSetSelector::open(flash.clone(), &layout)
            .map_err(|e: ConfigError| e.to_string())?;
        for slot in 0..count {
            let mut mapping = Mapping::new();
            codec::set_active_flag(&mut mapping, Some(slot) == active);
            selector.slots().save(slot, &mapping)?;
        }
        Ok((flash, selector))
    }

    #[test]
    fn test_non_watchdog_cause_is_noop() -> TestResult {
        let (flash, mut selector) = provisioned(Some(0), 2)?;
        let writes = flash.write_count();

        let rotated = WatchdogFailover::default().on_boot(&mut selector, &FixedResetCause(0x1))?;
        assert_eq!(rotated, None);
        assert_eq!(flash.write_count(), writes);
        assert_eq!(selector.get_active_index()?, 0);
        Ok(())
    }

    #[test]
    fn test_watchdog_cause_rotates() -> TestResult {
        let (_flash, mut selector) = provisioned(Some(0), 2)?;
        let policy = WatchdogFailover::default();

        assert_eq!(
            policy.on_boot(&mut selector, &FixedResetCause(WATCHDOG_RESET_CAUSE))?,
            Some(1)
        );
        assert_eq!(selector.get_active_index()?, 1);

        // Wraps back around.
        assert_eq!(
            policy.on_boot(&mut selector, &FixedResetCause(WATCHDOG_RESET_CAUSE))?,
            Some(0)
        );
        assert_eq!(selector.get_active_index()?, 0);
        Ok(())
    }

    #[test]
    fn test_watchdog_bit_among_others_is_not_a_match() -> TestResult {
        let (_flash, mut selector) = provisioned(Some(0), 2)?;
        let rotated =
            WatchdogFailover::default().on_boot(&mut selector, &FixedResetCause(0x1_0010))?;
        assert_eq!(rotated, None);
        Ok(())
    }

    #[test]
    fn test_custom_sentinel() -> TestResult {
        let (_flash, mut selector) = provisioned(Some(1), 3)?;
        let mut layout = LayoutConfig::contiguous(3, 128);
        layout.watchdog_sentinel = 0x20;
        let policy = WatchdogFailover::from_layout(&layout);

        assert_eq!(policy.sentinel(), 0x20);
        assert_eq!(policy.on_boot(&mut selector, &|| 0x10u32)?, None);
        assert_eq!(policy.on_boot(&mut selector, &|| 0x20u32)?, Some(2));
        Ok(())
    }

    #[test]
    fn test_no_active_slot_is_surfaced() -> TestResult {
        let (_flash, mut selector) = provisioned(None, 2)?;
        let result =
            WatchdogFailover::default().on_boot(&mut selector, &FixedResetCause(WATCHDOG_RESET_CAUSE));
        assert!(matches!(result, Err(SelectorError::NotFound)));
        Ok(())
    }

    #[test]
    fn test_rotation_failure_is_surfaced() -> TestResult {
        let (flash, mut selector) = provisioned(Some(0), 2)?;
        flash.inject(Fault::fail(FlashOp::Write, 128));

        let result =
            WatchdogFailover::default().on_boot(&mut selector, &FixedResetCause(WATCHDOG_RESET_CAUSE));
        assert!(matches!(result, Err(SelectorError::Slot(_))));
        Ok(())
    }
}
