//! Command implementations
//!
//! Each command works on an already opened selector so that it can be driven
//! by any block store.

use activeset::{
    ActiveSetSelector, BlockStore, FixedResetCause, ResetCauseProvider, WatchdogFailover,
};
use anyhow::Result;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output;

/// Print the active index. Lookup failures print `unknown` and succeed.
pub fn show_active<S: BlockStore>(selector: &mut ActiveSetSelector<S>, json: bool) -> Result<()> {
    let active = match selector.get_active_index() {
        Ok(index) => Some(index),
        Err(err) => {
            warn!(error = %err, "Active set lookup failed");
            None
        }
    };
    output::print_active(active, json);
    Ok(())
}

/// Make `raw` the active slot.
pub fn set_active<S: BlockStore>(
    selector: &mut ActiveSetSelector<S>,
    raw: i64,
    json: bool,
) -> Result<()> {
    let index = selector.parse_index(raw).map_err(CliError::from)?;
    selector.set_active(index).map_err(CliError::from)?;
    info!(slot = index, "Active set switched");
    output::print_set(index, json);
    Ok(())
}

/// Rotate after a watchdog reset.
pub fn watchdog<S, P>(
    selector: &mut ActiveSetSelector<S>,
    policy: &WatchdogFailover,
    provider: &P,
    json: bool,
) -> Result<()>
where
    S: BlockStore,
    P: ResetCauseProvider + ?Sized,
{
    let cause = provider.reset_cause();
    let rotated = policy
        .on_boot(selector, &FixedResetCause(cause))
        .map_err(CliError::from)?;
    output::print_watchdog(cause, rotated, json);
    Ok(())
}

/// Print every slot's state.
pub fn status<S: BlockStore>(selector: &mut ActiveSetSelector<S>, json: bool) -> Result<()> {
    let reports = selector.scan();
    let active = selector.get_active_index().ok();
    output::print_status(&reports, active, json);
    Ok(())
}
