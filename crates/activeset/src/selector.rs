//! Active-set selection and the two-step active-flag transition
//!
//! # Contracts
//!
//! **Lowest index wins.** [`ActiveSetSelector::get_active_index`] scans slots
//! in ascending index order, skips any slot that cannot be read or does not
//! verify, and returns the first slot flagged active. When an interrupted
//! update leaves two slots flagged, the lower index is selected.
//!
//! **Set before clear.** [`ActiveSetSelector::set_active`] first marks the
//! target active and only then clears every other slot. A crash at any point
//! leaves at most two slots flagged, never zero.
//!
//! Known limitation: if a previous rotation left a stale flag on a lower
//! index and a later `set_active` targeting a higher index is interrupted
//! before the clear step, the stale lower index still wins the scan.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{self, Mapping};
use crate::config::LayoutConfig;
use crate::error::{ConfigError, SelectorError, SelectorResult, SlotError, SlotResult};
use crate::flash::BlockStore;
use crate::slot_store::SlotStore;

/// Per-slot state reported by [`ActiveSetSelector::scan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    /// Verified and flagged active
    Active,
    /// Verified and not flagged active
    Inactive,
    /// Contents failed verification
    Corrupt {
        /// Why verification failed
        reason: String,
    },
    /// Probe or read failed
    Unreadable {
        /// Why the read failed
        reason: String,
    },
}

/// One line of a slot scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    /// Slot index
    pub slot: usize,
    /// Start offset on the medium
    pub offset: u64,
    /// Observed state
    #[serde(flatten)]
    pub state: SlotState,
}

/// Chooses and changes the active slot.
#[derive(Debug)]
pub struct ActiveSetSelector<S: BlockStore> {
    slots: SlotStore<S>,
}

impl<S: BlockStore> ActiveSetSelector<S> {
    /// Wrap a slot store.
    pub fn new(slots: SlotStore<S>) -> Self {
        Self { slots }
    }

    /// Build the slot store and selector for `store` in one step.
    pub fn open(store: S, layout: &LayoutConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(SlotStore::new(store, layout)?))
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slots.slot_count()
    }

    /// Underlying slot store
    pub fn slots(&mut self) -> &mut SlotStore<S> {
        &mut self.slots
    }

    /// Validate an operator supplied index.
    ///
    /// # Errors
    ///
    /// [`SelectorError::InvalidIndex`] for negative values and values at or
    /// beyond the slot count.
    pub fn parse_index(&self, raw: i64) -> SelectorResult<usize> {
        let count = self.slot_count();
        usize::try_from(raw)
            .ok()
            .filter(|index| *index < count)
            .ok_or(SelectorError::InvalidIndex { index: raw, count })
    }

    /// Index of the active slot.
    ///
    /// Slots that cannot be read or do not verify are skipped as if
    /// inactive. The lowest flagged index wins.
    ///
    /// # Errors
    ///
    /// [`SelectorError::NotFound`] when no usable slot is flagged active.
    pub fn get_active_index(&mut self) -> SelectorResult<usize> {
        for slot in 0..self.slot_count() {
            match self.slots.load(slot) {
                Ok(mapping) if codec::is_active(&mapping) => {
                    debug!(slot, "Found active slot");
                    return Ok(slot);
                }
                Ok(_) => {}
                Err(err) if err.is_unusable() => {
                    warn!(slot, error = %err, "Skipping unusable slot");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(SelectorError::NotFound)
    }

    /// Make `target` the active slot.
    ///
    /// Step one loads the target, flags it active and saves it; a failure
    /// here aborts before any other slot is touched. Step two clears the
    /// flag on every other slot in ascending order and stops at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// - [`SelectorError::InvalidIndex`] if `target` is out of range
    /// - [`SelectorError::Slot`] if step one fails; storage is unchanged
    ///   unless the failure was mid-erase or mid-write of the target
    /// - [`SelectorError::PartialUpdate`] if step two fails; the target is
    ///   already durably active
    pub fn set_active(&mut self, target: usize) -> SelectorResult<()> {
        let count = self.slot_count();
        if target >= count {
            return Err(SelectorError::InvalidIndex {
                index: i64::try_from(target).unwrap_or(i64::MAX),
                count,
            });
        }

        self.update_flag(target, true)?;
        info!(slot = target, "Marked slot active");

        for slot in (0..count).filter(|slot| *slot != target) {
            self.update_flag(slot, false)
                .map_err(|source| SelectorError::PartialUpdate {
                    active: target,
                    slot,
                    source,
                })?;
            debug!(slot, "Cleared active flag");
        }

        Ok(())
    }

    fn update_flag(&mut self, slot: usize, active: bool) -> SlotResult<()> {
        let mut mapping: Mapping = self.slots.load(slot)?;
        codec::set_active_flag(&mut mapping, active);
        self.slots.save(slot, &mapping)
    }

    /// Read every slot and report its state without changing anything.
    pub fn scan(&mut self) -> Vec<SlotReport> {
        (0..self.slot_count())
            .filter_map(|slot| {
                let offset = self.slots.offset(slot).ok()?;
                let state = match self.slots.load(slot) {
                    Ok(mapping) if codec::is_active(&mapping) => SlotState::Active,
                    Ok(_) => SlotState::Inactive,
                    Err(err) => unusable_state(&err),
                };
                Some(SlotReport {
                    slot,
                    offset,
                    state,
                })
            })
            .collect()
    }
}

fn unusable_state(err: &SlotError) -> SlotState {
    let reason = std::error::Error::source(err)
        .map_or_else(|| err.to_string(), |source| source.to_string());
    match err {
        SlotError::Corrupt { .. } => SlotState::Corrupt { reason },
        _ => SlotState::Unreadable { reason },
    }
}
