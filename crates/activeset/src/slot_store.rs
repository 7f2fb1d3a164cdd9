//! Per-slot load and save on top of a block store.

use tracing::{debug, info};

use crate::codec::{ConfigCodec, Mapping};
use crate::config::LayoutConfig;
use crate::error::{ConfigError, SlotError, SlotResult};
use crate::flash::{BlockStore, FlashDevice};

/// Load/save access to the redundant slots of one medium.
///
/// The device is probed on first use and the handle is kept for the life
/// of the store; it is never reopened, even after an I/O error.
#[derive(Debug)]
pub struct SlotStore<S: BlockStore> {
    store: S,
    device: Option<S::Device>,
    codec: ConfigCodec,
    offsets: Vec<u64>,
}

impl<S: BlockStore> SlotStore<S> {
    /// Create a store over `store` with the given layout.
    ///
    /// Nothing is probed yet.
    pub fn new(store: S, layout: &LayoutConfig) -> Result<Self, ConfigError> {
        layout.validate()?;
        let codec =
            ConfigCodec::new(layout.slot_len).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            store,
            device: None,
            codec,
            offsets: layout.slot_offsets.clone(),
        })
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.offsets.len()
    }

    /// Codec used for every slot
    pub fn codec(&self) -> ConfigCodec {
        self.codec
    }

    /// Whether the device handle has been acquired
    pub fn is_probed(&self) -> bool {
        self.device.is_some()
    }

    /// Start offset of `slot` on the medium
    pub fn offset(&self, slot: usize) -> SlotResult<u64> {
        self.offsets
            .get(slot)
            .copied()
            .ok_or(SlotError::NoSuchSlot {
                slot,
                count: self.offsets.len(),
            })
    }

    fn device(&mut self, slot: usize) -> SlotResult<&mut S::Device> {
        let device = match self.device.take() {
            Some(device) => device,
            None => {
                let device = self
                    .store
                    .probe()
                    .map_err(|source| SlotError::Io { slot, source })?;
                info!(size = device.size(), "Probed flash device");
                device
            }
        };
        Ok(self.device.insert(device))
    }

    /// Read and verify one slot.
    ///
    /// # Errors
    ///
    /// [`SlotError::Io`] if the probe or read fails, [`SlotError::Corrupt`]
    /// if the block does not verify.
    pub fn load(&mut self, slot: usize) -> SlotResult<Mapping> {
        let offset = self.offset(slot)?;
        let codec = self.codec;
        let mut block = vec![0u8; codec.block_len()];

        self.device(slot)?
            .read(offset, &mut block)
            .map_err(|source| SlotError::Io { slot, source })?;
        debug!(slot, offset, len = block.len(), "Read slot");

        codec
            .parse(&block)
            .map_err(|source| SlotError::Corrupt { slot, source })
    }

    /// Encode `mapping` and replace the slot's block.
    ///
    /// The region is erased and then programmed. Power loss in between
    /// leaves a block whose checksum no longer verifies, so the slot reads
    /// as corrupt rather than as stale or partial data.
    ///
    /// # Errors
    ///
    /// [`SlotError::Encode`] if the mapping does not fit, [`SlotError::Io`]
    /// if the probe fails, [`SlotError::Erase`] / [`SlotError::Write`] for
    /// the respective medium failure.
    pub fn save(&mut self, slot: usize, mapping: &Mapping) -> SlotResult<()> {
        let offset = self.offset(slot)?;
        let block = self
            .codec
            .serialize(mapping)
            .map_err(|source| SlotError::Encode { slot, source })?;

        let device = self.device(slot)?;
        device
            .erase(offset, block.len())
            .map_err(|source| SlotError::Erase { slot, source })?;
        device
            .write(offset, &block)
            .map_err(|source| SlotError::Write { slot, source })?;

        debug!(slot, offset, len = block.len(), "Wrote slot");
        Ok(())
    }
}
