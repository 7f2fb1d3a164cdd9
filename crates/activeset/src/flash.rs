//! Block store adapters
//!
//! The slot store talks to raw non-volatile memory through two traits:
//! [`BlockStore`] probes the medium once and hands out a [`FlashDevice`],
//! which offers erase/read/write on byte ranges. The medium must be erased
//! before it is written.
//!
//! Two adapters ship with the crate:
//!
//! - [`MemFlash`]: in-memory NOR model with fault injection, for tests
//! - [`FileFlash`]: file or device node backed image, for host tooling

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{FlashError, FlashResult};

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Flash operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashOp {
    /// Region erase
    Erase,
    /// Region read
    Read,
    /// Region write
    Write,
}

impl std::fmt::Display for FlashOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashOp::Erase => write!(f, "erase"),
            FlashOp::Read => write!(f, "read"),
            FlashOp::Write => write!(f, "write"),
        }
    }
}

/// Raw access to a probed medium.
pub trait FlashDevice {
    /// Total size of the medium in bytes.
    fn size(&self) -> u64;

    /// Fill `buf` from `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> FlashResult<()>;

    /// Erase `len` bytes starting at `offset`.
    fn erase(&mut self, offset: u64, len: usize) -> FlashResult<()>;

    /// Program `data` at `offset`. The range must have been erased.
    fn write(&mut self, offset: u64, data: &[u8]) -> FlashResult<()>;
}

/// A medium that can be probed for a device handle.
///
/// Probing may be expensive (bus setup, JEDEC id read); callers probe once
/// and keep the handle.
pub trait BlockStore {
    /// Handle returned by a successful probe
    type Device: FlashDevice + std::fmt::Debug;

    /// Probe the medium.
    fn probe(&mut self) -> FlashResult<Self::Device>;
}

/// Check that `offset..offset + len` lies within `size` and return it as a
/// `usize` range.
fn checked_range(offset: u64, len: usize, size: u64) -> FlashResult<std::ops::Range<usize>> {
    let out_of_bounds = || FlashError::OutOfBounds { offset, len, size };
    let end = u64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .filter(|end| *end <= size)
        .ok_or_else(out_of_bounds)?;
    let start = usize::try_from(offset).ok().ok_or_else(out_of_bounds)?;
    let end = usize::try_from(end).ok().ok_or_else(out_of_bounds)?;
    Ok(start..end)
}

// ============================================================================
// In-memory flash
// ============================================================================

/// A fault armed on [`MemFlash`].
///
/// The fault fires on the first `op` whose start offset equals `offset`,
/// after `done` bytes of that operation were applied, and is then consumed.
/// `done == 0` models a clean failure; anything else models power loss part
/// way through the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Operation to fail
    pub op: FlashOp,
    /// Start offset of the targeted operation
    pub offset: u64,
    /// Bytes applied before failing
    pub done: usize,
}

impl Fault {
    /// Fail the operation without touching the medium.
    pub fn fail(op: FlashOp, offset: u64) -> Self {
        Self { op, offset, done: 0 }
    }

    /// Cut power after `done` bytes of the operation.
    pub fn power_cut(op: FlashOp, offset: u64, done: usize) -> Self {
        Self { op, offset, done }
    }

    fn error(&self, len: usize) -> FlashError {
        if self.done == 0 {
            FlashError::Injected {
                op: self.op,
                offset: self.offset,
            }
        } else {
            FlashError::PowerCut {
                op: self.op,
                offset: self.offset,
                done: self.done,
                len,
            }
        }
    }
}

#[derive(Debug)]
struct MemFlashState {
    data: Vec<u8>,
    faults: VecDeque<Fault>,
    fail_probe: bool,
    probes: usize,
    erases: usize,
    writes: usize,
}

impl MemFlashState {
    fn take_fault(&mut self, op: FlashOp, offset: u64) -> Option<Fault> {
        let pos = self
            .faults
            .iter()
            .position(|f| f.op == op && f.offset == offset)?;
        self.faults.remove(pos)
    }
}

/// In-memory NOR flash.
///
/// Erase sets bytes to [`ERASED_BYTE`]; write can only clear bits, so a
/// write without a preceding erase produces garbage exactly like real NOR.
/// Clones share the same medium, which lets a test keep a handle for
/// inspection and fault injection while a slot store owns another.
#[derive(Debug, Clone)]
pub struct MemFlash {
    state: Arc<Mutex<MemFlashState>>,
}

impl MemFlash {
    /// Create an erased medium of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemFlashState {
                data: vec![ERASED_BYTE; size],
                faults: VecDeque::new(),
                fail_probe: false,
                probes: 0,
                erases: 0,
                writes: 0,
            })),
        }
    }

    /// Copy `bytes` to `offset`, bypassing erase semantics and faults.
    ///
    /// Used to provision images.
    pub fn load_image(&self, offset: u64, bytes: &[u8]) -> FlashResult<()> {
        let mut state = self.state.lock();
        let range = checked_range(offset, bytes.len(), state.data.len() as u64)?;
        if let Some(dst) = state.data.get_mut(range) {
            dst.copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Copy of `len` bytes at `offset`.
    pub fn region(&self, offset: u64, len: usize) -> FlashResult<Vec<u8>> {
        let state = self.state.lock();
        let range = checked_range(offset, len, state.data.len() as u64)?;
        Ok(state.data.get(range).map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Copy of the whole medium.
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    /// Flip one bit in place, bypassing erase semantics.
    pub fn flip_bit(&self, offset: u64, bit: u8) -> FlashResult<()> {
        let mut state = self.state.lock();
        let range = checked_range(offset, 1, state.data.len() as u64)?;
        if let Some(byte) = state.data.get_mut(range.start) {
            *byte ^= 1u8 << (bit % 8);
        }
        Ok(())
    }

    /// Arm a one-shot fault.
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Make every subsequent probe fail.
    pub fn set_probe_failure(&self, fail: bool) {
        self.state.lock().fail_probe = fail;
    }

    /// Number of successful probes so far.
    pub fn probe_count(&self) -> usize {
        self.state.lock().probes
    }

    /// Number of erase calls that reached the medium.
    pub fn erase_count(&self) -> usize {
        self.state.lock().erases
    }

    /// Number of write calls that reached the medium.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

impl BlockStore for MemFlash {
    type Device = MemFlash;

    fn probe(&mut self) -> FlashResult<MemFlash> {
        let mut state = self.state.lock();
        if state.fail_probe {
            return Err(FlashError::ProbeFailed("memory flash offline".to_string()));
        }
        state.probes = state.probes.saturating_add(1);
        Ok(self.clone())
    }
}

impl FlashDevice for MemFlash {
    fn size(&self) -> u64 {
        self.state.lock().data.len() as u64
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> FlashResult<()> {
        let mut state = self.state.lock();
        let range = checked_range(offset, buf.len(), state.data.len() as u64)?;
        if let Some(fault) = state.take_fault(FlashOp::Read, offset) {
            return Err(fault.error(buf.len()));
        }
        if let Some(src) = state.data.get(range) {
            buf.copy_from_slice(src);
        }
        Ok(())
    }

    fn erase(&mut self, offset: u64, len: usize) -> FlashResult<()> {
        let mut state = self.state.lock();
        let range = checked_range(offset, len, state.data.len() as u64)?;
        state.erases = state.erases.saturating_add(1);
        let fault = state.take_fault(FlashOp::Erase, offset);
        let done = fault.map_or(len, |f| f.done.min(len));
        if let Some(dst) = state.data.get_mut(range) {
            dst.iter_mut().take(done).for_each(|b| *b = ERASED_BYTE);
        }
        match fault {
            Some(fault) => Err(fault.error(len)),
            None => Ok(()),
        }
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> FlashResult<()> {
        let mut state = self.state.lock();
        let range = checked_range(offset, data.len(), state.data.len() as u64)?;
        state.writes = state.writes.saturating_add(1);
        let fault = state.take_fault(FlashOp::Write, offset);
        let done = fault.map_or(data.len(), |f| f.done.min(data.len()));
        if let Some(dst) = state.data.get_mut(range) {
            // NOR programming only clears bits.
            dst.iter_mut()
                .zip(data)
                .take(done)
                .for_each(|(d, s)| *d &= *s);
        }
        match fault {
            Some(fault) => Err(fault.error(data.len())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// File-backed flash
// ============================================================================

/// Flash image stored in a file or exposed as a device node.
///
/// Erase is emulated by programming [`ERASED_BYTE`] over the range, which is
/// what an MTD block device or a raw image file expects.
#[derive(Debug, Clone)]
pub struct FileFlash {
    path: PathBuf,
}

impl FileFlash {
    /// Adapter for the medium at `path`. Nothing is opened until probe.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the medium
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileFlash {
    type Device = FileFlashDevice;

    fn probe(&mut self) -> FlashResult<FileFlashDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| FlashError::ProbeFailed(format!("{}: {e}", self.path.display())))?;
        let size = file.metadata()?.len();
        debug!(path = %self.path.display(), size, "Opened flash image");
        Ok(FileFlashDevice { file, size })
    }
}

/// Open handle on a [`FileFlash`] medium.
#[derive(Debug)]
pub struct FileFlashDevice {
    file: File,
    size: u64,
}

impl FlashDevice for FileFlashDevice {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> FlashResult<()> {
        checked_range(offset, buf.len(), self.size)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        trace!(offset, len = buf.len(), "Read flash range");
        Ok(())
    }

    fn erase(&mut self, offset: u64, len: usize) -> FlashResult<()> {
        checked_range(offset, len, self.size)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&vec![ERASED_BYTE; len])?;
        self.file.sync_data()?;
        trace!(offset, len, "Erased flash range");
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> FlashResult<()> {
        checked_range(offset, data.len(), self.size)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        trace!(offset, len = data.len(), "Wrote flash range");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_checked_range() {
        assert!(matches!(checked_range(0, 16, 16), Ok(r) if r == (0..16)));
        assert!(matches!(checked_range(8, 8, 16), Ok(r) if r == (8..16)));
        assert!(matches!(
            checked_range(8, 9, 16),
            Err(FlashError::OutOfBounds { offset: 8, len: 9, size: 16 })
        ));
        assert!(checked_range(u64::MAX, 1, 16).is_err());
    }

    #[test]
    fn test_mem_flash_starts_erased() {
        let flash = MemFlash::new(32);
        assert!(flash.snapshot().iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_mem_flash_erase_then_write() -> TestResult {
        let mut flash = MemFlash::new(16);
        flash.erase(4, 4)?;
        flash.write(4, &[1, 2, 3, 4])?;
        let mut buf = [0u8; 4];
        flash.read(4, &mut buf)?;
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(flash.erase_count(), 1);
        assert_eq!(flash.write_count(), 1);
        Ok(())
    }

    #[test]
    fn test_mem_flash_write_without_erase_only_clears_bits() -> TestResult {
        let mut flash = MemFlash::new(4);
        flash.write(0, &[0b1010_1010; 4])?;
        flash.write(0, &[0b0101_0101; 4])?;
        assert_eq!(flash.region(0, 4)?, vec![0u8; 4]);
        Ok(())
    }

    #[test]
    fn test_mem_flash_injected_fault_is_one_shot() -> TestResult {
        let mut flash = MemFlash::new(16);
        flash.inject(Fault::fail(FlashOp::Erase, 8));

        // Other offsets are unaffected.
        flash.erase(0, 8)?;
        assert!(matches!(
            flash.erase(8, 8),
            Err(FlashError::Injected { op: FlashOp::Erase, offset: 8 })
        ));
        flash.erase(8, 8)?;
        Ok(())
    }

    #[test]
    fn test_mem_flash_power_cut_during_write() -> TestResult {
        let mut flash = MemFlash::new(8);
        flash.inject(Fault::power_cut(FlashOp::Write, 0, 3));
        let err = flash.write(0, &[0u8; 8]);
        assert!(matches!(
            err,
            Err(FlashError::PowerCut { done: 3, len: 8, .. })
        ));
        assert_eq!(flash.region(0, 8)?, vec![0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_mem_flash_probe_shares_medium() -> TestResult {
        let mut store = MemFlash::new(8);
        let mut device = store.probe()?;
        device.write(0, &[0x00])?;
        assert_eq!(store.region(0, 1)?, vec![0x00]);
        assert_eq!(store.probe_count(), 1);

        store.set_probe_failure(true);
        assert!(matches!(store.probe(), Err(FlashError::ProbeFailed(_))));
        Ok(())
    }

    #[test]
    fn test_mem_flash_flip_bit() -> TestResult {
        let flash = MemFlash::new(2);
        flash.load_image(0, &[0x00, 0x00])?;
        flash.flip_bit(1, 3)?;
        assert_eq!(flash.snapshot(), vec![0x00, 0x08]);
        Ok(())
    }

    #[test]
    fn test_file_flash_roundtrip() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("flash.img");
        std::fs::write(&path, vec![0u8; 64])?;

        let mut store = FileFlash::new(&path);
        let mut device = store.probe()?;
        assert_eq!(device.size(), 64);

        device.erase(16, 16)?;
        device.write(16, b"hello")?;
        let mut buf = [0u8; 16];
        device.read(16, &mut buf)?;
        assert_eq!(&buf[..5], b"hello");
        assert!(buf[5..].iter().all(|&b| b == ERASED_BYTE));

        assert!(matches!(
            device.read(60, &mut buf),
            Err(FlashError::OutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_file_flash_probe_missing_file() {
        let mut store = FileFlash::new("/nonexistent/activeset/flash.img");
        assert!(matches!(store.probe(), Err(FlashError::ProbeFailed(_))));
    }
}
