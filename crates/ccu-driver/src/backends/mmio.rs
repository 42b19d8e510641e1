//! Memory-mapped register block.
//!
//! Maps the clock controller's physical register window through a memory
//! device (normally `/dev/mem`) and provides volatile 32-bit access. This is
//! the only module in the crate with unsafe code.

use crate::backend::RegisterBlock;
use crate::error::{CcuError, Result};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::os::unix::io::AsFd;
use std::path::Path;

/// One mapped register block.
pub struct MmioBlock {
    /// Memory-mapped pointer.
    ptr: *mut u8,
    /// Size of the mapping in bytes.
    size: usize,
    /// Physical base, kept for diagnostics.
    phys_base: u64,
}

impl std::fmt::Debug for MmioBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioBlock")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("phys_base", &format_args!("{:#x}", self.phys_base))
            .finish()
    }
}

// SAFETY: Send - MmioBlock owns the mapping exclusively; mmap'd memory is
// process-wide and carries no thread-local state.
unsafe impl Send for MmioBlock {}

// SAFETY: Sync - all access is volatile and bounds-checked; the register
// space serializes read-modify-write cycles above this layer.
unsafe impl Sync for MmioBlock {}

impl MmioBlock {
    /// Map `size` bytes of the register window at physical address
    /// `phys_base` through the memory device at `dev`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened (usually a
    /// permissions problem) or the mapping fails.
    pub fn map(dev: impl AsRef<Path>, phys_base: u64, size: usize) -> Result<Self> {
        let dev = dev.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dev)
            .map_err(|e| CcuError::map_failed(format!("cannot open {}: {e}", dev.display())))?;

        if size == 0 {
            return Err(CcuError::map_failed("zero-sized register window"));
        }

        // SAFETY: mmap is required for MMIO. The fd was just opened
        // read-write, size is non-zero, and the offset is the page-aligned
        // physical base of the register block. rustix returns Result, and
        // the mapping is released in Drop.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                phys_base,
            )
            .map_err(|e| CcuError::map_failed(format!("mmap of {phys_base:#x} failed: {e}")))?
        };

        tracing::info!("mapped register block {phys_base:#x} ({size:#x} bytes) at {ptr:p}");

        Ok(Self {
            ptr: ptr.cast(),
            size,
            phys_base,
        })
    }
}

impl RegisterBlock for MmioBlock {
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped window.
    fn read32(&self, offset: u16) -> u32 {
        let offset = usize::from(offset);
        assert!(offset + 4 <= self.size, "register offset out of bounds");
        // SAFETY: read_volatile is required for MMIO - hardware can change
        // the value. ptr comes from mmap in map(), offset + 4 <= size, and
        // the offset is 4-aligned by the register layout.
        unsafe { std::ptr::read_volatile(self.ptr.add(offset).cast::<u32>()) }
    }

    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped window.
    fn write32(&self, offset: u16, value: u32) {
        let offset = usize::from(offset);
        assert!(offset + 4 <= self.size, "register offset out of bounds");
        // SAFETY: write_volatile is required for MMIO - the store has
        // hardware side effects. Same bounds invariants as read32.
        unsafe {
            std::ptr::write_volatile(self.ptr.add(offset).cast::<u32>(), value);
        }
    }
}

impl Drop for MmioBlock {
    fn drop(&mut self) {
        // SAFETY: ptr/size come from the successful mmap in map() and Drop
        // runs at most once. Errors cannot be propagated from Drop.
        unsafe {
            let _ = munmap(self.ptr.cast(), self.size);
        }
        tracing::debug!("unmapped register block {:#x}", self.phys_base);
    }
}
