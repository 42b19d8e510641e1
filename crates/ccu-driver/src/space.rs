//! Shared register spaces and the masked read-modify-write primitive.
//!
//! The whole chip's clock-control address range — primary controller plus
//! the optional low-power-domain block — shares **one** lock. Coarse, but
//! clock-tree mutations are rare and latency-insensitive next to the
//! correctness of concurrent read-modify-write, and a single lock cannot
//! deadlock against itself across the two blocks.

use crate::backend::RegisterBlock;
use crate::error::{CcuError, Result};
use ccu_model::AddressSpace;
use std::sync::Mutex;
use std::time::Duration;

/// Timing knobs for PLL settling.
///
/// The defaults are the hardware values; tests shrink them to keep the poll
/// loops instant against a mock block.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between two reads of the lock-status bit.
    pub lock_poll_interval: Duration,
    /// Number of lock-status reads before giving up (non-fatally).
    pub lock_poll_retries: u32,
    /// Settle delay for PLLs without lock-status wiring.
    pub settle_delay: Duration,
    /// Delay after each step of an ordered factor write.
    pub factor_write_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            lock_poll_interval: Duration::from_micros(200),
            lock_poll_retries: 500,
            settle_delay: Duration::from_micros(500),
            factor_write_delay: Duration::from_micros(10),
        }
    }
}

impl PollConfig {
    /// Zero-delay configuration for driving a mock block.
    pub const fn instant() -> Self {
        Self {
            lock_poll_interval: Duration::ZERO,
            lock_poll_retries: 3,
            settle_delay: Duration::ZERO,
            factor_write_delay: Duration::ZERO,
        }
    }
}

/// The chip's clock-control register blocks and their shared lock.
///
/// Passed (behind an `Arc`) into every clock node and the reset controller;
/// there are no process-wide globals, which is what lets a test stand up an
/// engine against a [`crate::MockBlock`].
#[derive(Debug)]
pub struct RegisterSpace {
    blocks: [Option<Box<dyn RegisterBlock>>; 2],
    lock: Mutex<()>,
    poll: PollConfig,
}

impl RegisterSpace {
    /// New space over the primary controller block.
    pub fn new(primary: Box<dyn RegisterBlock>) -> Self {
        Self {
            blocks: [Some(primary), None],
            lock: Mutex::new(()),
            poll: PollConfig::default(),
        }
    }

    /// Attach the optional low-power-domain block.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Box<dyn RegisterBlock>) -> Self {
        self.blocks[AddressSpace::Prcm.index()] = Some(secondary);
        self
    }

    /// Override the PLL settle timing.
    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// The active settle timing.
    pub fn poll(&self) -> &PollConfig {
        &self.poll
    }

    fn block(&self, space: AddressSpace) -> Result<&dyn RegisterBlock> {
        self.blocks[space.index()]
            .as_deref()
            .ok_or(CcuError::MissingAddressSpace { space })
    }

    /// Read a register. Takes no lock; only the write-back half of a
    /// read-modify-write needs protection.
    pub fn read(&self, space: AddressSpace, reg: u16) -> Result<u32> {
        Ok(self.block(space)?.read32(reg))
    }

    /// Masked read-modify-write under the shared lock.
    ///
    /// The new word is `(old & !mask) | value` — `value` bits *outside*
    /// `mask` are written too. Update-strobe bits depend on this.
    pub fn apply(&self, space: AddressSpace, reg: u16, mask: u32, value: u32) -> Result<()> {
        let block = self.block(space)?;
        let guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let word = (block.read32(reg) & !mask) | value;
        tracing::debug!("set {space:?} {reg:#05x} {word:#010x}");
        block.write32(reg, word);
        drop(guard);
        Ok(())
    }
}
