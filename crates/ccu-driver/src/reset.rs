//! Ganged reset lines for bus-gated peripherals.
//!
//! A flat per-chip table maps line identifiers to (register, bit) pairs.
//! Lines are asserted low: assert clears the bit, deassert sets it. Some
//! identifiers exist only for compatibility with generic code on chips where
//! the line has no hardware behind it; their entries carry the unassigned
//! sentinel and toggle as a successful no-op.

use crate::error::{CcuError, Result};
use crate::space::RegisterSpace;
use ccu_model::AddressSpace;
use std::sync::Arc;
use tracing::debug;

/// One reset line: register offset, bit, and which block it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetMapEntry {
    /// Register offset; 0 is the "not wired on this chip" sentinel.
    pub reg: u16,
    /// Bit index.
    pub bit: u8,
    /// Address space of the register.
    pub space: AddressSpace,
}

impl ResetMapEntry {
    /// Line in the primary block.
    pub const fn new(reg: u16, bit: u8) -> Self {
        Self {
            reg,
            bit,
            space: AddressSpace::Ccu,
        }
    }

    /// Line in the low-power-domain block.
    pub const fn prcm(reg: u16, bit: u8) -> Self {
        Self {
            reg,
            bit,
            space: AddressSpace::Prcm,
        }
    }

    /// Identifier kept for compatibility, no hardware behind it.
    pub const UNASSIGNED: Self = Self::new(0, 0);
}

/// Reset-line controller over a chip's reset map.
#[derive(Debug)]
pub struct ResetController {
    map: &'static [ResetMapEntry],
    space: Arc<RegisterSpace>,
}

impl ResetController {
    pub(crate) fn new(map: &'static [ResetMapEntry], space: Arc<RegisterSpace>) -> Self {
        Self { map, space }
    }

    /// Number of mapped lines.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the chip maps any reset lines at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Put the peripheral behind line `id` into reset.
    pub fn assert(&self, id: usize) -> Result<()> {
        self.toggle(id, false)
    }

    /// Release line `id` from reset.
    pub fn deassert(&self, id: usize) -> Result<()> {
        self.toggle(id, true)
    }

    fn toggle(&self, id: usize, release: bool) -> Result<()> {
        let entry = self.map.get(id).ok_or(CcuError::InvalidResetLine {
            id,
            count: self.map.len(),
        })?;
        if entry.reg == 0 {
            return Ok(());
        }

        debug!(
            "reset line {id}: {} {:#05x} bit {}",
            if release { "deassert" } else { "assert" },
            entry.reg,
            entry.bit
        );

        let mask = 1u32 << entry.bit;
        self.space
            .apply(entry.space, entry.reg, mask, if release { mask } else { 0 })
    }
}
