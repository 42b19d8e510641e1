//! Live clock nodes and the operation dispatch.
//!
//! A [`ClockNode`] is one registered clock: a shallow copy of its static
//! descriptor plus a handle on the shared register space. The four node
//! families dispatch through a single `match` per operation, so adding a
//! family without wiring every operation fails to compile instead of
//! falling through an ops table.

use crate::error::{CcuError, Result};
use crate::space::RegisterSpace;
use ccu_model::{regs, ClockDescriptor, ClockOps, ParentSlot};
use std::sync::Arc;
use tracing::debug;

/// External view of a parent clock, supplied by whoever owns the topology.
///
/// The engine never walks the clock tree itself; callers resolve parent
/// handles by name and pass them in. `round_rate` only matters for nodes
/// with the rate-propagating feature — the default ignores the request.
pub trait ParentClock {
    /// Current rate of the parent in Hz.
    fn rate(&self) -> u64;

    /// Closest rate the parent could run at near `rate`.
    fn round_rate(&self, rate: u64) -> u64 {
        let _ = rate;
        self.rate()
    }
}

/// A parent pinned at a fixed rate — oscillators, and most tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub u64);

impl ParentClock for FixedRate {
    fn rate(&self) -> u64 {
        self.0
    }
}

/// A rate request flowing through `determine_rate`.
///
/// On input `rate` is the target and `best_parent_rate` the rate of the
/// currently selected parent; on output `rate` is the achievable rate and,
/// for muxed nodes, the parent fields name the winning input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRequest {
    /// Requested rate in, achievable rate out.
    pub rate: u64,
    /// Rate of the (chosen) parent.
    pub best_parent_rate: u64,
    /// Index of the chosen parent.
    pub best_parent_index: usize,
}

impl RateRequest {
    /// Request for `rate` against a known parent rate.
    pub fn new(rate: u64, parent_rate: u64) -> Self {
        Self {
            rate,
            best_parent_rate: parent_rate,
            best_parent_index: 0,
        }
    }
}

/// One live clock node.
#[derive(Debug)]
pub struct ClockNode {
    desc: ClockDescriptor,
    space: Arc<RegisterSpace>,
}

impl ClockNode {
    /// Validate a descriptor and instantiate it against a register space.
    pub(crate) fn new(desc: &ClockDescriptor, space: Arc<RegisterSpace>) -> Result<Self> {
        desc.validate()?;
        Ok(Self {
            desc: desc.clone(),
            space,
        })
    }

    /// Clock name.
    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    /// The node's (instance copy of its) descriptor.
    pub fn descriptor(&self) -> &ClockDescriptor {
        &self.desc
    }

    pub(crate) fn space(&self) -> &RegisterSpace {
        &self.space
    }

    /// Read the node's main register.
    pub(crate) fn read_main(&self) -> Result<u32> {
        self.space.read(self.desc.space, self.desc.reg)
    }

    /// Masked write to one of the node's registers.
    pub(crate) fn set_field(&self, reg: u16, mask: u32, value: u32) -> Result<()> {
        self.space.apply(self.desc.space, reg, mask, value)
    }

    /// Ungate the clock: deassert the bus reset, open the bus gate, open the
    /// clock's own gate, then wait for the PLL to report lock (best-effort).
    pub fn enable(&self) -> Result<()> {
        debug!(clock = self.desc.name, "enable");

        if let Some(reset) = self.desc.reset {
            self.set_field(reset.reg, reset.mask(), reset.mask())?;
        }
        if let Some(bus) = self.desc.bus {
            self.set_field(bus.reg, bus.mask(), bus.mask())?;
        }
        if let Some(bit) = self.desc.gate_bit {
            self.set_field(self.desc.reg, 1 << bit, 1 << bit)?;
        }
        self.wait_pll_stable()
    }

    /// Gate the clock: exact reverse order of [`ClockNode::enable`].
    pub fn disable(&self) -> Result<()> {
        debug!(clock = self.desc.name, "disable");

        if let Some(bit) = self.desc.gate_bit {
            self.set_field(self.desc.reg, 1 << bit, 0)?;
        }
        if let Some(bus) = self.desc.bus {
            self.set_field(bus.reg, bus.mask(), 0)?;
        }
        if let Some(reset) = self.desc.reset {
            self.set_field(reset.reg, reset.mask(), 0)?;
        }
        Ok(())
    }

    /// Currently selected parent index (0 for un-muxed nodes).
    pub fn parent_index(&self) -> Result<usize> {
        if !self.desc.mux.is_present() {
            return Ok(0);
        }
        Ok(self.desc.mux.extract(self.read_main()?) as usize)
    }

    /// Select a parent by index.
    ///
    /// Selecting a slot the descriptor marks unavailable (or one past the
    /// end of the parent list) is refused rather than programmed blind.
    pub fn set_parent_index(&self, index: usize) -> Result<()> {
        if !self.desc.mux.is_present() {
            return Ok(());
        }
        match self.desc.parents.get(index) {
            Some(ParentSlot::Named(_)) => {}
            _ => {
                return Err(CcuError::MissingParent {
                    clock: self.desc.name,
                    index,
                })
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        let selector = self.desc.mux.encode(index as u32);
        self.set_field(self.desc.reg, self.desc.mux.mask(), selector)
    }

    /// Recompute the current rate from raw register bits.
    pub fn recalc_rate(&self, parent_rate: u64) -> Result<u64> {
        match self.desc.ops {
            ClockOps::Pll => self.pll_recalc_rate(parent_rate),
            ClockOps::Periph => self.periph_recalc_rate(parent_rate),
            ClockOps::FixedFactor => Ok(regs::fixed_factor_rate(&self.desc, parent_rate)),
            // A phase node passes its parent's rate through untouched.
            ClockOps::Phase => Ok(parent_rate),
        }
    }

    /// Dry-run a rate change: fill `req` with the best achievable rate (and,
    /// for muxed peripherals, the winning parent) without touching hardware.
    pub fn determine_rate(
        &self,
        req: &mut RateRequest,
        parents: &[Option<&dyn ParentClock>],
    ) -> Result<()> {
        match self.desc.ops {
            ClockOps::Pll => self.pll_determine_rate(req),
            ClockOps::Periph => self.periph_determine_rate(req, parents),
            ClockOps::FixedFactor => self.fixed_factor_determine_rate(req, parents),
            ClockOps::Phase => Err(CcuError::NotSupported {
                clock: self.desc.name,
                what: "rate control",
            }),
        }
    }

    /// Re-solve for `rate` and commit the factors to hardware with the write
    /// ordering the node's features demand.
    pub fn set_rate(&self, rate: u64, parent_rate: u64) -> Result<()> {
        debug!(clock = self.desc.name, rate, parent_rate, "set rate");
        match self.desc.ops {
            ClockOps::Pll => self.pll_set_rate(rate, parent_rate),
            ClockOps::Periph => self.periph_set_rate(rate, parent_rate),
            // The ratio is baked into the silicon; accepting the call keeps
            // rate propagation through such nodes painless.
            ClockOps::FixedFactor => Ok(()),
            ClockOps::Phase => Err(CcuError::NotSupported {
                clock: self.desc.name,
                what: "rate control",
            }),
        }
    }

    /// Current phase in degrees, for delay-line phase nodes.
    pub fn phase(&self, parent_rate: u64, grandparent_rate: u64) -> Result<u32> {
        match self.desc.ops {
            ClockOps::Phase => self.phase_get(parent_rate, grandparent_rate),
            _ => Err(CcuError::NotSupported {
                clock: self.desc.name,
                what: "phase control",
            }),
        }
    }

    /// Program the delay line to `degrees`.
    pub fn set_phase(&self, degrees: u32, parent_rate: u64, grandparent_rate: u64) -> Result<()> {
        match self.desc.ops {
            ClockOps::Phase => self.phase_set(degrees, parent_rate, grandparent_rate),
            _ => Err(CcuError::NotSupported {
                clock: self.desc.name,
                what: "phase control",
            }),
        }
    }

    /// Fixed-factor rate determination: optionally propagate the request to
    /// the parent, then scale whatever rate it lands on.
    fn fixed_factor_determine_rate(
        &self,
        req: &mut RateRequest,
        parents: &[Option<&dyn ParentClock>],
    ) -> Result<()> {
        let mul = u64::from(self.desc.n.width);
        let div = u64::from(self.desc.m.width);

        if self
            .desc
            .features
            .contains(ccu_model::Features::SET_RATE_PARENT)
        {
            let parent = parents
                .first()
                .and_then(|p| *p)
                .ok_or(CcuError::MissingParent {
                    clock: self.desc.name,
                    index: 0,
                })?;
            req.best_parent_rate = parent.round_rate(req.rate / mul * div);
        }
        req.rate = req.best_parent_rate / div * mul;
        Ok(())
    }
}
