//! Phase-family operations: delay-line sampling/output clocks.
//!
//! These nodes shift their output by whole periods of the grandparent clock
//! (the PLL feeding the divider that feeds them). With the divider ratio
//! `div` between grandparent and parent, one delay step is `360 / div`
//! degrees; a delay of zero is the hardware convention for 180 degrees.

use crate::error::{CcuError, Result};
use crate::node::ClockNode;
use ccu_model::rational::div_round_closest;
use ccu_model::regs;

impl ClockNode {
    fn parent_div(&self, parent_rate: u64, grandparent_rate: u64) -> Result<u64> {
        let desc = self.descriptor();
        if parent_rate == 0 || grandparent_rate < parent_rate {
            return Err(CcuError::InvalidParentRate { clock: desc.name });
        }
        Ok(grandparent_rate / parent_rate)
    }

    pub(crate) fn phase_get(&self, parent_rate: u64, grandparent_rate: u64) -> Result<u32> {
        let desc = self.descriptor();
        let reg = self.read_main()?;

        // In double-rate mode the delay field has no phase meaning.
        if regs::mode_select_active(desc, reg) {
            return Err(CcuError::PhaseUnavailable { clock: desc.name });
        }

        let delay = desc.p.extract(reg);
        if delay == 0 {
            return Ok(180);
        }

        let div = self.parent_div(parent_rate, grandparent_rate)?;
        #[allow(clippy::cast_possible_truncation)] // a step is at most 360
        let step = div_round_closest(360, div) as u32;
        Ok(delay * step)
    }

    pub(crate) fn phase_set(
        &self,
        degrees: u32,
        parent_rate: u64,
        grandparent_rate: u64,
    ) -> Result<()> {
        let desc = self.descriptor();

        if desc.extra.is_some() {
            let reg = self.read_main()?;
            if regs::mode_select_active(desc, reg) {
                return Err(CcuError::PhaseUnavailable { clock: desc.name });
            }
        }

        let delay = if degrees == 180 {
            0
        } else {
            let div = self.parent_div(parent_rate, grandparent_rate)?;
            let step = div_round_closest(360, div);
            div_round_closest(u64::from(degrees), step)
        };

        #[allow(clippy::cast_possible_truncation)] // truncated to the field width anyway
        let delay = delay as u32;
        self.set_field(desc.reg, desc.p.mask(), desc.p.encode(delay))
    }
}
