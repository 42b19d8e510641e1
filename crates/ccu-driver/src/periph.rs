//! Peripheral-family operations: muxed divider clocks.

use crate::error::{CcuError, Result};
use crate::node::{ClockNode, ParentClock, RateRequest};
use ccu_model::{regs, solver, Features};

impl ClockNode {
    /// Parent rate after the mux pre-divider for `parent_index`, or for the
    /// currently selected parent when `None`.
    fn prediv_parent_rate(&self, parent_index: Option<usize>, parent_rate: u64) -> Result<u64> {
        let desc = self.descriptor();
        if desc.extra.is_none()
            || !desc
                .features
                .intersects(Features::MUX_FIXED_PREDIV | Features::MUX_VARIABLE_PREDIV)
        {
            return Ok(parent_rate);
        }
        let reg = self.read_main()?;
        let index = match parent_index {
            Some(index) => index,
            None => desc.mux.extract(reg) as usize,
        };
        Ok(parent_rate / regs::prediv_for_parent(desc, reg, index))
    }

    pub(crate) fn periph_recalc_rate(&self, parent_rate: u64) -> Result<u64> {
        let desc = self.descriptor();
        let parent_rate = self.prediv_parent_rate(None, parent_rate)?;

        if !desc.m.is_present() && !desc.p.is_present() {
            return Ok(parent_rate);
        }
        let reg = self.read_main()?;
        Ok(regs::periph_rate_from_reg(desc, reg, parent_rate))
    }

    /// Try every wired parent, solve against each, and keep the combination
    /// with the smallest deviation; an exact hit stops the scan.
    pub(crate) fn periph_determine_rate(
        &self,
        req: &mut RateRequest,
        parents: &[Option<&dyn ParentClock>],
    ) -> Result<()> {
        let desc = self.descriptor();

        let mut best_rate = 0u64;
        let mut best_parent_rate = 0u64;
        let mut best_index = 0usize;
        let mut best_delta = i64::MAX;

        for (index, parent) in parents.iter().enumerate() {
            let Some(parent) = parent else { continue };

            let parent_rate = if desc.features.contains(Features::SET_RATE_PARENT) {
                parent.round_rate(req.rate)
            } else {
                parent.rate()
            };
            let parent_rate = self.prediv_parent_rate(Some(index), parent_rate)?;

            // A node with no divider fields is a pure mux; the candidate
            // rate is the (pre-divided) parent itself.
            let (new_rate, _) = solver::periph_find_best(desc, req.rate, parent_rate);

            if new_rate == req.rate {
                req.rate = new_rate;
                req.best_parent_rate = parent_rate;
                req.best_parent_index = index;
                return Ok(());
            }
            #[allow(clippy::cast_possible_wrap)]
            let delta = (req.rate as i64 - new_rate as i64).abs();
            if new_rate != 0 && delta < best_delta {
                best_delta = delta;
                best_rate = new_rate;
                best_parent_rate = parent_rate;
                best_index = index;
            }
        }

        if best_rate == 0 {
            return Err(CcuError::NoSolution {
                clock: desc.name,
                rate: req.rate,
            });
        }
        req.rate = best_rate;
        req.best_parent_rate = best_parent_rate;
        req.best_parent_index = best_index;
        Ok(())
    }

    pub(crate) fn periph_set_rate(&self, rate: u64, parent_rate: u64) -> Result<()> {
        let desc = self.descriptor();

        if !desc.m.is_present() && !desc.p.is_present() {
            return Ok(());
        }
        let parent_rate = self.prediv_parent_rate(None, parent_rate)?;

        let mut mask = 0u32;
        let mut mode = 0u32;
        let mut target = rate;

        if desc.features.contains(Features::MODE_SELECT) {
            if let Some(ms) = desc.extra.and_then(|e| e.mode_select) {
                // The mode bit belongs to this write either way; above the
                // threshold the divider counts double, so solve for twice
                // the rate.
                mask = 1 << ms.bit;
                if rate >= ms.rate {
                    mode = mask;
                    target = rate * 2;
                }
            }
        }

        let (_, v) = solver::periph_find_best(desc, target, parent_rate);
        mask |= regs::periph_factor_mask(desc);
        let val = mode | regs::periph_encode_factors(desc, &v);

        let drop_gate = desc.features.contains(Features::SET_RATE_GATE);
        if drop_gate {
            if let Some(bit) = desc.gate_bit {
                self.set_field(desc.reg, 1 << bit, 0)?;
            }
        }
        self.set_field(desc.reg, mask, val)?;
        if drop_gate {
            if let Some(bit) = desc.gate_bit {
                self.set_field(desc.reg, 1 << bit, 1 << bit)?;
            }
        }
        Ok(())
    }
}
