//! PLL-family operations: rate math round trips, lock polling, and the
//! ordered factor-write discipline.

use crate::error::{CcuError, Result};
use crate::node::{ClockNode, RateRequest};
use ccu_model::{regs, solver, Features};
use tracing::warn;

impl ClockNode {
    /// Block until the PLL reports lock, best-effort.
    ///
    /// Skipped while the clock is gated off (the lock bit will never rise).
    /// Nodes without lock wiring get a fixed settle delay instead. Exhausting
    /// the poll budget is logged, not failed: at early boot there is nowhere
    /// useful to report it, and refusing to proceed would hang bring-up.
    pub(crate) fn wait_pll_stable(&self) -> Result<()> {
        let desc = self.descriptor();

        if let Some(bit) = desc.gate_bit {
            if self.read_main()? & (1 << bit) == 0 {
                return Ok(());
            }
        }

        let poll = *self.space().poll();
        if let Some(lock) = desc.lock {
            for _ in 0..poll.lock_poll_retries {
                std::thread::sleep(poll.lock_poll_interval);
                if self.space().read(desc.space, lock.reg)? & lock.mask() != 0 {
                    return Ok(());
                }
            }
            warn!(clock = desc.name, "no rate lock");
        } else {
            std::thread::sleep(poll.settle_delay);
        }
        Ok(())
    }

    pub(crate) fn pll_recalc_rate(&self, parent_rate: u64) -> Result<u64> {
        let reg = self.read_main()?;
        Ok(regs::pll_rate_from_reg(self.descriptor(), reg, parent_rate))
    }

    pub(crate) fn pll_determine_rate(&self, req: &mut RateRequest) -> Result<()> {
        let desc = self.descriptor();

        if let Some(extra) = desc.extra {
            // Fractional rates are reachable as-is; leave the request alone.
            if extra.frac_for_rate(req.rate).is_some() {
                return Ok(());
            }
        }

        let post_div = self.fixed_post_div();
        let (rate, _) =
            solver::pll_find_best(desc, req.rate * post_div, req.best_parent_rate);
        req.rate = rate / post_div;
        Ok(())
    }

    pub(crate) fn pll_set_rate(&self, rate: u64, parent_rate: u64) -> Result<()> {
        let desc = self.descriptor();
        let mut mask = regs::pll_factor_mask(desc);
        let mut val = 0u32;

        if let Some(extra) = desc.extra {
            if !extra.fracs.is_empty() {
                if let Some(entry) = extra.frac_for_rate(rate) {
                    // Sigma-delta pattern first, then the fractional bits.
                    if let Some(sd) = entry.sd {
                        self.set_field(sd.reg, !0, sd.val)?;
                    }
                    return self.set_field(desc.reg, entry.mask, entry.val);
                }
                if let Some(fallback) = extra.frac_fallback() {
                    // Integer mode: force the hardware out of sigma-delta.
                    mask |= fallback.mask;
                    val |= fallback.val;
                }
            }
        }

        let post_div = self.fixed_post_div();
        let (best, v) = solver::pll_find_best(desc, rate * post_div, parent_rate);
        if best == 0 {
            return Err(CcuError::NoSolution {
                clock: desc.name,
                rate,
            });
        }
        val |= regs::pll_encode_factors(desc, &v);

        if desc.features.contains(Features::FLAT_FACTORS) {
            return self.pll_set_flat_factors(mask, val);
        }
        self.set_field(desc.reg, mask, val)?;
        self.wait_pll_stable()
    }

    /// Ordered factor write for nodes that must never pass through a
    /// configuration hotter than either endpoint: grow the dividers, move
    /// the multiplying factors, let the PLL lock, then shrink the dividers.
    /// Every intermediate word is itself a safe operating point, which is
    /// why a partially applied sequence needs no rollback.
    fn pll_set_flat_factors(&self, mask: u32, val: u32) -> Result<()> {
        let desc = self.descriptor();
        let m_mask = desc.m.mask();
        let p_mask = desc.p.mask();
        let delay = self.space().poll().factor_write_delay;

        let reg = self.read_main()?;
        let m_old = reg & m_mask;
        let p_old = reg & p_mask;

        if desc.p.is_present() && p_old < (val & p_mask) {
            self.set_field(desc.reg, p_mask, val & p_mask)?;
            std::thread::sleep(delay);
        }
        if desc.m.is_present() && m_old < (val & m_mask) {
            self.set_field(desc.reg, m_mask, val & m_mask)?;
            std::thread::sleep(delay);
        }

        self.set_field(desc.reg, mask & !(p_mask | m_mask), val & !(p_mask | m_mask))?;

        if desc.m.is_present() && m_old > (val & m_mask) {
            self.set_field(desc.reg, m_mask, val & m_mask)?;
            std::thread::sleep(delay);
        }

        self.wait_pll_stable()?;

        if desc.p.is_present() && p_old > (val & p_mask) {
            self.set_field(desc.reg, p_mask, val & p_mask)?;
            std::thread::sleep(delay);
        }
        Ok(())
    }

    /// Fixed post-divider, 1 when the node has none.
    fn fixed_post_div(&self) -> u64 {
        let desc = self.descriptor();
        if desc.features.contains(Features::FIXED_POSTDIV) {
            if let Some(extra) = desc.extra {
                return u64::from(extra.fixed_div[0]);
            }
        }
        1
    }
}
