//! Register word encode/decode for factor fields.
//!
//! The solver works in actual factor values; the hardware stores most of
//! them off by one (a field value of 2 divides by 3) and, for some PLLs,
//! stores N directly. This module owns both directions of that translation
//! plus the rate decode used by `recalc_rate`: given the raw register word
//! and the parent rate, what is this clock running at?
//!
//! Decode order is fixed: D1 halving first, then the N multiply, the M
//! divide, the K multiply, the P shift, and finally any fixed post-divider.

use crate::descriptor::{BitField, ClockDescriptor, Features};
use crate::solver::FactorSet;

/// Mask covering every factor field of a PLL node.
pub fn pll_factor_mask(desc: &ClockDescriptor) -> u32 {
    desc.n.mask() | desc.d1.mask() | desc.k.mask() | desc.m.mask() | desc.p.mask()
}

/// Encode a solved factor set into PLL register position.
///
/// Includes the update-strobe bit when the node has one; the strobe sits
/// outside the factor mask and relies on the transaction primitive writing
/// value bits beyond the mask.
pub fn pll_encode_factors(desc: &ClockDescriptor, v: &FactorSet) -> u32 {
    let n = if desc.features.contains(Features::ZERO_BASED_N) {
        v.n
    } else {
        v.n - 1
    };
    let mut val = desc.n.encode(n)
        | desc.d1.encode(v.d1 - 1)
        | desc.k.encode(v.k - 1)
        | desc.m.encode(v.m - 1)
        | desc.p.encode(v.p);
    if let Some(bit) = desc.upd_bit {
        val |= 1 << bit;
    }
    val
}

/// Decode the current rate of a PLL node from its raw register word.
///
/// A register state matching a fractional table entry short-circuits to that
/// entry's fixed rate; sigma-delta output is not reconstructible from the
/// factor fields.
pub fn pll_rate_from_reg(desc: &ClockDescriptor, reg: u32, parent_rate: u64) -> u64 {
    if let Some(extra) = desc.extra {
        for entry in extra.frac_entries() {
            if reg & entry.mask == entry.val {
                return entry.rate;
            }
        }
    }

    let mut rate = parent_rate;

    if desc.d1.is_present() {
        rate /= u64::from(desc.d1.extract(reg) + 1);
    }
    if desc.n.is_present() {
        let mut n = desc.n.extract(reg);
        if !desc.features.contains(Features::ZERO_BASED_N) {
            n += 1;
        }
        rate *= u64::from(n);
    }
    if desc.m.is_present() {
        rate /= u64::from(desc.m.extract(reg) + 1);
    }
    if desc.k.is_present() {
        rate *= u64::from(desc.k.extract(reg) + 1);
    }
    if desc.p.is_present() {
        rate >>= desc.p.extract(reg);
    }

    if desc.features.contains(Features::FIXED_POSTDIV) {
        if let Some(extra) = desc.extra {
            rate /= u64::from(extra.fixed_div[0]);
        }
    }
    rate
}

/// Mask covering the divider fields of a peripheral node.
pub fn periph_factor_mask(desc: &ClockDescriptor) -> u32 {
    desc.m.mask() | desc.p.mask()
}

/// Encode a peripheral M/P pair into register position.
pub fn periph_encode_factors(desc: &ClockDescriptor, v: &FactorSet) -> u32 {
    desc.m.encode(v.m - 1) | desc.p.encode(v.p)
}

/// Decode the current rate of a peripheral node from its raw register word.
///
/// `parent_rate` must already have any mux pre-divider applied.
#[allow(clippy::cast_possible_truncation)] // table index is a few bits wide
pub fn periph_rate_from_reg(desc: &ClockDescriptor, reg: u32, parent_rate: u64) -> u64 {
    if !desc.m.is_present() && !desc.p.is_present() {
        return parent_rate;
    }

    let mut m = u64::from(desc.m.extract(reg)) + 1;

    if let Some(extra) = desc.extra {
        if desc.features.contains(Features::M_TABLE) {
            // Raw bits can index past the table on a mis-programmed
            // register; treat that as divide-by-one.
            let idx = (m - 1) as usize;
            m = match extra.m_table.get(idx) {
                Some(&t) if t != 0 => u64::from(t),
                _ => 1,
            };
        }
        if mode_select_active(desc, reg) {
            m *= 2;
        }
    }

    if !desc.p.is_present() {
        return parent_rate / m;
    }
    (parent_rate / m) >> desc.p.extract(reg)
}

/// Whether the node's mode-select bit is currently set in `reg`.
pub fn mode_select_active(desc: &ClockDescriptor, reg: u32) -> bool {
    if !desc.features.contains(Features::MODE_SELECT) {
        return false;
    }
    desc.extra
        .and_then(|e| e.mode_select)
        .is_some_and(|ms| reg & (1 << ms.bit) != 0)
}

/// Effective mux pre-divider for `parent_index`, given the current register
/// word. 1 when the node has no pre-divider on that input.
pub fn prediv_for_parent(desc: &ClockDescriptor, reg: u32, parent_index: usize) -> u64 {
    let Some(extra) = desc.extra else {
        return 1;
    };
    let mut prediv = 1u64;

    if desc.features.contains(Features::MUX_FIXED_PREDIV) {
        if let Some(&div) = extra.fixed_div.get(parent_index) {
            if div != 0 {
                prediv = u64::from(div);
            }
        }
    }

    if desc.features.contains(Features::MUX_VARIABLE_PREDIV) {
        if let Some(vp) = extra.variable_prediv {
            if usize::from(vp.parent_index) == parent_index {
                let field = BitField::new(vp.shift, vp.width);
                prediv = u64::from(field.extract(reg)) + 1;
            }
        }
    }
    prediv
}

/// Rate of a fixed-factor node: parent / div * mul, with the ratio stored in
/// the width slots.
pub fn fixed_factor_rate(desc: &ClockDescriptor, parent_rate: u64) -> u64 {
    parent_rate / u64::from(desc.m.width) * u64::from(desc.n.width)
}
