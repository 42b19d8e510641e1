//! Factor search.
//!
//! Given a node descriptor and a (target, parent) rate pair, find the factor
//! combination whose output rate best approximates the target. Four solving
//! modes are selected structurally from which fields the descriptor carries;
//! each scans a small, fixed factor space in a documented order so results
//! are deterministic:
//!
//! - multiplier-only (`parent * n * k`): K descending, N around the quotient
//! - single divider chain (`parent / d1 * n / m >> p`): P ascending,
//!   N/M from bounded rational approximation
//! - general chain (`parent * n / m * k >> p`): P ascending, K descending
//! - peripheral dividers (`parent / m >> p`): P descending, M ascending or
//!   walked through the legal-divider table
//!
//! The first exact match in scan order wins immediately; otherwise the whole
//! space is scanned and the minimum absolute deviation wins. The scan orders
//! are load-bearing: at frequencies where two combinations tie, hardware has
//! only been validated with the combination the documented order prefers.
//!
//! All arithmetic is integer, rates are Hz in `u64`, and no rounding beyond
//! truncation happens in intermediate ratios.

use crate::descriptor::{ClockDescriptor, Features};
use crate::rational;

/// Factor values chosen by a solve.
///
/// Every field holds the *actual* factor value (e.g. `m` = 3 divides by 3),
/// not the raw register encoding; [`crate::regs`] converts. Fields whose
/// bit-field is absent from the descriptor stay at their identity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactorSet {
    /// Multiplier N.
    pub n: u32,
    /// Halver D1 (1 or 2).
    pub d1: u32,
    /// Secondary multiplier K.
    pub k: u32,
    /// Divider M. For table-driven nodes this is the one-based table index.
    pub m: u32,
    /// Power-of-two divider P, as a shift count.
    pub p: u32,
}

impl Default for FactorSet {
    fn default() -> Self {
        Self {
            n: 1,
            d1: 1,
            k: 1,
            m: 1,
            p: 0,
        }
    }
}

/// Candidates further than this from the target are treated as unreachable;
/// a solve that finds nothing closer reports a best rate of 0.
const DELTA_CUTOFF: i64 = 2_000_000_000;

#[allow(clippy::cast_possible_wrap)] // rates stay far below i64::MAX
fn delta_abs(target: u64, candidate: u64) -> i64 {
    (target as i64 - candidate as i64).abs()
}

/// Best factor combination for a PLL-style node.
///
/// Returns `(achieved_rate, factors)`; an achieved rate of 0 means the scan
/// space held nothing within reach of the target.
#[allow(clippy::cast_possible_truncation)] // factors are bounded by field widths
pub fn pll_find_best(desc: &ClockDescriptor, rate: u64, parent_rate: u64) -> (u64, FactorSet) {
    let mut v = FactorSet::default();

    let n_max = desc.n_max();
    let n_min = u32::from(desc.n_min);
    let d1_max = desc.d1_max();
    let k_max = desc.k_max();
    let m_max = desc.m_max();
    let p_max = desc.p_max();

    let mut best_rate = 0u64;
    let mut best_delta = DELTA_CUTOFF;

    // No divider at all: rate = parent * n * k. K trades off against N, so
    // scan K from the top and bracket the quotient with N and N + 1.
    if d1_max == 1 && m_max == 1 && p_max == 0 {
        for k in (1..=k_max).rev() {
            let mul = (rate / parent_rate / u64::from(k)).min(u64::from(n_max) + 1) as u32;
            for n in mul..=mul + 1 {
                if n == 0 || n < n_min {
                    continue;
                }
                if n > n_max {
                    break;
                }
                let new_rate = parent_rate * u64::from(n) * u64::from(k);
                if new_rate == rate {
                    v.n = n;
                    v.k = k;
                    return (new_rate, v);
                }
                let delta = delta_abs(rate, new_rate);
                if delta < best_delta {
                    best_delta = delta;
                    best_rate = new_rate;
                    v.n = n;
                    v.k = k;
                }
            }
        }
        return (best_rate, v);
    }

    // Single multiplier: rate = parent / d1 * n / m >> p. The halver extends
    // the shift range by one step; an exact match trades one P step back for
    // D1 = 2 when possible.
    if k_max == 1 {
        for p in 0..=(p_max + d1_max - 1) {
            let (n, m) = pick_ratio(rate, parent_rate, p, 1, n_max, m_max);
            let Some((n, m)) = n_floor_scale(n, m, n_min, n_max, m_max) else {
                continue;
            };
            let new_rate = (parent_rate * u64::from(n) / u64::from(m)) >> p;
            let exact = new_rate == rate;
            let delta = delta_abs(rate, new_rate);
            if exact || delta < best_delta {
                v.n = n;
                v.m = m;
                if p > 1 && d1_max > 1 {
                    v.p = p - 1;
                    v.d1 = 2;
                } else {
                    v.p = p;
                    v.d1 = 1;
                }
                if exact {
                    return (new_rate, v);
                }
                best_delta = delta;
                best_rate = new_rate;
            }
        }
        return (best_rate, v);
    }

    // General chain: rate = parent * n / m * k >> p. Smallest P first,
    // largest K first.
    for p in 0..=p_max {
        for k in (1..=k_max).rev() {
            let (n, m) = pick_ratio(rate, parent_rate, p, k, n_max, m_max);
            let Some((n, m)) = n_floor_scale(n, m, n_min, n_max, m_max) else {
                continue;
            };
            let new_rate = (parent_rate * u64::from(n) / u64::from(m) * u64::from(k)) >> p;
            if new_rate == rate {
                // Normalise the K/M pair; keep the scanned pair when the
                // re-approximation degenerates.
                let (nk, nm) = rational::best_approximation(
                    u64::from(k),
                    u64::from(m),
                    u64::from(k_max) - 1,
                    u64::from(m_max) - 1,
                );
                v.n = n;
                if nm != 0 {
                    v.k = nk as u32;
                    v.m = nm as u32;
                } else {
                    v.k = k;
                    v.m = m;
                }
                v.p = p;
                return (new_rate, v);
            }
            let delta = delta_abs(rate, new_rate);
            if delta < best_delta {
                best_delta = delta;
                best_rate = new_rate;
                v.n = n;
                v.m = m;
                v.k = k;
                v.p = p;
            }
        }
    }
    (best_rate, v)
}

/// N/M candidate for one (p, k) step of the divider-chain scans.
///
/// With an M field present this is the bounded rational approximation of
/// `rate / parent`; without one (or when the approximation degenerates to a
/// zero numerator or denominator) it falls back to plain division of the
/// shifted parent.
#[allow(clippy::cast_possible_truncation)]
fn pick_ratio(rate: u64, parent_rate: u64, p: u32, k: u32, n_max: u32, m_max: u32) -> (u32, u32) {
    if m_max > 1 {
        let (num, den) = rational::best_approximation(
            rate,
            parent_rate,
            u64::from(n_max) - 1,
            u64::from(m_max) - 1,
        );
        if den != 0 && num != 0 {
            return (num as u32, den as u32);
        }
    }
    let shifted = parent_rate >> p;
    if shifted == 0 {
        return (0, 0);
    }
    let n = rate / u64::from(k) / shifted;
    if n > u64::from(n_max) {
        return (0, 0);
    }
    (n as u32, 1)
}

/// Enforce the N floor by scaling N and M together; `None` rejects the
/// candidate (zero N, or the scale-up overflowing either field).
fn n_floor_scale(n: u32, m: u32, n_min: u32, n_max: u32, m_max: u32) -> Option<(u32, u32)> {
    if n == 0 || m == 0 {
        return None;
    }
    if n >= n_min {
        return Some((n, m));
    }
    let scale = (n_min + n - 1) / n;
    let (n, m) = (n * scale, m * scale);
    if n > n_max || m > m_max {
        return None;
    }
    Some((n, m))
}

/// Best shift for a peripheral node with only a P field: the smallest shift
/// that does not overshoot the target, saturating at the field maximum.
pub fn periph_p_find_best(
    desc: &ClockDescriptor,
    rate: u64,
    parent_rate: u64,
) -> (u64, FactorSet) {
    let p_max = i64::from(desc.p_max());

    let mut p = p_max - 1;
    while p >= 0 {
        if (parent_rate >> p) > rate {
            break;
        }
        p -= 1;
    }
    #[allow(clippy::cast_sign_loss)]
    let p = (p + 1) as u32;

    let v = FactorSet {
        p,
        ..FactorSet::default()
    };
    (parent_rate >> p, v)
}

/// Best M/P combination for a peripheral divider node.
///
/// Scans P from the top so exact matches land on the largest shift (and the
/// smallest M), either over the dense `1..=m_max` divider range or over the
/// descriptor's legal-divider table. A target below the minimum reachable
/// rate yields the minimum rate, not zero.
#[allow(clippy::cast_possible_truncation)]
pub fn periph_mp_find_best(
    desc: &ClockDescriptor,
    rate: u64,
    parent_rate: u64,
) -> (u64, FactorSet) {
    // A zero target is not a contract; scan as if asked for the floor.
    let rate = rate.max(1);
    let m_max = u64::from(desc.m_max());
    let p_max = desc.p_max();

    let mut v = FactorSet::default();
    let mut best_rate = 0u64;
    let mut best_delta = DELTA_CUTOFF;

    if desc.features.contains(Features::M_TABLE) {
        if let Some(extra) = desc.extra {
            for (i, &mval) in extra.m_table.iter().enumerate() {
                if mval == 0 {
                    break;
                }
                for p in (0..=p_max).rev() {
                    let new_rate = (parent_rate / u64::from(mval)) >> p;
                    if new_rate == rate {
                        v.m = i as u32 + 1;
                        v.p = p;
                        return (new_rate, v);
                    }
                    let delta = delta_abs(rate, new_rate);
                    if delta < best_delta {
                        best_delta = delta;
                        best_rate = new_rate;
                        v.m = i as u32 + 1;
                        v.p = p;
                    }
                }
            }
            return (best_rate, v);
        }
    }

    for p in (0..=p_max).rev() {
        let div = ((parent_rate / rate) >> p).clamp(1, m_max);
        for m in div..=div + 1 {
            if m > m_max {
                break;
            }
            let new_rate = (parent_rate / m) >> p;
            if new_rate == rate {
                v.m = m as u32;
                v.p = p;
                return (new_rate, v);
            }
            let delta = delta_abs(rate, new_rate);
            if delta < best_delta {
                best_delta = delta;
                best_rate = new_rate;
                v.m = m as u32;
                v.p = p;
            }
        }
    }
    (best_rate, v)
}

/// Dispatch a peripheral solve on whichever divider fields are present.
///
/// With neither field the node is a pure mux and the parent rate passes
/// through unchanged.
pub fn periph_find_best(desc: &ClockDescriptor, rate: u64, parent_rate: u64) -> (u64, FactorSet) {
    if desc.m.is_present() {
        periph_mp_find_best(desc, rate, parent_rate)
    } else if desc.p.is_present() {
        periph_p_find_best(desc, rate, parent_rate)
    } else {
        (parent_rate, FactorSet::default())
    }
}
