//! Representative node topologies for offline diagnostics.
//!
//! These are *shapes*, not a chip table: each stands for one structural
//! family the solver has to handle, with field layouts borrowed from common
//! silicon so solved factor values can be compared against datasheets.

use ccu_model::{ClockDescriptor, ClockOps, Extra, Features, FracEntry, ParentSlot, SigmaDelta};

const HOSC: &[ParentSlot] = &[ParentSlot::Named("osc24M")];

/// CPU PLL: zero-based 8-bit multiplier with a VCO floor, halver, one-bit
/// power-of-two divider.
pub static CPU_PLL: ClockDescriptor = ClockDescriptor::new("cpu-pll", HOSC, ClockOps::Pll)
    .reg(0x000)
    .lock(0x00c, 0)
    .n(8, 8)
    .n_min(12)
    .d1(16, 1)
    .p(18, 1)
    .features(Features::ZERO_BASED_N);

/// Four-factor PLL with the monotonic-safe write ordering.
pub static NKMP_PLL: ClockDescriptor = ClockDescriptor::new("nkmp-pll", HOSC, ClockOps::Pll)
    .reg(0x000)
    .n(8, 5)
    .k(4, 2)
    .m(0, 2)
    .p(16, 2)
    .features(Features::FLAT_FACTORS);

const AUDIO_FRACS: &[FracEntry] = &[
    FracEntry {
        rate: 22_579_200,
        mask: (1 << 24) | (0xff << 8) | (1 << 16) | (1 << 18) | 0x3f,
        val: (1 << 24) | (54 << 8) | (1 << 18) | 28,
        sd: Some(SigmaDelta {
            reg: 0x284,
            val: 0xc001_21ff,
        }),
    },
    FracEntry {
        rate: 24_576_000,
        mask: (1 << 24) | (0xff << 8) | (1 << 16) | (1 << 18) | 0x3f,
        val: (1 << 24) | (61 << 8) | (1 << 18) | 29,
        sd: Some(SigmaDelta {
            reg: 0x284,
            val: 0xc000_e147,
        }),
    },
    FracEntry {
        rate: 0,
        mask: 1 << 24,
        val: 0,
        sd: None,
    },
];
static AUDIO_EXTRA: Extra = Extra::new().with_fracs(AUDIO_FRACS);

/// Audio PLL: integer divider chain plus the two sigma-delta sample rates.
pub static AUDIO_PLL: ClockDescriptor = ClockDescriptor::new("audio-pll", HOSC, ClockOps::Pll)
    .reg(0x008)
    .n(8, 8)
    .n_min(12)
    .d1(16, 1)
    .p(18, 1)
    .m(0, 6)
    .features(Features::ZERO_BASED_N)
    .extra(&AUDIO_EXTRA);

static MMC_EXTRA: Extra = Extra::new().with_mode_select(50_000_000, 30);

/// Storage-controller divider: dense M, two-bit shift, gate dropped around
/// rate changes, double-rate mode above 50 MHz.
pub static MMC: ClockDescriptor = ClockDescriptor::new("mmc", HOSC, ClockOps::Periph)
    .reg(0x088)
    .gate(31)
    .m(0, 4)
    .p(16, 2)
    .features(Features::SET_RATE_GATE.union(Features::MODE_SELECT))
    .extra(&MMC_EXTRA);

/// All presets by name.
pub static PRESETS: &[&ClockDescriptor] = &[&CPU_PLL, &NKMP_PLL, &AUDIO_PLL, &MMC];

/// Look a preset up by its clock name.
pub fn by_name(name: &str) -> Option<&'static ClockDescriptor> {
    PRESETS.iter().copied().find(|d| d.name == name)
}
