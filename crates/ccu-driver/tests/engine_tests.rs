//! Rate engine validation against the recording mock backend.
//!
//! Every test stands up a full controller over a `MockBlock` and asserts
//! both final register contents and, where ordering is the contract
//! (enable/disable, flat factors, gate drop), the exact write sequence.

use ccu_driver::{
    Ccu, CcuError, FixedRate, MockBlock, PollConfig, RateRequest, RegisterSpace, ResetMapEntry,
};
use ccu_model::{ClockDescriptor, ClockOps, Extra, Features, FracEntry, ParentSlot, SigmaDelta};

const OSC24M: u64 = 24_000_000;
const HOSC: &[ParentSlot] = &[ParentSlot::Named("osc24M")];
const NO_RESETS: &[ResetMapEntry] = &[];

fn mock_ccu(clocks: &[&'static ClockDescriptor]) -> (MockBlock, Ccu) {
    let mock = MockBlock::new();
    let space =
        RegisterSpace::new(Box::new(mock.clone())).with_poll_config(PollConfig::instant());
    let ccu = Ccu::new(space, clocks, NO_RESETS).expect("test descriptors must validate");
    (mock, ccu)
}

// ── enable / disable ─────────────────────────────────────────────────────────

const MMC0_PARENTS: &[ParentSlot] = &[
    ParentSlot::Named("osc24M"),
    ParentSlot::Named("pll-periph"),
];
static MMC0: ClockDescriptor = ClockDescriptor::new("mmc0", MMC0_PARENTS, ClockOps::Periph)
    .reg(0x088)
    .mux(24, 2)
    .gate(31)
    .m(0, 4)
    .p(16, 2)
    .bus(0x060, 8)
    .reset(0x2c0, 8)
    .features(Features::SET_RATE_GATE);

#[test]
fn enable_sequences_reset_bus_gate() {
    let (mock, ccu) = mock_ccu(&[&MMC0]);
    let node = ccu.node_by_name("mmc0").unwrap();

    node.enable().unwrap();
    let writes = mock.writes();
    assert_eq!(
        writes.iter().map(|w| (w.reg, w.value)).collect::<Vec<_>>(),
        vec![
            (0x2c0, 1 << 8),      // bus reset deasserted first
            (0x060, 1 << 8),      // then the bus gate
            (0x088, 1 << 31),     // own gate last
        ]
    );

    mock.clear_log();
    node.disable().unwrap();
    let writes = mock.writes();
    assert_eq!(
        writes.iter().map(|w| (w.reg, w.value)).collect::<Vec<_>>(),
        vec![(0x088, 0), (0x060, 0), (0x2c0, 0)],
    );
}

#[test]
fn set_rate_drops_and_restores_the_gate() {
    let (mock, ccu) = mock_ccu(&[&MMC0]);
    let node = ccu.node_by_name("mmc0").unwrap();

    mock.preload(0x088, 1 << 31);
    node.set_rate(25_000_000, 600_000_000).unwrap();

    let writes = mock.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].value & (1 << 31), 0, "gate must drop first");
    // 600 MHz / 3 >> 3 = 25 MHz: m field 2, p field 3
    assert_eq!(writes[1].value & 0xf, 2);
    assert_eq!((writes[1].value >> 16) & 0x3, 3);
    assert_ne!(writes[2].value & (1 << 31), 0, "gate restored last");

    assert_eq!(node.recalc_rate(600_000_000).unwrap(), 25_000_000);
}

#[test]
fn determine_rate_picks_the_best_parent() {
    let (_, ccu) = mock_ccu(&[&MMC0]);
    let node = ccu.node_by_name("mmc0").unwrap();

    let osc = FixedRate(OSC24M);
    let periph = FixedRate(600_000_000);
    let mut req = RateRequest::new(25_000_000, OSC24M);
    node.determine_rate(&mut req, &[Some(&osc), Some(&periph)])
        .unwrap();

    assert_eq!(req.rate, 25_000_000);
    assert_eq!(req.best_parent_index, 1);
    assert_eq!(req.best_parent_rate, 600_000_000);
}

#[test]
fn set_parent_refuses_unwired_slots() {
    let (mock, ccu) = mock_ccu(&[&MMC0]);
    let node = ccu.node_by_name("mmc0").unwrap();

    node.set_parent_index(1).unwrap();
    assert_eq!((mock.value(0x088) >> 24) & 0x3, 1);
    assert_eq!(node.parent_index().unwrap(), 1);

    assert!(matches!(
        node.set_parent_index(2),
        Err(CcuError::MissingParent { index: 2, .. })
    ));
}

// ── PLL round trip and lock handling ─────────────────────────────────────────

static PLL_C0CPUX: ClockDescriptor =
    ClockDescriptor::new("pll-c0cpux", HOSC, ClockOps::Pll)
        .reg(0x000)
        .lock(0x00c, 0)
        .n(8, 8)
        .n_min(12)
        .d1(16, 1)
        .p(18, 1)
        .features(Features::ZERO_BASED_N);

#[test]
fn pll_set_rate_recalc_round_trip() {
    let (mock, ccu) = mock_ccu(&[&PLL_C0CPUX]);
    let node = ccu.node_by_name("pll-c0cpux").unwrap();

    // Lock bit never rises: the commit must still land (logged, non-fatal).
    node.set_rate(1_200_000_000, OSC24M).unwrap();
    assert_eq!(mock.value(0x000), 50 << 8);
    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 1_200_000_000);

    // With the lock bit wired up the wait ends on the first poll.
    mock.preload(0x00c, 1);
    node.set_rate(1_200_000_000, OSC24M).unwrap();
    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 1_200_000_000);
}

#[test]
fn pll_unreachable_rate_is_an_error() {
    let (_, ccu) = mock_ccu(&[&PLL_C0CPUX]);
    let node = ccu.node_by_name("pll-c0cpux").unwrap();
    // Far above n_max * parent: nothing in the scan space comes close.
    assert!(matches!(
        node.set_rate(40_000_000_000, OSC24M),
        Err(CcuError::NoSolution { .. })
    ));
}

// ── flat-factor ordered writes ───────────────────────────────────────────────

static PLL_FLAT: ClockDescriptor = ClockDescriptor::new("pll-cpux", HOSC, ClockOps::Pll)
    .reg(0x000)
    .n(8, 5)
    .k(4, 2)
    .m(0, 2)
    .p(16, 2)
    .features(Features::FLAT_FACTORS);

#[test]
fn flat_factors_shrink_dividers_last() {
    let (mock, ccu) = mock_ccu(&[&PLL_FLAT]);
    let node = ccu.node_by_name("pll-cpux").unwrap();

    // Old state: n=16 k=1 m=2 p=1.
    mock.preload(0x000, (15 << 8) | 0x1 | (1 << 16));
    // 600 MHz = 24 MHz * 25: m and p both shrink.
    node.set_rate(600_000_000, OSC24M).unwrap();

    let values: Vec<u32> = mock.writes().iter().map(|w| w.value).collect();
    assert_eq!(
        values,
        vec![
            0x0001_1801, // multiplying factors move, old m/p still in place
            0x0001_1800, // m shrinks after the new factors are in
            0x0000_1800, // p shrinks only once the PLL had time to lock
        ]
    );
}

#[test]
fn flat_factors_grow_dividers_first() {
    let (mock, ccu) = mock_ccu(&[&PLL_FLAT]);
    let node = ccu.node_by_name("pll-cpux").unwrap();

    // Old state: n=16 k=1 m=1 p=0; 200 MHz = 24 MHz * 25 / 3 needs m=3.
    mock.preload(0x000, 15 << 8);
    node.set_rate(200_000_000, OSC24M).unwrap();

    let values: Vec<u32> = mock.writes().iter().map(|w| w.value).collect();
    assert_eq!(
        values,
        vec![
            0x0000_0f02, // m grows first, multiplier untouched
            0x0000_1802, // then the multiplying factors
        ]
    );
    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 200_000_000);
}

// ── fractional / sigma-delta override ────────────────────────────────────────

const SDM_BIT: u32 = 1 << 24;
const NDP_MASK: u32 = (0xff << 8) | (1 << 16) | (1 << 18) | 0x3f;

const AUDIO_FRACS: &[FracEntry] = &[
    FracEntry {
        rate: 22_579_200,
        mask: SDM_BIT | NDP_MASK,
        val: SDM_BIT | (54 << 8) | (1 << 18) | 28,
        sd: Some(SigmaDelta {
            reg: 0x284,
            val: 0xc001_21ff,
        }),
    },
    FracEntry {
        rate: 24_576_000,
        mask: SDM_BIT | NDP_MASK,
        val: SDM_BIT | (61 << 8) | (1 << 18) | 29,
        sd: Some(SigmaDelta {
            reg: 0x284,
            val: 0xc000_e147,
        }),
    },
    FracEntry {
        rate: 0,
        mask: SDM_BIT,
        val: 0,
        sd: None,
    },
];
static AUDIO_EXTRA: Extra = Extra::new().with_fracs(AUDIO_FRACS);
static PLL_AUDIO: ClockDescriptor = ClockDescriptor::new("pll-audio", HOSC, ClockOps::Pll)
    .reg(0x008)
    .n(8, 8)
    .n_min(12)
    .d1(16, 1)
    .p(18, 1)
    .m(0, 6)
    .features(Features::ZERO_BASED_N)
    .extra(&AUDIO_EXTRA);

#[test]
fn fractional_rate_short_circuits_the_solver() {
    let (mock, ccu) = mock_ccu(&[&PLL_AUDIO]);
    let node = ccu.node_by_name("pll-audio").unwrap();

    node.set_rate(22_579_200, OSC24M).unwrap();

    let writes = mock.writes();
    assert_eq!(writes.len(), 2, "sigma-delta word plus one masked write");
    assert_eq!((writes[0].reg, writes[0].value), (0x284, 0xc001_21ff));
    assert_eq!(writes[1].reg, 0x008);
    assert_eq!(
        writes[1].value & (SDM_BIT | NDP_MASK),
        SDM_BIT | (54 << 8) | (1 << 18) | 28
    );

    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 22_579_200);

    let mut req = RateRequest::new(24_576_000, OSC24M);
    node.determine_rate(&mut req, &[]).unwrap();
    assert_eq!(req.rate, 24_576_000, "table rates are reachable as-is");
}

#[test]
fn integer_rate_leaves_sigma_delta_mode() {
    let (mock, ccu) = mock_ccu(&[&PLL_AUDIO]);
    let node = ccu.node_by_name("pll-audio").unwrap();

    node.set_rate(22_579_200, OSC24M).unwrap();
    assert_ne!(mock.value(0x008) & SDM_BIT, 0);

    node.set_rate(576_000_000, OSC24M).unwrap();
    assert_eq!(mock.value(0x008) & SDM_BIT, 0, "wildcard entry clears the mode");
    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 576_000_000);
}

// ── update strobe ────────────────────────────────────────────────────────────

static PLL_DDR: ClockDescriptor = ClockDescriptor::new("pll-ddr", HOSC, ClockOps::Pll)
    .reg(0x020)
    .n(8, 6)
    .n_min(12)
    .d1(16, 1)
    .p(18, 1)
    .update(30);

#[test]
fn update_strobe_is_written_with_the_factors() {
    let (mock, ccu) = mock_ccu(&[&PLL_DDR]);
    let node = ccu.node_by_name("pll-ddr").unwrap();

    node.set_rate(576_000_000, OSC24M).unwrap();
    let reg = mock.value(0x020);
    assert_ne!(reg & (1 << 30), 0);
    assert_eq!((reg >> 8) & 0x3f, 23); // one-based n=24
}

// ── fixed post-divider ───────────────────────────────────────────────────────

static PERIPH0_EXTRA: Extra = Extra::new().with_post_div(2);
static PLL_PERIPH0: ClockDescriptor =
    ClockDescriptor::new("pll-periph0", HOSC, ClockOps::Pll)
        .reg(0x028)
        .n(8, 5)
        .k(4, 2)
        .features(Features::FIXED_POSTDIV)
        .extra(&PERIPH0_EXTRA);

#[test]
fn fixed_postdiv_scales_both_directions() {
    let (_, ccu) = mock_ccu(&[&PLL_PERIPH0]);
    let node = ccu.node_by_name("pll-periph0").unwrap();

    let mut req = RateRequest::new(600_000_000, OSC24M);
    node.determine_rate(&mut req, &[]).unwrap();
    assert_eq!(req.rate, 600_000_000); // 24 MHz * 25 * 2 / 2

    node.set_rate(600_000_000, OSC24M).unwrap();
    assert_eq!(node.recalc_rate(OSC24M).unwrap(), 600_000_000);
}

// ── mux pre-dividers ─────────────────────────────────────────────────────────

const AHB1_PARENTS: &[ParentSlot] = &[
    ParentSlot::Named("losc"),
    ParentSlot::Named("osc24M"),
    ParentSlot::Named("axi"),
    ParentSlot::Named("pll-periph"),
];
static AHB1_EXTRA: Extra = Extra::new().with_variable_prediv(3, 6, 2);
static AHB1: ClockDescriptor = ClockDescriptor::new("ahb1", AHB1_PARENTS, ClockOps::Periph)
    .reg(0x054)
    .mux(12, 2)
    .p(4, 2)
    .features(Features::MUX_VARIABLE_PREDIV)
    .extra(&AHB1_EXTRA);

#[test]
fn variable_prediv_applies_to_its_parent_only() {
    let (mock, ccu) = mock_ccu(&[&AHB1]);
    let node = ccu.node_by_name("ahb1").unwrap();

    // mux=3, pre-divider field 2 (divide by 3), p=1
    mock.preload(0x054, (3 << 12) | (2 << 6) | (1 << 4));
    assert_eq!(node.recalc_rate(600_000_000).unwrap(), 100_000_000);

    let osc = FixedRate(OSC24M);
    let periph = FixedRate(600_000_000);
    let mut req = RateRequest::new(100_000_000, 0);
    node.determine_rate(&mut req, &[None, Some(&osc), None, Some(&periph)])
        .unwrap();
    assert_eq!(req.best_parent_index, 3);
    assert_eq!(req.best_parent_rate, 200_000_000, "pre-divided candidate");
    assert_eq!(req.rate, 100_000_000);
}

const AHB2_PARENTS: &[ParentSlot] = &[
    ParentSlot::Named("ahb1"),
    ParentSlot::Named("pll-periph"),
];
static AHB2_EXTRA: Extra = Extra::new().with_fixed_div([0, 2, 0, 0]);
static AHB2: ClockDescriptor = ClockDescriptor::new("ahb2", AHB2_PARENTS, ClockOps::Periph)
    .reg(0x05c)
    .mux(0, 2)
    .features(Features::MUX_FIXED_PREDIV)
    .extra(&AHB2_EXTRA);

#[test]
fn pure_mux_with_fixed_prediv() {
    let (mock, ccu) = mock_ccu(&[&AHB2]);
    let node = ccu.node_by_name("ahb2").unwrap();

    mock.preload(0x05c, 1);
    assert_eq!(node.recalc_rate(600_000_000).unwrap(), 300_000_000);

    let ahb1 = FixedRate(200_000_000);
    let periph = FixedRate(600_000_000);
    let mut req = RateRequest::new(300_000_000, 0);
    node.determine_rate(&mut req, &[Some(&ahb1), Some(&periph)])
        .unwrap();
    assert_eq!(req.best_parent_index, 1);
    assert_eq!(req.rate, 300_000_000);
}

// ── mode select ──────────────────────────────────────────────────────────────

static MMC2_EXTRA: Extra = Extra::new().with_mode_select(50_000_000, 30);
static MMC2: ClockDescriptor = ClockDescriptor::new("mmc2", HOSC, ClockOps::Periph)
    .reg(0x090)
    .m(0, 4)
    .p(16, 2)
    .features(Features::MODE_SELECT)
    .extra(&MMC2_EXTRA);

#[test]
fn mode_select_doubles_the_divider_above_threshold() {
    let (mock, ccu) = mock_ccu(&[&MMC2]);
    let node = ccu.node_by_name("mmc2").unwrap();

    node.set_rate(52_000_000, 600_000_000).unwrap();
    assert_ne!(mock.value(0x090) & (1 << 30), 0);
    // Solved for 104 MHz with the divider counting double: 600/6/2.
    assert_eq!(node.recalc_rate(600_000_000).unwrap(), 50_000_000);

    // Below the threshold the mode bit is cleared again.
    node.set_rate(25_000_000, 600_000_000).unwrap();
    assert_eq!(mock.value(0x090) & (1 << 30), 0);
    assert_eq!(node.recalc_rate(600_000_000).unwrap(), 25_000_000);
}

// ── phase ────────────────────────────────────────────────────────────────────

static MMC0_SAMPLE: ClockDescriptor =
    ClockDescriptor::new("mmc0-sample", HOSC, ClockOps::Phase)
        .reg(0x088)
        .p(20, 3);

#[test]
fn phase_round_trip() {
    let (mock, ccu) = mock_ccu(&[&MMC0_SAMPLE]);
    let node = ccu.node_by_name("mmc0-sample").unwrap();

    // Grandparent PLL at 600 MHz, parent divider output at 100 MHz:
    // one delay step is 60 degrees.
    node.set_phase(120, 100_000_000, 600_000_000).unwrap();
    assert_eq!((mock.value(0x088) >> 20) & 0x7, 2);
    assert_eq!(node.phase(100_000_000, 600_000_000).unwrap(), 120);

    // Zero delay is the 180-degree convention.
    node.set_phase(180, 100_000_000, 600_000_000).unwrap();
    assert_eq!((mock.value(0x088) >> 20) & 0x7, 0);
    assert_eq!(node.phase(100_000_000, 600_000_000).unwrap(), 180);
}

static MMC2_SAMPLE: ClockDescriptor =
    ClockDescriptor::new("mmc2-sample", HOSC, ClockOps::Phase)
        .reg(0x090)
        .p(8, 3)
        .features(Features::MODE_SELECT)
        .extra(&MMC2_EXTRA);

#[test]
fn phase_is_unavailable_in_double_rate_mode() {
    let (mock, ccu) = mock_ccu(&[&MMC2_SAMPLE]);
    let node = ccu.node_by_name("mmc2-sample").unwrap();

    mock.preload(0x090, 1 << 30);
    assert!(matches!(
        node.phase(100_000_000, 600_000_000),
        Err(CcuError::PhaseUnavailable { .. })
    ));
    assert!(matches!(
        node.set_phase(90, 100_000_000, 600_000_000),
        Err(CcuError::PhaseUnavailable { .. })
    ));
    assert_eq!(mock.write_count(), 0);
}

#[test]
fn phase_needs_usable_parent_rates() {
    let (mock, ccu) = mock_ccu(&[&MMC0_SAMPLE]);
    let node = ccu.node_by_name("mmc0-sample").unwrap();

    mock.preload(0x088, 1 << 20);
    assert!(matches!(
        node.phase(0, 600_000_000),
        Err(CcuError::InvalidParentRate { .. })
    ));
}

// ── fixed factor ─────────────────────────────────────────────────────────────

static PLL_AUDIO_2X: ClockDescriptor =
    ClockDescriptor::new("pll-audio-2x", HOSC, ClockOps::FixedFactor)
        .ratio(2, 1)
        .features(Features::SET_RATE_PARENT);

#[test]
fn fixed_factor_scales_and_never_writes() {
    let (mock, ccu) = mock_ccu(&[&PLL_AUDIO_2X]);
    let node = ccu.node_by_name("pll-audio-2x").unwrap();

    assert_eq!(node.recalc_rate(24_576_000).unwrap(), 49_152_000);

    let audio = FixedRate(24_576_000);
    let mut req = RateRequest::new(49_152_000, 0);
    node.determine_rate(&mut req, &[Some(&audio)])
        .unwrap();
    assert_eq!(req.rate, 49_152_000);
    assert_eq!(req.best_parent_rate, 24_576_000);

    node.set_rate(49_152_000, 24_576_000).unwrap();
    assert_eq!(mock.write_count(), 0);
}

// ── address spaces ───────────────────────────────────────────────────────────

static APB0: ClockDescriptor = ClockDescriptor::new("apb0", HOSC, ClockOps::Periph)
    .prcm_reg(0x00c)
    .p(0, 2);

#[test]
fn secondary_space_must_be_mapped() {
    let (_, ccu) = mock_ccu(&[&APB0]);
    let node = ccu.node_by_name("apb0").unwrap();
    assert!(matches!(
        node.recalc_rate(OSC24M),
        Err(CcuError::MissingAddressSpace { .. })
    ));

    let primary = MockBlock::new();
    let secondary = MockBlock::new();
    secondary.preload(0x00c, 1); // shift by one
    let space = RegisterSpace::new(Box::new(primary))
        .with_secondary(Box::new(secondary))
        .with_poll_config(PollConfig::instant());
    let ccu = Ccu::new(space, &[&APB0], NO_RESETS).unwrap();
    assert_eq!(
        ccu.node_by_name("apb0").unwrap().recalc_rate(OSC24M).unwrap(),
        OSC24M >> 1
    );
}
