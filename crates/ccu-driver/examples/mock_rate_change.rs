//! Drive a flat-factor PLL rate change against the mock backend and print
//! every register write the ordering discipline produces.
//!
//! Run with `RUST_LOG=debug` to also see the engine's own trace.

use ccu_driver::{Ccu, MockBlock, PollConfig, RegisterSpace};
use ccu_model::{ClockDescriptor, ClockOps, Features, ParentSlot};
use tracing_subscriber::EnvFilter;

const HOSC: &[ParentSlot] = &[ParentSlot::Named("osc24M")];
static PLL_CPUX: ClockDescriptor = ClockDescriptor::new("pll-cpux", HOSC, ClockOps::Pll)
    .reg(0x000)
    .n(8, 5)
    .k(4, 2)
    .m(0, 2)
    .p(16, 2)
    .features(Features::FLAT_FACTORS);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mock = MockBlock::new();
    // Boot state: 408 MHz (n=17 k=1 m=1 p=0).
    mock.preload(0x000, 16 << 8);

    let space =
        RegisterSpace::new(Box::new(mock.clone())).with_poll_config(PollConfig::instant());
    let ccu = Ccu::new(space, &[&PLL_CPUX], &[])?;
    let pll = ccu.node(0).expect("just registered");

    println!("408 MHz -> 600 MHz:");
    pll.set_rate(600_000_000, 24_000_000)?;
    for (step, w) in mock.writes().iter().enumerate() {
        println!("  {}. reg {:#05x} <- {:#010x}", step + 1, w.reg, w.value);
    }
    println!("now running at {} Hz", pll.recalc_rate(24_000_000)?);
    Ok(())
}
