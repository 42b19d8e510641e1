//! `ccu` — offline clock-control diagnostics.
//!
//! ```text
//! USAGE:
//!   ccu presets                              List the built-in node shapes
//!   ccu solve <preset> <hz> [--parent <hz>]  Best factors for a target rate
//!   ccu decode <preset> <word> [--parent]    Rate of a raw register word
//!   ccu sequence <preset> <hz> [--from <word>]
//!                                            Register writes a rate change
//!                                            would perform (mock backend)
//! ```
//!
//! Everything runs against the pure model or a recording mock, so this is
//! safe to use anywhere — nothing touches hardware.

use anyhow::{bail, Result};
use ccu_driver::{Ccu, MockBlock, PollConfig, RegisterSpace};
use ccu_model::{regs, solver, ClockDescriptor, ClockOps};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod presets;

#[derive(Parser)]
#[command(name = "ccu", about = "Offline CCU factor-solver diagnostics", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List the built-in node shapes.
    Presets,
    /// Solve for the best factor combination at a target rate.
    Solve {
        /// Preset name (see `ccu presets`).
        preset: String,
        /// Target rate in Hz.
        rate: u64,
        /// Parent rate in Hz.
        #[arg(long, default_value_t = 24_000_000)]
        parent: u64,
    },
    /// Decode a raw register word into the rate it programs.
    Decode {
        /// Preset name.
        preset: String,
        /// Register word, hex.
        word: String,
        /// Parent rate in Hz.
        #[arg(long, default_value_t = 24_000_000)]
        parent: u64,
    },
    /// Print the register writes a rate change would perform.
    Sequence {
        /// Preset name.
        preset: String,
        /// Target rate in Hz.
        rate: u64,
        /// Parent rate in Hz.
        #[arg(long, default_value_t = 24_000_000)]
        parent: u64,
        /// Starting register word, hex.
        #[arg(long, default_value = "0")]
        from: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Cmd::Presets => cmd_presets(),
        Cmd::Solve {
            preset,
            rate,
            parent,
        } => cmd_solve(lookup(&preset)?, rate, parent),
        Cmd::Decode {
            preset,
            word,
            parent,
        } => cmd_decode(lookup(&preset)?, parse_word(&word)?, parent),
        Cmd::Sequence {
            preset,
            rate,
            parent,
            from,
        } => cmd_sequence(lookup(&preset)?, rate, parent, parse_word(&from)?),
    }
}

fn lookup(name: &str) -> Result<&'static ClockDescriptor> {
    match presets::by_name(name) {
        Some(desc) => Ok(desc),
        None => bail!("unknown preset {name:?}; try `ccu presets`"),
    }
}

fn parse_word(word: &str) -> Result<u32> {
    let trimmed = word.trim_start_matches("0x");
    Ok(u32::from_str_radix(trimmed, 16)?)
}

fn cmd_presets() -> Result<()> {
    for desc in presets::PRESETS {
        println!("{:10}  {:?}", desc.name, desc.ops);
    }
    Ok(())
}

fn cmd_solve(desc: &ClockDescriptor, rate: u64, parent: u64) -> Result<()> {
    if let Some(entry) = desc.extra.and_then(|e| e.frac_for_rate(rate)) {
        println!("{rate} Hz: fractional table entry (mask {:#010x} val {:#010x})", entry.mask, entry.val);
        return Ok(());
    }

    let (best, v) = match desc.ops {
        ClockOps::Pll => solver::pll_find_best(desc, rate, parent),
        ClockOps::Periph => solver::periph_find_best(desc, rate, parent),
        _ => bail!("{} has no factors to solve", desc.name),
    };
    if best == 0 {
        bail!("no reachable rate near {rate} Hz from {parent} Hz");
    }

    println!("requested {rate} Hz from parent {parent} Hz");
    println!("achieved  {best} Hz (delta {})", rate.abs_diff(best));
    println!(
        "factors   n={} d1={} k={} m={} p={}",
        v.n, v.d1, v.k, v.m, v.p
    );
    Ok(())
}

fn cmd_decode(desc: &ClockDescriptor, word: u32, parent: u64) -> Result<()> {
    let rate = match desc.ops {
        ClockOps::Pll => regs::pll_rate_from_reg(desc, word, parent),
        ClockOps::Periph => regs::periph_rate_from_reg(desc, word, parent),
        _ => bail!("{} has no register word to decode", desc.name),
    };
    println!("{word:#010x} with parent {parent} Hz -> {rate} Hz");
    Ok(())
}

fn cmd_sequence(desc: &'static ClockDescriptor, rate: u64, parent: u64, from: u32) -> Result<()> {
    let mock = MockBlock::new();
    mock.preload(desc.reg, from);

    let space =
        RegisterSpace::new(Box::new(mock.clone())).with_poll_config(PollConfig::instant());
    let ccu = Ccu::new(space, &[desc], &[])?;
    let node = ccu.node(0).expect("just registered");

    node.set_rate(rate, parent)?;

    println!(
        "{}: {from:#010x} -> {rate} Hz from parent {parent} Hz",
        desc.name
    );
    for (step, w) in mock.writes().iter().enumerate() {
        println!("  {:>2}. reg {:#05x} <- {:#010x}", step + 1, w.reg, w.value);
    }
    println!("  => {:#010x}", mock.value(desc.reg));
    Ok(())
}
