//! Pure Rust rate engine for Allwinner clock-control units (CCUs).
//!
//! The silicon model — descriptors and factor math — lives in `ccu-model`;
//! this crate owns everything that touches registers: the shared register
//! spaces, the per-node rate engine with its write-sequencing rules, the
//! ganged reset-line controller, and PLL lock polling.
//!
//! # Backend hierarchy
//!
//! ```text
//! Hardware:
//!   MmioBlock — mmap of the physical register window (/dev/mem)
//!
//! Development / CI:
//!   MockBlock — in-memory registers, records every write in order
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use ccu_driver::{Ccu, MmioBlock, RegisterSpace};
//! # use ccu_model::ClockDescriptor;
//! # static CLOCKS: &[&ClockDescriptor] = &[];
//! # static RESETS: &[ccu_driver::ResetMapEntry] = &[];
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let primary = MmioBlock::map("/dev/mem", 0x01c2_0000, 0x400)?;
//! let space = RegisterSpace::new(Box::new(primary));
//! let ccu = Ccu::new(space, CLOCKS, RESETS)?;
//!
//! let pll = ccu.node_by_name("pll-cpux").expect("descriptor table");
//! pll.set_rate(1_200_000_000, 24_000_000)?;
//! pll.enable()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! One mutex per [`RegisterSpace`] serializes every read-modify-write across
//! both register blocks; plain reads take no lock. Multi-step sequences
//! (flat-factor ordering, gate drop around a rate change) are *not* atomic
//! as a whole — per-node call serialization is the caller's contract.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

mod backend;
pub mod backends;
mod ccu;
mod error;
mod node;
mod periph;
mod phase;
mod pll;
mod reset;
mod space;

pub use backend::RegisterBlock;
pub use backends::mmio::MmioBlock;
pub use backends::mock::{MockBlock, WriteRecord};
pub use ccu::Ccu;
pub use error::{CcuError, Result};
pub use node::{ClockNode, FixedRate, ParentClock, RateRequest};
pub use reset::{ResetController, ResetMapEntry};
pub use space::{PollConfig, RegisterSpace};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Ccu, CcuError, ClockNode, FixedRate, MockBlock, ParentClock, RateRequest, RegisterSpace,
        ResetMapEntry, Result,
    };
}
