//! Register block backends.
//!
//! `mmio` maps the physical register window for real hardware; `mock` is an
//! in-memory block that records every write, for tests and CI machines
//! without the target silicon.

pub mod mmio;
pub mod mock;
