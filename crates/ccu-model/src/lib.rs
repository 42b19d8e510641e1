//! Silicon model for Allwinner clock-control units (CCUs).
//!
//! This crate has **no hardware access** — it is a pure model of the clock
//! hardware: node descriptors (which divider/multiplier bit-fields a clock
//! carries and where), the factor-solving algorithms that turn a requested
//! frequency into register field values, and the encode/decode math between
//! raw register words and rates.
//!
//! Everything here is deterministic and runs the same on a build machine as
//! on the target, which is what makes the driver layer testable against a
//! recorded register backend.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`descriptor`] | Clock node descriptors — bit-fields, feature flags, extension blocks |
//! | [`solver`] | Factor search: best N/D1/K/M/P combination for a target rate |
//! | [`rational`] | Bounded continued-fraction rational approximation |
//! | [`regs`] | Register word encode/decode for factor fields |
//!
//! # Factor naming
//!
//! The factor letters follow the Allwinner datasheets:
//!
//! ```text
//! n      multiplier (PLL feedback divider)
//! d1     boolean divider by 2 ahead of the VCO
//! k      secondary multiplier
//! m      divider
//! p      power-of-two (pre-)divider, stored as a shift count
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod descriptor;
pub mod rational;
pub mod regs;
pub mod solver;

pub use descriptor::{
    AddressSpace, BitField, ClockDescriptor, ClockOps, DescriptorError, Extra, Features,
    FracEntry, ModeSelect, ParentSlot, RegBit, SigmaDelta, VariablePrediv,
};
pub use solver::FactorSet;
