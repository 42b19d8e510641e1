//! Error types for clock-control operations.

use ccu_model::{AddressSpace, DescriptorError};
use thiserror::Error;

/// Result type alias for clock-control operations.
pub type Result<T> = std::result::Result<T, CcuError>;

/// Errors that can occur while driving a clock-control unit.
///
/// A PLL lock timeout is deliberately *not* here: lock detection is
/// best-effort at early boot, so it is logged and execution continues.
#[derive(Debug, Error)]
pub enum CcuError {
    /// A descriptor failed validation at registration time.
    #[error("invalid descriptor: {source}")]
    InvalidDescriptor {
        /// What the validator rejected.
        #[from]
        source: DescriptorError,
    },

    /// An operation needs a parent clock that is missing or marked
    /// unavailable in the descriptor.
    #[error("clock {clock}: parent {index} is missing or unavailable")]
    MissingParent {
        /// Clock name.
        clock: &'static str,
        /// Parent index that was asked for.
        index: usize,
    },

    /// A parent rate required for the operation is zero.
    #[error("clock {clock}: parent rate is unusable")]
    InvalidParentRate {
        /// Clock name.
        clock: &'static str,
    },

    /// The solver's scan space held nothing within reach of the target.
    #[error("clock {clock}: no reachable rate near {rate} Hz")]
    NoSolution {
        /// Clock name.
        clock: &'static str,
        /// Requested rate.
        rate: u64,
    },

    /// Phase read/write attempted while the node is in double-rate mode.
    ///
    /// A capability gap, not a fault — the delay field has no phase meaning
    /// in that mode.
    #[error("clock {clock}: phase control unavailable in double-rate mode")]
    PhaseUnavailable {
        /// Clock name.
        clock: &'static str,
    },

    /// The operation does not exist for this node family.
    #[error("clock {clock}: node has no {what}")]
    NotSupported {
        /// Clock name.
        clock: &'static str,
        /// What the node is missing.
        what: &'static str,
    },

    /// A register offset refers to an address space with no mapped block.
    #[error("no register block mapped for address space {space:?}")]
    MissingAddressSpace {
        /// The unmapped space.
        space: AddressSpace,
    },

    /// Reset line identifier out of range for the chip's reset map.
    #[error("reset line {id} out of range (have {count})")]
    InvalidResetLine {
        /// Requested line.
        id: usize,
        /// Number of mapped lines.
        count: usize,
    },

    /// Mapping the register window failed.
    #[error("register mapping failed: {reason}")]
    MapFailed {
        /// Reason for failure.
        reason: String,
    },

    /// I/O error talking to the memory device.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl CcuError {
    /// Create a map-failed error.
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }
}
