//! Clock node descriptors.
//!
//! A [`ClockDescriptor`] is a static, read-only description of one clock's
//! topology: which factor bit-fields exist and where they sit in the main
//! register, how the node is gated and reset, and which structural quirks
//! (fractional tables, pre-dividers, mode-select) apply.
//!
//! Descriptors are built once per chip as `'static` constants through the
//! `const fn` builder methods and never mutated afterwards; the driver layer
//! clones one per live clock instance at registration time. Validation of
//! feature-flag combinations happens at registration via [`ClockDescriptor::validate`]
//! so an inconsistent table fails loudly instead of silently picking an
//! interpretation at use time.

use bitflags::bitflags;
use thiserror::Error;

/// Which memory-mapped register block a register offset refers to.
///
/// The primary block holds the main clock controller; the secondary block is
/// the low-power-domain controller (PRCM) and may be absent on some boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// Main clock controller block.
    Ccu,
    /// Low-power-domain (PRCM) controller block.
    Prcm,
}

impl AddressSpace {
    /// Index of this block in the register-space table.
    pub const fn index(self) -> usize {
        match self {
            Self::Ccu => 0,
            Self::Prcm => 1,
        }
    }
}

/// A contiguous bit-field inside a 32-bit register.
///
/// Width 0 means the field is absent from the hardware, not that it is fixed
/// at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitField {
    /// Bit position of the least significant bit.
    pub shift: u8,
    /// Field width in bits; 0 = field absent.
    pub width: u8,
}

impl BitField {
    /// A field that does not exist in the hardware.
    pub const ABSENT: Self = Self { shift: 0, width: 0 };

    /// New field at `shift` of `width` bits.
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// Whether the field exists.
    pub const fn is_present(self) -> bool {
        self.width != 0
    }

    /// Mask of the field in register position.
    pub const fn mask(self) -> u32 {
        ((1u32 << self.width) - 1) << self.shift
    }

    /// Largest raw value the field can hold.
    pub const fn max_value(self) -> u32 {
        (1u32 << self.width) - 1
    }

    /// Extract the raw field value from a register word.
    pub const fn extract(self, reg: u32) -> u32 {
        (reg >> self.shift) & ((1u32 << self.width) - 1)
    }

    /// Place a raw value into register position (truncated to the width).
    pub const fn encode(self, value: u32) -> u32 {
        (value & ((1u32 << self.width) - 1)) << self.shift
    }
}

/// A single bit in some register — reset, bus-enable, or lock-status wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegBit {
    /// Register offset within the node's address space.
    pub reg: u16,
    /// Bit index.
    pub bit: u8,
}

impl RegBit {
    /// New register/bit pair.
    pub const fn new(reg: u16, bit: u8) -> Self {
        Self { reg, bit }
    }

    /// Mask with only this bit set.
    pub const fn mask(self) -> u32 {
        1 << self.bit
    }
}

bitflags! {
    /// Structural quirks of a clock node.
    ///
    /// These select branches in the solver and rate engine; disallowed
    /// combinations are rejected by [`ClockDescriptor::validate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u16 {
        /// The mux applies a separately programmable pre-divider to one parent.
        const MUX_VARIABLE_PREDIV = 1 << 0;
        /// The mux applies a fixed per-parent pre-divider.
        const MUX_FIXED_PREDIV = 1 << 1;
        /// A fixed post-divider (from the extension block) applies to the output.
        const FIXED_POSTDIV = 1 << 2;
        /// The N field stores the multiplier directly instead of `n - 1`.
        const ZERO_BASED_N = 1 << 3;
        /// A mode bit doubles the effective divider above a threshold rate.
        const MODE_SELECT = 1 << 4;
        /// Factor writes must follow the monotonic-safe ordering discipline.
        const FLAT_FACTORS = 1 << 5;
        /// The gate must be dropped for the duration of a rate change.
        const SET_RATE_GATE = 1 << 6;
        /// The M field indexes a table of legal divider values.
        const M_TABLE = 1 << 7;
        /// Rate determination recurses into the parent clock.
        const SET_RATE_PARENT = 1 << 8;
    }
}

/// One entry of a fractional / sigma-delta override table.
///
/// Exact target rates unreachable by the integer factor math are configured
/// by writing a fixed register pattern (and optionally a sigma-delta
/// modulation word) instead of computed factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FracEntry {
    /// Output rate this entry produces; 0 marks the wildcard fallback entry.
    pub rate: u64,
    /// Bits of the main register this entry owns.
    pub mask: u32,
    /// Value to place under `mask`.
    pub val: u32,
    /// Optional sigma-delta pattern register written before the main register.
    pub sd: Option<SigmaDelta>,
}

/// Sigma-delta pattern register and the full word written to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigmaDelta {
    /// Pattern register offset.
    pub reg: u16,
    /// Word written to the pattern register.
    pub val: u32,
}

/// Location of a variable pre-divider attached to one mux input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariablePrediv {
    /// Parent index the pre-divider applies to.
    pub parent_index: u8,
    /// Field position in the main register.
    pub shift: u8,
    /// Field width.
    pub width: u8,
}

/// Mode-select threshold: above `rate`, the mode bit is set and the divider
/// field counts double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelect {
    /// Threshold rate in Hz.
    pub rate: u64,
    /// Mode bit index in the main register.
    pub bit: u8,
}

/// Extension block for nodes with structure beyond the plain factor fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extra {
    /// Fractional override table, wildcard entry (`rate == 0`) last.
    pub fracs: &'static [FracEntry],
    /// Fixed pre-divider per parent index (0 = none); index 0 doubles as the
    /// fixed post-divider when [`Features::FIXED_POSTDIV`] is set.
    pub fixed_div: [u16; 4],
    /// Variable pre-divider location, if one mux input has one.
    pub variable_prediv: Option<VariablePrediv>,
    /// Mode-select threshold and bit.
    pub mode_select: Option<ModeSelect>,
    /// Legal divider values indexed by the M field, for [`Features::M_TABLE`].
    pub m_table: &'static [u8],
}

impl Extra {
    /// Empty extension block; start here and chain the `with_*` builders.
    pub const fn new() -> Self {
        Self {
            fracs: &[],
            fixed_div: [0; 4],
            variable_prediv: None,
            mode_select: None,
            m_table: &[],
        }
    }

    /// Attach a fractional override table (wildcard entry last).
    pub const fn with_fracs(mut self, fracs: &'static [FracEntry]) -> Self {
        self.fracs = fracs;
        self
    }

    /// Set the fixed per-parent pre-dividers.
    pub const fn with_fixed_div(mut self, fixed_div: [u16; 4]) -> Self {
        self.fixed_div = fixed_div;
        self
    }

    /// Set the fixed post-divider (stored in slot 0 of the divider table).
    pub const fn with_post_div(mut self, div: u16) -> Self {
        self.fixed_div[0] = div;
        self
    }

    /// Attach a variable pre-divider on one mux input.
    pub const fn with_variable_prediv(mut self, parent_index: u8, shift: u8, width: u8) -> Self {
        self.variable_prediv = Some(VariablePrediv {
            parent_index,
            shift,
            width,
        });
        self
    }

    /// Set the mode-select threshold and bit.
    pub const fn with_mode_select(mut self, rate: u64, bit: u8) -> Self {
        self.mode_select = Some(ModeSelect { rate, bit });
        self
    }

    /// Attach a legal-divider table for the M field.
    pub const fn with_m_table(mut self, m_table: &'static [u8]) -> Self {
        self.m_table = m_table;
        self
    }

    /// Real fractional entries, excluding the trailing wildcard.
    pub fn frac_entries(&self) -> &[FracEntry] {
        match self.fracs.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// The wildcard fallback entry, if a fractional table is present.
    pub fn frac_fallback(&self) -> Option<&FracEntry> {
        self.fracs.last()
    }

    /// Fractional entry whose rate matches `rate` exactly.
    pub fn frac_for_rate(&self, rate: u64) -> Option<&FracEntry> {
        self.frac_entries().iter().find(|e| e.rate == rate)
    }
}

impl Default for Extra {
    fn default() -> Self {
        Self::new()
    }
}

/// One input slot of a clock multiplexer.
///
/// Some chips document mux encodings whose source is unknown or unwired; an
/// [`ParentSlot::Unavailable`] slot keeps the selector encoding honest
/// without guessing a clock source — it is never selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentSlot {
    /// Input wired to the named clock.
    Named(&'static str),
    /// Input present in the encoding but never selectable.
    Unavailable,
}

impl ParentSlot {
    /// Parent clock name, if the slot is wired.
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Unavailable => None,
        }
    }
}

/// Behavior family of a clock node, dispatched exhaustively by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOps {
    /// Multiplying generator with a lock-detect settle period.
    Pll,
    /// Peripheral divider (M and/or P), possibly muxed between parents.
    Periph,
    /// Constant multiply/divide of the parent; ratio stored in the
    /// N/M width slots, no register fields.
    FixedFactor,
    /// Delay-line sampling/output phase clock; the P field holds the delay.
    Phase,
}

/// Static description of one clock node.
///
/// See the module docs for the construction pattern. All rate math in
/// [`crate::solver`] and [`crate::regs`] is driven from this description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDescriptor {
    /// Clock name, unique within a chip.
    pub name: &'static str,
    /// Mux inputs in selector order; a single entry for un-muxed clocks.
    pub parents: &'static [ParentSlot],
    /// Behavior family.
    pub ops: ClockOps,
    /// Main register offset.
    pub reg: u16,
    /// Address space the node's registers live in.
    pub space: AddressSpace,
    /// Reset line wiring, asserted low.
    pub reset: Option<RegBit>,
    /// Bus-gate enable wiring.
    pub bus: Option<RegBit>,
    /// Lock-status bit, for PLL-style nodes with lock detect.
    pub lock: Option<RegBit>,
    /// Gate bit index in the main register.
    pub gate_bit: Option<u8>,
    /// Mux selector field.
    pub mux: BitField,
    /// Multiplier N field.
    pub n: BitField,
    /// Minimum accepted N value (VCO floor).
    pub n_min: u8,
    /// Boolean halver D1 field.
    pub d1: BitField,
    /// Secondary multiplier K field.
    pub k: BitField,
    /// Divider M field.
    pub m: BitField,
    /// Power-of-two divider P field (a shift count).
    pub p: BitField,
    /// Update-strobe bit ORed into every factor commit.
    pub upd_bit: Option<u8>,
    /// Structural quirks.
    pub features: Features,
    /// Extension block, when the node needs one.
    pub extra: Option<&'static Extra>,
}

impl ClockDescriptor {
    /// New descriptor with every optional field absent.
    pub const fn new(
        name: &'static str,
        parents: &'static [ParentSlot],
        ops: ClockOps,
    ) -> Self {
        Self {
            name,
            parents,
            ops,
            reg: 0,
            space: AddressSpace::Ccu,
            reset: None,
            bus: None,
            lock: None,
            gate_bit: None,
            mux: BitField::ABSENT,
            n: BitField::ABSENT,
            n_min: 0,
            d1: BitField::ABSENT,
            k: BitField::ABSENT,
            m: BitField::ABSENT,
            p: BitField::ABSENT,
            upd_bit: None,
            features: Features::empty(),
            extra: None,
        }
    }

    /// Main register offset in the primary block.
    pub const fn reg(mut self, reg: u16) -> Self {
        self.reg = reg;
        self
    }

    /// Main register offset in the low-power-domain block.
    pub const fn prcm_reg(mut self, reg: u16) -> Self {
        self.reg = reg;
        self.space = AddressSpace::Prcm;
        self
    }

    /// Reset line wiring.
    pub const fn reset(mut self, reg: u16, bit: u8) -> Self {
        self.reset = Some(RegBit::new(reg, bit));
        self
    }

    /// Bus-gate wiring.
    pub const fn bus(mut self, reg: u16, bit: u8) -> Self {
        self.bus = Some(RegBit::new(reg, bit));
        self
    }

    /// Lock-status wiring.
    pub const fn lock(mut self, reg: u16, bit: u8) -> Self {
        self.lock = Some(RegBit::new(reg, bit));
        self
    }

    /// Gate bit in the main register.
    pub const fn gate(mut self, bit: u8) -> Self {
        self.gate_bit = Some(bit);
        self
    }

    /// Mux selector field.
    pub const fn mux(mut self, shift: u8, width: u8) -> Self {
        self.mux = BitField::new(shift, width);
        self
    }

    /// Multiplier N field.
    pub const fn n(mut self, shift: u8, width: u8) -> Self {
        self.n = BitField::new(shift, width);
        self
    }

    /// Minimum accepted N value.
    pub const fn n_min(mut self, min: u8) -> Self {
        self.n_min = min;
        self
    }

    /// Boolean halver D1 field.
    pub const fn d1(mut self, shift: u8, width: u8) -> Self {
        self.d1 = BitField::new(shift, width);
        self
    }

    /// Secondary multiplier K field.
    pub const fn k(mut self, shift: u8, width: u8) -> Self {
        self.k = BitField::new(shift, width);
        self
    }

    /// Divider M field.
    pub const fn m(mut self, shift: u8, width: u8) -> Self {
        self.m = BitField::new(shift, width);
        self
    }

    /// Power-of-two divider P field (also the delay field of phase nodes).
    pub const fn p(mut self, shift: u8, width: u8) -> Self {
        self.p = BitField::new(shift, width);
        self
    }

    /// Update-strobe bit.
    pub const fn update(mut self, bit: u8) -> Self {
        self.upd_bit = Some(bit);
        self
    }

    /// Fixed-factor ratio: output = parent / `div` * `mul`.
    ///
    /// Reuses the N/M width slots as the multiplier and divider, matching
    /// how fixed-factor nodes carry no register fields at all.
    pub const fn ratio(mut self, mul: u8, div: u8) -> Self {
        self.n = BitField::new(0, mul);
        self.m = BitField::new(0, div);
        self
    }

    /// Structural feature flags.
    pub const fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Attach an extension block.
    pub const fn extra(mut self, extra: &'static Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Largest multiplier value N can express.
    pub fn n_max(&self) -> u32 {
        let max = 1u32 << self.n.width;
        if self.features.contains(Features::ZERO_BASED_N) {
            max - 1
        } else {
            max
        }
    }

    /// Largest halver value D1 can express (1 when absent).
    pub fn d1_max(&self) -> u32 {
        1 << self.d1.width
    }

    /// Largest multiplier value K can express (1 when absent).
    pub fn k_max(&self) -> u32 {
        1 << self.k.width
    }

    /// Largest divider value M can express (1 when absent).
    pub fn m_max(&self) -> u32 {
        1 << self.m.width
    }

    /// Largest shift count P can express (0 when absent).
    pub fn p_max(&self) -> u32 {
        (1 << self.p.width) - 1
    }

    /// Check the descriptor for inconsistent feature combinations.
    ///
    /// Runs once at registration time; the constants themselves stay cheap
    /// to build.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] naming the first problem found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let name = self.name;
        let extra = self.extra;

        if self.features.contains(Features::M_TABLE) {
            let table = extra.map_or::<&[u8], _>(&[], |e| e.m_table);
            if table.is_empty() {
                return Err(DescriptorError::MissingExtension {
                    name,
                    what: "M table",
                });
            }
            if !self.m.is_present() {
                return Err(DescriptorError::MissingField { name, field: "m" });
            }
        } else if extra.is_some_and(|e| !e.m_table.is_empty()) {
            // A table without the flag would silently fall back to the dense
            // range interpretation.
            return Err(DescriptorError::UnusedExtension {
                name,
                what: "M table",
            });
        }

        if self.features.contains(Features::MODE_SELECT)
            && !extra.is_some_and(|e| e.mode_select.is_some())
        {
            return Err(DescriptorError::MissingExtension {
                name,
                what: "mode select",
            });
        }

        if self.features.contains(Features::MUX_VARIABLE_PREDIV)
            && !extra.is_some_and(|e| e.variable_prediv.is_some())
        {
            return Err(DescriptorError::MissingExtension {
                name,
                what: "variable pre-divider",
            });
        }

        if self.features.contains(Features::MUX_FIXED_PREDIV)
            && !extra.is_some_and(|e| e.fixed_div.iter().any(|&d| d != 0))
        {
            return Err(DescriptorError::MissingExtension {
                name,
                what: "fixed pre-divider table",
            });
        }

        if self.features.contains(Features::FIXED_POSTDIV)
            && !extra.is_some_and(|e| e.fixed_div[0] != 0)
        {
            return Err(DescriptorError::MissingExtension {
                name,
                what: "fixed post-divider",
            });
        }

        if self.features.contains(Features::SET_RATE_GATE) && self.gate_bit.is_none() {
            return Err(DescriptorError::MissingField { name, field: "gate" });
        }

        if let Some(extra) = extra {
            if let Some((last, rest)) = extra.fracs.split_last() {
                if last.rate != 0 {
                    return Err(DescriptorError::BadFracTable {
                        name,
                        reason: "missing trailing wildcard entry",
                    });
                }
                if rest.iter().any(|e| e.rate == 0) {
                    return Err(DescriptorError::BadFracTable {
                        name,
                        reason: "wildcard entry not last",
                    });
                }
            }
        }

        if self.n_min != 0 && !self.n.is_present() {
            return Err(DescriptorError::MissingField { name, field: "n" });
        }

        // Fixed-factor nodes overload the width slots as a ratio; every other
        // node's fields share the main register and must not collide.
        if self.ops != ClockOps::FixedFactor {
            let mut seen: u32 = 0;
            let mut fields = [
                self.mux.mask(),
                self.n.mask(),
                self.d1.mask(),
                self.k.mask(),
                self.m.mask(),
                self.p.mask(),
            ]
            .to_vec();
            if let Some(bit) = self.gate_bit {
                fields.push(1 << bit);
            }
            if let Some(bit) = self.upd_bit {
                fields.push(1 << bit);
            }
            if let Some(ms) = extra.and_then(|e| e.mode_select) {
                fields.push(1 << ms.bit);
            }
            for mask in fields {
                if seen & mask != 0 {
                    return Err(DescriptorError::OverlappingFields { name });
                }
                seen |= mask;
            }
        }

        Ok(())
    }
}

/// Problems detected by [`ClockDescriptor::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// A feature flag refers to an extension entry that is not there.
    #[error("clock {name}: feature requires {what} in the extension block")]
    MissingExtension {
        /// Clock name.
        name: &'static str,
        /// Missing extension entry.
        what: &'static str,
    },

    /// An extension entry is present but no feature flag selects it.
    #[error("clock {name}: {what} present but not enabled by a feature flag")]
    UnusedExtension {
        /// Clock name.
        name: &'static str,
        /// Orphaned extension entry.
        what: &'static str,
    },

    /// A feature or floor refers to a bit-field the node does not have.
    #[error("clock {name}: required field {field} is absent")]
    MissingField {
        /// Clock name.
        name: &'static str,
        /// Field that should be present.
        field: &'static str,
    },

    /// The fractional table is malformed.
    #[error("clock {name}: bad fractional table: {reason}")]
    BadFracTable {
        /// Clock name.
        name: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Two bit-fields of the main register overlap.
    #[error("clock {name}: overlapping bit-fields in main register")]
    OverlappingFields {
        /// Clock name.
        name: &'static str,
    },
}
