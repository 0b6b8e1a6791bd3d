// This module defines the operand model of the backend IR. A Value is one of four
// kinds: an SSA temporary identified by a dense integer id handed out by the owning
// Function, a physical hardware register at half-register granularity, a read of the
// restricted uniform operand bank, or an inline immediate. Every Value carries a size
// class (16/32/64 bit). Per-use state lives on Src, the source-operand record: the
// absolute-value and negate modifiers plus the kill flag written by liveness analysis
// to mark the last read of a value on the current path. Values are plain Copy data;
// identity and ownership live entirely in the Function that allocated the id.

use std::fmt;

/// Dense id of an SSA temporary, allocated by [`Function::new_temp`].
///
/// Ids are dense in `[0, alloc)` immediately after reindexing and may be
/// sparse between reindexing runs.
///
/// [`Function::new_temp`]: crate::ir::Function::new_temp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Operand width.
///
/// `Half` and `Word` address half-register granularity; a `Word` value
/// occupies a full register, a `Double` value a register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeClass {
    /// 16-bit, one half-register.
    Half,
    /// 32-bit, one full register.
    Word,
    /// 64-bit, a register pair.
    Double,
}

/// Physical register at half-register granularity.
///
/// Full register `N` covers half-registers `2N` and `2N + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwReg(pub u8);

impl HwReg {
    /// Index of the full register containing this half.
    #[inline]
    pub fn full(self) -> u8 {
        self.0 >> 1
    }

    /// The other half of the same full register.
    #[inline]
    pub fn other_half(self) -> HwReg {
        HwReg(self.0 ^ 1)
    }
}

/// Fixed hardware nesting counter for structured control flow (full register 30).
pub const NEST_REG: HwReg = HwReg(60);

/// Reserved shuffle scratch register (full register 31), held at zero
/// everywhere except momentarily during a shuffle.
pub const SCRATCH_REG: HwReg = HwReg(62);

/// An operand: SSA temporary, physical register, uniform-bank read or immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Ssa { id: ValueId, size: SizeClass },
    Reg { reg: HwReg, size: SizeClass },
    Uniform { index: u16, size: SizeClass },
    Imm(u32),
}

impl Value {
    pub fn ssa(id: ValueId, size: SizeClass) -> Value {
        Value::Ssa { id, size }
    }

    pub fn reg(reg: HwReg, size: SizeClass) -> Value {
        Value::Reg { reg, size }
    }

    pub fn uniform(index: u16, size: SizeClass) -> Value {
        Value::Uniform { index, size }
    }

    pub fn imm(bits: u32) -> Value {
        Value::Imm(bits)
    }

    /// The hardware nesting-counter register as a word operand.
    pub fn nest_counter() -> Value {
        Value::reg(NEST_REG, SizeClass::Word)
    }

    /// The reserved shuffle scratch register as a word operand.
    pub fn scratch() -> Value {
        Value::reg(SCRATCH_REG, SizeClass::Word)
    }

    /// Size class of the operand. Immediates read as one word.
    pub fn size(&self) -> SizeClass {
        match *self {
            Value::Ssa { size, .. } | Value::Reg { size, .. } | Value::Uniform { size, .. } => size,
            Value::Imm(_) => SizeClass::Word,
        }
    }

    /// The SSA id, if this is an SSA temporary.
    pub fn ssa_id(&self) -> Option<ValueId> {
        match *self {
            Value::Ssa { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Value::Imm(_))
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Value::Uniform { .. })
    }

    /// Whether this operand reads or writes the given full hardware register.
    pub fn touches_reg(&self, full: u8) -> bool {
        match *self {
            Value::Reg { reg, size } => {
                reg.full() == full || (size == SizeClass::Double && reg.full() + 1 == full)
            }
            _ => false,
        }
    }
}

/// A source operand: a [`Value`] plus per-use modifier flags.
///
/// `kill` is written by liveness analysis and means "last read of this value
/// on the current path"; register storage may be reused after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Src {
    pub value: Value,
    /// Absolute-value modifier.
    pub abs: bool,
    /// Negate modifier.
    pub neg: bool,
    /// Last-use flag, maintained by liveness analysis.
    pub kill: bool,
}

impl Src {
    pub fn new(value: Value) -> Src {
        Src { value, abs: false, neg: false, kill: false }
    }

    pub fn negated(value: Value) -> Src {
        Src { value, abs: false, neg: true, kill: false }
    }

    /// Copy of this source with abs/neg/kill stripped.
    pub fn plain(&self) -> Src {
        Src::new(self.value)
    }

    pub fn has_modifiers(&self) -> bool {
        self.abs || self.neg
    }
}
