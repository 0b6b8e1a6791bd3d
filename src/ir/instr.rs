// This module defines the instruction model of the backend IR: the Opcode enum
// covering both real hardware operations and the pseudo operations that pseudo-
// lowering expands, the InstrData enum holding opcode-family-specific payloads
// (logic truth table, condition code, branch target, structured-flow nesting depth,
// phi marker), and the Instr struct itself with its ordered destination and source
// lists plus a back-reference to the containing block. Instructions are owned by the
// Function's slab and referenced by InstrId; nothing here maintains a global use
// list, so passes that need use information recompute it by scanning.

use super::value::{Src, Value};
use super::BlockId;

/// Opcodes of the backend IR.
///
/// Opcodes prefixed with `P` are pseudo operations with no 1:1 hardware
/// equivalent; [`LowerPseudo`] expands every one of them, so the binary
/// encoder only ever sees the rest.
///
/// [`LowerPseudo`]: crate::passes::LowerPseudo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Real hardware operations.
    /// Two-source logic op; truth table in [`InstrData::Logic`].
    BitOp,
    Add,
    Mul,
    /// Compare, condition code in [`InstrData::Cond`].
    Cmp,
    /// Compare-and-select: `dst = srcs[0] <code> srcs[1] ? srcs[2] : srcs[3]`.
    CmpSel,
    /// Hardware structured-loop primitive.
    While,
    /// Exec-mask pop.
    PopExec,
    /// Rotate a full register by half its width.
    RotHalf,
    Xor,
    LoadImm,
    /// Cross-lane read: `srcs[0]` is data, `srcs[1]` the lane index.
    Shuffle,
    Branch,
    Phi,

    // Pseudo operations.
    PMov,
    PNot,
    /// Unfused compare producing a boolean value.
    PCmp,
    /// Cross-lane ballot producing an active-lane mask.
    PBallot,
    PLoopBegin,
    PBreak,
    PBreakCond,
    /// Register swap with no temporary.
    PSwap,
    /// Pass-through marker already resolved upstream; deleted outright.
    PMarker,
}

impl Opcode {
    pub fn is_pseudo(self) -> bool {
        matches!(
            self,
            Opcode::PMov
                | Opcode::PNot
                | Opcode::PCmp
                | Opcode::PBallot
                | Opcode::PLoopBegin
                | Opcode::PBreak
                | Opcode::PBreakCond
                | Opcode::PSwap
                | Opcode::PMarker
        )
    }

    pub fn is_phi(self) -> bool {
        self == Opcode::Phi
    }
}

/// Condition codes for compare-family opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondCode {
    Eq,
    Ne,
    Lt,
    Ge,
}

impl CondCode {
    pub fn inverse(self) -> CondCode {
        match self {
            CondCode::Eq => CondCode::Ne,
            CondCode::Ne => CondCode::Eq,
            CondCode::Lt => CondCode::Ge,
            CondCode::Ge => CondCode::Lt,
        }
    }
}

/// Opcode-family-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrData {
    Plain,
    /// Truth-table control code for [`Opcode::BitOp`].
    Logic { table: u8 },
    /// Condition code for compare-family opcodes.
    Cond { code: CondCode },
    /// Taken-edge target for [`Opcode::Branch`].
    Branch { target: BlockId },
    /// Phi marker; sources align 1:1 with the block's predecessor order.
    Phi,
    /// Nesting depth for structured-control-flow markers.
    Nest { depth: u32 },
}

/// Truth table selecting the first source: `dst = srcs[0]`.
pub const TABLE_MOV: u8 = 0b1010;
/// Truth table complementing the first source: `dst = !srcs[0]`.
pub const TABLE_NOT: u8 = 0b0101;

/// Canonical boolean encodings produced by lowered compares.
pub const BOOL_TRUE: u32 = 0xffff_ffff;
pub const BOOL_FALSE: u32 = 0;

/// A single IR instruction.
///
/// Owned by the [`Function`] slab; `block` is a non-owning back-reference to
/// the containing block.
///
/// [`Function`]: crate::ir::Function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub dests: Vec<Value>,
    pub srcs: Vec<Src>,
    pub data: InstrData,
    pub block: BlockId,
}

impl Instr {
    /// Build an instruction not yet linked into a block.
    ///
    /// [`Function::push`] and [`Function::insert_at`] fill in the block
    /// back-reference when linking.
    ///
    /// [`Function::push`]: crate::ir::Function::push
    /// [`Function::insert_at`]: crate::ir::Function::insert_at
    pub fn new(op: Opcode, dests: Vec<Value>, srcs: Vec<Src>) -> Instr {
        Instr { op, dests, srcs, data: InstrData::Plain, block: BlockId(u32::MAX) }
    }

    pub fn with_data(mut self, data: InstrData) -> Instr {
        self.data = data;
        self
    }

    /// Replace the source at `slot` in place, preserving all other operands.
    pub fn replace_src(&mut self, slot: usize, src: Src) {
        self.srcs[slot] = src;
    }

    /// Branch target, if this is a branch.
    pub fn branch_target(&self) -> Option<BlockId> {
        match self.data {
            InstrData::Branch { target } if self.op == Opcode::Branch => Some(target),
            _ => None,
        }
    }

    /// Nesting depth of a structured-flow marker.
    pub fn nest_depth(&self) -> Option<u32> {
        match self.data {
            InstrData::Nest { depth } => Some(depth),
            _ => None,
        }
    }
}
