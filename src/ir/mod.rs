// This module is the hub for the backend IR data model: operand and instruction
// representation (value.rs, instr.rs), the Function that owns all blocks and
// instructions (function.rs), a textual printer used by log output and test
// diagnostics (print.rs), and an internal-consistency verifier that checks the
// well-formedness the passes assume (verify.rs). Block and instruction handles are
// plain u32 newtypes indexing into Function-owned slabs.

//! Backend IR data model.
//!
//! The IR is a structured control-flow graph of basic blocks over SSA
//! temporaries, physical registers, uniform-bank reads and immediates.
//! A [`Function`] owns everything for one compilation job.

pub mod function;
pub mod instr;
pub mod print;
pub mod value;
pub mod verify;

use std::fmt;

/// Handle of a [`Block`] within its owning [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Handle of an [`Instr`] within its owning [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrId(pub u32);

impl InstrId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub use function::{Block, Function};
pub use instr::{CondCode, Instr, InstrData, Opcode, BOOL_FALSE, BOOL_TRUE, TABLE_MOV, TABLE_NOT};
pub use value::{HwReg, SizeClass, Src, Value, ValueId, NEST_REG, SCRATCH_REG};
pub use verify::verify;
