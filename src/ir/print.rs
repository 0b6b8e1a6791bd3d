//! Textual IR dumps for logging and test diagnostics.
//!
//! The format is stable enough to read in logs but is not a parseable
//! interchange format: `%3:w` is SSA temporary 3 of word size, `r6:h` a
//! half-register, `u[2]:w` a uniform-bank read, `#42` an immediate.
//! Source modifiers print as `-` (negate), `|..|` (absolute value) and a
//! trailing `!` for a kill-flagged last use.

use std::fmt;

use super::function::Function;
use super::instr::{Instr, InstrData, Opcode};
use super::value::{SizeClass, Src, Value};

fn size_suffix(size: SizeClass) -> &'static str {
    match size {
        SizeClass::Half => "h",
        SizeClass::Word => "w",
        SizeClass::Double => "d",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Ssa { id, size } => write!(f, "{}:{}", id, size_suffix(size)),
            Value::Reg { reg, size } => write!(f, "r{}:{}", reg.0, size_suffix(size)),
            Value::Uniform { index, size } => write!(f, "u[{}]:{}", index, size_suffix(size)),
            Value::Imm(bits) => write!(f, "#{}", bits),
        }
    }
}

impl fmt::Display for Src {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.neg {
            write!(f, "-")?;
        }
        if self.abs {
            write!(f, "|{}|", self.value)?;
        } else {
            write!(f, "{}", self.value)?;
        }
        if self.kill {
            write!(f, "!")?;
        }
        Ok(())
    }
}

fn opcode_name(op: Opcode) -> &'static str {
    match op {
        Opcode::BitOp => "bitop",
        Opcode::Add => "add",
        Opcode::Mul => "mul",
        Opcode::Cmp => "cmp",
        Opcode::CmpSel => "cmpsel",
        Opcode::While => "while",
        Opcode::PopExec => "popexec",
        Opcode::RotHalf => "rothalf",
        Opcode::Xor => "xor",
        Opcode::LoadImm => "loadimm",
        Opcode::Shuffle => "shuffle",
        Opcode::Branch => "branch",
        Opcode::Phi => "phi",
        Opcode::PMov => "p.mov",
        Opcode::PNot => "p.not",
        Opcode::PCmp => "p.cmp",
        Opcode::PBallot => "p.ballot",
        Opcode::PLoopBegin => "p.loop_begin",
        Opcode::PBreak => "p.break",
        Opcode::PBreakCond => "p.break_cond",
        Opcode::PSwap => "p.swap",
        Opcode::PMarker => "p.marker",
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dest) in self.dests.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dest)?;
        }
        if !self.dests.is_empty() {
            write!(f, " = ")?;
        }
        write!(f, "{}", opcode_name(self.op))?;
        match self.data {
            InstrData::Logic { table } => write!(f, ".{:04b}", table)?,
            InstrData::Cond { code } => write!(f, ".{:?}", code)?,
            InstrData::Branch { target } => write!(f, " {}", target)?,
            InstrData::Nest { depth } => write!(f, ".d{}", depth)?,
            InstrData::Plain | InstrData::Phi => {}
        }
        for (i, src) in self.srcs.iter().enumerate() {
            write!(f, "{} {}", if i == 0 { "" } else { "," }, src)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func (alloc={}) {{", self.alloc())?;
        for block in self.blocks() {
            let b = self.block(block);
            write!(f, "{}:", block)?;
            if !b.preds.is_empty() {
                write!(f, "  ; preds:")?;
                for p in &b.preds {
                    write!(f, " {}", p)?;
                }
            }
            if !b.succs.is_empty() {
                write!(f, "  ; succs:")?;
                for s in &b.succs {
                    write!(f, " {}", s)?;
                }
            }
            writeln!(f)?;
            for &id in &b.instrs {
                writeln!(f, "  {}", self.instr(id))?;
            }
        }
        writeln!(f, "}}")
    }
}
