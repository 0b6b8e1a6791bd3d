// This module implements uniform-source legalization. Each opcode accepts a read
// from the restricted uniform operand bank only under its own rule: a specific
// source position, a restricted index range, and a restricted bit width; opcodes
// with no declared rule reject all uniform sources. The rule table is a compile-time
// constant and the only state shared across concurrent compilation jobs, which is
// safe because it is read-only. Every violating source is materialized into a fresh
// SSA temporary through an explicit move inserted immediately before the
// instruction, and the source rewritten to that temporary. Absolute-value and
// negate modifiers must already have been folded off uniform sources by earlier
// passes; finding one on a source that needs materialization is a fatal error, and
// the copy itself is emitted bare. The canonical uniform-to-register move (a
// truth-table BitOp reading the uniform in its first slot) accepts the whole bank
// at any width, so materialization always terminates.

//! Per-opcode legalization of uniform-bank sources.

use crate::error::{IrError, IrResult};
use crate::ir::{
    BlockId, Function, Instr, InstrData, Opcode, SizeClass, Src, Value, TABLE_MOV,
};

/// Acceptance rule for uniform sources of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct UniformRule {
    /// The one source position allowed to read the uniform bank.
    pub slot: u8,
    /// Highest addressable uniform index, inclusive.
    pub max_index: u16,
    /// Widest acceptable uniform operand.
    pub max_size: SizeClass,
}

/// Per-opcode acceptance table. Compile-time constant, shared read-only
/// across jobs. Opcodes without an entry reject all uniform sources.
pub fn uniform_rule(op: Opcode) -> Option<UniformRule> {
    match op {
        // The canonical materializing move: full bank, any width, first slot.
        Opcode::BitOp => {
            Some(UniformRule { slot: 0, max_index: u16::MAX, max_size: SizeClass::Double })
        }
        // Arithmetic reads the bank in its second slot, 32-bit at most.
        Opcode::Add => Some(UniformRule { slot: 1, max_index: 63, max_size: SizeClass::Word }),
        Opcode::Mul => Some(UniformRule { slot: 1, max_index: 31, max_size: SizeClass::Word }),
        Opcode::Xor => Some(UniformRule { slot: 1, max_index: 63, max_size: SizeClass::Word }),
        Opcode::Cmp | Opcode::CmpSel => {
            Some(UniformRule { slot: 1, max_index: 63, max_size: SizeClass::Word })
        }
        _ => None,
    }
}

fn accepts(op: Opcode, slot: usize, index: u16, size: SizeClass) -> bool {
    match uniform_rule(op) {
        Some(rule) => {
            slot == rule.slot as usize && index <= rule.max_index && size <= rule.max_size
        }
        None => false,
    }
}

/// Rewrite every uniform source violating its opcode's rule through a fresh
/// temporary.
pub fn legalize_uniform(func: &mut Function) -> IrResult<bool> {
    let mut changed = false;
    let blocks: Vec<BlockId> = func.blocks().collect();
    for block in blocks {
        let mut pos = 0;
        while pos < func.block(block).instrs.len() {
            let id = func.block(block).instrs[pos];
            let instr = func.instr(id);
            // Phis are merge markers, not hardware ops; their sources are
            // resolved on the incoming edges by the register allocator.
            if instr.op.is_phi() {
                pos += 1;
                continue;
            }
            let op = instr.op;
            let nsrcs = instr.srcs.len();
            let mut inserted = 0;
            for slot in 0..nsrcs {
                let src = func.instr(id).srcs[slot];
                let Value::Uniform { index, size } = src.value else { continue };
                if accepts(op, slot, index, size) {
                    continue;
                }
                if src.abs {
                    return Err(IrError::UnfoldedModifier { modifier: "abs" });
                }
                if src.neg {
                    return Err(IrError::UnfoldedModifier { modifier: "neg" });
                }
                let temp = func.new_temp(size);
                func.insert_at(
                    block,
                    pos + inserted,
                    Instr::new(
                        Opcode::BitOp,
                        vec![temp],
                        vec![src.plain(), Src::new(Value::imm(0))],
                    )
                    .with_data(InstrData::Logic { table: TABLE_MOV }),
                );
                func.instr_mut(id).replace_src(slot, Src::new(temp));
                inserted += 1;
                changed = true;
                log::trace!(
                    "legalized uniform u[{}] at slot {} of {:?} in b{}",
                    index,
                    slot,
                    op,
                    block.0
                );
            }
            pos += 1 + inserted;
        }
    }
    Ok(changed)
}
