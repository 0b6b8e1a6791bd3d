// This module implements the IR verifier. It checks the well-formedness contract the
// pipeline assumes from upstream instruction selection and preserves internally:
// mirrored predecessor/successor edges with at most two successors per block, branch
// payloads targeting actual successors, phis confined to the leading group of a block
// with exactly one source per predecessor edge, instruction block back-references
// matching the containing block, and SSA discipline over the value-id universe (ids
// inside [0, alloc), at most one definition per id, no use without a definition).
// Verification failures are fatal: a malformed function must never reach the passes,
// since continuing risks a miscompile. Dominance of uses by definitions is not
// checked here; that is what SSA repair restores.

//! Internal-consistency verifier for the backend IR.

use crate::error::{IrError, IrResult};
use crate::ir::function::Function;
use crate::ir::instr::{InstrData, Opcode};
use crate::ir::value::Value;

/// Check structural and SSA well-formedness of a function.
pub fn verify(func: &Function) -> IrResult<()> {
    verify_cfg(func)?;
    verify_instrs(func)?;
    verify_ssa(func)
}

fn verify_cfg(func: &Function) -> IrResult<()> {
    for block in func.blocks() {
        let b = func.block(block);
        if b.succs.len() > 2 {
            return Err(IrError::TooManySuccessors { block: block.0, count: b.succs.len() });
        }
        for &succ in &b.succs {
            if !func.block(succ).preds.contains(&block) {
                return Err(IrError::BrokenEdge { from: block.0, to: succ.0 });
            }
        }
        for &pred in &b.preds {
            if !func.block(pred).succs.contains(&block) {
                return Err(IrError::BrokenEdge { from: pred.0, to: block.0 });
            }
        }
    }
    Ok(())
}

fn verify_instrs(func: &Function) -> IrResult<()> {
    for block in func.blocks() {
        let b = func.block(block);
        let mut seen_non_phi = false;
        for &id in &b.instrs {
            let instr = func.instr(id);
            if instr.block != block {
                return Err(IrError::BlockRefMismatch { block: block.0, claimed: instr.block.0 });
            }
            if instr.op.is_phi() {
                if seen_non_phi {
                    return Err(IrError::MisplacedPhi { block: block.0 });
                }
                if instr.srcs.len() != b.preds.len() {
                    return Err(IrError::PhiArity {
                        block: block.0,
                        got: instr.srcs.len(),
                        want: b.preds.len(),
                    });
                }
            } else {
                seen_non_phi = true;
            }
            if instr.op == Opcode::Branch {
                match instr.data {
                    InstrData::Branch { target } if b.succs.contains(&target) => {}
                    InstrData::Branch { target } => {
                        return Err(IrError::BadBranchTarget { block: block.0, target: target.0 })
                    }
                    _ => return Err(IrError::BadBranchTarget { block: block.0, target: u32::MAX }),
                }
            }
        }
    }
    Ok(())
}

fn verify_ssa(func: &Function) -> IrResult<()> {
    let universe = func.alloc() as usize;
    let mut defined = vec![false; universe];

    for id in func.program_order() {
        for dest in &func.instr(id).dests {
            if let Value::Ssa { id: value, .. } = *dest {
                if value.index() >= universe {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
                if defined[value.index()] {
                    return Err(IrError::MultipleDefinitions { value: value.0 });
                }
                defined[value.index()] = true;
            }
        }
    }
    for id in func.program_order() {
        for src in &func.instr(id).srcs {
            if let Some(value) = src.value.ssa_id() {
                if value.index() >= universe || !defined[value.index()] {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
            }
        }
    }
    Ok(())
}
