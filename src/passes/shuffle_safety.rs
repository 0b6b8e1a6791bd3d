// This module implements divergence-safety lowering for cross-lane shuffles. A
// shuffle's lane-index operand is combined across the whole execution quad, so an
// inactive lane's contribution is undefined and corrupts the result for every lane.
// The fix reserves one scratch register that is held at zero everywhere except
// momentarily during a shuffle: the function entry gets an immediate zero-write to
// the scratch register; every shuffle whose lane index is a register gets a copy of
// that operand into scratch immediately before it and reads scratch instead
// (immediates are already uniform across the quad and need no protection); and any
// block that protected at least one shuffle re-zeroes scratch at its end, before
// the terminator. No other instruction may read or write the scratch register; a
// collision is fatal. The pass's own artifacts (zero-writes and lane copies into
// scratch, shuffles reading scratch) are recognized on a re-run, so a fixed-point
// scheduler can safely invoke the pass again and observe no progress.

//! Divergence-safety lowering for shuffle lane indices.

use crate::error::{IrError, IrResult};
use crate::ir::{
    BlockId, Function, Instr, InstrData, Opcode, SizeClass, Src, Value, SCRATCH_REG, TABLE_MOV,
};

/// The shuffle source slot carrying the lane index.
const LANE_SLOT: usize = 1;

fn is_scratch_zero_write(instr: &Instr) -> bool {
    instr.op == Opcode::LoadImm
        && instr.dests == [Value::scratch()]
        && instr.srcs.len() == 1
        && instr.srcs[0].value == Value::imm(0)
}

fn is_scratch_lane_copy(instr: &Instr) -> bool {
    instr.op == Opcode::BitOp
        && instr.data == InstrData::Logic { table: TABLE_MOV }
        && instr.dests == [Value::scratch()]
        && instr.srcs.len() == 2
        && instr.srcs[1].value == Value::imm(0)
}

/// Make every shuffle's lane index safe under partial lane activity.
pub fn lower_shuffle_safety(func: &mut Function) -> IrResult<bool> {
    let scratch_full = SCRATCH_REG.full();

    // The scratch register belongs to this pass alone; anything else touching
    // it is a miscompile in the making. A genuine lane copy is always followed
    // directly by the shuffle reading scratch; a mov of the same shape without
    // one is a foreign clobber.
    for block in func.blocks() {
        let order = &func.block(block).instrs;
        for (at, &id) in order.iter().enumerate() {
            let instr = func.instr(id);
            let feeds_shuffle = order.get(at + 1).is_some_and(|&next| {
                let next = func.instr(next);
                next.op == Opcode::Shuffle
                    && next.srcs.get(LANE_SLOT).is_some_and(|s| s.value == Value::scratch())
            });
            let own_artifact =
                is_scratch_zero_write(instr) || (is_scratch_lane_copy(instr) && feeds_shuffle);
            if !own_artifact && instr.dests.iter().any(|d| d.touches_reg(scratch_full)) {
                return Err(IrError::ScratchClash { block: block.0 });
            }
            for (slot, src) in instr.srcs.iter().enumerate() {
                let lane_read = instr.op == Opcode::Shuffle && slot == LANE_SLOT;
                if src.value.touches_reg(scratch_full) && !lane_read {
                    return Err(IrError::ScratchClash { block: block.0 });
                }
            }
        }
    }

    let mut changed = false;
    let mut any_protected = false;
    let blocks: Vec<BlockId> = func.blocks().collect();
    for block in blocks {
        let mut block_protected = false;
        let mut pos = 0;
        while pos < func.block(block).instrs.len() {
            let id = func.block(block).instrs[pos];
            let instr = func.instr(id);
            if instr.op != Opcode::Shuffle {
                pos += 1;
                continue;
            }
            let lane = instr.srcs[LANE_SLOT];
            if lane.value.is_imm() || lane.value == Value::scratch() {
                pos += 1;
                continue;
            }
            func.insert_at(
                block,
                pos,
                Instr::new(
                    Opcode::BitOp,
                    vec![Value::scratch()],
                    vec![lane, Src::new(Value::imm(0))],
                )
                .with_data(InstrData::Logic { table: TABLE_MOV }),
            );
            func.instr_mut(id).replace_src(LANE_SLOT, Src::new(Value::scratch()));
            block_protected = true;
            changed = true;
            pos += 2;
        }
        if block_protected {
            any_protected = true;
            // Re-zero at block end, keeping the terminator last.
            let order = &func.block(block).instrs;
            let mut at = order.len();
            if let Some(&last) = order.last() {
                if func.instr(last).op == Opcode::Branch {
                    at -= 1;
                }
            }
            func.insert_at(
                block,
                at,
                Instr::new(
                    Opcode::LoadImm,
                    vec![Value::scratch()],
                    vec![Src::new(Value::imm(0))],
                ),
            );
        }
    }

    if any_protected {
        // The initial zero-write dominates every shuffle from function entry.
        let entry = func.entry();
        let already = func
            .block(entry)
            .instrs
            .first()
            .is_some_and(|&first| is_scratch_zero_write(func.instr(first)));
        if !already {
            func.insert_at(
                entry,
                0,
                Instr::new(
                    Opcode::LoadImm,
                    vec![Value::scratch()],
                    vec![Src::new(Value::imm(0))],
                ),
            );
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::HwReg;

    #[test]
    fn test_single_shuffle_protocol() {
        // Scenario: one register-indexed shuffle in an otherwise shuffle-free
        // block lowers to copy, rewritten shuffle, block-end re-zero and an
        // entry zero-write.
        let mut func = Function::new();
        let b0 = func.add_block();
        let data = func.new_temp(SizeClass::Word);
        let lane = func.new_temp(SizeClass::Word);
        let out = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![data], vec![Src::new(Value::imm(9))]));
        func.push(b0, Instr::new(Opcode::LoadImm, vec![lane], vec![Src::new(Value::imm(1))]));
        let shuffle = func.push(
            b0,
            Instr::new(Opcode::Shuffle, vec![out], vec![Src::new(data), Src::new(lane)]),
        );

        assert!(lower_shuffle_safety(&mut func).unwrap());

        let instrs = func.block(b0).instrs.clone();
        // entry zero, two loads, lane copy, shuffle, block-end zero
        assert_eq!(instrs.len(), 6);
        assert!(is_scratch_zero_write(func.instr(instrs[0])));
        let copy = func.instr(instrs[3]);
        assert!(is_scratch_lane_copy(copy));
        assert_eq!(copy.srcs[0].value, lane);
        assert_eq!(func.instr(shuffle).srcs[LANE_SLOT].value, Value::scratch());
        assert!(is_scratch_zero_write(func.instr(instrs[5])));
    }

    #[test]
    fn test_immediate_lane_needs_no_protection() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let data = func.new_temp(SizeClass::Word);
        let out = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![data], vec![Src::new(Value::imm(9))]));
        func.push(
            b0,
            Instr::new(Opcode::Shuffle, vec![out], vec![Src::new(data), Src::new(Value::imm(2))]),
        );

        assert!(!lower_shuffle_safety(&mut func).unwrap());
        assert_eq!(func.block(b0).instrs.len(), 2);
    }

    #[test]
    fn test_rezero_stays_before_terminator() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let b1 = func.add_block();
        func.add_edge(b0, b1);
        let data = func.new_temp(SizeClass::Word);
        let lane = func.new_temp(SizeClass::Word);
        let out = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![data], vec![Src::new(Value::imm(9))]));
        func.push(b0, Instr::new(Opcode::LoadImm, vec![lane], vec![Src::new(Value::imm(0))]));
        func.push(b0, Instr::new(Opcode::Shuffle, vec![out], vec![Src::new(data), Src::new(lane)]));
        func.push(
            b0,
            Instr::new(Opcode::Branch, vec![], vec![]).with_data(InstrData::Branch { target: b1 }),
        );

        lower_shuffle_safety(&mut func).unwrap();
        let instrs = func.block(b0).instrs.clone();
        let last = func.instr(*instrs.last().unwrap());
        assert_eq!(last.op, Opcode::Branch);
        assert!(is_scratch_zero_write(func.instr(instrs[instrs.len() - 2])));
    }

    #[test]
    fn test_scratch_collision_is_fatal() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let x = func.new_temp(SizeClass::Word);
        func.push(
            b0,
            Instr::new(
                Opcode::Add,
                vec![Value::scratch()],
                vec![Src::new(x), Src::new(x)],
            ),
        );
        assert_eq!(
            lower_shuffle_safety(&mut func),
            Err(IrError::ScratchClash { block: 0 })
        );
    }

    #[test]
    fn test_mov_shaped_scratch_clobber_is_fatal() {
        // A foreign truth-table mov into scratch looks like a lane copy but
        // feeds no shuffle; it must still be flagged.
        let mut func = Function::new();
        let b0 = func.add_block();
        let x = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
        func.push(
            b0,
            Instr::new(
                Opcode::BitOp,
                vec![Value::scratch()],
                vec![Src::new(x), Src::new(x)],
            )
            .with_data(InstrData::Logic { table: TABLE_MOV }),
        );
        assert_eq!(
            lower_shuffle_safety(&mut func),
            Err(IrError::ScratchClash { block: 0 })
        );
    }

    #[test]
    fn test_lane_copy_without_shuffle_is_fatal() {
        // Even with the exact artifact shape, a copy into scratch that no
        // shuffle consumes is a clobber.
        let mut func = Function::new();
        let b0 = func.add_block();
        let x = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
        func.push(
            b0,
            Instr::new(
                Opcode::BitOp,
                vec![Value::scratch()],
                vec![Src::new(x), Src::new(Value::imm(0))],
            )
            .with_data(InstrData::Logic { table: TABLE_MOV }),
        );
        assert_eq!(
            lower_shuffle_safety(&mut func),
            Err(IrError::ScratchClash { block: 0 })
        );
    }

    #[test]
    fn test_scratch_read_outside_shuffle_is_fatal() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let d = func.new_temp(SizeClass::Word);
        func.push(
            b0,
            Instr::new(
                Opcode::Add,
                vec![d],
                vec![Src::new(Value::scratch()), Src::new(Value::imm(1))],
            ),
        );
        assert_eq!(
            lower_shuffle_safety(&mut func),
            Err(IrError::ScratchClash { block: 0 })
        );
    }

    #[test]
    fn test_rerun_makes_no_further_progress() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let data = func.new_temp(SizeClass::Word);
        let lane = func.new_temp(SizeClass::Word);
        let out = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![data], vec![Src::new(Value::imm(9))]));
        func.push(b0, Instr::new(Opcode::LoadImm, vec![lane], vec![Src::new(Value::imm(1))]));
        func.push(b0, Instr::new(Opcode::Shuffle, vec![out], vec![Src::new(data), Src::new(lane)]));

        assert!(lower_shuffle_safety(&mut func).unwrap());
        let dump = func.to_string();
        assert!(!lower_shuffle_safety(&mut func).unwrap());
        assert_eq!(func.to_string(), dump);
    }

    #[test]
    fn test_half_register_overlap_detected() {
        // A half-register write into either half of the scratch register is
        // still a collision.
        let mut func = Function::new();
        let b0 = func.add_block();
        func.push(
            b0,
            Instr::new(
                Opcode::LoadImm,
                vec![Value::reg(HwReg(SCRATCH_REG.0 + 1), SizeClass::Half)],
                vec![Src::new(Value::imm(5))],
            ),
        );
        assert_eq!(
            lower_shuffle_safety(&mut func),
            Err(IrError::ScratchClash { block: 0 })
        );
    }
}
