// This module implements pseudo-instruction lowering: every IR-level convenience
// operation with no 1:1 hardware equivalent is expanded in place into real
// instructions and the pseudo op deleted. The rule table: moves and bitwise
// negations become one fixed-truth-table BitOp with a constant-zero second operand;
// an unfused compare becomes a compare-and-select between the two canonical boolean
// encodings, branches swapped when the invert modifier is set on the first source;
// a mask-producing ballot becomes an equality-compare-against-zero with inverted
// polarity; structured-control-flow markers become explicit writes to the fixed
// hardware nesting counter, where a conditional break is a single hardware While
// when nesting depth is trivial and a compare-and-select plus exec-mask pop
// otherwise; a register swap becomes one rotate-by-half-width when both operands
// are half-registers of the same full register and a three-step exclusive-or swap
// otherwise; resolved pass-through markers are deleted with no replacement. Each
// expansion inserts its replacement instructions before the pseudo, deletes the
// pseudo, and advances the scan position by the replacement count, so in-place
// insertion and deletion never invalidates the iteration.

//! Expansion of pseudo opcodes into real hardware instructions.

use crate::error::IrResult;
use crate::ir::{
    BlockId, CondCode, Function, Instr, InstrData, InstrId, Opcode, SizeClass, Src, Value,
    BOOL_FALSE, BOOL_TRUE, TABLE_MOV, TABLE_NOT,
};

/// Expand every pseudo op. After this pass no instruction carries one.
pub fn lower_pseudo(func: &mut Function) -> IrResult<bool> {
    let mut changed = false;
    let blocks: Vec<BlockId> = func.blocks().collect();
    for block in blocks {
        let mut pos = 0;
        while pos < func.block(block).instrs.len() {
            let id = func.block(block).instrs[pos];
            let op = func.instr(id).op;
            if !op.is_pseudo() {
                pos += 1;
                continue;
            }
            let emitted = match op {
                Opcode::PMov => lower_unary_bitop(func, block, pos, id, TABLE_MOV),
                Opcode::PNot => lower_unary_bitop(func, block, pos, id, TABLE_NOT),
                Opcode::PCmp => lower_cmp(func, block, pos, id),
                Opcode::PBallot => lower_ballot(func, block, pos, id),
                Opcode::PLoopBegin | Opcode::PBreak => lower_nest_write(func, block, pos, id),
                Opcode::PBreakCond => lower_break_cond(func, block, pos, id),
                Opcode::PSwap => lower_swap(func, block, pos, id),
                Opcode::PMarker => 0,
                _ => unreachable!("non-pseudo opcode {:?} in pseudo lowering", op),
            };
            func.remove_instr(id);
            changed = true;
            log::trace!("lowered {:?} to {} instruction(s) in b{}", op, emitted, block.0);
            pos += emitted;
        }
    }
    Ok(changed)
}

/// `dst = src` / `dst = !src` as one BitOp with a constant-zero second operand.
fn lower_unary_bitop(func: &mut Function, block: BlockId, pos: usize, id: InstrId, table: u8) -> usize {
    let pseudo = func.instr(id);
    let dest = pseudo.dests[0];
    let src = pseudo.srcs[0];
    func.insert_at(
        block,
        pos,
        Instr::new(Opcode::BitOp, vec![dest], vec![src, Src::new(Value::imm(0))])
            .with_data(InstrData::Logic { table }),
    );
    1
}

/// Unfused compare: select between the canonical boolean encodings.
///
/// The invert modifier rides on the first source's negate flag and swaps the
/// select branches; it is consumed here, not passed to the hardware compare.
fn lower_cmp(func: &mut Function, block: BlockId, pos: usize, id: InstrId) -> usize {
    let pseudo = func.instr(id);
    let dest = pseudo.dests[0];
    let mut lhs = pseudo.srcs[0];
    let rhs = pseudo.srcs[1];
    let code = match pseudo.data {
        InstrData::Cond { code } => code,
        _ => CondCode::Ne,
    };
    let invert = lhs.neg;
    lhs.neg = false;
    let (on_true, on_false) =
        if invert { (BOOL_FALSE, BOOL_TRUE) } else { (BOOL_TRUE, BOOL_FALSE) };
    func.insert_at(
        block,
        pos,
        Instr::new(
            Opcode::CmpSel,
            vec![dest],
            vec![lhs, rhs, Src::new(Value::imm(on_true)), Src::new(Value::imm(on_false))],
        )
        .with_data(InstrData::Cond { code }),
    );
    1
}

/// Ballot: equality-compare-against-zero with inverted polarity.
fn lower_ballot(func: &mut Function, block: BlockId, pos: usize, id: InstrId) -> usize {
    let pseudo = func.instr(id);
    let dest = pseudo.dests[0];
    let src = pseudo.srcs[0];
    func.insert_at(
        block,
        pos,
        Instr::new(Opcode::Cmp, vec![dest], vec![src, Src::new(Value::imm(0))])
            .with_data(InstrData::Cond { code: CondCode::Eq.inverse() }),
    );
    1
}

/// Loop begin / unconditional break: direct immediate write of the nesting counter.
fn lower_nest_write(func: &mut Function, block: BlockId, pos: usize, id: InstrId) -> usize {
    let depth = func.instr(id).nest_depth().unwrap_or(0);
    func.insert_at(
        block,
        pos,
        Instr::new(
            Opcode::LoadImm,
            vec![Value::nest_counter()],
            vec![Src::new(Value::imm(depth))],
        ),
    );
    1
}

/// Conditional break: a single While at trivial depth, otherwise a
/// compare-and-select on the nesting counter followed by an exec-mask pop.
fn lower_break_cond(func: &mut Function, block: BlockId, pos: usize, id: InstrId) -> usize {
    let pseudo = func.instr(id);
    let cond = pseudo.srcs[0];
    let depth = pseudo.nest_depth().unwrap_or(0);
    if depth <= 1 {
        func.insert_at(block, pos, Instr::new(Opcode::While, vec![], vec![cond]));
        return 1;
    }
    func.insert_at(
        block,
        pos,
        Instr::new(
            Opcode::CmpSel,
            vec![Value::nest_counter()],
            vec![
                cond,
                Src::new(Value::imm(0)),
                Src::new(Value::imm(depth)),
                Src::new(Value::nest_counter()),
            ],
        )
        .with_data(InstrData::Cond { code: CondCode::Ne }),
    );
    func.insert_at(block, pos + 1, Instr::new(Opcode::PopExec, vec![], vec![]));
    2
}

/// Register swap without a temporary.
fn lower_swap(func: &mut Function, block: BlockId, pos: usize, id: InstrId) -> usize {
    let pseudo = func.instr(id);
    let a = pseudo.srcs[0].value;
    let b = pseudo.srcs[1].value;

    if let (Value::Reg { reg: ra, size: SizeClass::Half }, Value::Reg { reg: rb, size: SizeClass::Half }) =
        (a, b)
    {
        if ra.full() == rb.full() {
            // Both halves of one full register: a single rotate swaps them.
            let full = Value::reg(crate::ir::HwReg(ra.full() << 1), SizeClass::Word);
            func.insert_at(
                block,
                pos,
                Instr::new(Opcode::RotHalf, vec![full], vec![Src::new(full)]),
            );
            return 1;
        }
    }

    // General case: three-step exclusive-or swap.
    func.insert_at(
        block,
        pos,
        Instr::new(Opcode::Xor, vec![a], vec![Src::new(a), Src::new(b)]),
    );
    func.insert_at(
        block,
        pos + 1,
        Instr::new(Opcode::Xor, vec![b], vec![Src::new(b), Src::new(a)]),
    );
    func.insert_at(
        block,
        pos + 2,
        Instr::new(Opcode::Xor, vec![a], vec![Src::new(a), Src::new(b)]),
    );
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::HwReg;

    fn single_block() -> (Function, BlockId) {
        let mut func = Function::new();
        let b0 = func.add_block();
        (func, b0)
    }

    #[test]
    fn test_pmov_becomes_one_bitop() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        let y = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        func.push(b0, Instr::new(Opcode::PMov, vec![y], vec![Src::new(x)]));

        assert!(lower_pseudo(&mut func).unwrap());
        assert!(!func.has_pseudo_ops());

        let instrs = &func.block(b0).instrs;
        assert_eq!(instrs.len(), 2);
        let mov = func.instr(instrs[1]);
        assert_eq!(mov.op, Opcode::BitOp);
        assert_eq!(mov.data, InstrData::Logic { table: TABLE_MOV });
        assert_eq!(mov.dests, vec![y]);
        assert_eq!(mov.srcs[0].value, x);
        assert_eq!(mov.srcs[1].value, Value::imm(0));
    }

    #[test]
    fn test_pnot_uses_complement_table() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        let y = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        func.push(b0, Instr::new(Opcode::PNot, vec![y], vec![Src::new(x)]));

        lower_pseudo(&mut func).unwrap();
        let not = func.instr(func.block(b0).instrs[1]);
        assert_eq!(not.op, Opcode::BitOp);
        assert_eq!(not.data, InstrData::Logic { table: TABLE_NOT });
    }

    #[test]
    fn test_pcmp_selects_boolean_encodings() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        let d = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        func.push(
            b0,
            Instr::new(Opcode::PCmp, vec![d], vec![Src::new(x), Src::new(Value::imm(7))])
                .with_data(InstrData::Cond { code: CondCode::Lt }),
        );

        lower_pseudo(&mut func).unwrap();
        let sel = func.instr(func.block(b0).instrs[1]);
        assert_eq!(sel.op, Opcode::CmpSel);
        assert_eq!(sel.data, InstrData::Cond { code: CondCode::Lt });
        assert_eq!(sel.srcs[2].value, Value::imm(BOOL_TRUE));
        assert_eq!(sel.srcs[3].value, Value::imm(BOOL_FALSE));
    }

    #[test]
    fn test_pcmp_invert_swaps_branches() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        let d = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        func.push(
            b0,
            Instr::new(Opcode::PCmp, vec![d], vec![Src::negated(x), Src::new(Value::imm(7))])
                .with_data(InstrData::Cond { code: CondCode::Eq }),
        );

        lower_pseudo(&mut func).unwrap();
        let sel = func.instr(func.block(b0).instrs[1]);
        assert_eq!(sel.srcs[2].value, Value::imm(BOOL_FALSE));
        assert_eq!(sel.srcs[3].value, Value::imm(BOOL_TRUE));
        // The invert modifier is consumed, not forwarded.
        assert!(!sel.srcs[0].neg);
    }

    #[test]
    fn test_pballot_is_inverted_compare_against_zero() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        let mask = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        func.push(b0, Instr::new(Opcode::PBallot, vec![mask], vec![Src::new(x)]));

        lower_pseudo(&mut func).unwrap();
        let cmp = func.instr(func.block(b0).instrs[1]);
        assert_eq!(cmp.op, Opcode::Cmp);
        assert_eq!(cmp.data, InstrData::Cond { code: CondCode::Ne });
        assert_eq!(cmp.srcs[1].value, Value::imm(0));
    }

    #[test]
    fn test_break_cond_trivial_depth_is_single_while() {
        let (mut func, b0) = single_block();
        let cond = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![cond], vec![Src::new(Value::imm(1))]));
        func.push(
            b0,
            Instr::new(Opcode::PBreakCond, vec![], vec![Src::new(cond)])
                .with_data(InstrData::Nest { depth: 1 }),
        );

        lower_pseudo(&mut func).unwrap();
        let instrs = &func.block(b0).instrs;
        assert_eq!(instrs.len(), 2);
        assert_eq!(func.instr(instrs[1]).op, Opcode::While);
    }

    #[test]
    fn test_break_cond_nested_is_cmpsel_plus_pop() {
        let (mut func, b0) = single_block();
        let cond = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![cond], vec![Src::new(Value::imm(1))]));
        func.push(
            b0,
            Instr::new(Opcode::PBreakCond, vec![], vec![Src::new(cond)])
                .with_data(InstrData::Nest { depth: 3 }),
        );

        lower_pseudo(&mut func).unwrap();
        let instrs = func.block(b0).instrs.clone();
        assert_eq!(instrs.len(), 3);
        let sel = func.instr(instrs[1]);
        assert_eq!(sel.op, Opcode::CmpSel);
        assert_eq!(sel.dests, vec![Value::nest_counter()]);
        assert_eq!(func.instr(instrs[2]).op, Opcode::PopExec);
    }

    #[test]
    fn test_loop_markers_write_nest_counter() {
        let (mut func, b0) = single_block();
        func.push(
            b0,
            Instr::new(Opcode::PLoopBegin, vec![], vec![]).with_data(InstrData::Nest { depth: 2 }),
        );
        func.push(
            b0,
            Instr::new(Opcode::PBreak, vec![], vec![]).with_data(InstrData::Nest { depth: 1 }),
        );

        lower_pseudo(&mut func).unwrap();
        let instrs = func.block(b0).instrs.clone();
        assert_eq!(instrs.len(), 2);
        for (&id, depth) in instrs.iter().zip([2u32, 1]) {
            let write = func.instr(id);
            assert_eq!(write.op, Opcode::LoadImm);
            assert_eq!(write.dests, vec![Value::nest_counter()]);
            assert_eq!(write.srcs[0].value, Value::imm(depth));
        }
    }

    #[test]
    fn test_swap_same_full_register_uses_rotate() {
        let (mut func, b0) = single_block();
        let lo = Value::reg(HwReg(4), SizeClass::Half);
        let hi = Value::reg(HwReg(5), SizeClass::Half);
        func.push(
            b0,
            Instr::new(Opcode::PSwap, vec![lo, hi], vec![Src::new(lo), Src::new(hi)]),
        );

        lower_pseudo(&mut func).unwrap();
        let instrs = &func.block(b0).instrs;
        assert_eq!(instrs.len(), 1);
        let rot = func.instr(instrs[0]);
        assert_eq!(rot.op, Opcode::RotHalf);
        assert_eq!(rot.dests, vec![Value::reg(HwReg(4), SizeClass::Word)]);
    }

    #[test]
    fn test_swap_distinct_registers_uses_xor_triple() {
        let (mut func, b0) = single_block();
        let a = Value::reg(HwReg(2), SizeClass::Word);
        let b = Value::reg(HwReg(6), SizeClass::Word);
        func.push(b0, Instr::new(Opcode::PSwap, vec![a, b], vec![Src::new(a), Src::new(b)]));

        lower_pseudo(&mut func).unwrap();
        let instrs = func.block(b0).instrs.clone();
        assert_eq!(instrs.len(), 3);
        for &id in &instrs {
            assert_eq!(func.instr(id).op, Opcode::Xor);
        }
        assert_eq!(func.instr(instrs[0]).dests, vec![a]);
        assert_eq!(func.instr(instrs[1]).dests, vec![b]);
        assert_eq!(func.instr(instrs[2]).dests, vec![a]);
    }

    #[test]
    fn test_marker_deleted_without_replacement() {
        let (mut func, b0) = single_block();
        func.push(b0, Instr::new(Opcode::PMarker, vec![], vec![]));
        func.push(b0, Instr::new(Opcode::PopExec, vec![], vec![]));

        assert!(lower_pseudo(&mut func).unwrap());
        let instrs = &func.block(b0).instrs;
        assert_eq!(instrs.len(), 1);
        assert_eq!(func.instr(instrs[0]).op, Opcode::PopExec);
    }

    #[test]
    fn test_no_pseudo_ops_is_no_progress() {
        let (mut func, b0) = single_block();
        let x = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(3))]));
        assert!(!lower_pseudo(&mut func).unwrap());
    }
}
