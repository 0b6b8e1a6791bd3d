// This module implements SSA repair: after a transformation rewrites a definition on
// one control-flow path without updating the dominance-equivalent path, or narrows a
// use's dominance region, some values no longer have a single definition dominating
// every use. The pass restores that invariant. It first computes a dominance snapshot
// and collects per-value definition sites, then classifies a value as impaired when
// it either has several definitions or has a use its one definition does not
// dominate (phi uses are checked against the incoming edge's predecessor, since a
// phi reads on the edge, not in the merge block). Each impaired value is repaired
// with standard SSA construction: phi instructions are placed on the iterated
// dominance frontier of its definition sites, each definition site past the first
// receives a fresh id, and a dominator-tree walk renames every use to the nearest
// dominating definition, filling phi sources per incoming edge. Phis are never
// skipped at a genuine merge point; over-inserted phis that turn out dead are left
// for later dead-code elimination. Running the pass on already-valid SSA finds no
// impaired values and reports no progress, which makes it idempotent.

//! SSA repair: phi insertion and use renaming after non-SSA-preserving rewrites.

use hashbrown::{HashMap, HashSet};

use crate::analysis::DomTree;
use crate::error::{IrError, IrResult};
use crate::ir::{BlockId, Function, Instr, InstrData, InstrId, Opcode, SizeClass, Src, Value, ValueId};

struct Impaired {
    value: ValueId,
    size: SizeClass,
    /// Definition sites in program order.
    sites: Vec<InstrId>,
}

/// Restore "every use is dominated by exactly one reaching definition".
pub fn repair_ssa(func: &mut Function) -> IrResult<bool> {
    let dom = DomTree::compute(func);
    let impaired = find_impaired(func, &dom)?;
    if impaired.is_empty() {
        return Ok(false);
    }
    let mut changed = false;
    for info in impaired {
        log::debug!(
            "ssa repair: value %{} has {} definition sites",
            info.value.0,
            info.sites.len()
        );
        changed |= repair_value(func, &dom, &info)?;
    }
    Ok(changed)
}

fn find_impaired(func: &Function, dom: &DomTree) -> IrResult<Vec<Impaired>> {
    // Definition sites per value, scanned in program order over reachable blocks.
    let mut defs: HashMap<ValueId, Impaired> = HashMap::new();
    let mut first_site: HashMap<ValueId, (BlockId, usize)> = HashMap::new();
    for &block in dom.rpo() {
        for (pos, &id) in func.block(block).instrs.iter().enumerate() {
            for dest in &func.instr(id).dests {
                if let Value::Ssa { id: value, size } = *dest {
                    defs.entry(value)
                        .or_insert_with(|| Impaired { value, size, sites: Vec::new() })
                        .sites
                        .push(id);
                    first_site.entry(value).or_insert((block, pos));
                }
            }
        }
    }

    let mut broken: HashSet<ValueId> = HashSet::new();
    for info in defs.values() {
        if info.sites.len() > 1 {
            broken.insert(info.value);
        }
    }

    // A single definition must dominate every use; phi uses read on the edge.
    for &block in dom.rpo() {
        for (pos, &id) in func.block(block).instrs.iter().enumerate() {
            let instr = func.instr(id);
            let is_phi = instr.op.is_phi();
            if is_phi && instr.srcs.len() != func.block(block).preds.len() {
                return Err(IrError::PhiArity {
                    block: block.0,
                    got: instr.srcs.len(),
                    want: func.block(block).preds.len(),
                });
            }
            for (slot, src) in instr.srcs.iter().enumerate() {
                let Some(value) = src.value.ssa_id() else { continue };
                if !defs.contains_key(&value) {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
                if broken.contains(&value) {
                    continue;
                }
                let (def_block, def_pos) = first_site[&value];
                let dominated = if is_phi {
                    let pred = func.block(block).preds[slot];
                    dom.dominates(def_block, pred)
                } else if def_block == block {
                    def_pos < pos
                } else {
                    dom.dominates(def_block, block)
                };
                if !dominated {
                    broken.insert(value);
                }
            }
        }
    }

    let mut impaired: Vec<Impaired> = defs
        .into_iter()
        .filter_map(|(value, info)| broken.contains(&value).then_some(info))
        .collect();
    impaired.sort_by_key(|info| info.value);
    Ok(impaired)
}

fn repair_value(func: &mut Function, dom: &DomTree, info: &Impaired) -> IrResult<bool> {
    let value = info.value;
    let size = info.size;

    // Phi placement on the iterated dominance frontier of the definition sites.
    let mut phi_blocks: HashSet<BlockId> = HashSet::new();
    let mut work: Vec<BlockId> = info.sites.iter().map(|&id| func.instr(id).block).collect();
    work.dedup();
    while let Some(block) = work.pop() {
        for &join in dom.frontier(block) {
            if phi_blocks.insert(join) {
                work.push(join);
            }
        }
    }
    let mut ordered: Vec<BlockId> = phi_blocks.into_iter().collect();
    ordered.sort();

    let mut inserted: HashMap<BlockId, InstrId> = HashMap::new();
    for &join in &ordered {
        let arity = func.block(join).preds.len();
        let dest = func.new_temp(size);
        // Placeholder sources; the rename walk fills them per edge.
        let placeholder = Src::new(Value::ssa(value, size));
        let id = func.insert_at(
            join,
            0,
            Instr::new(Opcode::Phi, vec![dest], vec![placeholder; arity]).with_data(InstrData::Phi),
        );
        inserted.insert(join, id);
        log::trace!("ssa repair: phi for %{} inserted in b{}", value.0, join.0);
    }

    // The first definition site keeps the original id; the rest get fresh ids.
    let mut new_def: HashMap<InstrId, Value> = HashMap::new();
    for (nth, &site) in info.sites.iter().enumerate() {
        let val = if nth == 0 { Value::ssa(value, size) } else { func.new_temp(size) };
        new_def.insert(site, val);
    }

    let mut changed = !inserted.is_empty();

    // Rename over the dominator tree; a child inherits the definition reaching
    // the end of its parent's block.
    let mut stack: Vec<(BlockId, Option<Value>)> = vec![(func.entry(), None)];
    while let Some((block, mut reaching)) = stack.pop() {
        let order = func.block(block).instrs.clone();
        for &id in &order {
            if inserted.get(&block).copied() == Some(id) {
                reaching = Some(func.instr(id).dests[0]);
                continue;
            }
            if !func.instr(id).op.is_phi() {
                let instr = func.instr_mut(id);
                for src in &mut instr.srcs {
                    if src.value.ssa_id() == Some(value) {
                        match reaching {
                            Some(def) if def != src.value => {
                                src.value = def;
                                changed = true;
                            }
                            Some(_) => {}
                            None => return Err(IrError::DanglingSource { value: value.0 }),
                        }
                    }
                }
            }
            if let Some(&def) = new_def.get(&id) {
                let instr = func.instr_mut(id);
                for dest in &mut instr.dests {
                    if dest.ssa_id() == Some(value) && *dest != def {
                        *dest = def;
                        changed = true;
                    }
                }
                reaching = Some(def);
            }
        }

        // Phi sources in successors read on this edge.
        let succs = func.block(block).succs.clone();
        for succ in succs {
            let Some(slot) = func.pred_index(succ, block) else { continue };
            let phis: Vec<InstrId> = func.phis(succ).collect();
            for phi in phis {
                let instr = func.instr_mut(phi);
                if instr.srcs[slot].value.ssa_id() == Some(value) {
                    // A path with no reaching definition never produces the
                    // value; reading it there is undefined upstream, so the
                    // slot gets a zero to keep the phi well defined.
                    let def = reaching.unwrap_or(Value::imm(0));
                    if instr.srcs[slot].value != def {
                        instr.srcs[slot].value = def;
                        changed = true;
                    }
                }
            }
        }

        for &child in dom.children(block) {
            stack.push((child, reaching));
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::verify;

    /// Diamond with one value defined differently on each arm.
    fn broken_diamond() -> (Function, Value, InstrId) {
        let mut func = Function::new();
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        let b3 = func.add_block();
        func.add_edge(b0, b1);
        func.add_edge(b0, b2);
        func.add_edge(b1, b3);
        func.add_edge(b2, b3);

        let x = func.new_temp(SizeClass::Word);
        func.push(b1, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
        func.push(b2, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(2))]));
        let use_id = func.push(b3, Instr::new(Opcode::Add, vec![], vec![Src::new(x), Src::new(x)]));
        (func, x, use_id)
    }

    #[test]
    fn test_inserts_phi_at_merge_point() {
        let (mut func, x, use_id) = broken_diamond();
        assert!(verify(&func).is_err());

        assert!(repair_ssa(&mut func).unwrap());
        assert_eq!(verify(&func), Ok(()));

        // Exactly one phi at the join, and the use reads its destination.
        let b3 = BlockId(3);
        let phis: Vec<InstrId> = func.phis(b3).collect();
        assert_eq!(phis.len(), 1);
        let phi = func.instr(phis[0]);
        assert_eq!(phi.srcs.len(), 2);
        assert_eq!(func.instr(use_id).srcs[0].value, phi.dests[0]);

        // The two incoming definitions are distinct and neither is the phi.
        assert_ne!(phi.srcs[0].value, phi.srcs[1].value);
        assert_ne!(phi.srcs[0].value, phi.dests[0]);
        let _ = x;
    }

    #[test]
    fn test_repair_is_idempotent() {
        let (mut func, _, _) = broken_diamond();
        assert!(repair_ssa(&mut func).unwrap());
        let dump = func.to_string();
        assert!(!repair_ssa(&mut func).unwrap());
        assert_eq!(func.to_string(), dump);
    }

    #[test]
    fn test_valid_ssa_untouched() {
        let mut func = Function::new();
        let b0 = func.add_block();
        let b1 = func.add_block();
        func.add_edge(b0, b1);
        let x = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
        func.push(b1, Instr::new(Opcode::Add, vec![], vec![Src::new(x), Src::new(x)]));

        let dump = func.to_string();
        assert!(!repair_ssa(&mut func).unwrap());
        assert_eq!(func.to_string(), dump);
    }

    #[test]
    fn test_use_not_dominated_by_single_def() {
        // x defined only on one arm of a branch but used at the join.
        let mut func = Function::new();
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        let b3 = func.add_block();
        func.add_edge(b0, b1);
        func.add_edge(b0, b2);
        func.add_edge(b1, b3);
        func.add_edge(b2, b3);

        let init = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![init], vec![Src::new(Value::imm(0))]));
        let x = func.new_temp(SizeClass::Word);
        func.push(b1, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
        let use_id = func.push(b3, Instr::new(Opcode::Add, vec![], vec![Src::new(x), Src::new(init)]));

        assert!(repair_ssa(&mut func).unwrap());

        // A phi now feeds the join use of x.
        let phis: Vec<InstrId> = func.phis(BlockId(3)).collect();
        assert_eq!(phis.len(), 1);
        assert_eq!(func.instr(use_id).srcs[0].value, func.instr(phis[0]).dests[0]);
        // init dominates everything and stays untouched.
        assert_eq!(func.instr(use_id).srcs[1].value, init);
    }

    #[test]
    fn test_loop_redefinition_gets_header_phi() {
        // x defined before a loop and redefined in the body: the header is a
        // merge point of the two definitions.
        let mut func = Function::new();
        let b0 = func.add_block();
        let header = func.add_block();
        let body = func.add_block();
        let exit = func.add_block();
        func.add_edge(b0, header);
        func.add_edge(header, body);
        func.add_edge(header, exit);
        func.add_edge(body, header);

        let x = func.new_temp(SizeClass::Word);
        func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(0))]));
        func.push(body, Instr::new(Opcode::Add, vec![x], vec![Src::new(x), Src::new(Value::imm(1))]));
        let exit_use =
            func.push(exit, Instr::new(Opcode::Mul, vec![], vec![Src::new(x), Src::new(x)]));

        assert!(repair_ssa(&mut func).unwrap());
        assert_eq!(verify(&func), Ok(()));

        let phis: Vec<InstrId> = func.phis(header).collect();
        assert_eq!(phis.len(), 1);
        let phi_dest = func.instr(phis[0]).dests[0];
        // The exit use sees the header merge.
        assert_eq!(func.instr(exit_use).srcs[0].value, phi_dest);
    }
}
