// This module implements the liveness analyzer: a backward worklist dataflow over
// the structured CFG producing, for every block, the set of SSA values live at
// entry and exit, plus a per-use kill flag marking the last read of a value on the
// current path. Per-block sets are bit-vectors sized to the Function's current
// value-id universe and allocated from a caller-provided bump arena, so one run's
// sets are superseded wholesale by the next run after any id-space change. The
// worklist is a FIFO of block ids with an in-queue mark, seeded in approximate
// reverse topological order so most blocks converge in one visit; bitwise-OR merges
// only grow sets over a bounded universe, so a fixed point is reached regardless of
// processing order. Phi instructions are edge-local: the backward scan of a block
// stops before its leading phi group, and each predecessor edge instead removes the
// phi destinations from the block's live-in and adds the phi source selected for
// that edge before merging into the predecessor's live-out. Only SSA temporaries
// participate; registers, uniforms and immediates are ignored. Kill flags are
// written directly into the IR's source-operand records and overwritten on every
// visit, so the flags left behind by the final visit reflect the converged sets.

//! Backward worklist liveness analysis with per-use kill flags.

use std::collections::VecDeque;

use bumpalo::Bump;

use super::bitset::BitSet;
use super::dominance::reverse_postorder;
use crate::ir::{BlockId, Function, InstrId};

/// Per-block live-in/live-out sets for one analysis run.
///
/// Borrows the arena the sets were allocated from; reset the arena to discard
/// the whole run. Kill flags are left in the analyzed Function itself.
pub struct Liveness<'a> {
    live_in: Vec<BitSet<'a>>,
    live_out: Vec<BitSet<'a>>,
}

impl<'a> Liveness<'a> {
    /// Run the analysis, writing kill flags into `func`'s source operands.
    ///
    /// Requires IR already validated upstream: every use reachable from some
    /// definition and phi arity matching predecessor count.
    pub fn compute(func: &mut Function, arena: &'a Bump) -> Liveness<'a> {
        let universe = func.alloc();
        let n = func.num_blocks();
        let mut live_in: Vec<BitSet<'a>> =
            (0..n).map(|_| BitSet::new_in(arena, universe)).collect();
        let mut live_out: Vec<BitSet<'a>> =
            (0..n).map(|_| BitSet::new_in(arena, universe)).collect();
        let mut candidate = BitSet::new_in(arena, universe);
        let mut edge_set = BitSet::new_in(arena, universe);

        // Seed in reverse RPO; convergence does not depend on the order, only
        // the number of revisits does.
        let rpo = reverse_postorder(func);
        let mut worklist: VecDeque<BlockId> = rpo.iter().rev().copied().collect();
        let mut in_queue = vec![false; n];
        for &block in &worklist {
            in_queue[block.index()] = true;
        }

        let mut visits = 0usize;
        while let Some(block) = worklist.pop_front() {
            in_queue[block.index()] = false;
            visits += 1;

            candidate.copy_from(&live_out[block.index()]);
            scan_block(func, block, &mut candidate);
            live_in[block.index()].copy_from(&candidate);

            let phis: Vec<InstrId> = func.phis(block).collect();
            let preds = func.block(block).preds.clone();
            for (slot, &pred) in preds.iter().enumerate() {
                edge_set.copy_from(&live_in[block.index()]);
                for &phi in &phis {
                    let instr = func.instr(phi);
                    if let Some(dest) = instr.dests[0].ssa_id() {
                        edge_set.remove(dest.0);
                    }
                    if let Some(src) = instr.srcs[slot].value.ssa_id() {
                        edge_set.insert(src.0);
                    }
                }
                if live_out[pred.index()].or_with(&edge_set) && !in_queue[pred.index()] {
                    worklist.push_back(pred);
                    in_queue[pred.index()] = true;
                }
            }
        }
        log::debug!(
            "liveness converged after {} block visits ({} blocks, {} values)",
            visits,
            n,
            universe
        );

        Liveness { live_in, live_out }
    }

    pub fn live_in(&self, block: BlockId) -> &BitSet<'a> {
        &self.live_in[block.index()]
    }

    pub fn live_out(&self, block: BlockId) -> &BitSet<'a> {
        &self.live_out[block.index()]
    }
}

/// Backward scan of one block: kill definitions, gen uses, write kill flags.
///
/// `candidate` enters as the block's live-out and leaves as its live-in.
/// The scan stops before the leading phi group; phis are handled per edge.
fn scan_block(func: &mut Function, block: BlockId, candidate: &mut BitSet<'_>) {
    let order = func.block(block).instrs.clone();
    for &id in order.iter().rev() {
        if func.instr(id).op.is_phi() {
            break;
        }
        let instr = func.instr_mut(id);
        for dest in &instr.dests {
            if let Some(value) = dest.ssa_id() {
                candidate.remove(value.0);
            }
        }
        // Sources scan backwards too, so when one instruction reads a value
        // twice the textually last slot carries the kill.
        for src in instr.srcs.iter_mut().rev() {
            if let Some(value) = src.value.ssa_id() {
                // First backward encounter is the last forward use.
                src.kill = !candidate.contains(value.0);
                candidate.insert(value.0);
            }
        }
    }
}
