// This module implements the Function, the top-level IR unit and sole owner of all
// blocks and instructions for one shader compilation job. Blocks and instructions
// live in Vec slabs indexed by BlockId/InstrId; every cross-reference (predecessor
// and successor lists, instruction block back-references, phi/branch payloads) is a
// plain index into Function-owned storage, never an owning pointer, which sidesteps
// reference cycles between mutually-referencing blocks. The Function also owns the
// monotonic value-id allocator handed out by new_temp; reindexing compacts and
// resets it. Edits go through a small audited surface (add_block, add_edge, push,
// insert_at, remove_instr) that keeps block order and edge lists self-consistent.
// Removing an instruction only unlinks it from its block; the slab slot is reclaimed
// when the whole Function is dropped at job teardown. Independent compilations share
// nothing: each job owns its own Function, so concurrent jobs need no locking.

use super::instr::{Instr, Opcode};
use super::value::{SizeClass, Value, ValueId};
use super::{BlockId, InstrId};

/// A basic block: ordered instruction list plus CFG edges.
///
/// Successor count is at most two, reflecting structured control flow
/// (fallthrough/branch or loop back-edge).
#[derive(Debug, Default, Clone)]
pub struct Block {
    pub instrs: Vec<InstrId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

/// Top-level IR unit owning all blocks, instructions and the value-id space.
#[derive(Debug, Default)]
pub struct Function {
    blocks: Vec<Block>,
    instrs: Vec<Instr>,
    alloc: u32,
}

impl Function {
    pub fn new() -> Function {
        Function::default()
    }

    /// Entry block. Block 0 by construction; the entry has no predecessors.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Current value-id high-water mark; all live ids are below it.
    pub fn alloc(&self) -> u32 {
        self.alloc
    }

    pub(crate) fn set_alloc(&mut self, alloc: u32) {
        self.alloc = alloc;
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Block ids in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.index()]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id.index()]
    }

    /// Append an empty block.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    /// Add a CFG edge, keeping both sides' lists mirrored.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let succs = &mut self.blocks[from.index()].succs;
        assert!(succs.len() < 2, "block b{} already has two successors", from.0);
        succs.push(to);
        self.blocks[to.index()].preds.push(from);
    }

    /// Allocate a fresh SSA temporary.
    pub fn new_temp(&mut self, size: SizeClass) -> Value {
        let id = ValueId(self.alloc);
        self.alloc += 1;
        Value::ssa(id, size)
    }

    /// Append an instruction to a block.
    pub fn push(&mut self, block: BlockId, instr: Instr) -> InstrId {
        let at = self.blocks[block.index()].instrs.len();
        self.insert_at(block, at, instr)
    }

    /// Insert an instruction at a position within a block's order.
    pub fn insert_at(&mut self, block: BlockId, at: usize, mut instr: Instr) -> InstrId {
        instr.block = block;
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);
        self.blocks[block.index()].instrs.insert(at, id);
        id
    }

    /// Unlink an instruction from its block.
    ///
    /// The slab slot is not reused; it is reclaimed with the Function.
    pub fn remove_instr(&mut self, id: InstrId) {
        let block = self.instrs[id.index()].block;
        let order = &mut self.blocks[block.index()].instrs;
        let at = order
            .iter()
            .position(|&i| i == id)
            .expect("instruction not linked into its block");
        order.remove(at);
    }

    /// Position of an instruction within its block's order.
    pub fn position_of(&self, id: InstrId) -> usize {
        let block = self.instrs[id.index()].block;
        self.blocks[block.index()]
            .instrs
            .iter()
            .position(|&i| i == id)
            .expect("instruction not linked into its block")
    }

    /// The leading phi group of a block.
    pub fn phis(&self, block: BlockId) -> impl Iterator<Item = InstrId> + '_ {
        self.blocks[block.index()]
            .instrs
            .iter()
            .copied()
            .take_while(|&i| self.instrs[i.index()].op.is_phi())
    }

    /// Index of `pred` within `block`'s predecessor order.
    ///
    /// Phi sources are aligned with this order, one per incoming edge.
    pub fn pred_index(&self, block: BlockId, pred: BlockId) -> Option<usize> {
        self.blocks[block.index()].preds.iter().position(|&p| p == pred)
    }

    /// All linked instructions in program order (block order, then block-local order).
    pub fn program_order(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.blocks.iter().flat_map(|b| b.instrs.iter().copied())
    }

    /// Whether any linked instruction still carries a pseudo opcode.
    pub fn has_pseudo_ops(&self) -> bool {
        self.program_order().any(|i| self.instr(i).op.is_pseudo())
    }
}
