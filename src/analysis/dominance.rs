// This module computes the dominator tree and dominance frontiers consumed by SSA
// repair. Reverse post-order is built with an explicit DFS stack; immediate
// dominators use the Cooper-Harvey-Kennedy iteration over that order, with the
// two-finger intersection walking idom chains until they meet. The resulting DomTree
// is a pure, read-only snapshot of CFG shape: callers recompute it after any
// block/edge change and never mutate it in place. Blocks unreachable from entry are
// excluded from the order and report as such.

//! Dominator tree and dominance frontiers, derived from CFG shape.

use crate::ir::{BlockId, Function};

const INVALID: BlockId = BlockId(u32::MAX);

/// Reverse post-order over the blocks reachable from entry.
pub fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    if func.num_blocks() == 0 {
        return Vec::new();
    }
    let mut post = Vec::with_capacity(func.num_blocks());
    let mut visited = vec![false; func.num_blocks()];
    let mut stack = vec![(func.entry(), false)];
    while let Some((block, processed)) = stack.pop() {
        if processed {
            post.push(block);
            continue;
        }
        if visited[block.index()] {
            continue;
        }
        visited[block.index()] = true;
        stack.push((block, true));
        for &succ in &func.block(block).succs {
            if !visited[succ.index()] {
                stack.push((succ, false));
            }
        }
    }
    post.reverse();
    post
}

/// Immutable dominance snapshot for one CFG shape.
pub struct DomTree {
    rpo: Vec<BlockId>,
    rpo_index: Vec<u32>,
    idom: Vec<BlockId>,
    children: Vec<Vec<BlockId>>,
    frontier: Vec<Vec<BlockId>>,
}

impl DomTree {
    /// Compute dominators for the current CFG shape.
    pub fn compute(func: &Function) -> DomTree {
        let rpo = reverse_postorder(func);
        let n = func.num_blocks();
        let mut rpo_index = vec![u32::MAX; n];
        for (i, &b) in rpo.iter().enumerate() {
            rpo_index[b.index()] = i as u32;
        }

        let mut idom = vec![INVALID; n];
        if let Some(&entry) = rpo.first() {
            idom[entry.index()] = entry;
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom = INVALID;
                for &pred in &func.block(block).preds {
                    if rpo_index[pred.index()] == u32::MAX || idom[pred.index()] == INVALID {
                        continue;
                    }
                    new_idom = if new_idom == INVALID {
                        pred
                    } else {
                        intersect(&idom, &rpo_index, new_idom, pred)
                    };
                }
                if new_idom != INVALID && idom[block.index()] != new_idom {
                    idom[block.index()] = new_idom;
                    changed = true;
                }
            }
        }

        let mut children = vec![Vec::new(); n];
        for &block in rpo.iter().skip(1) {
            children[idom[block.index()].index()].push(block);
        }

        let mut frontier: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for &block in &rpo {
            if func.block(block).preds.len() < 2 {
                continue;
            }
            for &pred in &func.block(block).preds {
                if rpo_index[pred.index()] == u32::MAX {
                    continue;
                }
                let mut runner = pred;
                while runner != idom[block.index()] {
                    if !frontier[runner.index()].contains(&block) {
                        frontier[runner.index()].push(block);
                    }
                    runner = idom[runner.index()];
                }
            }
        }

        DomTree { rpo, rpo_index, idom, children, frontier }
    }

    /// Blocks reachable from entry, in reverse post-order.
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_index[block.index()] != u32::MAX
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        let idom = self.idom[block.index()];
        if idom == INVALID || idom == block {
            None
        } else {
            Some(idom)
        }
    }

    /// Dominator-tree children of a block.
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        &self.children[block.index()]
    }

    /// Dominance frontier of a block.
    pub fn frontier(&self, block: BlockId) -> &[BlockId] {
        &self.frontier[block.index()]
    }

    /// Whether `a` dominates `b`. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        // Dominators always precede their subtree in reverse post-order.
        let bound = self.rpo_index[a.index()];
        let mut walk = b;
        while self.rpo_index[walk.index()] > bound {
            walk = self.idom[walk.index()];
        }
        walk == a
    }
}

fn intersect(idom: &[BlockId], rpo_index: &[u32], a: BlockId, b: BlockId) -> BlockId {
    let mut a = a;
    let mut b = b;
    while a != b {
        while rpo_index[a.index()] > rpo_index[b.index()] {
            a = idom[a.index()];
        }
        while rpo_index[b.index()] > rpo_index[a.index()] {
            b = idom[b.index()];
        }
    }
    a
}
