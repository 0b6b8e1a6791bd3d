// This module implements SSA reindexing: compacting a sparse, gap-riddled value-id
// space left behind by insert/delete activity onto the dense range [0, N), where N
// is exactly the number of values still defined, and resetting the Function's
// allocator to N. The renaming is a bijection on surviving ids that preserves every
// definition/use relationship. Two full traversals are required in this order: the
// first walks all instructions in program order assigning each SSA destination a
// fresh dense id into an old-to-new table sized to the old high-water mark, the
// second rewrites every SSA source through that table. The two-phase structure
// removes any dependency on def-before-use program order; a single-pass rewrite
// would silently require it.

//! Value-id compaction onto a dense prefix.

use crate::error::{IrError, IrResult};
use crate::ir::{Function, InstrId, Value, ValueId};

/// Renumber all SSA values onto `[0, N)` and reset the allocator to `N`.
pub fn reindex(func: &mut Function) -> IrResult<bool> {
    let old_alloc = func.alloc() as usize;
    let mut table = vec![u32::MAX; old_alloc];
    let mut next: u32 = 0;
    let mut changed = false;

    let order: Vec<InstrId> = func.program_order().collect();

    // Pass 1: definitions, program order.
    for &id in &order {
        let instr = func.instr_mut(id);
        for dest in &mut instr.dests {
            if let Value::Ssa { id: value, size } = *dest {
                if value.index() >= old_alloc {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
                if table[value.index()] != u32::MAX {
                    return Err(IrError::MultipleDefinitions { value: value.0 });
                }
                table[value.index()] = next;
                changed |= next != value.0;
                *dest = Value::ssa(ValueId(next), size);
                next += 1;
            }
        }
    }

    // Pass 2: uses, through the table.
    for &id in &order {
        let instr = func.instr_mut(id);
        for src in &mut instr.srcs {
            if let Value::Ssa { id: value, size } = src.value {
                if value.index() >= old_alloc {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
                let mapped = table[value.index()];
                if mapped == u32::MAX {
                    return Err(IrError::DanglingSource { value: value.0 });
                }
                src.value = Value::ssa(ValueId(mapped), size);
            }
        }
    }

    changed |= next as usize != old_alloc;
    log::debug!("reindex: {} -> {} values", old_alloc, next);
    func.set_alloc(next);
    Ok(changed)
}
