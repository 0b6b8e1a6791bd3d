// This module is the hub for the lowering passes and the pipeline driver. Each pass
// is a free function wrapped in a unit struct implementing the Pass trait, which
// returns a progress flag: true when the IR changed, false when the pass had
// nothing to do. "No progress" is a normal outcome that lets a fixed-point pass
// scheduler terminate. The Pipeline runs the fixed backend order: SSA repair, then
// reindexing, then pseudo-op expansion, then uniform legalization, then shuffle
// divergence safety. The ordering is load-bearing: repair and reindex must precede
// any liveness run, and pseudo lowering can introduce new uniform reads and
// shuffles that the later legalization passes must still see. Liveness itself is
// invoked by the register-allocator consumer between reindexing and pseudo
// lowering, outside this driver.

//! Lowering passes and the pipeline driver.

pub mod legalize_uniform;
pub mod lower_pseudo;
pub mod reindex;
pub mod shuffle_safety;
pub mod ssa_repair;

use crate::error::IrResult;
use crate::ir::Function;

pub use legalize_uniform::{legalize_uniform, uniform_rule, UniformRule};
pub use lower_pseudo::lower_pseudo;
pub use reindex::reindex;
pub use shuffle_safety::lower_shuffle_safety;
pub use ssa_repair::repair_ssa;

/// A single IR transformation with a progress flag.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Run the pass; `Ok(true)` means the IR changed.
    fn run(&mut self, func: &mut Function) -> IrResult<bool>;
}

/// SSA repair as a pipeline pass.
pub struct SsaRepair;

impl Pass for SsaRepair {
    fn name(&self) -> &'static str {
        "ssa-repair"
    }

    fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        repair_ssa(func)
    }
}

/// Value-id compaction as a pipeline pass.
pub struct Reindex;

impl Pass for Reindex {
    fn name(&self) -> &'static str {
        "reindex"
    }

    fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        reindex(func)
    }
}

/// Pseudo-op expansion as a pipeline pass.
pub struct LowerPseudo;

impl Pass for LowerPseudo {
    fn name(&self) -> &'static str {
        "lower-pseudo"
    }

    fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        lower_pseudo(func)
    }
}

/// Uniform-source legalization as a pipeline pass.
pub struct LegalizeUniform;

impl Pass for LegalizeUniform {
    fn name(&self) -> &'static str {
        "legalize-uniform"
    }

    fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        legalize_uniform(func)
    }
}

/// Shuffle divergence-safety as a pipeline pass.
pub struct ShuffleSafety;

impl Pass for ShuffleSafety {
    fn name(&self) -> &'static str {
        "shuffle-safety"
    }

    fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        lower_shuffle_safety(func)
    }
}

/// Ordered sequence of passes run over one function.
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    /// The fixed backend lowering order.
    pub fn lowering() -> Pipeline {
        Pipeline {
            passes: vec![
                Box::new(SsaRepair),
                Box::new(Reindex),
                Box::new(LowerPseudo),
                Box::new(LegalizeUniform),
                Box::new(ShuffleSafety),
            ],
        }
    }

    /// A custom pass sequence.
    pub fn with_passes(passes: Vec<Box<dyn Pass>>) -> Pipeline {
        Pipeline { passes }
    }

    /// Run every pass in order. `Ok(true)` if any pass changed the IR; an
    /// error aborts the one compilation job.
    pub fn run(&mut self, func: &mut Function) -> IrResult<bool> {
        let mut progress = false;
        for pass in &mut self.passes {
            let changed = pass.run(func)?;
            log::debug!(
                "pass {}: {}",
                pass.name(),
                if changed { "changed" } else { "no change" }
            );
            progress |= changed;
        }
        Ok(progress)
    }
}
