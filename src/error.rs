// This module defines error types for the gpir pipeline using the thiserror crate for
// idiomatic Rust error handling. IrError is the main error enum covering the fatal
// internal-consistency failures a pass can detect: dangling sources, duplicate SSA
// definitions, phi arity mismatches and misplaced phis, malformed CFG edges, scratch
// register collisions, and unfolded modifiers on uniform sources. Each variant carries
// the offending value/block indices for debugging. Any IrError aborts compilation of
// the one shader job in question; none of these conditions is recoverable, since
// continuing would risk a miscompile. The module also provides IrResult<T> as a
// convenience alias for Result<T, IrError>.

//! Error types for the IR pipeline.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Fatal internal-consistency failures detected by analyses and passes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("dangling source: value %{value} has no reaching definition")]
    DanglingSource { value: u32 },

    #[error("value %{value} has more than one definition")]
    MultipleDefinitions { value: u32 },

    #[error("phi in block b{block} has {got} sources for {want} predecessors")]
    PhiArity { block: u32, got: usize, want: usize },

    #[error("phi below a non-phi instruction in block b{block}")]
    MisplacedPhi { block: u32 },

    #[error("block b{block} has {count} successors, structured CFG allows at most two")]
    TooManySuccessors { block: u32, count: usize },

    #[error("branch in block b{block} targets b{target}, which is not a successor")]
    BadBranchTarget { block: u32, target: u32 },

    #[error("edge b{from} -> b{to} is not mirrored in the predecessor list")]
    BrokenEdge { from: u32, to: u32 },

    #[error("instruction in block b{block} carries a back-reference to b{claimed}")]
    BlockRefMismatch { block: u32, claimed: u32 },

    #[error("scratch register touched outside shuffle lowering in block b{block}")]
    ScratchClash { block: u32 },

    #[error("uniform source carries an unfolded {modifier} modifier")]
    UnfoldedModifier { modifier: &'static str },
}

/// Result type alias for pipeline operations.
pub type IrResult<T> = Result<T, IrError>;
