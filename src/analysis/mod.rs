//! Analyses over the backend IR.
//!
//! - [`bitset`] - arena-allocated dense bit-vectors keyed by value id.
//! - [`dominance`] - dominator tree and frontiers, a pure function of CFG
//!   shape consumed by SSA repair.
//! - [`liveness`] - backward worklist dataflow producing live-in/live-out
//!   sets and per-use kill flags for the register allocator.

pub mod bitset;
pub mod dominance;
pub mod liveness;

pub use bitset::BitSet;
pub use dominance::{reverse_postorder, DomTree};
pub use liveness::Liveness;
