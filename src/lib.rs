//! gpir - SSA IR pipeline for a GPU shader-compiler backend.
//!
//! This crate owns the backend's intermediate representation and the passes
//! that prepare it for register allocation and binary encoding: liveness
//! analysis with per-use kill flags, SSA repair and value-id reindexing,
//! pseudo-instruction expansion, uniform-operand legalization and shuffle
//! divergence-safety lowering.
//!
//! # Primary Usage
//!
//! ```
//! use gpir::ir::{Function, Instr, Opcode, SizeClass, Src, Value};
//! use gpir::passes::Pipeline;
//! use gpir::analysis::Liveness;
//! use bumpalo::Bump;
//!
//! // Instruction selection (out of scope here) builds the initial IR.
//! let mut func = Function::new();
//! let b0 = func.add_block();
//! let x = func.new_temp(SizeClass::Word);
//! func.push(b0, Instr::new(Opcode::LoadImm, vec![x], vec![Src::new(Value::imm(1))]));
//!
//! // Lower it for encoding.
//! Pipeline::lowering().run(&mut func).unwrap();
//!
//! // The register allocator consumes liveness from a per-run arena.
//! let arena = Bump::new();
//! let live = Liveness::compute(&mut func, &arena);
//! assert!(live.live_out(b0).is_empty());
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - value/instruction/block model, printer and verifier
//! - [`analysis`] - bit sets, dominance, liveness
//! - [`passes`] - repair, reindex and the legalization pipeline
//! - [`error`] - fatal internal-consistency errors
//!
//! Each compilation job owns its own [`ir::Function`] and shares nothing
//! mutable with concurrent jobs; the only cross-job state is the read-only
//! uniform acceptance table in [`passes::uniform_rule`].

pub mod analysis;
pub mod error;
pub mod ir;
pub mod passes;

pub use analysis::{BitSet, DomTree, Liveness};
pub use error::{IrError, IrResult};
pub use ir::{
    Block, BlockId, Function, Instr, InstrData, InstrId, Opcode, SizeClass, Src, Value, ValueId,
};
pub use passes::{Pass, Pipeline};
