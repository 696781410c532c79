// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Intermediate representation for the Tally formula engine.
//!
//! This crate defines the typed expression tree a binder hands to the
//! transform pipeline and, eventually, to the evaluator:
//!
//! - [`node`] — the closed set of IR node kinds, each carrying an
//!   [`IrContext`](node::IrContext) (result type + source span)
//! - [`foundation`] — spans, result types, and scope symbols
//! - [`function`] — function signatures and the builtin registry
//! - [`visit`] — per-kind visitor dispatch with a uniform recursion guard
//! - [`rewrite`] — the generic copy-on-write rewriting engine
//! - [`compact`] — the canonical compact string format used by tooling
//!
//! Trees are immutable once built: passes replace subtrees, never mutate
//! them in place. Children are reference counted ([`node::NodeRef`]) so a
//! rewrite that touches one leaf of a wide node shares every untouched
//! sibling with the original tree.

pub mod compact;
pub mod foundation;
pub mod function;
pub mod node;
pub mod rewrite;
pub mod visit;

// Re-export commonly used types
pub use foundation::{
    ResultType, RowType, ScopeAccess, ScopeId, ScopeSymbol, SourceFile, SourceMap, Span, Unit,
};
pub use function::{FunctionRegistry, FunctionSig};
pub use node::{
    BinaryOp, CoercionOp, IrContext, IrNode, NodeKind, NodeRef, ResolvedObject, ResolvedValue,
    UnaryOp,
};
pub use visit::{DepthExceeded, NodeVisitor, RecursionGuard, DEFAULT_MAX_DEPTH};
