//! Foundation types shared across the IR.
//!
//! Everything here is metadata the binder produces and the IR merely
//! carries: source locations, result types, and lambda-scope symbols.

pub mod scope;
pub mod span;
pub mod types;

pub use scope::{ScopeAccess, ScopeId, ScopeSymbol};
pub use span::{SourceFile, SourceMap, Span};
pub use types::{ResultType, RowType, Unit};
