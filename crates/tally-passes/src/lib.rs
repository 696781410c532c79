// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Passes over the Tally IR.
//!
//! Everything between the binder and the evaluator lives here:
//!
//! - [`pipeline`] — ordered, named transforms with halt-on-blocking
//! - [`diag`] — severities, diagnostics, and the source-aware formatter
//! - [`dependencies`] — which entity fields a formula reads
//! - [`scopes`] — lambda-scope integrity verification
//! - [`normalize`] — degenerate-wrapper collapsing
//!
//! A typical run:
//!
//! ```
//! use tally_ir::{IrNode, Span};
//! use tally_passes::diag::Diagnostics;
//! use tally_passes::normalize::CollapseSingletons;
//! use tally_passes::pipeline::{Pipeline, PipelineOptions};
//! use tally_passes::scopes::ScopeCheck;
//!
//! let pipeline = Pipeline::new().with(CollapseSingletons).with(ScopeCheck);
//! let mut diags = Diagnostics::new();
//! let root = IrNode::chain(vec![IrNode::number(1.0, Span::zero(0))], Span::zero(0));
//! let run = pipeline.run(root, &PipelineOptions::default(), &mut diags);
//! assert!(run.completed());
//! ```

pub mod dependencies;
pub mod diag;
pub mod normalize;
pub mod pipeline;
pub mod scopes;

pub use dependencies::{extract_dependencies, DependencyInfo, FieldRead};
pub use diag::{DiagKind, Diagnostic, DiagnosticFormatter, Diagnostics, Severity};
pub use normalize::CollapseSingletons;
pub use pipeline::{Pipeline, PipelineOptions, PipelineRun, Transform};
pub use scopes::{verify_scopes, ScopeCheck, AMBIENT_SCOPE};
