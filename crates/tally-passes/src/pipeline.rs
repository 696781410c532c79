//! Ordered transform pipeline.
//!
//! A [`Pipeline`] runs named [`Transform`]s over a tree in registration
//! order. Each transform maps the current root to a new root (reference
//! identity preserved when it changes nothing) and pushes diagnostics as
//! it goes. A blocking diagnostic halts the pipeline after the transform
//! that produced it; warnings and below never do.
//!
//! A tree deeper than [`PipelineOptions::max_depth`] aborts the offending
//! transform with [`DepthExceeded`]; the pipeline converts that to a
//! critical diagnostic and halts, so callers see one uniform failure
//! channel.

use crate::diag::{DiagKind, Diagnostic, Diagnostics, Severity};
use serde::{Deserialize, Serialize};
use tally_ir::visit::DepthExceeded;
use tally_ir::{NodeRef, RecursionGuard, DEFAULT_MAX_DEPTH};
use tracing::{debug, warn};

/// Knobs shared by every transform in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Traversal depth limit applied by every transform
    pub max_depth: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl PipelineOptions {
    /// A fresh guard honoring the configured depth limit.
    pub fn guard(&self) -> RecursionGuard {
        RecursionGuard::with_limit(self.max_depth)
    }
}

/// One named pass over the tree.
pub trait Transform {
    /// Stable name, used in logs and halt reporting.
    fn name(&self) -> &str;

    /// Map the root to a new root, pushing findings into `diags`.
    ///
    /// Must return the input root unchanged (same `Arc`) when the
    /// transform has nothing to do.
    fn apply(
        &self,
        root: NodeRef,
        options: &PipelineOptions,
        diags: &mut Diagnostics,
    ) -> Result<NodeRef, DepthExceeded>;
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// The tree after the last transform that ran
    pub root: NodeRef,
    /// Name of the transform after which the pipeline halted, if it did
    pub halted_after: Option<String>,
}

impl PipelineRun {
    /// Check whether every transform ran to completion.
    pub fn completed(&self) -> bool {
        self.halted_after.is_none()
    }
}

/// Ordered collection of transforms.
#[derive(Default)]
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform (builder style).
    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Append a transform.
    pub fn push(&mut self, transform: impl Transform + 'static) {
        self.transforms.push(Box::new(transform));
    }

    /// Number of registered transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check whether no transforms are registered.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run every transform in order, stopping at the first blocking
    /// diagnostic.
    pub fn run(
        &self,
        root: NodeRef,
        options: &PipelineOptions,
        diags: &mut Diagnostics,
    ) -> PipelineRun {
        let mut current = root;
        for transform in &self.transforms {
            let before = diags.len();
            debug!(transform = transform.name(), "running transform");

            current = match transform.apply(current.clone(), options, diags) {
                Ok(next) => next,
                Err(depth) => {
                    warn!(
                        transform = transform.name(),
                        limit = depth.limit,
                        "transform aborted: tree too deep"
                    );
                    diags.push(Diagnostic::new(
                        DiagKind::DepthLimit,
                        Severity::Critical,
                        depth.span,
                        format!(
                            "expression nesting exceeds the limit of {}",
                            depth.limit
                        ),
                    ));
                    return PipelineRun {
                        root: current,
                        halted_after: Some(transform.name().to_string()),
                    };
                }
            };

            if diags.has_blocking() {
                debug!(
                    transform = transform.name(),
                    new_diagnostics = diags.len() - before,
                    "halting: blocking diagnostic"
                );
                return PipelineRun {
                    root: current,
                    halted_after: Some(transform.name().to_string()),
                };
            }
        }
        PipelineRun {
            root: current,
            halted_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ir::{IrNode, Span};

    /// Pushes one diagnostic of a fixed severity, never touches the tree.
    struct Reporter {
        name: &'static str,
        severity: Severity,
    }

    impl Transform for Reporter {
        fn name(&self) -> &str {
            self.name
        }

        fn apply(
            &self,
            root: NodeRef,
            _options: &PipelineOptions,
            diags: &mut Diagnostics,
        ) -> Result<NodeRef, DepthExceeded> {
            diags.push(Diagnostic::new(
                DiagKind::Transform,
                self.severity,
                root.span(),
                format!("{} ran", self.name),
            ));
            Ok(root)
        }
    }

    #[test]
    fn warnings_do_not_halt() {
        let pipeline = Pipeline::new()
            .with(Reporter {
                name: "first",
                severity: Severity::Warning,
            })
            .with(Reporter {
                name: "second",
                severity: Severity::Suggestion,
            });

        let mut diags = Diagnostics::new();
        let run = pipeline.run(
            IrNode::number(1.0, Span::zero(0)),
            &PipelineOptions::default(),
            &mut diags,
        );
        assert!(run.completed());
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn blocking_diagnostic_halts_after_its_transform() {
        let pipeline = Pipeline::new()
            .with(Reporter {
                name: "breaks",
                severity: Severity::Severe,
            })
            .with(Reporter {
                name: "never-runs",
                severity: Severity::Warning,
            });

        let mut diags = Diagnostics::new();
        let run = pipeline.run(
            IrNode::number(1.0, Span::zero(0)),
            &PipelineOptions::default(),
            &mut diags,
        );
        assert_eq!(run.halted_after.as_deref(), Some("breaks"));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn depth_abort_becomes_critical_diagnostic() {
        struct AlwaysTooDeep;

        impl Transform for AlwaysTooDeep {
            fn name(&self) -> &str {
                "too-deep"
            }

            fn apply(
                &self,
                _root: NodeRef,
                options: &PipelineOptions,
                _diags: &mut Diagnostics,
            ) -> Result<NodeRef, DepthExceeded> {
                Err(DepthExceeded {
                    span: Span::zero(0),
                    limit: options.max_depth,
                })
            }
        }

        let pipeline = Pipeline::new().with(AlwaysTooDeep);
        let mut diags = Diagnostics::new();
        let options = PipelineOptions { max_depth: 4 };
        let run = pipeline.run(IrNode::number(1.0, Span::zero(0)), &options, &mut diags);

        assert_eq!(run.halted_after.as_deref(), Some("too-deep"));
        assert_eq!(diags.max_severity(), Some(Severity::Critical));
    }
}
