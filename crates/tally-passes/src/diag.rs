//! Diagnostics emitted by transforms.
//!
//! Transforms never fail with a Rust error for user-level problems; they
//! push [`Diagnostic`]s and let the pipeline decide whether to continue.
//! Only [`DepthExceeded`](tally_ir::DepthExceeded) propagates as an error,
//! and the pipeline converts it to a critical diagnostic at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use tally_ir::{SourceMap, Span};

/// How bad a diagnostic is.
///
/// Everything above [`Warning`](Severity::Warning) blocks the pipeline;
/// warnings and below are advisory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// Tracing-level detail, normally filtered out
    Verbose,
    /// The formula works but could be written better
    Suggestion,
    /// Suspicious but evaluable
    Warning,
    /// Broken in a recoverable way
    Moderate,
    /// Broken; evaluation would produce wrong results
    Severe,
    /// Broken; continuing the pipeline is pointless
    Critical,
}

impl Severity {
    /// Check whether this severity halts the pipeline.
    pub fn is_blocking(&self) -> bool {
        *self > Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Verbose => "verbose",
            Severity::Suggestion => "suggestion",
            Severity::Warning => "warning",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// Category of a diagnostic, for filtering and stable formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagKind {
    /// A scope reference escaped its introducing call, or a scope id was
    /// introduced twice
    ScopeIntegrity,
    /// The tree is deeper than the configured limit
    DepthLimit,
    /// Advisory from a normalization transform
    Normalize,
    /// Anything a transform reports that has no narrower category
    Transform,
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagKind::ScopeIntegrity => "scope-integrity",
            DiagKind::DepthLimit => "depth-limit",
            DiagKind::Normalize => "normalize",
            DiagKind::Transform => "transform",
        };
        write!(f, "{name}")
    }
}

/// One finding against one formula location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    /// Extra lines rendered after the snippet
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with no notes.
    pub fn new(
        kind: DiagKind,
        severity: Severity,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            span,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Attach a note (builder style).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Ordered collection of diagnostics from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    /// Check whether any diagnostic blocks the pipeline.
    pub fn has_blocking(&self) -> bool {
        self.items.iter().any(|d| d.severity.is_blocking())
    }

    /// The worst severity seen, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.items.iter().map(|d| d.severity).max()
    }

    /// Iterate the diagnostics in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Renders diagnostics against their source text.
///
/// ```text
/// severe[scope-integrity]: reference to scope 3 outside its introducing call
///   --> commission:1:8
///    |
///  1 | Name & Age
///    |        ^^^
///    = note: scopes are only visible inside the call that introduces them
/// ```
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// A formatter over the given sources.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Render one diagnostic.
    pub fn format(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}[{}]: {}\n", diag.severity, diag.kind, diag.message);

        let source = self.sources.source(&diag.span);
        let (line, col) = self.sources.line_col(&diag.span);
        out.push_str(&format!("  --> {}:{}:{}\n", source.name, line, col));

        if let Some(text) = source.line_text(line) {
            let text = text.trim_end_matches('\n');
            let gutter = line.to_string().len().max(2);
            out.push_str(&format!("{:gutter$} |\n", ""));
            out.push_str(&format!("{line:gutter$} | {text}\n"));
            let underline = "^".repeat((diag.span.len() as usize).max(1));
            out.push_str(&format!(
                "{:gutter$} | {:pad$}{underline}\n",
                "",
                "",
                pad = (col as usize).saturating_sub(1)
            ));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        out
    }

    /// Render a whole collection.
    pub fn format_all(&self, diags: &Diagnostics) -> String {
        diags.iter().map(|d| self.format(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_and_blocking() {
        assert!(Severity::Verbose < Severity::Suggestion);
        assert!(Severity::Suggestion < Severity::Warning);
        assert!(Severity::Warning < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
        assert!(Severity::Severe < Severity::Critical);

        assert!(!Severity::Warning.is_blocking());
        assert!(Severity::Moderate.is_blocking());
    }

    #[test]
    fn collection_tracks_worst_severity() {
        let mut diags = Diagnostics::new();
        assert!(diags.max_severity().is_none());
        assert!(!diags.has_blocking());

        diags.push(Diagnostic::new(
            DiagKind::Normalize,
            Severity::Suggestion,
            Span::zero(0),
            "could be simpler",
        ));
        assert!(!diags.has_blocking());

        diags.push(Diagnostic::new(
            DiagKind::ScopeIntegrity,
            Severity::Severe,
            Span::zero(0),
            "scope escaped",
        ));
        assert!(diags.has_blocking());
        assert_eq!(diags.max_severity(), Some(Severity::Severe));
    }

    #[test]
    fn formatter_underlines_the_span() {
        let mut sources = SourceMap::new();
        let id = sources.add_source("commission".into(), "Name & Age".into());
        let diag = Diagnostic::new(
            DiagKind::Transform,
            Severity::Warning,
            Span::new(id, 7, 10, 1),
            "suspicious operand",
        )
        .with_note("expected text");

        let rendered = DiagnosticFormatter::new(&sources).format(&diag);
        assert!(rendered.starts_with("warning[transform]: suspicious operand\n"));
        assert!(rendered.contains("--> commission:1:8"));
        assert!(rendered.contains(" 1 | Name & Age"));
        assert!(rendered.contains("^^^"));
        assert!(rendered.contains("= note: expected text"));
    }
}
