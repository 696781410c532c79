//! Tree normalization.
//!
//! The binder lowers uniformly and leaves degenerate wrappers behind: a
//! chain around a single expression, an interpolation holding one plain
//! text segment. [`CollapseSingletons`] strips them so later stages and
//! the evaluator see the smallest equivalent tree.
//!
//! Built on the copy-on-write rewriter, so a formula with nothing to
//! collapse comes back reference-identical.

use crate::diag::Diagnostics;
use crate::pipeline::{PipelineOptions, Transform};
use std::sync::Arc;
use tally_ir::rewrite::{rewrite_children, rewrite_node, Rewriter};
use tally_ir::visit::DepthExceeded;
use tally_ir::{NodeKind, NodeRef, RecursionGuard};
use tracing::trace;

/// Collapses single-child `Chain` and single-text `Interpolation` nodes.
pub struct CollapseSingletons;

impl Transform for CollapseSingletons {
    fn name(&self) -> &str {
        "collapse-singletons"
    }

    fn apply(
        &self,
        root: NodeRef,
        options: &PipelineOptions,
        _diags: &mut Diagnostics,
    ) -> Result<NodeRef, DepthExceeded> {
        let out = rewrite_node(&mut Collapse, &root, &mut options.guard())?;
        if !Arc::ptr_eq(&out, &root) {
            trace!("collapsed degenerate wrappers");
        }
        Ok(out)
    }
}

struct Collapse;

impl Rewriter for Collapse {
    fn rewrite_chain(
        &mut self,
        node: &NodeRef,
        _items: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        // children first, so a chain that becomes degenerate by inner
        // collapsing is caught too
        let rewritten = rewrite_children(self, node, guard)?;
        if let NodeKind::Chain(items) = &rewritten.kind {
            if let [only] = items.as_slice() {
                return Ok(Arc::clone(only));
            }
        }
        Ok(rewritten)
    }

    fn rewrite_interpolation(
        &mut self,
        node: &NodeRef,
        _segments: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        let rewritten = rewrite_children(self, node, guard)?;
        if let NodeKind::Interpolation(segments) = &rewritten.kind {
            if let [only] = segments.as_slice() {
                if matches!(only.kind, NodeKind::Text(_)) {
                    return Ok(Arc::clone(only));
                }
            }
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ir::{BinaryOp, IrNode, ResultType, Span};

    fn span() -> Span {
        Span::zero(0)
    }

    fn run(root: NodeRef) -> NodeRef {
        let mut diags = Diagnostics::new();
        CollapseSingletons
            .apply(root, &PipelineOptions::default(), &mut diags)
            .unwrap()
    }

    #[test]
    fn singleton_chain_collapses_to_its_child() {
        let inner = IrNode::number(7.0, span());
        let root = IrNode::chain(vec![Arc::clone(&inner)], span());
        let out = run(root);
        assert!(Arc::ptr_eq(&out, &inner));
    }

    #[test]
    fn multi_item_chain_is_untouched() {
        let root = IrNode::chain(
            vec![IrNode::text("drop", span()), IrNode::number(1.0, span())],
            span(),
        );
        let out = run(Arc::clone(&root));
        assert!(Arc::ptr_eq(&out, &root));
    }

    #[test]
    fn single_text_interpolation_becomes_the_text() {
        let text = IrNode::text("hello", span());
        let root = IrNode::interpolation(vec![Arc::clone(&text)], span());
        let out = run(root);
        assert!(Arc::ptr_eq(&out, &text));
    }

    #[test]
    fn single_expression_interpolation_is_kept() {
        // a lone non-text segment still needs the to-text conversion the
        // interpolation node implies
        let root = IrNode::interpolation(vec![IrNode::number(1.0, span())], span());
        let out = run(Arc::clone(&root));
        assert!(Arc::ptr_eq(&out, &root));
    }

    #[test]
    fn nested_wrappers_collapse_through_parents() {
        let inner = IrNode::number(2.0, span());
        let chain = IrNode::chain(vec![Arc::clone(&inner)], span());
        let sibling = IrNode::number(1.0, span());
        let root = IrNode::binary(
            BinaryOp::Add,
            Arc::clone(&sibling),
            chain,
            ResultType::Number,
            span(),
        );

        let out = run(root);
        let NodeKind::Binary { left, right, .. } = &out.kind else {
            panic!("expected binary");
        };
        assert!(Arc::ptr_eq(left, &sibling));
        assert!(Arc::ptr_eq(right, &inner));
    }
}
