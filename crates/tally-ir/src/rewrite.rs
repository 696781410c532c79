//! Copy-on-write rewriting over IR trees.
//!
//! A [`Rewriter`] maps a tree to a new tree. The contract every transform
//! leans on: **an untouched subtree comes back reference-identical**. The
//! default hooks rewrite children and rebuild a node only when at least one
//! child actually changed, so a rewrite that touches nothing returns the
//! original root (`Arc::ptr_eq` holds), and a rewrite that touches one leaf
//! shares every off-path sibling with the input tree.
//!
//! Override the hooks for the kinds a transform replaces; call
//! [`rewrite_children`] from an override when the replacement still wants
//! its children processed first.
//!
//! Depth accounting mirrors [`accept`](crate::node::IrNode::accept): it
//! lives in [`rewrite_node`], never in individual rewriters.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tally_ir::rewrite::{rewrite_children, rewrite_node, Rewriter};
//! use tally_ir::{DepthExceeded, IrNode, NodeRef, RecursionGuard, Span};
//!
//! /// Upper-cases every text literal.
//! struct UpperCase;
//!
//! impl Rewriter for UpperCase {
//!     fn rewrite_text(
//!         &mut self,
//!         node: &NodeRef,
//!         value: &str,
//!         _guard: &mut RecursionGuard,
//!     ) -> Result<NodeRef, DepthExceeded> {
//!         Ok(IrNode::text(value.to_uppercase(), node.span()))
//!     }
//! }
//!
//! let root = IrNode::text("abc", Span::zero(0));
//! let out = rewrite_node(&mut UpperCase, &root, &mut RecursionGuard::new()).unwrap();
//! assert!(!Arc::ptr_eq(&root, &out));
//! ```

use crate::foundation::{ScopeAccess, Unit};
use crate::node::{
    BinaryOp, CoercionOp, IrNode, NodeKind, NodeRef, ResolvedObject, UnaryOp,
};
use crate::visit::{DepthExceeded, RecursionGuard};
use indexmap::IndexMap;
use std::sync::Arc;

/// Tree-to-tree transform with per-kind hooks.
///
/// Every hook defaults to [`rewrite_children`], which preserves reference
/// identity for unchanged subtrees.
#[allow(unused_variables)]
pub trait Rewriter: Sized {
    fn rewrite_text(
        &mut self,
        node: &NodeRef,
        value: &str,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_number(
        &mut self,
        node: &NodeRef,
        value: f64,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_decimal(
        &mut self,
        node: &NodeRef,
        value: f64,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_boolean(
        &mut self,
        node: &NodeRef,
        value: bool,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_color(
        &mut self,
        node: &NodeRef,
        argb: u32,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_units(
        &mut self,
        node: &NodeRef,
        value: f64,
        unit: &Unit,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_record(
        &mut self,
        node: &NodeRef,
        fields: &IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_table(
        &mut self,
        node: &NodeRef,
        rows: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_chain(
        &mut self,
        node: &NodeRef,
        items: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_interpolation(
        &mut self,
        node: &NodeRef,
        segments: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_unary(
        &mut self,
        node: &NodeRef,
        op: UnaryOp,
        child: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_binary(
        &mut self,
        node: &NodeRef,
        op: BinaryOp,
        left: &NodeRef,
        right: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_call(
        &mut self,
        node: &NodeRef,
        args: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_lazy(
        &mut self,
        node: &NodeRef,
        child: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_field_access(
        &mut self,
        node: &NodeRef,
        from: &NodeRef,
        field: &str,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_scope_access(
        &mut self,
        node: &NodeRef,
        access: &ScopeAccess,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_resolved(
        &mut self,
        node: &NodeRef,
        object: &ResolvedObject,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }

    fn rewrite_aggregate_coercion(
        &mut self,
        node: &NodeRef,
        op: CoercionOp,
        child: &NodeRef,
        fields: &IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        rewrite_children(self, node, guard)
    }

    fn rewrite_error(
        &mut self,
        node: &NodeRef,
        hint: &str,
        guard: &mut RecursionGuard,
    ) -> Result<NodeRef, DepthExceeded> {
        Ok(Arc::clone(node))
    }
}

/// Rewrite a node, dispatching on its kind.
///
/// The uniform entry point: enters the guard, dispatches to the matching
/// hook, leaves the guard. Transforms call this on the root; hooks call it
/// (through [`rewrite_children`]) on children.
pub fn rewrite_node<R: Rewriter>(
    rewriter: &mut R,
    node: &NodeRef,
    guard: &mut RecursionGuard,
) -> Result<NodeRef, DepthExceeded> {
    guard.enter(node.span())?;
    let result = match &node.kind {
        NodeKind::Text(value) => rewriter.rewrite_text(node, value, guard),
        NodeKind::Number(value) => rewriter.rewrite_number(node, *value, guard),
        NodeKind::Decimal(value) => rewriter.rewrite_decimal(node, *value, guard),
        NodeKind::Boolean(value) => rewriter.rewrite_boolean(node, *value, guard),
        NodeKind::Color(argb) => rewriter.rewrite_color(node, *argb, guard),
        NodeKind::Units { value, unit } => rewriter.rewrite_units(node, *value, unit, guard),
        NodeKind::Record(fields) => rewriter.rewrite_record(node, fields, guard),
        NodeKind::Table(rows) => rewriter.rewrite_table(node, rows, guard),
        NodeKind::Chain(items) => rewriter.rewrite_chain(node, items, guard),
        NodeKind::Interpolation(segments) => {
            rewriter.rewrite_interpolation(node, segments, guard)
        }
        NodeKind::Unary { op, child } => rewriter.rewrite_unary(node, *op, child, guard),
        NodeKind::Binary { op, left, right } => {
            rewriter.rewrite_binary(node, *op, left, right, guard)
        }
        NodeKind::Call { args, .. } => rewriter.rewrite_call(node, args, guard),
        NodeKind::Lazy(child) => rewriter.rewrite_lazy(node, child, guard),
        NodeKind::FieldAccess { from, field } => {
            rewriter.rewrite_field_access(node, from, field, guard)
        }
        NodeKind::ScopeAccess(access) => rewriter.rewrite_scope_access(node, access, guard),
        NodeKind::Resolved(object) => rewriter.rewrite_resolved(node, object, guard),
        NodeKind::AggregateCoercion {
            op, child, fields, ..
        } => rewriter.rewrite_aggregate_coercion(node, *op, child, fields, guard),
        NodeKind::Error { hint } => rewriter.rewrite_error(node, hint, guard),
    };
    guard.leave();
    result
}

/// Rewrite every child of a node, rebuilding the node only on change.
///
/// Returns the original `Arc` when every child came back identical. Hooks
/// that rebuild a node must not reuse this node's `Arc`; a changed child
/// always produces a fresh allocation with the parent's original context.
pub fn rewrite_children<R: Rewriter>(
    rewriter: &mut R,
    node: &NodeRef,
    guard: &mut RecursionGuard,
) -> Result<NodeRef, DepthExceeded> {
    let kind = match &node.kind {
        NodeKind::Text(_)
        | NodeKind::Number(_)
        | NodeKind::Decimal(_)
        | NodeKind::Boolean(_)
        | NodeKind::Color(_)
        | NodeKind::Units { .. }
        | NodeKind::ScopeAccess(_)
        | NodeKind::Resolved(_)
        | NodeKind::Error { .. } => None,
        NodeKind::Record(fields) => {
            rewrite_field_map(rewriter, fields, guard)?.map(NodeKind::Record)
        }
        NodeKind::Table(rows) => rewrite_list(rewriter, rows, guard)?.map(NodeKind::Table),
        NodeKind::Chain(items) => rewrite_list(rewriter, items, guard)?.map(NodeKind::Chain),
        NodeKind::Interpolation(segments) => {
            rewrite_list(rewriter, segments, guard)?.map(NodeKind::Interpolation)
        }
        NodeKind::Unary { op, child } => {
            let new_child = rewrite_node(rewriter, child, guard)?;
            (!Arc::ptr_eq(&new_child, child)).then(|| NodeKind::Unary {
                op: *op,
                child: new_child,
            })
        }
        NodeKind::Binary { op, left, right } => {
            let new_left = rewrite_node(rewriter, left, guard)?;
            let new_right = rewrite_node(rewriter, right, guard)?;
            (!Arc::ptr_eq(&new_left, left) || !Arc::ptr_eq(&new_right, right)).then(|| {
                NodeKind::Binary {
                    op: *op,
                    left: new_left,
                    right: new_right,
                }
            })
        }
        NodeKind::Call {
            function,
            args,
            scope,
        } => rewrite_list(rewriter, args, guard)?.map(|new_args| NodeKind::Call {
            function: Arc::clone(function),
            args: new_args,
            scope: *scope,
        }),
        NodeKind::Lazy(child) => {
            let new_child = rewrite_node(rewriter, child, guard)?;
            (!Arc::ptr_eq(&new_child, child)).then(|| NodeKind::Lazy(new_child))
        }
        NodeKind::FieldAccess { from, field } => {
            let new_from = rewrite_node(rewriter, from, guard)?;
            (!Arc::ptr_eq(&new_from, from)).then(|| NodeKind::FieldAccess {
                from: new_from,
                field: field.clone(),
            })
        }
        NodeKind::AggregateCoercion {
            op,
            scope,
            child,
            fields,
        } => {
            let new_child = rewrite_node(rewriter, child, guard)?;
            let new_fields = rewrite_field_map(rewriter, fields, guard)?;
            if Arc::ptr_eq(&new_child, child) && new_fields.is_none() {
                None
            } else {
                Some(NodeKind::AggregateCoercion {
                    op: *op,
                    scope: *scope,
                    child: new_child,
                    fields: new_fields.unwrap_or_else(|| fields.clone()),
                })
            }
        }
    };

    Ok(match kind {
        Some(kind) => Arc::new(IrNode {
            kind,
            context: node.context.clone(),
        }),
        None => Arc::clone(node),
    })
}

/// Rewrite an ordered list of children.
///
/// Returns `None` when every child is unchanged; otherwise a new list that
/// shares the unchanged elements. The copy happens lazily at the first
/// change, so the all-identical case allocates nothing.
pub fn rewrite_list<R: Rewriter>(
    rewriter: &mut R,
    items: &[NodeRef],
    guard: &mut RecursionGuard,
) -> Result<Option<Vec<NodeRef>>, DepthExceeded> {
    let mut changed: Option<Vec<NodeRef>> = None;
    for (idx, item) in items.iter().enumerate() {
        let new = rewrite_node(rewriter, item, guard)?;
        match &mut changed {
            Some(out) => out.push(new),
            None if !Arc::ptr_eq(&new, item) => {
                let mut out = Vec::with_capacity(items.len());
                out.extend(items[..idx].iter().cloned());
                out.push(new);
                changed = Some(out);
            }
            None => {}
        }
    }
    Ok(changed)
}

/// Rewrite a name-keyed map of children, preserving insertion order.
///
/// Same contract as [`rewrite_list`]: `None` means nothing changed.
pub fn rewrite_field_map<R: Rewriter>(
    rewriter: &mut R,
    fields: &IndexMap<String, NodeRef>,
    guard: &mut RecursionGuard,
) -> Result<Option<IndexMap<String, NodeRef>>, DepthExceeded> {
    let mut changed: Option<IndexMap<String, NodeRef>> = None;
    for (idx, (name, value)) in fields.iter().enumerate() {
        let new = rewrite_node(rewriter, value, guard)?;
        match &mut changed {
            Some(out) => {
                out.insert(name.clone(), new);
            }
            None if !Arc::ptr_eq(&new, value) => {
                let mut out = IndexMap::with_capacity(fields.len());
                for (prev_name, prev_value) in fields.iter().take(idx) {
                    out.insert(prev_name.clone(), Arc::clone(prev_value));
                }
                out.insert(name.clone(), new);
                changed = Some(out);
            }
            None => {}
        }
    }
    Ok(changed)
}
