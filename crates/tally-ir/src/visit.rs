//! Read-only traversal over IR trees.
//!
//! [`NodeVisitor`] has one method per node kind. Kind dispatch is a single
//! `match` in [`IrNode::accept`], so adding a kind breaks every visitor at
//! compile time instead of at runtime. Compound kinds default to visiting
//! their children via [`walk_children`]; leaves default to doing nothing.
//! Override only the kinds a pass cares about.
//!
//! Every traversal threads a [`RecursionGuard`]: depth accounting lives in
//! `accept`, not in individual visitors, so no visitor can forget it. A
//! tree deeper than the guard's limit aborts with [`DepthExceeded`].
//!
//! # Examples
//!
//! ```
//! use tally_ir::{IrNode, NodeVisitor, RecursionGuard, DepthExceeded, Span};
//!
//! struct CountText(usize);
//!
//! impl NodeVisitor for CountText {
//!     fn visit_text(
//!         &mut self,
//!         _node: &tally_ir::IrNode,
//!         _value: &str,
//!         _guard: &mut RecursionGuard,
//!     ) -> Result<(), DepthExceeded> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! let node = IrNode::interpolation(
//!     vec![IrNode::text("a", Span::zero(0)), IrNode::text("b", Span::zero(0))],
//!     Span::zero(0),
//! );
//! let mut counter = CountText(0);
//! node.accept(&mut counter, &mut RecursionGuard::new()).unwrap();
//! assert_eq!(counter.0, 2);
//! ```

use crate::foundation::{ScopeAccess, Span, Unit};
use crate::node::{
    BinaryOp, CoercionOp, IrNode, NodeKind, NodeRef, ResolvedObject, UnaryOp,
};
use indexmap::IndexMap;
use std::error::Error;
use std::fmt;

/// Default traversal depth limit.
///
/// Generous for hand-written formulas (nesting past a few dozen levels is
/// already pathological) while still bounding the stack for synthesized
/// trees.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Traversal abort: the tree is deeper than the guard's limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthExceeded {
    /// Span of the node that crossed the limit
    pub span: Span,
    /// The limit in effect
    pub limit: usize,
}

impl fmt::Display for DepthExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expression nesting exceeds the limit of {}", self.limit)
    }
}

impl Error for DepthExceeded {}

/// Depth accounting for one traversal.
///
/// `enter`/`leave` pair around every node; `accept` and the rewriter do
/// this, visitors never touch it except to pass it through.
#[derive(Debug)]
pub struct RecursionGuard {
    depth: usize,
    limit: usize,
}

impl RecursionGuard {
    /// A guard with the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_DEPTH)
    }

    /// A guard with an explicit limit.
    pub fn with_limit(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    /// Current depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Descend one level, failing when the limit is crossed.
    pub fn enter(&mut self, span: Span) -> Result<(), DepthExceeded> {
        if self.depth >= self.limit {
            return Err(DepthExceeded {
                span,
                limit: self.limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Ascend one level.
    pub fn leave(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced recursion guard");
        self.depth -= 1;
    }
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only visitor over IR trees.
///
/// Compound kinds default to [`walk_children`]; leaves default to `Ok(())`.
#[allow(unused_variables)]
pub trait NodeVisitor: Sized {
    fn visit_text(
        &mut self,
        node: &IrNode,
        value: &str,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_number(
        &mut self,
        node: &IrNode,
        value: f64,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_decimal(
        &mut self,
        node: &IrNode,
        value: f64,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_boolean(
        &mut self,
        node: &IrNode,
        value: bool,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_color(
        &mut self,
        node: &IrNode,
        argb: u32,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_units(
        &mut self,
        node: &IrNode,
        value: f64,
        unit: &Unit,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_record(
        &mut self,
        node: &IrNode,
        fields: &IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_table(
        &mut self,
        node: &IrNode,
        rows: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_chain(
        &mut self,
        node: &IrNode,
        items: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_interpolation(
        &mut self,
        node: &IrNode,
        segments: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_unary(
        &mut self,
        node: &IrNode,
        op: UnaryOp,
        child: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_binary(
        &mut self,
        node: &IrNode,
        op: BinaryOp,
        left: &NodeRef,
        right: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_call(
        &mut self,
        node: &IrNode,
        args: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_lazy(
        &mut self,
        node: &IrNode,
        child: &NodeRef,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_field_access(
        &mut self,
        node: &IrNode,
        from: &NodeRef,
        field: &str,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_scope_access(
        &mut self,
        node: &IrNode,
        access: &ScopeAccess,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_resolved(
        &mut self,
        node: &IrNode,
        object: &ResolvedObject,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }

    fn visit_aggregate_coercion(
        &mut self,
        node: &IrNode,
        op: CoercionOp,
        child: &NodeRef,
        fields: &IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        walk_children(self, node, guard)
    }

    fn visit_error(
        &mut self,
        node: &IrNode,
        hint: &str,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        Ok(())
    }
}

/// Visit every direct child of a node, in evaluation order.
///
/// The building block the default visit methods are made of; an override
/// that still wants its children visited calls this explicitly.
pub fn walk_children<V: NodeVisitor>(
    visitor: &mut V,
    node: &IrNode,
    guard: &mut RecursionGuard,
) -> Result<(), DepthExceeded> {
    match &node.kind {
        NodeKind::Text(_)
        | NodeKind::Number(_)
        | NodeKind::Decimal(_)
        | NodeKind::Boolean(_)
        | NodeKind::Color(_)
        | NodeKind::Units { .. }
        | NodeKind::ScopeAccess(_)
        | NodeKind::Resolved(_)
        | NodeKind::Error { .. } => Ok(()),
        NodeKind::Record(fields) => {
            for child in fields.values() {
                child.accept(visitor, guard)?;
            }
            Ok(())
        }
        NodeKind::Table(rows) => {
            for row in rows {
                row.accept(visitor, guard)?;
            }
            Ok(())
        }
        NodeKind::Chain(items) => {
            for item in items {
                item.accept(visitor, guard)?;
            }
            Ok(())
        }
        NodeKind::Interpolation(segments) => {
            for segment in segments {
                segment.accept(visitor, guard)?;
            }
            Ok(())
        }
        NodeKind::Unary { child, .. } => child.accept(visitor, guard),
        NodeKind::Binary { left, right, .. } => {
            left.accept(visitor, guard)?;
            right.accept(visitor, guard)
        }
        NodeKind::Call { args, .. } => {
            for arg in args {
                arg.accept(visitor, guard)?;
            }
            Ok(())
        }
        NodeKind::Lazy(child) => child.accept(visitor, guard),
        NodeKind::FieldAccess { from, .. } => from.accept(visitor, guard),
        NodeKind::AggregateCoercion { child, fields, .. } => {
            child.accept(visitor, guard)?;
            for coercion in fields.values() {
                coercion.accept(visitor, guard)?;
            }
            Ok(())
        }
    }
}

impl IrNode {
    /// Dispatch a visitor on this node's kind.
    ///
    /// Enters the guard before dispatch and leaves it after, so depth
    /// accounting is uniform across all visitors.
    pub fn accept<V: NodeVisitor>(
        &self,
        visitor: &mut V,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        guard.enter(self.span())?;
        let result = match &self.kind {
            NodeKind::Text(value) => visitor.visit_text(self, value, guard),
            NodeKind::Number(value) => visitor.visit_number(self, *value, guard),
            NodeKind::Decimal(value) => visitor.visit_decimal(self, *value, guard),
            NodeKind::Boolean(value) => visitor.visit_boolean(self, *value, guard),
            NodeKind::Color(argb) => visitor.visit_color(self, *argb, guard),
            NodeKind::Units { value, unit } => visitor.visit_units(self, *value, unit, guard),
            NodeKind::Record(fields) => visitor.visit_record(self, fields, guard),
            NodeKind::Table(rows) => visitor.visit_table(self, rows, guard),
            NodeKind::Chain(items) => visitor.visit_chain(self, items, guard),
            NodeKind::Interpolation(segments) => {
                visitor.visit_interpolation(self, segments, guard)
            }
            NodeKind::Unary { op, child } => visitor.visit_unary(self, *op, child, guard),
            NodeKind::Binary { op, left, right } => {
                visitor.visit_binary(self, *op, left, right, guard)
            }
            NodeKind::Call { args, .. } => visitor.visit_call(self, args, guard),
            NodeKind::Lazy(child) => visitor.visit_lazy(self, child, guard),
            NodeKind::FieldAccess { from, field } => {
                visitor.visit_field_access(self, from, field, guard)
            }
            NodeKind::ScopeAccess(access) => visitor.visit_scope_access(self, access, guard),
            NodeKind::Resolved(object) => visitor.visit_resolved(self, object, guard),
            NodeKind::AggregateCoercion {
                op, child, fields, ..
            } => visitor.visit_aggregate_coercion(self, *op, child, fields, guard),
            NodeKind::Error { hint } => visitor.visit_error(self, hint, guard),
        };
        guard.leave();
        result
    }

    /// Walk the tree, calling `f` on every node in pre-order.
    pub fn walk<F>(&self, f: &mut F) -> Result<(), DepthExceeded>
    where
        F: FnMut(&IrNode),
    {
        struct Walker<'a, F>(&'a mut F);

        impl<F: FnMut(&IrNode)> Walker<'_, F> {
            fn observe(
                &mut self,
                node: &IrNode,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                (self.0)(node);
                walk_children(self, node, guard)
            }
        }

        impl<F: FnMut(&IrNode)> NodeVisitor for Walker<'_, F> {
            fn visit_text(
                &mut self,
                node: &IrNode,
                _value: &str,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_number(
                &mut self,
                node: &IrNode,
                _value: f64,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_decimal(
                &mut self,
                node: &IrNode,
                _value: f64,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_boolean(
                &mut self,
                node: &IrNode,
                _value: bool,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_color(
                &mut self,
                node: &IrNode,
                _argb: u32,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_units(
                &mut self,
                node: &IrNode,
                _value: f64,
                _unit: &Unit,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_record(
                &mut self,
                node: &IrNode,
                _fields: &IndexMap<String, NodeRef>,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_table(
                &mut self,
                node: &IrNode,
                _rows: &[NodeRef],
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_chain(
                &mut self,
                node: &IrNode,
                _items: &[NodeRef],
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_interpolation(
                &mut self,
                node: &IrNode,
                _segments: &[NodeRef],
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_unary(
                &mut self,
                node: &IrNode,
                _op: UnaryOp,
                _child: &NodeRef,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_binary(
                &mut self,
                node: &IrNode,
                _op: BinaryOp,
                _left: &NodeRef,
                _right: &NodeRef,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_call(
                &mut self,
                node: &IrNode,
                _args: &[NodeRef],
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_lazy(
                &mut self,
                node: &IrNode,
                _child: &NodeRef,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_field_access(
                &mut self,
                node: &IrNode,
                _from: &NodeRef,
                _field: &str,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_scope_access(
                &mut self,
                node: &IrNode,
                _access: &ScopeAccess,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_resolved(
                &mut self,
                node: &IrNode,
                _object: &ResolvedObject,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_aggregate_coercion(
                &mut self,
                node: &IrNode,
                _op: CoercionOp,
                _child: &NodeRef,
                _fields: &IndexMap<String, NodeRef>,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
            fn visit_error(
                &mut self,
                node: &IrNode,
                _hint: &str,
                guard: &mut RecursionGuard,
            ) -> Result<(), DepthExceeded> {
                self.observe(node, guard)
            }
        }

        self.accept(&mut Walker(f), &mut RecursionGuard::new())
    }
}
