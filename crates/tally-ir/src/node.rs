//! The IR node model.
//!
//! A bound formula is a tree of [`IrNode`]s. Every node carries an
//! [`IrContext`] — its resolved result type and source span — fixed at
//! construction and never mutated: a rewrite produces a new node, it never
//! edits one in place.
//!
//! # Design
//!
//! - **Closed set of kinds** — [`NodeKind`] is an exhaustive enum, so
//!   adding a kind is a compile error in every pass until handled.
//! - **Shared immutable children** — children are [`NodeRef`]
//!   (`Arc<IrNode>`); a rewrite that touches one leaf of a wide node keeps
//!   every untouched sibling's allocation, and identity is observable via
//!   `Arc::ptr_eq`.
//! - **Invariants fail fast** — malformed construction (arity violation,
//!   scope on a non-scoped function, empty chain) is a programming error,
//!   not a user error, and panics instead of producing a diagnostic.
//!
//! Trees are acyclic by construction: a node only ever holds
//! previously-built children, and no node is shared across two formulas.
//!
//! # Examples
//!
//! ```
//! use tally_ir::{IrNode, BinaryOp, Span};
//!
//! let span = Span::zero(0);
//! let n = IrNode::binary(
//!     BinaryOp::Concat,
//!     IrNode::text("a", span),
//!     IrNode::text("b", span),
//!     tally_ir::ResultType::Text,
//!     span,
//! );
//! assert_eq!(tally_ir::compact::render(&n), r#"BinaryOp(Concat, "a":s, "b":s)"#);
//! ```

use crate::foundation::{ResultType, RowType, ScopeAccess, ScopeSymbol, Span, Unit};
use crate::function::FunctionSig;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to an immutable IR node.
pub type NodeRef = Arc<IrNode>;

/// Metadata attached to every node at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IrContext {
    /// Resolved result type of the node
    pub result_type: ResultType,
    /// Source location of the expression the node was lowered from
    pub span: Span,
}

impl IrContext {
    /// Create a context.
    pub fn new(result_type: ResultType, span: Span) -> Self {
        Self { result_type, span }
    }
}

/// Unary operator kinds.
///
/// Aggregate coercions are deliberately not operators; they have their own
/// node kind with per-field structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation
    Negate,
    /// Logical negation
    Not,
    /// Percent suffix (`x%` = `x / 100`)
    Percent,
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    /// Text concatenation (`&`)
    Concat,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

/// Structural coercion kinds for [`NodeKind::AggregateCoercion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoercionOp {
    /// Record value coerced to another record shape
    RecordToRecord,
    /// Table value coerced row-by-row to another row shape
    TableToTable,
}

/// What a resolved-object node refers to.
///
/// The binder resolves bare names against its symbol tables; the IR keeps
/// only the outcome. Globals, named formulas, and slots are opaque here —
/// the evaluator resolves them at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// The whole row the formula is evaluated against.
    CurrentRow(RowType),
    /// One field of the row the formula is evaluated against.
    CurrentField {
        /// Shape of the row the field belongs to
        row: RowType,
        /// Field logical name
        field: String,
    },
    /// An opaque global value (named formula, slot, enum option).
    Global,
}

/// A name the binder fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
    /// Display name, kept for rendering and diagnostics
    pub name: String,
    /// What the name resolved to
    pub value: ResolvedValue,
}

impl ResolvedObject {
    /// Create a resolved object.
    pub fn new(name: impl Into<String>, value: ResolvedValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The closed set of IR node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // === Literals (leaves) ===
    /// Text literal
    Text(String),
    /// Floating-point literal
    Number(f64),
    /// Decimal literal
    Decimal(f64),
    /// Boolean literal
    Boolean(bool),
    /// Color literal, ARGB
    Color(u32),
    /// Numeric literal with a unit annotation
    Units {
        /// Numeric value
        value: f64,
        /// Unit symbol
        unit: Unit,
    },

    // === Structural aggregates ===
    /// Record construction; field names are unique by construction
    Record(IndexMap<String, NodeRef>),
    /// Table construction from row expressions
    Table(Vec<NodeRef>),
    /// Expression sequence (`;`): children evaluate in order for their
    /// side effects, the value is the last child's
    Chain(Vec<NodeRef>),
    /// String interpolation segments; concatenation semantics belong to
    /// the evaluator
    Interpolation(Vec<NodeRef>),

    // === Operators ===
    /// Unary operation
    Unary { op: UnaryOp, child: NodeRef },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: NodeRef,
        right: NodeRef,
    },

    // === Calls ===
    /// Function call. `scope` is present exactly when the function
    /// introduces a row scope for its lambda-typed arguments.
    Call {
        function: Arc<FunctionSig>,
        args: Vec<NodeRef>,
        scope: Option<ScopeSymbol>,
    },
    /// Marks an argument the enclosing call evaluates on demand — the
    /// short-circuit / lambda-argument mechanism. This core only
    /// preserves the marker.
    Lazy(NodeRef),

    // === Access and resolution ===
    /// Static field projection off a record-typed child
    FieldAccess { from: NodeRef, field: String },
    /// Reference into an enclosing lambda scope
    ScopeAccess(ScopeAccess),
    /// A name the binder fully resolved
    Resolved(ResolvedObject),

    // === Coercion ===
    /// Structural coercion where each field may need its own nested
    /// coercion, resolved through `scope`
    AggregateCoercion {
        op: CoercionOp,
        scope: ScopeSymbol,
        child: NodeRef,
        /// Field logical name to coercion expression for that field
        fields: IndexMap<String, NodeRef>,
    },

    // === Failure placeholder ===
    /// A subtree that failed to bind; consumers decide how to fail
    Error {
        /// Diagnostic hint for tooling
        hint: String,
    },
}

/// One node of a bound formula tree.
#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    /// The node's kind and payload
    pub kind: NodeKind,
    /// Result type and source span
    pub context: IrContext,
}

impl IrNode {
    /// Wrap a kind and context into a shared node.
    pub fn new(kind: NodeKind, context: IrContext) -> NodeRef {
        Arc::new(Self { kind, context })
    }

    /// Text literal.
    pub fn text(value: impl Into<String>, span: Span) -> NodeRef {
        Self::new(
            NodeKind::Text(value.into()),
            IrContext::new(ResultType::Text, span),
        )
    }

    /// Floating-point literal.
    ///
    /// The value must be finite: formula source can only spell finite
    /// numbers, and the compact format has no rendering for NaN or
    /// infinity.
    pub fn number(value: f64, span: Span) -> NodeRef {
        debug_assert!(value.is_finite(), "numeric literal must be finite");
        Self::new(
            NodeKind::Number(value),
            IrContext::new(ResultType::Number, span),
        )
    }

    /// Decimal literal. The value must be finite, as for [`number`](Self::number).
    pub fn decimal(value: f64, span: Span) -> NodeRef {
        debug_assert!(value.is_finite(), "numeric literal must be finite");
        Self::new(
            NodeKind::Decimal(value),
            IrContext::new(ResultType::Decimal, span),
        )
    }

    /// Boolean literal.
    pub fn boolean(value: bool, span: Span) -> NodeRef {
        Self::new(
            NodeKind::Boolean(value),
            IrContext::new(ResultType::Boolean, span),
        )
    }

    /// Color literal (ARGB).
    pub fn color(argb: u32, span: Span) -> NodeRef {
        Self::new(
            NodeKind::Color(argb),
            IrContext::new(ResultType::Color, span),
        )
    }

    /// Units literal. The value must be finite, as for [`number`](Self::number).
    pub fn units(value: f64, unit: Unit, span: Span) -> NodeRef {
        debug_assert!(value.is_finite(), "numeric literal must be finite");
        let ty = ResultType::Units(unit.clone());
        Self::new(
            NodeKind::Units { value, unit },
            IrContext::new(ty, span),
        )
    }

    /// Record construction. Field names are unique by the map type.
    pub fn record(fields: IndexMap<String, NodeRef>, ty: ResultType, span: Span) -> NodeRef {
        Self::new(NodeKind::Record(fields), IrContext::new(ty, span))
    }

    /// Table construction.
    pub fn table(rows: Vec<NodeRef>, ty: ResultType, span: Span) -> NodeRef {
        Self::new(NodeKind::Table(rows), IrContext::new(ty, span))
    }

    /// Expression chain; the value is the last child's.
    ///
    /// # Panics
    /// Panics on an empty chain — a chain with no value is unrepresentable.
    pub fn chain(items: Vec<NodeRef>, span: Span) -> NodeRef {
        let last = items.last().expect("chain must have at least one child");
        let ty = last.result_type().clone();
        Self::new(NodeKind::Chain(items), IrContext::new(ty, span))
    }

    /// String interpolation.
    pub fn interpolation(segments: Vec<NodeRef>, span: Span) -> NodeRef {
        Self::new(
            NodeKind::Interpolation(segments),
            IrContext::new(ResultType::Text, span),
        )
    }

    /// Unary operation.
    pub fn unary(op: UnaryOp, child: NodeRef, ty: ResultType, span: Span) -> NodeRef {
        Self::new(NodeKind::Unary { op, child }, IrContext::new(ty, span))
    }

    /// Binary operation.
    pub fn binary(
        op: BinaryOp,
        left: NodeRef,
        right: NodeRef,
        ty: ResultType,
        span: Span,
    ) -> NodeRef {
        Self::new(
            NodeKind::Binary { op, left, right },
            IrContext::new(ty, span),
        )
    }

    /// Function call.
    ///
    /// # Panics
    /// Panics if the argument count violates the signature's arity bounds,
    /// or if a scope is present on a function that does not introduce one
    /// (and vice versa).
    pub fn call(
        function: Arc<FunctionSig>,
        args: Vec<NodeRef>,
        scope: Option<ScopeSymbol>,
        ty: ResultType,
        span: Span,
    ) -> NodeRef {
        assert!(
            function.accepts_arity(args.len()),
            "{} expects {}..={} arguments, got {}",
            function.name,
            function.min_args,
            function.max_args,
            args.len()
        );
        assert_eq!(
            function.introduces_scope,
            scope.is_some(),
            "scope presence must match {}'s signature",
            function.name
        );
        Self::new(
            NodeKind::Call {
                function,
                args,
                scope,
            },
            IrContext::new(ty, span),
        )
    }

    /// Lazy-evaluation wrapper; the context mirrors the child's.
    pub fn lazy(child: NodeRef) -> NodeRef {
        let context = child.context.clone();
        Self::new(NodeKind::Lazy(child), context)
    }

    /// Static field projection.
    pub fn field_access(
        from: NodeRef,
        field: impl Into<String>,
        ty: ResultType,
        span: Span,
    ) -> NodeRef {
        Self::new(
            NodeKind::FieldAccess {
                from,
                field: field.into(),
            },
            IrContext::new(ty, span),
        )
    }

    /// Scope access.
    pub fn scope_access(access: ScopeAccess, ty: ResultType, span: Span) -> NodeRef {
        Self::new(NodeKind::ScopeAccess(access), IrContext::new(ty, span))
    }

    /// Resolved object reference.
    pub fn resolved(object: ResolvedObject, ty: ResultType, span: Span) -> NodeRef {
        Self::new(NodeKind::Resolved(object), IrContext::new(ty, span))
    }

    /// Aggregate coercion.
    ///
    /// # Panics
    /// Panics if the target type's shape does not match the coercion kind
    /// (RecordToRecord must produce a Record, TableToTable a Table).
    pub fn aggregate_coercion(
        op: CoercionOp,
        scope: ScopeSymbol,
        child: NodeRef,
        fields: IndexMap<String, NodeRef>,
        ty: ResultType,
        span: Span,
    ) -> NodeRef {
        let shape_ok = match op {
            CoercionOp::RecordToRecord => matches!(ty, ResultType::Record(_)),
            CoercionOp::TableToTable => matches!(ty, ResultType::Table(_)),
        };
        assert!(shape_ok, "coercion target type does not match {op:?}");
        Self::new(
            NodeKind::AggregateCoercion {
                op,
                scope,
                child,
                fields,
            },
            IrContext::new(ty, span),
        )
    }

    /// Error placeholder for a subtree that failed to bind.
    pub fn error(hint: impl Into<String>, span: Span) -> NodeRef {
        Self::new(
            NodeKind::Error { hint: hint.into() },
            IrContext::new(ResultType::Error, span),
        )
    }

    /// The node's source span.
    pub fn span(&self) -> Span {
        self.context.span
    }

    /// The node's resolved result type.
    pub fn result_type(&self) -> &ResultType {
        &self.context.result_type
    }

    /// Check if this node is a lazy-argument marker.
    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, NodeKind::Lazy(_))
    }
}

// Operators display as their variant name; the compact format relies on
// this being stable.

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for CoercionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::ScopeId;
    use crate::function::FunctionRegistry;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn literal_constructors_fix_result_types() {
        assert_eq!(*IrNode::text("x", span()).result_type(), ResultType::Text);
        assert_eq!(
            *IrNode::number(1.0, span()).result_type(),
            ResultType::Number
        );
        assert_eq!(
            *IrNode::decimal(1.0, span()).result_type(),
            ResultType::Decimal
        );
        assert_eq!(
            *IrNode::boolean(true, span()).result_type(),
            ResultType::Boolean
        );
        assert_eq!(
            *IrNode::units(2.0, Unit::new("cm"), span()).result_type(),
            ResultType::Units(Unit::new("cm"))
        );
        assert_eq!(
            *IrNode::error("unbound", span()).result_type(),
            ResultType::Error
        );
    }

    #[test]
    #[should_panic(expected = "must be finite")]
    fn non_finite_number_rejected() {
        let _ = IrNode::number(f64::NAN, span());
    }

    #[test]
    #[should_panic(expected = "must be finite")]
    fn non_finite_decimal_rejected() {
        let _ = IrNode::decimal(f64::INFINITY, span());
    }

    #[test]
    fn chain_takes_last_childs_type() {
        let chain = IrNode::chain(
            vec![IrNode::text("side effect", span()), IrNode::number(1.0, span())],
            span(),
        );
        assert_eq!(*chain.result_type(), ResultType::Number);
    }

    #[test]
    #[should_panic(expected = "at least one child")]
    fn empty_chain_rejected() {
        let _ = IrNode::chain(vec![], span());
    }

    #[test]
    fn lazy_mirrors_child_context() {
        let child = IrNode::number(3.0, span());
        let lazy = IrNode::lazy(Arc::clone(&child));
        assert!(lazy.is_lazy());
        assert_eq!(lazy.result_type(), child.result_type());
    }

    #[test]
    fn call_accepts_matching_scope() {
        let registry = FunctionRegistry::builtins();
        let sum = Arc::clone(registry.get("Sum").unwrap());
        let table = IrNode::table(vec![], ResultType::Table(RowType::entity("contact")), span());
        let body = IrNode::lazy(IrNode::number(0.0, span()));
        let call = IrNode::call(
            sum,
            vec![table, body],
            Some(ScopeSymbol::new(ScopeId(1))),
            ResultType::Number,
            span(),
        );
        assert!(matches!(call.kind, NodeKind::Call { scope: Some(_), .. }));
    }

    #[test]
    #[should_panic(expected = "scope presence")]
    fn scoped_call_without_scope_rejected() {
        let registry = FunctionRegistry::builtins();
        let sum = Arc::clone(registry.get("Sum").unwrap());
        let table = IrNode::table(vec![], ResultType::Table(RowType::entity("contact")), span());
        let body = IrNode::lazy(IrNode::number(0.0, span()));
        let _ = IrNode::call(sum, vec![table, body], None, ResultType::Number, span());
    }

    #[test]
    #[should_panic(expected = "arguments")]
    fn call_arity_enforced() {
        let registry = FunctionRegistry::builtins();
        let not = Arc::clone(registry.get("Not").unwrap());
        let _ = IrNode::call(not, vec![], None, ResultType::Boolean, span());
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn coercion_shape_enforced() {
        let child = IrNode::table(vec![], ResultType::Table(RowType::anonymous()), span());
        let _ = IrNode::aggregate_coercion(
            CoercionOp::TableToTable,
            ScopeSymbol::new(ScopeId(1)),
            child,
            IndexMap::new(),
            ResultType::Number, // not a table
            span(),
        );
    }

    #[test]
    fn op_display_is_variant_name() {
        assert_eq!(BinaryOp::Concat.to_string(), "Concat");
        assert_eq!(UnaryOp::Negate.to_string(), "Negate");
        assert_eq!(CoercionOp::TableToTable.to_string(), "TableToTable");
    }
}
