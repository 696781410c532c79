//! Dependency extraction: which entity fields a formula reads.
//!
//! Change tracking needs to know, per formula, the set of fields read
//! from each entity so edits can invalidate exactly the formulas that
//! depend on them. The reads come from two places:
//!
//! - field projection off an entity-typed value (`'Primary
//!   Contact'.'Full Name'`)
//! - scope references inside scoped calls (`Sum(Contacts, 'Number Of
//!   Children')`)
//!
//! Reads of the *current* row are deliberately excluded: the formula's
//! own column metadata already covers them. They appear either as
//! resolved current-row references, which this pass never records, or as
//! accesses against the ambient scope, whose id no call introduces and
//! which therefore never enters the scope table.
//!
//! Scope composition is declarative: a scoped call's first argument
//! supplies the row type its scope ranges over, and the visitor records
//! it in a per-traversal side table keyed by scope id. No global state,
//! so concurrent extractions over different formulas never interfere.

use crate::pipeline::PipelineOptions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tally_ir::visit::{walk_children, DepthExceeded};
use tally_ir::{
    IrNode, NodeKind, NodeRef, NodeVisitor, RecursionGuard, RowType, ScopeAccess, ScopeId,
};
use tracing::trace;

/// One read against an entity.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FieldRead {
    /// The whole row (e.g. passing the scope's row to a function)
    Whole,
    /// A single field, by logical name
    Field(String),
}

/// Everything a formula reads, grouped by entity logical name.
///
/// BTree containers keep the output deterministic, which the change
/// tracker and the golden tests both rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    reads: BTreeMap<String, BTreeSet<FieldRead>>,
}

impl DependencyInfo {
    /// Record a whole-row read.
    pub fn record_whole(&mut self, entity: &str) {
        self.reads
            .entry(entity.to_string())
            .or_default()
            .insert(FieldRead::Whole);
    }

    /// Record a single-field read.
    pub fn record_field(&mut self, entity: &str, field: &str) {
        self.reads
            .entry(entity.to_string())
            .or_default()
            .insert(FieldRead::Field(field.to_string()));
    }

    /// Entities read from, in name order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.reads.keys().map(String::as_str)
    }

    /// The reads against one entity, if any.
    pub fn reads_for(&self, entity: &str) -> Option<&BTreeSet<FieldRead>> {
        self.reads.get(entity)
    }

    /// Check whether the formula reads nothing beyond its own row.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Number of entities read from.
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Fold another formula's reads into this one.
    pub fn merge(&mut self, other: &DependencyInfo) {
        for (entity, reads) in &other.reads {
            self.reads
                .entry(entity.clone())
                .or_default()
                .extend(reads.iter().cloned());
        }
    }
}

/// Extract the dependency set of one formula.
pub fn extract_dependencies(
    root: &NodeRef,
    options: &PipelineOptions,
) -> Result<DependencyInfo, DepthExceeded> {
    let mut visitor = DependencyVisitor::default();
    root.accept(&mut visitor, &mut options.guard())?;
    trace!(entities = visitor.info.len(), "extracted dependencies");
    Ok(visitor.info)
}

/// Visitor accumulating reads and the scope-to-row-type side table.
#[derive(Default)]
struct DependencyVisitor {
    scope_types: HashMap<ScopeId, RowType>,
    info: DependencyInfo,
}

impl DependencyVisitor {
    fn record_scope(&mut self, scope: ScopeId, source: &NodeRef) {
        if let Some(row) = source.result_type().row() {
            self.scope_types.insert(scope, row.clone());
        }
    }
}

impl NodeVisitor for DependencyVisitor {
    fn visit_call(
        &mut self,
        node: &IrNode,
        args: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        if let NodeKind::Call {
            scope: Some(scope), ..
        } = &node.kind
        {
            // arg 0 supplies the row type the scope ranges over
            if let Some(source) = args.first() {
                self.record_scope(scope.id, source);
            }
        }
        walk_children(self, node, guard)
    }

    fn visit_aggregate_coercion(
        &mut self,
        node: &IrNode,
        _op: tally_ir::CoercionOp,
        child: &NodeRef,
        _fields: &indexmap::IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        if let NodeKind::AggregateCoercion { scope, .. } = &node.kind {
            self.record_scope(scope.id, child);
        }
        walk_children(self, node, guard)
    }

    fn visit_scope_access(
        &mut self,
        _node: &IrNode,
        access: &ScopeAccess,
        _guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        // unknown scope id = the ambient current-row scope, not a read
        let Some(row) = self.scope_types.get(&access.scope_id()) else {
            return Ok(());
        };
        let row_has_field = match access {
            ScopeAccess::Whole(_) => true,
            ScopeAccess::Field { name, .. } => row.has_field(name),
        };
        let Some(entity) = row.entity.clone() else {
            return Ok(());
        };
        match access {
            ScopeAccess::Whole(_) => self.info.record_whole(&entity),
            // only a field the row actually exposes counts as a read
            ScopeAccess::Field { name, .. } if row_has_field => {
                self.info.record_field(&entity, name)
            }
            ScopeAccess::Field { .. } => {}
        }
        Ok(())
    }

    fn visit_field_access(
        &mut self,
        node: &IrNode,
        from: &NodeRef,
        field: &str,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        if let Some(entity) = from.result_type().row().and_then(|row| row.entity.as_deref()) {
            let entity = entity.to_string();
            self.info.record_field(&entity, field);
        }
        walk_children(self, node, guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_ir::{
        BinaryOp, FunctionRegistry, ResolvedObject, ResolvedValue, ResultType, ScopeSymbol, Span,
    };

    fn span() -> Span {
        Span::zero(0)
    }

    fn account_row() -> RowType {
        RowType::entity("account")
            .with_field("name", ResultType::Text)
            .with_field(
                "primarycontact",
                ResultType::Record(contact_row()),
            )
    }

    fn contact_row() -> RowType {
        RowType::entity("contact")
            .with_field("fullname", ResultType::Text)
            .with_field("numberofchildren", ResultType::Number)
    }

    /// `Name & 'Primary Contact'.'Full Name'` on an account row.
    fn name_and_contact_name() -> NodeRef {
        let name = IrNode::resolved(
            ResolvedObject::new(
                "Name",
                ResolvedValue::CurrentField {
                    row: account_row(),
                    field: "name".into(),
                },
            ),
            ResultType::Text,
            span(),
        );
        let primary_contact = IrNode::resolved(
            ResolvedObject::new(
                "Primary Contact",
                ResolvedValue::CurrentField {
                    row: account_row(),
                    field: "primarycontact".into(),
                },
            ),
            ResultType::Record(contact_row()),
            span(),
        );
        let full_name =
            IrNode::field_access(primary_contact, "fullname", ResultType::Text, span());
        IrNode::binary(BinaryOp::Concat, name, full_name, ResultType::Text, span())
    }

    /// `Sum(Contacts, 'Number Of Children')`.
    fn sum_children(scope: u32) -> NodeRef {
        let registry = FunctionRegistry::builtins();
        let sum = Arc::clone(registry.get("Sum").unwrap());
        let contacts = IrNode::resolved(
            ResolvedObject::new("Contacts", ResolvedValue::Global),
            ResultType::Table(contact_row()),
            span(),
        );
        let body = IrNode::lazy(IrNode::scope_access(
            ScopeAccess::Field {
                scope: ScopeId(scope),
                name: "numberofchildren".into(),
            },
            ResultType::Number,
            span(),
        ));
        IrNode::call(
            sum,
            vec![contacts, body],
            Some(ScopeSymbol::new(ScopeId(scope))),
            ResultType::Number,
            span(),
        )
    }

    fn fields(info: &DependencyInfo, entity: &str) -> Vec<FieldRead> {
        info.reads_for(entity)
            .map(|reads| reads.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn related_field_read_is_recorded_current_row_is_not() {
        let info =
            extract_dependencies(&name_and_contact_name(), &PipelineOptions::default()).unwrap();

        assert_eq!(info.entities().collect::<Vec<_>>(), ["contact"]);
        assert_eq!(
            fields(&info, "contact"),
            [FieldRead::Field("fullname".into())]
        );
        assert!(info.reads_for("account").is_none());
    }

    #[test]
    fn scoped_call_contributes_its_scopes_reads() {
        let root = IrNode::binary(
            BinaryOp::Concat,
            name_and_contact_name(),
            sum_children(1),
            ResultType::Text,
            span(),
        );
        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();

        assert_eq!(
            fields(&info, "contact"),
            [
                FieldRead::Field("fullname".into()),
                FieldRead::Field("numberofchildren".into()),
            ]
        );
    }

    #[test]
    fn whole_row_access_is_a_whole_read() {
        let registry = FunctionRegistry::builtins();
        let lookup = Arc::clone(registry.get("LookUp").unwrap());
        let contacts = IrNode::resolved(
            ResolvedObject::new("Contacts", ResolvedValue::Global),
            ResultType::Table(contact_row()),
            span(),
        );
        let body = IrNode::lazy(IrNode::scope_access(
            ScopeAccess::Whole(ScopeId(2)),
            ResultType::Record(contact_row()),
            span(),
        ));
        let root = IrNode::call(
            lookup,
            vec![contacts, body],
            Some(ScopeSymbol::new(ScopeId(2))),
            ResultType::Record(contact_row()),
            span(),
        );

        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();
        assert_eq!(fields(&info, "contact"), [FieldRead::Whole]);
    }

    #[test]
    fn anonymous_rows_contribute_nothing() {
        let registry = FunctionRegistry::builtins();
        let sum = Arc::clone(registry.get("Sum").unwrap());
        let grouped = IrNode::table(
            vec![],
            ResultType::Table(RowType::anonymous().with_field("total", ResultType::Number)),
            span(),
        );
        let body = IrNode::lazy(IrNode::scope_access(
            ScopeAccess::Field {
                scope: ScopeId(3),
                name: "total".into(),
            },
            ResultType::Number,
            span(),
        ));
        let root = IrNode::call(
            sum,
            vec![grouped, body],
            Some(ScopeSymbol::new(ScopeId(3))),
            ResultType::Number,
            span(),
        );

        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn field_the_row_does_not_expose_is_ignored() {
        let registry = FunctionRegistry::builtins();
        let sum = Arc::clone(registry.get("Sum").unwrap());
        let contacts = IrNode::resolved(
            ResolvedObject::new("Contacts", ResolvedValue::Global),
            ResultType::Table(contact_row()),
            span(),
        );
        let body = IrNode::lazy(IrNode::scope_access(
            ScopeAccess::Field {
                scope: ScopeId(1),
                name: "bogusfield".into(),
            },
            ResultType::Number,
            span(),
        ));
        let root = IrNode::call(
            sum,
            vec![contacts, body],
            Some(ScopeSymbol::new(ScopeId(1))),
            ResultType::Number,
            span(),
        );

        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn resolved_references_contribute_nothing() {
        // current-row references are covered by the formula's own column
        // metadata; globals are opaque
        let current = IrNode::resolved(
            ResolvedObject::new(
                "Name",
                ResolvedValue::CurrentField {
                    row: account_row(),
                    field: "name".into(),
                },
            ),
            ResultType::Text,
            span(),
        );
        let whole_row = IrNode::resolved(
            ResolvedObject::new("ThisRow", ResolvedValue::CurrentRow(account_row())),
            ResultType::Record(account_row()),
            span(),
        );
        let root = IrNode::binary(
            BinaryOp::Concat,
            current,
            whole_row,
            ResultType::Text,
            span(),
        );

        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn ambient_scope_access_is_ignored() {
        // no enclosing call introduces scope 0
        let root = IrNode::scope_access(
            ScopeAccess::Field {
                scope: ScopeId(0),
                name: "name".into(),
            },
            ResultType::Text,
            span(),
        );
        let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn merge_unions_reads() {
        let mut a = DependencyInfo::default();
        a.record_field("contact", "fullname");
        let mut b = DependencyInfo::default();
        b.record_field("contact", "numberofchildren");
        b.record_whole("account");

        a.merge(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(
            fields(&a, "contact"),
            [
                FieldRead::Field("fullname".into()),
                FieldRead::Field("numberofchildren".into()),
            ]
        );
    }
}
