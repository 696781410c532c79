//! End-to-end runs over realistic formula trees: pipeline ordering,
//! identity preservation across transforms, dependency extraction, and
//! diagnostic formatting.

use std::sync::Arc;
use tally_ir::{
    BinaryOp, FunctionRegistry, IrNode, NodeRef, ResolvedObject, ResolvedValue, ResultType,
    RowType, ScopeAccess, ScopeId, ScopeSymbol, SourceMap, Span,
};
use tally_passes::diag::{DiagnosticFormatter, Diagnostics};
use tally_passes::normalize::CollapseSingletons;
use tally_passes::pipeline::{Pipeline, PipelineOptions};
use tally_passes::scopes::ScopeCheck;
use tally_passes::{extract_dependencies, FieldRead};

fn contact_row() -> RowType {
    RowType::entity("contact")
        .with_field("fullname", ResultType::Text)
        .with_field("numberofchildren", ResultType::Number)
}

fn account_row() -> RowType {
    RowType::entity("account")
        .with_field("name", ResultType::Text)
        .with_field("primarycontact", ResultType::Record(contact_row()))
}

/// `Name & 'Primary Contact'.'Full Name' & Sum(Contacts, 'Number Of
/// Children')` bound against an account row, with the spans a real binder
/// would produce.
fn commission_formula(sources: &mut SourceMap) -> NodeRef {
    let text = "Name & 'Primary Contact'.'Full Name'";
    let file = sources.add_source("commission".into(), text.into());
    let sp = |start: u32, end: u32| Span::new(file, start, end, 1);

    let name = IrNode::resolved(
        ResolvedObject::new(
            "Name",
            ResolvedValue::CurrentField {
                row: account_row(),
                field: "name".into(),
            },
        ),
        ResultType::Text,
        sp(0, 4),
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
        sp(7, 24),
    );
    let full_name = IrNode::field_access(primary_contact, "fullname", ResultType::Text, sp(7, 36));
    let concat = IrNode::binary(BinaryOp::Concat, name, full_name, ResultType::Text, sp(0, 36));

    let registry = FunctionRegistry::builtins();
    let sum = Arc::clone(registry.get("Sum").unwrap());
    let contacts = IrNode::resolved(
        ResolvedObject::new("Contacts", ResolvedValue::Global),
        ResultType::Table(contact_row()),
        sp(0, 0),
    );
    let children = IrNode::lazy(IrNode::scope_access(
        ScopeAccess::Field {
            scope: ScopeId(1),
            name: "numberofchildren".into(),
        },
        ResultType::Number,
        sp(0, 0),
    ));
    let sum_call = IrNode::call(
        sum,
        vec![contacts, children],
        Some(ScopeSymbol::new(ScopeId(1))),
        ResultType::Number,
        sp(0, 0),
    );

    IrNode::binary(BinaryOp::Concat, concat, sum_call, ResultType::Text, sp(0, 36))
}

fn standard_pipeline() -> Pipeline {
    Pipeline::new().with(CollapseSingletons).with(ScopeCheck)
}

#[test]
fn clean_formula_runs_to_completion_unchanged() {
    let mut sources = SourceMap::new();
    let root = commission_formula(&mut sources);

    let mut diags = Diagnostics::new();
    let run = standard_pipeline().run(
        Arc::clone(&root),
        &PipelineOptions::default(),
        &mut diags,
    );

    assert!(run.completed());
    assert!(diags.is_empty());
    // nothing to normalize, nothing to flag: the tree comes back identical
    assert!(Arc::ptr_eq(&run.root, &root));
}

#[test]
fn dependencies_of_the_commission_formula() {
    let mut sources = SourceMap::new();
    let root = commission_formula(&mut sources);

    let info = extract_dependencies(&root, &PipelineOptions::default()).unwrap();

    assert_eq!(info.entities().collect::<Vec<_>>(), ["contact"]);
    let reads: Vec<_> = info.reads_for("contact").unwrap().iter().cloned().collect();
    assert_eq!(
        reads,
        [
            FieldRead::Field("fullname".into()),
            FieldRead::Field("numberofchildren".into()),
        ]
    );
}

#[test]
fn normalization_runs_before_scope_check_and_preserves_siblings() {
    let mut sources = SourceMap::new();
    let formula = commission_formula(&mut sources);
    // binder artifact: the whole formula wrapped in a singleton chain
    let wrapped = IrNode::chain(vec![Arc::clone(&formula)], formula.span());

    let mut diags = Diagnostics::new();
    let run = standard_pipeline().run(wrapped, &PipelineOptions::default(), &mut diags);

    assert!(run.completed());
    assert!(Arc::ptr_eq(&run.root, &formula));
}

#[test]
fn escaped_scope_halts_the_pipeline() {
    let mut sources = SourceMap::new();
    let file = sources.add_source("broken".into(), "Sum(Contacts, X)".into());
    // a scope access with no introducing call anywhere above it
    let escaped = IrNode::scope_access(
        ScopeAccess::Field {
            scope: ScopeId(4),
            name: "numberofchildren".into(),
        },
        ResultType::Number,
        Span::new(file, 14, 15, 1),
    );

    let mut diags = Diagnostics::new();
    let run = standard_pipeline().run(escaped, &PipelineOptions::default(), &mut diags);

    assert_eq!(run.halted_after.as_deref(), Some("scope-check"));
    assert!(diags.has_blocking());

    let rendered = DiagnosticFormatter::new(&sources).format_all(&diags);
    assert!(rendered.contains("severe[scope-integrity]"));
    assert!(rendered.contains("broken:1:15"));
}

#[test]
fn depth_limit_applies_across_the_pipeline() {
    let mut node = IrNode::number(1.0, Span::zero(0));
    for _ in 0..32 {
        node = IrNode::lazy(node);
    }

    let mut diags = Diagnostics::new();
    let options = PipelineOptions { max_depth: 8 };
    let run = standard_pipeline().run(node, &options, &mut diags);

    assert!(!run.completed());
    assert!(diags.has_blocking());
    assert!(diags
        .iter()
        .any(|d| d.message.contains("exceeds the limit of 8")));
}
