//! Scope integrity checking.
//!
//! The binder guarantees two things about lambda scopes: every scope id is
//! introduced by exactly one call, and every scope access sits inside the
//! call that introduces its id. Rewrites can break both (a transform that
//! hoists a lambda body out of its call, or duplicates a call without
//! renumbering), so the pipeline re-verifies after mutation-heavy stages.
//!
//! Scope id 0 is the ambient current-row scope: always in scope, never
//! introduced by a call.

use crate::diag::{DiagKind, Diagnostic, Diagnostics, Severity};
use crate::pipeline::{PipelineOptions, Transform};
use std::collections::HashSet;
use tally_ir::visit::{walk_children, DepthExceeded};
use tally_ir::{IrNode, NodeKind, NodeRef, NodeVisitor, RecursionGuard, ScopeAccess, ScopeId};

/// The ambient current-row scope.
pub const AMBIENT_SCOPE: ScopeId = ScopeId(0);

/// Check every scope reference in a tree.
///
/// Returns the violations found; an empty vec means the tree is
/// scope-correct.
pub fn verify_scopes(
    root: &NodeRef,
    options: &PipelineOptions,
) -> Result<Vec<Diagnostic>, DepthExceeded> {
    let mut visitor = ScopeCheckVisitor {
        stack: vec![AMBIENT_SCOPE],
        seen: HashSet::new(),
        violations: Vec::new(),
    };
    root.accept(&mut visitor, &mut options.guard())?;
    Ok(visitor.violations)
}

/// Pipeline stage wrapping [`verify_scopes`]. Never changes the tree.
pub struct ScopeCheck;

impl Transform for ScopeCheck {
    fn name(&self) -> &str {
        "scope-check"
    }

    fn apply(
        &self,
        root: NodeRef,
        options: &PipelineOptions,
        diags: &mut Diagnostics,
    ) -> Result<NodeRef, DepthExceeded> {
        for violation in verify_scopes(&root, options)? {
            diags.push(violation);
        }
        Ok(root)
    }
}

struct ScopeCheckVisitor {
    /// Ids of the scopes enclosing the current node, innermost last
    stack: Vec<ScopeId>,
    /// Every id introduced anywhere in the tree, for duplicate detection
    seen: HashSet<ScopeId>,
    violations: Vec<Diagnostic>,
}

impl ScopeCheckVisitor {
    fn enter_scope(&mut self, id: ScopeId, node: &IrNode) {
        if id == AMBIENT_SCOPE {
            self.violations.push(Diagnostic::new(
                DiagKind::ScopeIntegrity,
                Severity::Severe,
                node.span(),
                "scope id 0 is reserved for the ambient scope",
            ));
        } else if !self.seen.insert(id) {
            self.violations.push(Diagnostic::new(
                DiagKind::ScopeIntegrity,
                Severity::Severe,
                node.span(),
                format!("scope {id} introduced more than once"),
            ));
        }
        self.stack.push(id);
    }

    fn leave_scope(&mut self) {
        self.stack.pop();
    }
}

impl NodeVisitor for ScopeCheckVisitor {
    fn visit_call(
        &mut self,
        node: &IrNode,
        _args: &[NodeRef],
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        let scope = match &node.kind {
            NodeKind::Call { scope, .. } => *scope,
            _ => None,
        };
        match scope {
            Some(scope) => {
                self.enter_scope(scope.id, node);
                let result = walk_children(self, node, guard);
                self.leave_scope();
                result
            }
            None => walk_children(self, node, guard),
        }
    }

    fn visit_aggregate_coercion(
        &mut self,
        node: &IrNode,
        _op: tally_ir::CoercionOp,
        _child: &NodeRef,
        _fields: &indexmap::IndexMap<String, NodeRef>,
        guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        let NodeKind::AggregateCoercion { scope, .. } = &node.kind else {
            return walk_children(self, node, guard);
        };
        self.enter_scope(scope.id, node);
        let result = walk_children(self, node, guard);
        self.leave_scope();
        result
    }

    fn visit_scope_access(
        &mut self,
        node: &IrNode,
        access: &ScopeAccess,
        _guard: &mut RecursionGuard,
    ) -> Result<(), DepthExceeded> {
        let id = access.scope_id();
        if !self.stack.contains(&id) {
            self.violations.push(Diagnostic::new(
                DiagKind::ScopeIntegrity,
                Severity::Severe,
                node.span(),
                format!("reference to scope {id} outside its introducing call"),
            ));
        }
        Ok(())
    }
}
