//! Lambda-scope symbols.
//!
//! Functions like `Sum(Contacts, ...)` introduce a row scope their
//! lambda-typed arguments resolve field names against. The binder assigns
//! every such scope a stable integer id, unique within one formula, and
//! guarantees that every field access into a scope references the id of an
//! enclosing call's scope.
//!
//! Scope *access* is an explicit two-variant enum: either the whole
//! current row, or one named field of it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one lambda scope within a formula.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ScopeId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scope a call introduces for its lambda-typed arguments.
///
/// Carried by `Call` and `AggregateCoercion` nodes. The row type the scope
/// ranges over is not stored here; it comes from the call's first argument
/// and is recorded per traversal by the passes that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSymbol {
    /// Identity of this scope
    pub id: ScopeId,
}

impl ScopeSymbol {
    /// Create a scope symbol.
    pub fn new(id: ScopeId) -> Self {
        Self { id }
    }
}

/// A reference out of a lambda body into an enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeAccess {
    /// The whole current row of the scope.
    Whole(ScopeId),
    /// One field of the current row.
    Field {
        /// Id of the owning scope
        scope: ScopeId,
        /// Field logical name
        name: String,
    },
}

impl ScopeAccess {
    /// The id of the scope being accessed.
    pub fn scope_id(&self) -> ScopeId {
        match self {
            ScopeAccess::Whole(id) => *id,
            ScopeAccess::Field { scope, .. } => *scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_reports_owning_scope() {
        assert_eq!(ScopeAccess::Whole(ScopeId(3)).scope_id(), ScopeId(3));
        let field = ScopeAccess::Field {
            scope: ScopeId(7),
            name: "fullname".into(),
        };
        assert_eq!(field.scope_id(), ScopeId(7));
    }

    #[test]
    fn scope_ids_order_and_display() {
        assert!(ScopeId(1) < ScopeId(2));
        assert_eq!(ScopeId(4).to_string(), "4");
    }
}
