//! Result types carried by IR nodes.
//!
//! The binder resolves every expression's type before the IR reaches this
//! crate, so this is deliberately not a type *system*: no inference, no
//! subtyping, just enough structure for the passes that consume it —
//! dependency extraction needs to see which entity backs a record or table
//! and which fields it exposes, coercion nodes need to name their target
//! kind, and the debug renderer needs literal tags.
//!
//! # Examples
//!
//! ```
//! # use tally_ir::foundation::types::*;
//! let contact = RowType::entity("contact")
//!     .with_field("fullname", ResultType::Text)
//!     .with_field("numberofchildren", ResultType::Number);
//!
//! let ty = ResultType::Table(contact);
//! assert!(ty.row().unwrap().has_field("fullname"));
//! assert_eq!(ty.row().unwrap().entity.as_deref(), Some("contact"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit annotation on a units literal (`10<cm>`).
///
/// Units are opaque symbols here; arithmetic over them is the evaluator's
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit(String);

impl Unit {
    /// Create a unit from its symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// The unit symbol (e.g. `"cm"`).
    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result type of an IR node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultType {
    /// Text value
    Text,
    /// Floating-point number
    Number,
    /// Exact decimal number
    Decimal,
    /// Boolean value
    Boolean,
    /// Color value (ARGB)
    Color,
    /// Number with a unit annotation
    Units(Unit),
    /// A single row, optionally backed by a named entity
    Record(RowType),
    /// An ordered collection of rows, optionally backed by a named entity
    Table(RowType),
    /// Type of an [`Error`](crate::node::NodeKind::Error) placeholder
    Error,
    /// No value (side-effect-only positions in a chain)
    Void,
}

impl ResultType {
    /// The row shape of a Record or Table type, if this is one.
    pub fn row(&self) -> Option<&RowType> {
        match self {
            ResultType::Record(row) | ResultType::Table(row) => Some(row),
            _ => None,
        }
    }

    /// Check if this is a Record or Table type.
    pub fn is_aggregate(&self) -> bool {
        self.row().is_some()
    }
}

/// Shape of a record or table: field types plus the logical name of the
/// backing entity, when there is one.
///
/// `entity` is `None` for synthetic shapes (grouping scopes, inline record
/// literals) that do not correspond to a stored entity. Dependency
/// extraction only reports reads against named entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowType {
    /// Logical name of the backing entity, if any
    pub entity: Option<String>,
    /// Field logical name to field type, in declaration order
    pub fields: IndexMap<String, ResultType>,
}

impl RowType {
    /// A row backed by a named entity.
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            entity: Some(name.into()),
            fields: IndexMap::new(),
        }
    }

    /// A synthetic row with no backing entity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    pub fn with_field(mut self, name: impl Into<String>, ty: ResultType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Type of a field, if present.
    pub fn field(&self, name: &str) -> Option<&ResultType> {
        self.fields.get(name)
    }

    /// Check if the row exposes a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
