//! Function signatures for call nodes.
//!
//! The IR does not implement functions; it only needs enough signature
//! metadata to keep call nodes well formed and to drive the passes:
//!
//! - arity bounds, asserted at node construction
//! - whether the function introduces a row scope for its lambda-typed
//!   arguments (`Sum`, `LookUp`, `Filter`, ...)
//!
//! Laziness is not signature metadata: an argument is lazy exactly when
//! the binder wrapped it in a `Lazy` node, and only the enclosing call
//! decides when to evaluate it.
//!
//! For scope-introducing functions, dependency composition is declarative:
//! the first argument supplies the row type the scope ranges over, and the
//! dependency pass records it under the scope id. Functions with genuinely
//! nonstandard scoping would extend the signature, not override a virtual
//! method.

use indexmap::IndexMap;
use std::sync::Arc;

/// Signature of a callable function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    /// Function name as it appears in formulas
    pub name: String,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments
    pub max_args: usize,
    /// Whether a call introduces a row scope for lambda arguments
    pub introduces_scope: bool,
}

impl FunctionSig {
    /// A plain function with no row scope.
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        assert!(min_args <= max_args, "invalid arity bounds");
        Self {
            name: name.into(),
            min_args,
            max_args,
            introduces_scope: false,
        }
    }

    /// A function whose call introduces a row scope (argument 0 supplies
    /// the row type).
    pub fn scoped(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        Self {
            introduces_scope: true,
            ..Self::new(name, min_args, max_args)
        }
    }

    /// Check whether an argument count satisfies the arity bounds.
    pub fn accepts_arity(&self, count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&count)
    }
}

/// Registry of known functions, keyed by name.
///
/// The binder resolves call targets against a registry; the IR keeps the
/// resolved `Arc<FunctionSig>` in the call node so later passes never need
/// to look names up again.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<FunctionSig>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin functions the core passes know about.
    pub fn builtins() -> Self {
        let mut registry = Self::new();
        registry.register(FunctionSig::new("If", 2, usize::MAX));
        registry.register(FunctionSig::new("And", 2, usize::MAX));
        registry.register(FunctionSig::new("Or", 2, usize::MAX));
        registry.register(FunctionSig::new("Not", 1, 1));
        registry.register(FunctionSig::new("IsBlank", 1, 1));
        registry.register(FunctionSig::new("Concatenate", 1, usize::MAX));
        registry.register(FunctionSig::new("Text", 1, 2));
        registry.register(FunctionSig::new("Value", 1, 1));
        registry.register(FunctionSig::scoped("Sum", 2, 2));
        registry.register(FunctionSig::scoped("LookUp", 2, 3));
        registry.register(FunctionSig::scoped("Filter", 2, usize::MAX));
        registry
    }

    /// Register a signature, replacing any previous one with that name.
    pub fn register(&mut self, sig: FunctionSig) -> Arc<FunctionSig> {
        let sig = Arc::new(sig);
        self.functions.insert(sig.name.clone(), Arc::clone(&sig));
        sig
    }

    /// Look up a signature by name.
    pub fn get(&self, name: &str) -> Option<&Arc<FunctionSig>> {
        self.functions.get(name)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
