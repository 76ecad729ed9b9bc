//! Builtin function registry and overload dispatch.
//!
//! A `Registry` maps names to `OverloadSet`s. It is immutable once built and
//! is injected into every evaluator as `Arc<Registry>`; `Registry::standard()`
//! builds the standard library once, lazily.
//!
//! Dispatch tries signatures in registration order and runs the first one
//! that accepts the arguments. When none does, the error lists every
//! candidate next to the argument types that were supplied.

mod signature;

use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;

use crate::environment::Environment;
use crate::errors::{argument_mismatch, EvalResult};
use crate::rng::Rng;
use crate::Value;

pub use signature::{BuiltinFn, ParamType, Signature};

static STANDARD: OnceLock<Arc<Registry>> = OnceLock::new();

/// What a builtin implementation may use from the running evaluation.
pub trait CallContext {
    /// Call a function value (lambda or builtin) with `args`.
    fn call(&mut self, callee: &Value, args: &[Value]) -> EvalResult;

    /// The run's seeded generator.
    fn rng(&mut self) -> &mut Rng;

    fn environment(&self) -> &Environment;
}

/// All signatures registered under one name, in registration order.
#[derive(Clone, Debug)]
pub struct OverloadSet {
    name: String,
    signatures: Vec<Signature>,
}

impl OverloadSet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Rendered form of every signature, in dispatch order.
    pub fn candidates(&self) -> Vec<String> {
        self.signatures.iter().map(|s| s.render(&self.name)).collect()
    }

    /// Run the first signature that accepts `args`.
    pub fn dispatch(&self, ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
        match self.signatures.iter().find(|s| s.accepts(args)) {
            Some(signature) => signature.call(ctx, args),
            None => Err(argument_mismatch(&self.name, args, self.candidates())),
        }
    }
}

/// Immutable name → overload set table.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    sets: FxHashMap<String, OverloadSet>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The standard library, built on first use and shared afterwards.
    pub fn standard() -> Arc<Registry> {
        Arc::clone(STANDARD.get_or_init(|| {
            Arc::new(Registry::builder().with_standard_library().build())
        }))
    }

    pub fn get(&self, name: &str) -> Option<&OverloadSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Accumulates signatures before freezing them into a `Registry`.
#[derive(Default)]
pub struct RegistryBuilder {
    sets: FxHashMap<String, OverloadSet>,
}

impl RegistryBuilder {
    /// Add the standard library's overload sets.
    #[must_use]
    pub fn with_standard_library(mut self) -> Self {
        crate::stdlib::register(&mut self);
        self
    }

    /// Append `signature` to the overload set `name`, creating it if needed.
    ///
    /// Later registrations are tried after earlier ones.
    pub fn register(&mut self, name: &str, signature: Signature) -> &mut Self {
        self.sets
            .entry(name.to_string())
            .or_insert_with(|| OverloadSet {
                name: name.to_string(),
                signatures: Vec::new(),
            })
            .signatures
            .push(signature);
        self
    }

    /// Register one signature with fixed parameters.
    pub fn function(
        &mut self,
        name: &str,
        params: Vec<ParamType>,
        returns: &'static str,
        implementation: BuiltinFn,
    ) -> &mut Self {
        self.register(name, Signature::new(params, returns, implementation))
    }

    pub fn build(self) -> Registry {
        tracing::debug!(sets = self.sets.len(), "builtin registry built");
        Registry { sets: self.sets }
    }
}
