//! Memoized run results.

use std::sync::Arc;

use quill_eval::{Bindings, EvalError, Value};
use quill_runner::RunSuccess;

use crate::hash::{output_hash, ContentHash};

/// The outcome of running one module version under one environment.
///
/// Built only from a fully resolved runner call and never modified; program
/// errors are cached like successes, infrastructure errors never are.
#[derive(Clone, Debug)]
pub struct CachedOutput {
    pub module_id: String,
    pub module_hash: ContentHash,
    pub environment_hash: ContentHash,
    /// `output_hash(module_hash, environment_hash)`.
    pub hash: ContentHash,
    pub result: Result<RunSuccess, EvalError>,
}

impl CachedOutput {
    pub fn new(
        module_id: impl Into<String>,
        module_hash: ContentHash,
        environment_hash: ContentHash,
        result: Result<RunSuccess, EvalError>,
    ) -> Self {
        CachedOutput {
            module_id: module_id.into(),
            module_hash,
            environment_hash,
            hash: output_hash(module_hash, environment_hash),
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn success(&self) -> Option<&RunSuccess> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&EvalError> {
        self.result.as_ref().err()
    }

    pub fn value(&self) -> Option<&Value> {
        self.success().map(|s| &s.result)
    }

    pub fn exports(&self) -> Option<&Bindings> {
        self.success().map(|s| &s.exports)
    }

    /// Equality of everything but `execution_time`.
    pub fn same_values(&self, other: &CachedOutput) -> bool {
        self.module_id == other.module_id
            && self.hash == other.hash
            && match (&self.result, &other.result) {
                (Ok(a), Ok(b)) => a.same_values(b),
                (Err(a), Err(b)) => a == b,
                _ => false,
            }
    }
}

/// What `ModuleGraph::get_output` knows about a module.
#[derive(Clone, Debug)]
pub enum OutputState {
    /// No module is registered under the id.
    Unknown,
    /// Registered, but nothing is cached for the current environment.
    NeedsRun,
    Ready(Arc<CachedOutput>),
}

impl OutputState {
    pub fn is_ready(&self) -> bool {
        matches!(self, OutputState::Ready(_))
    }

    pub fn needs_run(&self) -> bool {
        matches!(self, OutputState::NeedsRun)
    }

    pub fn ready(self) -> Option<Arc<CachedOutput>> {
        match self {
            OutputState::Ready(output) => Some(output),
            OutputState::Unknown | OutputState::NeedsRun => None,
        }
    }
}
