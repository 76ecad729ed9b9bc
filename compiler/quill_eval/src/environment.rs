//! Run configuration: the environment that determines results, the limits
//! that bound a run, and the flag that aborts it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inputs besides source and externals that a result depends on.
///
/// Equal environments produce bit-identical results for the same program.
/// `sample_count` is an integer, so there is no non-finite case to hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    /// Samples drawn per distribution.
    pub sample_count: u32,
    /// Resolution of summaries such as `Dist.histogram`.
    pub precision: u32,
    /// Seed for every random draw in a run.
    pub seed: String,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            sample_count: 1000,
            precision: 20,
            seed: "quill".to_string(),
        }
    }
}

impl Environment {
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }
}

/// Resource limits for one evaluation.
///
/// Not part of the cache key: a run either finishes within its limits with
/// the same result it would always produce, or fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalLimits {
    pub max_call_depth: Option<usize>,
    pub max_steps: Option<u64>,
    pub timeout: Option<Duration>,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            max_call_depth: Some(10_000),
            max_steps: None,
            timeout: None,
        }
    }
}

impl EvalLimits {
    pub fn unlimited() -> Self {
        EvalLimits {
            max_call_depth: None,
            max_steps: None,
            timeout: None,
        }
    }
}

/// Cooperative cancellation flag, checked between reduction steps.
///
/// A child flag reports aborted when either it or its parent is set, which
/// lets a worker abort every job it owns at once.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag {
    own: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is also set whenever `self` is.
    #[must_use]
    pub fn child(&self) -> AbortFlag {
        AbortFlag {
            own: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.own)),
        }
    }

    pub fn abort(&self) {
        self.own.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.own.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::Acquire))
    }
}
