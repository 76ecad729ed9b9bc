//! Runner that evaluates on the caller's thread.

use std::sync::Arc;
use std::time::Instant;

use quill_eval::{AbortFlag, EvalLimits, Evaluator, Registry};

use crate::{RunRequest, RunResult, RunSuccess, RunTicket, Runner};

/// Compile and evaluate synchronously; `submit` returns a ready ticket.
#[derive(Clone)]
pub struct InProcessRunner {
    registry: Arc<Registry>,
    limits: EvalLimits,
    abort: Option<AbortFlag>,
}

impl InProcessRunner {
    pub fn new(registry: Arc<Registry>) -> Self {
        InProcessRunner {
            registry,
            limits: EvalLimits::default(),
            abort: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: EvalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Every run checks `flag`; once set, runs fail with `Cancelled`.
    #[must_use]
    pub fn with_abort(mut self, flag: AbortFlag) -> Self {
        self.abort = Some(flag);
        self
    }
}

impl Default for InProcessRunner {
    fn default() -> Self {
        InProcessRunner::new(Registry::standard())
    }
}

impl Runner for InProcessRunner {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn submit(&self, request: RunRequest) -> RunTicket {
        RunTicket::ready(evaluate(
            &request.program,
            &request.environment,
            &request.externals,
            &self.registry,
            &self.limits,
            self.abort.as_ref(),
        ))
    }
}

/// Evaluate one program and time it. Shared with the worker side.
#[tracing::instrument(level = "debug", skip_all)]
pub(crate) fn evaluate(
    program: &quill_ir::Program,
    environment: &quill_eval::Environment,
    externals: &quill_eval::Externals,
    registry: &Registry,
    limits: &EvalLimits,
    abort: Option<&AbortFlag>,
) -> RunResult {
    let started = Instant::now();
    let mut evaluator = Evaluator::new(registry).limits(limits.clone());
    if let Some(flag) = abort {
        evaluator = evaluator.abort(flag.clone());
    }
    let output = evaluator.evaluate(program, environment, externals)?;
    Ok(RunSuccess {
        result: output.result,
        bindings: output.bindings,
        exports: output.exports,
        execution_time: started.elapsed(),
    })
}
