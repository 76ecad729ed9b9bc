//! Worker-thread side shared by the isolated and pool runners.
//!
//! A job is an encoded `WireRequest` plus a reply channel. The worker
//! decodes, evaluates, encodes the `WireResponse` and sends it back. A panic
//! anywhere in that sequence is caught and answered with `InternalRunner`;
//! the caller then retires the thread since its state can no longer be
//! trusted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use quill_eval::errors::internal_runner;
use quill_eval::{AbortFlag, EvalError, EvalLimits, Registry};

use crate::in_process::evaluate;
use crate::protocol::{decode_request, encode_request, encode_response};
use crate::{RunRequest, RunResult};

/// What every worker thread evaluates with.
pub(crate) struct WorkerContext {
    pub registry: Arc<Registry>,
    pub limits: EvalLimits,
}

pub(crate) struct Job {
    pub request: Vec<u8>,
    pub reply: Sender<Vec<u8>>,
    pub abort: AbortFlag,
}

impl Job {
    /// Encode `request` for a worker. Returns the reply receiver alongside.
    pub fn encode(
        request: &RunRequest,
        abort: AbortFlag,
    ) -> Result<(Job, Receiver<Vec<u8>>), EvalError> {
        let bytes = encode_request(request)?;
        let (reply, response) = channel::bounded(1);
        Ok((
            Job {
                request: bytes,
                reply,
                abort,
            },
            response,
        ))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    Crashed,
}

/// Run one job and answer it.
///
/// `settle` runs after evaluation and before the reply is sent, so any
/// bookkeeping it does is visible to whoever the reply wakes. The reply is
/// dropped unanswered only if the response cannot be encoded, which the
/// ticket reports as a disconnect.
pub(crate) fn run_job(
    worker: &str,
    job: Job,
    context: &WorkerContext,
    settle: impl FnOnce(JobOutcome),
) -> JobOutcome {
    let Job {
        request,
        reply,
        abort,
    } = job;
    let caught = panic::catch_unwind(AssertUnwindSafe(|| execute(&request, context, &abort)));
    let (result, outcome) = match caught {
        Ok(result) => (result, JobOutcome::Completed),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(worker, %message, "worker crashed while evaluating");
            (
                Err(internal_runner(format!("worker crashed: {message}"))),
                JobOutcome::Crashed,
            )
        }
    };
    settle(outcome);
    match encode_response(&result) {
        // The submitter may have stopped waiting; nothing to do then.
        Ok(bytes) => drop(reply.send(bytes)),
        Err(err) => tracing::warn!(worker, error = %err, "dropping unencodable response"),
    }
    outcome
}

fn execute(request: &[u8], context: &WorkerContext, abort: &AbortFlag) -> RunResult {
    let decoded = decode_request(request)?;
    evaluate(
        &decoded.program,
        &decoded.environment,
        &decoded.externals,
        &context.registry,
        &context.limits,
        Some(abort),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
