//! Runner backed by one dedicated worker thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, SendError, Sender};
use parking_lot::Mutex;
use quill_eval::errors::internal_runner;
use quill_eval::{AbortFlag, EvalError, EvalLimits, Registry};

use crate::worker::{run_job, Job, JobOutcome, WorkerContext};
use crate::{RunRequest, RunTicket, Runner};

/// Evaluates every request on its own worker thread, one at a time.
///
/// Requests and responses cross the thread boundary only as bytes, so the
/// worker shares nothing with the caller but the immutable registry. The
/// worker is started on first use and replaced after a crash or
/// `terminate`; jobs still queued on a crashed worker fail with
/// `InternalRunner`.
pub struct IsolatedWorkerRunner {
    context: Arc<WorkerContext>,
    worker: Mutex<Option<Worker>>,
    next_id: AtomicUsize,
}

struct Worker {
    name: String,
    jobs: Sender<Job>,
    /// Parent of every job flag handed out while this worker is current.
    abort: AbortFlag,
    retired: Arc<AtomicBool>,
}

impl Worker {
    fn spawn(id: usize, context: Arc<WorkerContext>) -> Result<Worker, EvalError> {
        let name = format!("quill-worker-{id}");
        let (jobs, queue) = channel::unbounded::<Job>();
        let retired = Arc::new(AtomicBool::new(false));

        let thread_name = name.clone();
        let thread_retired = Arc::clone(&retired);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!(worker = %thread_name, "worker started");
                for job in queue {
                    let outcome = run_job(&thread_name, job, &context, |outcome| {
                        if outcome == JobOutcome::Crashed {
                            thread_retired.store(true, Ordering::Release);
                        }
                    });
                    if outcome == JobOutcome::Crashed {
                        break;
                    }
                }
                tracing::debug!(worker = %thread_name, "worker stopped");
            })
            .map_err(|err| internal_runner(format!("failed to start {name}: {err}")))?;

        Ok(Worker {
            name,
            jobs,
            abort: AbortFlag::new(),
            retired,
        })
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

impl IsolatedWorkerRunner {
    pub fn new(registry: Arc<Registry>, limits: EvalLimits) -> Self {
        IsolatedWorkerRunner {
            context: Arc::new(WorkerContext { registry, limits }),
            worker: Mutex::new(None),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Abort every job of the current worker and replace it.
    ///
    /// Aborted jobs resolve to `Cancelled`; later submissions go to the
    /// replacement.
    pub fn terminate(&self) {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.take() {
            worker.abort.abort();
            tracing::debug!(worker = %worker.name, "worker terminated");
        }
        match self.spawn_worker() {
            Ok(worker) => *slot = Some(worker),
            Err(err) => tracing::warn!(error = %err, "no replacement worker"),
        }
    }

    /// Name of the current worker thread, if one is running.
    pub fn worker_name(&self) -> Option<String> {
        self.worker
            .lock()
            .as_ref()
            .filter(|w| !w.is_retired())
            .map(|w| w.name.clone())
    }

    fn spawn_worker(&self) -> Result<Worker, EvalError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Worker::spawn(id, Arc::clone(&self.context))
    }

    fn current<'s>(&self, slot: &'s mut Option<Worker>) -> Result<&'s Worker, EvalError> {
        if slot.as_ref().map_or(true, Worker::is_retired) {
            *slot = Some(self.spawn_worker()?);
        }
        slot.as_ref()
            .ok_or_else(|| internal_runner("isolated worker is unavailable"))
    }
}

impl Default for IsolatedWorkerRunner {
    fn default() -> Self {
        IsolatedWorkerRunner::new(Registry::standard(), EvalLimits::default())
    }
}

impl Runner for IsolatedWorkerRunner {
    fn name(&self) -> &'static str {
        "isolated-worker"
    }

    fn submit(&self, request: RunRequest) -> RunTicket {
        let mut slot = self.worker.lock();
        let worker = match self.current(&mut slot) {
            Ok(worker) => worker,
            Err(err) => return RunTicket::ready(Err(err)),
        };
        let abort = worker.abort.child();
        let (mut job, response) = match Job::encode(&request, abort.clone()) {
            Ok(encoded) => encoded,
            Err(err) => return RunTicket::ready(Err(err)),
        };
        if let Err(SendError(returned)) = worker.jobs.send(job) {
            // The thread exited between the liveness check and the send.
            *slot = None;
            let worker = match self.current(&mut slot) {
                Ok(worker) => worker,
                Err(err) => return RunTicket::ready(Err(err)),
            };
            job = returned;
            job.abort = worker.abort.child();
            let abort = job.abort.clone();
            if worker.jobs.send(job).is_err() {
                return RunTicket::ready(Err(internal_runner("isolated worker refused the job")));
            }
            return RunTicket::pending(response, abort);
        }
        RunTicket::pending(response, abort)
    }
}
