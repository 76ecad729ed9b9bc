//! Fixed-size worker pool over one FIFO queue.
//!
//! ```text
//! submit ──► [ job | job | job ] ──► worker 0
//!              shared queue     ├──► worker 1
//!                               └──► worker N-1
//! ```
//!
//! Each worker takes the oldest job and runs it to completion before taking
//! the next, so at most N jobs are in flight. A worker whose job panicked
//! starts its own replacement and exits; queued jobs stay queued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use quill_eval::errors::internal_runner;
use quill_eval::{AbortFlag, EvalLimits, Registry};

use crate::worker::{run_job, Job, JobOutcome, WorkerContext};
use crate::{RunRequest, RunTicket, Runner};

/// Point-in-time counters of a `WorkerPoolRunner`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub workers: usize,
    /// Jobs currently being evaluated.
    pub in_flight: usize,
    /// Highest `in_flight` ever observed.
    pub peak_in_flight: usize,
    pub completed: usize,
    /// Jobs that panicked; each one cost a worker replacement.
    pub crashed: usize,
    /// Jobs submitted but not yet picked up.
    pub queued: usize,
}

#[derive(Default)]
struct Counters {
    workers: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicUsize,
    crashed: AtomicUsize,
    queued: AtomicUsize,
}

/// State shared by the pool handle and every worker. Workers hold the
/// receiving end only, so dropping the pool ends them once the queue drains.
struct Shared {
    context: WorkerContext,
    queue: Receiver<Job>,
    counters: Counters,
    next_id: AtomicUsize,
}

pub struct WorkerPoolRunner {
    size: usize,
    shared: Arc<Shared>,
    jobs: Sender<Job>,
}

impl WorkerPoolRunner {
    /// Start `workers` threads (at least one).
    pub fn new(workers: usize, registry: Arc<Registry>, limits: EvalLimits) -> Self {
        let size = workers.max(1);
        let (jobs, queue) = channel::unbounded();
        let shared = Arc::new(Shared {
            context: WorkerContext { registry, limits },
            queue,
            counters: Counters::default(),
            next_id: AtomicUsize::new(0),
        });
        for _ in 0..size {
            spawn_worker(&shared);
        }
        tracing::debug!(workers = size, "worker pool started");
        WorkerPoolRunner { size, shared, jobs }
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            workers: c.workers.load(Ordering::Acquire),
            in_flight: c.in_flight.load(Ordering::Acquire),
            peak_in_flight: c.peak_in_flight.load(Ordering::Acquire),
            completed: c.completed.load(Ordering::Acquire),
            crashed: c.crashed.load(Ordering::Acquire),
            queued: c.queued.load(Ordering::Acquire),
        }
    }
}

impl Runner for WorkerPoolRunner {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    fn parallelism(&self) -> usize {
        self.size
    }

    fn submit(&self, request: RunRequest) -> RunTicket {
        let abort = AbortFlag::new();
        let (job, response) = match Job::encode(&request, abort.clone()) {
            Ok(encoded) => encoded,
            Err(err) => return RunTicket::ready(Err(err)),
        };
        let queued = &self.shared.counters.queued;
        queued.fetch_add(1, Ordering::AcqRel);
        if self.jobs.send(job).is_err() {
            queued.fetch_sub(1, Ordering::AcqRel);
            return RunTicket::ready(Err(internal_runner("worker pool has shut down")));
        }
        RunTicket::pending(response, abort)
    }
}

fn spawn_worker(shared: &Arc<Shared>) {
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    let name = format!("quill-worker-{id}");
    shared.counters.workers.fetch_add(1, Ordering::AcqRel);
    let thread_shared = Arc::clone(shared);
    let thread_name = name.clone();
    let spawned = thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker_loop(&thread_name, &thread_shared));
    if let Err(err) = spawned {
        shared.counters.workers.fetch_sub(1, Ordering::AcqRel);
        tracing::warn!(worker = %name, error = %err, "failed to start pool worker");
    }
}

fn worker_loop(name: &str, shared: &Arc<Shared>) {
    tracing::debug!(worker = name, "pool worker started");
    let c = &shared.counters;
    while let Ok(job) = shared.queue.recv() {
        c.queued.fetch_sub(1, Ordering::AcqRel);
        let now = c.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        c.peak_in_flight.fetch_max(now, Ordering::AcqRel);

        let outcome = run_job(name, job, &shared.context, |outcome| {
            c.in_flight.fetch_sub(1, Ordering::AcqRel);
            match outcome {
                JobOutcome::Completed => {
                    c.completed.fetch_add(1, Ordering::AcqRel);
                }
                JobOutcome::Crashed => {
                    c.crashed.fetch_add(1, Ordering::AcqRel);
                    c.workers.fetch_sub(1, Ordering::AcqRel);
                    spawn_worker(shared);
                }
            }
        });
        if outcome == JobOutcome::Crashed {
            tracing::debug!(worker = name, "pool worker replaced");
            return;
        }
    }
    c.workers.fetch_sub(1, Ordering::AcqRel);
    tracing::debug!(worker = name, "pool worker stopped");
}
