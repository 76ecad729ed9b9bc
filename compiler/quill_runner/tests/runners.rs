//! Behavior shared by every runner, plus worker crash and pool bounding.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use quill_eval::{
    Bindings, CallContext, EvalErrorKind, EvalLimits, EvalResult, Environment, Externals,
    ParamType, Registry, Value,
};
use quill_runner::{
    InProcessRunner, IsolatedWorkerRunner, RunRequest, RunResult, Runner, WorkerPoolRunner,
};

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sleep_ms(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let ms = args[0].as_number().unwrap_or(0.0);
    thread::sleep(Duration::from_millis(ms as u64));
    Ok(Value::number(ms))
}

fn crash(_: &mut dyn CallContext, _: &[Value]) -> EvalResult {
    panic!("deliberate crash");
}

/// Standard library plus `sleep(ms)` and `crash()`.
fn test_registry() -> Arc<Registry> {
    let mut builder = Registry::builder().with_standard_library();
    builder
        .function("sleep", vec![ParamType::Number], "Number", sleep_ms)
        .function("crash", vec![], "Void", crash);
    Arc::new(builder.build())
}

/// Takes about ten seconds unless cancelled.
const SLOW: &str = "List.map(List.upTo(1, 10000), {|i| sleep(1) + i})";

fn request(source: &str) -> RunRequest {
    RunRequest {
        program: Arc::new(quill_parse::parse(source).expect("test source parses")),
        environment: Environment::default().with_sample_count(200),
        externals: Externals::default(),
    }
}

fn runners() -> Vec<Box<dyn Runner>> {
    let registry = test_registry();
    vec![
        Box::new(InProcessRunner::new(Arc::clone(&registry))),
        Box::new(IsolatedWorkerRunner::new(
            Arc::clone(&registry),
            EvalLimits::default(),
        )),
        Box::new(WorkerPoolRunner::new(2, registry, EvalLimits::default())),
    ]
}

fn assert_same_outcome(a: &RunResult, b: &RunResult, what: &str) {
    match (a, b) {
        (Ok(a), Ok(b)) => assert!(a.same_values(b), "{what}: outputs differ"),
        (Err(a), Err(b)) => assert_eq!(a, b, "{what}: errors differ"),
        _ => panic!("{what}: one runner failed and the other did not: {a:?} vs {b:?}"),
    }
}

#[test]
fn runners_agree_on_values_and_errors() {
    let sources = [
        "d = normal(5, 1)\nexport m = mean(d)\nexport q = Dist.quantile(d, 0.9)",
        "fact(n) = if n <= 1 then 1 else n * fact(n - 1)\nfact(12)",
        "k = 3\nexport scale(x) = x * k",
        "add(2, \"bar\")",
        "f(x: [0, 1]) = x\nf(2)",
        "xs = List.map(List.upTo(1, 50), {|i| i ^ 2})\nList.sum(xs)",
    ];
    let runners = runners();
    for source in sources {
        let baseline = runners[0].run(request(source));
        for runner in &runners[1..] {
            let other = runner.run(request(source));
            assert_same_outcome(&baseline, &other, &format!("{} on {source:?}", runner.name()));
        }
    }
}

#[test]
fn externals_cross_the_worker_boundary() {
    let mut imported = Bindings::new();
    imported.insert("base".into(), Value::number(40.0));
    let mut req = request("base + 2");
    req.externals = Externals {
        imported,
        ..Externals::default()
    };
    for runner in runners() {
        let output = runner.run(req.clone()).expect("runs");
        assert_eq!(output.result, Value::number(42.0), "{}", runner.name());
    }
}

#[test]
fn isolated_worker_survives_a_crash() {
    let runner = IsolatedWorkerRunner::new(test_registry(), EvalLimits::default());
    assert_eq!(runner.run(request("1 + 1")).expect("runs").result, Value::number(2.0));
    let first = runner.worker_name();

    let err = runner.run(request("crash()")).expect_err("job panics");
    assert!(matches!(err.kind, EvalErrorKind::InternalRunner { .. }));
    assert!(err.to_string().contains("deliberate crash"));
    assert!(err.is_transient());

    assert_eq!(runner.run(request("2 + 2")).expect("runs").result, Value::number(4.0));
    assert_ne!(runner.worker_name(), first);
}

#[test]
fn terminate_cancels_running_jobs_and_replaces_the_worker() {
    let runner = IsolatedWorkerRunner::new(test_registry(), EvalLimits::default());
    let ticket = runner.submit(request(SLOW));
    thread::sleep(Duration::from_millis(20));
    runner.terminate();

    let err = ticket.wait().expect_err("terminated");
    assert_eq!(err.kind, EvalErrorKind::Cancelled);
    assert_eq!(runner.run(request("3")).expect("runs").result, Value::number(3.0));
}

#[test]
fn ticket_cancel_and_timeout() {
    let runner = WorkerPoolRunner::new(1, test_registry(), EvalLimits::default());
    let ticket = runner.submit(request(SLOW));
    ticket.cancel();
    assert_eq!(ticket.wait().expect_err("cancelled").kind, EvalErrorKind::Cancelled);

    let ticket = runner.submit(request(SLOW));
    let err = ticket
        .wait_timeout(Duration::from_millis(10))
        .expect_err("times out");
    assert_eq!(err.kind, EvalErrorKind::Timeout { millis: 10 });
    assert!(err.is_transient());
}

#[test]
fn pool_bounds_concurrency_and_completes_everything() {
    let runner = WorkerPoolRunner::new(2, test_registry(), EvalLimits::default());
    assert_eq!(runner.parallelism(), 2);

    let tickets: Vec<_> = (0..5)
        .map(|i| runner.submit(request(&format!("sleep(40) + {i}"))))
        .collect();
    let results: Vec<f64> = tickets
        .into_iter()
        .map(|t| t.wait().expect("runs").result.as_number().expect("number"))
        .collect();
    assert_eq!(results, vec![40.0, 41.0, 42.0, 43.0, 44.0]);

    let stats = runner.stats();
    assert!(stats.peak_in_flight <= 2, "peak was {}", stats.peak_in_flight);
    assert_eq!(stats.peak_in_flight, 2);
    assert_eq!(stats.workers, 2);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn pool_replaces_crashed_workers_without_losing_queued_jobs() {
    let runner = WorkerPoolRunner::new(2, test_registry(), EvalLimits::default());
    let tickets: Vec<_> = ["crash()", "sleep(20) + 1", "crash()", "sleep(20) + 2", "5"]
        .into_iter()
        .map(|source| runner.submit(request(source)))
        .collect();
    let outcomes: Vec<RunResult> = tickets.into_iter().map(|t| t.wait()).collect();

    assert!(outcomes[0].is_err() && outcomes[2].is_err());
    let values: Vec<_> = [1, 3, 4]
        .iter()
        .map(|&i| outcomes[i].as_ref().expect("runs").result.clone())
        .collect();
    assert_eq!(values, vec![Value::number(21.0), Value::number(22.0), Value::number(5.0)]);

    let stats = runner.stats();
    assert_eq!(stats.crashed, 2);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.workers, 2);
}
