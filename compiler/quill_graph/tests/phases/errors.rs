//! Cycles, import failures, and which failures are cached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use quill_eval::errors::internal_runner;
use quill_eval::{EvalErrorKind, EvalLimits, ImportEdge, Registry, Value};
use quill_graph::ModuleGraph;
use quill_runner::{InProcessRunner, RunRequest, RunTicket, Runner, WorkerPoolRunner};

use crate::common::{graph_with_runner, graph_with_sources, number, numbers, test_environment};

fn cycle_of(err: &quill_eval::EvalError) -> Vec<String> {
    match &err.kind {
        EvalErrorKind::CyclicImport { cycle } => cycle.clone(),
        other => panic!("expected a cyclic import, got {other:?}"),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn self_import_is_a_one_hop_cycle() {
    let mut graph = graph_with_sources(&[("a", "import \"a\" as A\n1")]);
    let err = graph.run("a").expect_err("cycle");
    assert_eq!(cycle_of(&err), strings(&["a", "a"]));
    assert_eq!(err.import_trace.len(), 1);
    assert!(graph.get_output("a").is_ready(), "cycle failures are cached");
}

#[test]
fn two_hop_cycle() {
    let mut graph = graph_with_sources(&[
        ("a", "import \"b\" as B\n1"),
        ("b", "import \"a\" as A\n2"),
    ]);
    let err = graph.run("a").expect_err("cycle");
    assert_eq!(cycle_of(&err), strings(&["a", "b", "a"]));
    let edges: Vec<(&str, &str)> = err
        .import_trace
        .iter()
        .map(|e| (e.from.as_str(), e.target.as_str()))
        .collect();
    assert_eq!(edges, vec![("b", "a"), ("a", "b")]);
}

#[test]
fn five_hop_cycle() {
    let mut graph = graph_with_sources(&[]);
    for i in 0..5 {
        graph.set_source(&format!("m{i}"), format!("import \"m{}\" as N\n{i}", (i + 1) % 5));
    }
    let err = graph.run("m2").expect_err("cycle");
    assert_eq!(cycle_of(&err), strings(&["m2", "m3", "m4", "m0", "m1", "m2"]));
    assert_eq!(err.import_trace.len(), 5);

    // Breaking the cycle anywhere makes every member runnable again.
    graph.set_source("m4", "4");
    assert_eq!(number(&graph.run("m2").expect("acyclic")), 2.0);
}

#[test]
fn continues_cycles_are_detected_too() {
    let mut graph = graph_with_sources(&[("c1", "x = 1"), ("c2", "y = 2")]);
    graph.set_continues("c1", strings(&["c2"]));
    graph.set_continues("c2", strings(&["c1"]));
    let err = graph.run("c1").expect_err("cycle");
    assert_eq!(cycle_of(&err), strings(&["c1", "c2", "c1"]));
    assert_eq!(
        err.import_trace.last(),
        Some(&ImportEdge {
            from: "c1".to_string(),
            target: "c2".to_string(),
            span: None,
        })
    );
}

#[test]
fn imports_without_a_linker_are_forbidden() {
    let mut graph = ModuleGraph::builder().environment(test_environment()).build();
    graph.set_source("a", "x = 1");
    graph.set_source("b", "import \"a\" as A\nA.x");
    let a = graph.run("a").expect("no imports");
    assert_eq!(a.value(), Some(&Value::Void));
    assert_eq!(a.exports(), Some(&numbers(&[("x", 1.0)])));

    let err = graph.run("b").expect_err("forbidden");
    assert_eq!(
        err.kind,
        EvalErrorKind::ImportsForbidden {
            path: "a".to_string()
        }
    );
    assert_eq!(err.span.map(|s| s.start), Some(0));
}

#[test]
fn unloadable_imports_name_the_edge() {
    let mut graph = graph_with_sources(&[("main", "x = 1\nimport \"ghost\" as G\nG")]);
    let err = graph.run("main").expect_err("ghost is nowhere");
    assert!(matches!(
        &err.kind,
        EvalErrorKind::ImportLoad { target, .. } if target == "ghost"
    ));
    assert_eq!(err.import_trace.len(), 1);
    assert_eq!(err.import_trace[0].from, "main");
    assert_eq!(err.import_trace[0].span.map(|s| s.start), Some(6));
}

#[test]
fn first_failing_import_in_source_order_wins() {
    let sources = [
        ("ok", "export k = 1"),
        ("bad1", "nope + 1"),
        ("bad2", "List.length(1)"),
        ("main", "import \"ok\"\nimport \"bad1\" as B1\nimport \"bad2\" as B2\nk"),
    ];
    let check = |mut graph: ModuleGraph| {
        for (id, source) in sources {
            graph.set_source(id, source);
        }
        let err = graph.run("main").expect_err("bad1 fails");
        assert_eq!(
            err.kind,
            EvalErrorKind::UnboundVariable {
                name: "nope".to_string()
            }
        );
        assert_eq!(err.import_trace[0].target, "bad1");
        assert_eq!(err.import_trace.len(), 1);
    };
    check(graph_with_runner(Arc::new(InProcessRunner::default())));
    check(graph_with_runner(Arc::new(WorkerPoolRunner::new(
        3,
        Registry::standard(),
        EvalLimits::default(),
    ))));
}

#[test]
fn nested_failures_carry_the_whole_import_chain() {
    let mut graph = graph_with_sources(&[
        ("a", "f(x) = x + \"s\" * 2\nf(1)"),
        ("b", "import \"a\" as A\n1"),
        ("c", "import \"b\" as B\n2"),
    ]);
    let err = graph.run("c").expect_err("a fails");
    let chain: Vec<String> = err.import_trace.iter().map(ToString::to_string).collect();
    assert_eq!(
        chain,
        vec![
            "`b` imports `a` at 0..15".to_string(),
            "`c` imports `b` at 0..15".to_string(),
        ]
    );
    assert!(err.call_trace.is_some());

    let rendered = graph.render_error("c", &err);
    assert!(rendered.contains("while importing `a`"), "{rendered}");
    assert!(rendered.contains("while importing `b`"), "{rendered}");
    assert!(rendered.contains("call stack:"), "{rendered}");
    assert!(rendered.contains("import chain:"), "{rendered}");
}

#[test]
fn import_depth_is_bounded() {
    let mut graph = ModuleGraph::builder()
        .linker(Arc::new(quill_graph::MemoryLinker::new()))
        .max_import_depth(2)
        .build();
    graph.set_source("d0", "import \"d1\" as N\n0");
    graph.set_source("d1", "import \"d2\" as N\n1");
    graph.set_source("d2", "import \"d3\" as N\n2");
    graph.set_source("d3", "3");

    let err = graph.run("d0").expect_err("too deep");
    assert_eq!(err.kind, EvalErrorKind::ImportDepthExceeded { limit: 2 });
    assert_eq!(number(&graph.run("d1").expect("within the limit")), 1.0);
}

#[test]
fn program_errors_are_cached() {
    let mut graph = graph_with_sources(&[("a", "add(2, \"bar\")")]);
    let first = graph.run("a").expect_err("mismatch");
    assert!(matches!(first.kind, EvalErrorKind::ArgumentMismatch { .. }));
    let cached = graph.get_output("a").ready().expect("cached");
    assert_eq!(cached.error(), Some(&first));
    assert_eq!(graph.run("a").expect_err("same failure"), first);
}

#[test]
fn syntax_errors_fail_the_module() {
    let mut graph = graph_with_sources(&[("a", "x = (1"), ("b", "import \"a\" as A\n1")]);
    let err = graph.run("b").expect_err("a does not parse");
    assert!(matches!(err.kind, EvalErrorKind::Syntax { .. }));
    assert_eq!(err.import_trace[0].target, "a");
}

/// Fails with an infrastructure error a set number of times, then runs
/// in-process.
struct FlakyRunner {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    inner: InProcessRunner,
}

impl Runner for FlakyRunner {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn submit(&self, request: RunRequest) -> RunTicket {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            RunTicket::ready(Err(internal_runner("worker went away")))
        } else {
            self.inner.submit(request)
        }
    }
}

#[test]
fn infrastructure_errors_are_not_cached() {
    let runner = Arc::new(FlakyRunner {
        failures_left: AtomicUsize::new(1),
        calls: AtomicUsize::new(0),
        inner: InProcessRunner::default(),
    });
    let mut graph = graph_with_runner(runner.clone());
    graph.set_source("a", "export x = 1");
    graph.set_source("b", "import \"a\" as A\nA.x + 1");

    let err = graph.run("b").expect_err("first run hits the flaky worker");
    assert!(err.is_transient());
    assert!(err.import_trace.is_empty(), "infrastructure errors are not wrapped");
    assert!(graph.get_output("a").needs_run());
    assert!(graph.get_output("b").needs_run());

    assert_eq!(number(&graph.run("b").expect("retry succeeds")), 2.0);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
}
