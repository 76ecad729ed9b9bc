//! Resolving and running modules.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use quill_eval::{EvalLimits, Registry, Value};
use quill_graph::{CachedOutput, ModuleGraph, OutputState};
use quill_runner::{IsolatedWorkerRunner, Runner, WorkerPoolRunner};

use crate::common::{
    graph_with_runner, graph_with_sources, in_process, linked_graph, number, numbers,
    sleepy_registry,
};

#[test]
fn edited_import_flows_into_importer() {
    let mut graph = graph_with_sources(&[
        ("a", "x = 1"),
        ("b", "import \"a\" as A\ny = A.x + 1"),
    ]);
    let b = graph.run("b").expect("b runs");
    assert_eq!(b.exports(), Some(&numbers(&[("y", 2.0)])));

    graph.set_source("a", "x = 10");
    assert!(graph.get_output("b").needs_run());
    let b = graph.run("b").expect("b runs");
    assert_eq!(b.exports(), Some(&numbers(&[("y", 11.0)])));
}

#[test]
fn get_output_after_run_is_the_run_output() {
    let mut graph = graph_with_sources(&[("a", "x = 2\nx * 21")]);
    assert!(graph.get_output("a").needs_run());
    assert!(matches!(graph.get_output("zzz"), OutputState::Unknown));

    let ran = graph.run("a").expect("runs");
    let cached = graph.get_output("a").ready().expect("cached");
    assert!(Arc::ptr_eq(&ran, &cached));
    assert_eq!(number(&cached), 42.0);
}

#[test]
fn cached_outputs_are_reused() {
    let mut graph = graph_with_sources(&[("a", "x = 1"), ("b", "import \"a\" as A\nA.x")]);
    let first = graph.run("b").expect("runs");
    let a_first = graph.get_output("a").ready().expect("a cached as a leaf");
    let second = graph.run("b").expect("runs");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(
        &a_first,
        &graph.get_output("a").ready().expect("still cached")
    ));
}

#[test]
fn running_twice_is_deterministic() {
    let sources = [
        ("dist", "export d = normal(10, 2)\nexport m = mean(d)"),
        ("main", "import \"dist\"\nexport q = Dist.quantile(d, 0.5)\nm"),
    ];
    let mut graph = graph_with_sources(&sources);
    let first = graph.run("main").expect("runs");
    graph.evict_outputs();
    let second = graph.run("main").expect("runs");
    assert!(first.same_values(&second));

    let mut other = graph_with_sources(&sources);
    let third = other.run("main").expect("runs");
    assert_eq!(first.hash, third.hash);
    assert!(first.same_values(&third));
}

#[test]
fn flat_imports_bind_each_export() {
    let mut graph = graph_with_sources(&[
        ("lib", "export k = 4\nhidden = 1\nexport twice(x) = x * 2"),
        ("main", "import \"lib\"\ntwice(k)"),
    ]);
    assert_eq!(number(&graph.run("main").expect("runs")), 8.0);
}

#[test]
fn private_bindings_do_not_leak_through_imports() {
    let mut graph = graph_with_sources(&[
        ("lib", "export k = 4\nhidden = 1"),
        ("main", "import \"lib\" as L\nDict.keys(L)"),
    ]);
    let output = graph.run("main").expect("runs");
    assert_eq!(output.value(), Some(&Value::list(vec![Value::string("k")])));
}

#[test]
fn later_imports_win() {
    let mut graph = graph_with_sources(&[
        ("p", "export k = 1"),
        ("q", "export k = 2"),
        ("main", "import \"p\"\nimport \"q\"\nk"),
    ]);
    assert_eq!(number(&graph.run("main").expect("runs")), 2.0);
}

#[test]
fn continues_chain_like_notebook_cells() {
    let mut graph = graph_with_sources(&[("c1", "x = 2"), ("c2", "y = x * 3"), ("c3", "x + y")]);
    graph.set_continues("c2", vec!["c1".to_string()]);
    graph.set_continues("c3", vec!["c2".to_string()]);

    let c2 = graph.run("c2").expect("runs");
    assert_eq!(
        c2.success().expect("ok").bindings,
        numbers(&[("x", 2.0), ("y", 6.0)])
    );
    assert_eq!(number(&graph.run("c3").expect("runs")), 8.0);

    graph.set_source("c1", "x = 5");
    assert!(graph.get_output("c3").needs_run());
    assert_eq!(number(&graph.run("c3").expect("runs")), 20.0);
}

#[test]
fn imports_shadow_continued_names() {
    let mut graph = graph_with_sources(&[
        ("cell", "x = 2"),
        ("lib", "export x = 100"),
        ("main", "import \"lib\"\nx"),
    ]);
    graph.set_continues("main", vec!["cell".to_string()]);
    assert_eq!(number(&graph.run("main").expect("runs")), 100.0);
}

#[test]
fn unknown_imports_are_loaded_through_the_linker() {
    let (mut graph, linker) = linked_graph();
    linker.insert("lib", "export k = 41");
    graph.set_source("main", "import \"./lib\" as L\nL.k + 1");

    assert_eq!(number(&graph.run("main").expect("runs")), 42.0);
    assert_eq!(graph.module_ids().collect::<Vec<_>>(), vec!["lib", "main"]);
    assert_eq!(linker.loads(), 1);

    graph.set_source("main", "import \"lib\" as L\nL.k - 1");
    assert_eq!(number(&graph.run("main").expect("runs")), 40.0);
    assert_eq!(linker.loads(), 1, "registered modules are not reloaded");
}

#[test]
fn unregistered_roots_are_loaded_too() {
    let (mut graph, linker) = linked_graph();
    linker.insert("solo", "3 * 3");
    assert_eq!(number(&graph.run("solo").expect("runs")), 9.0);
    assert!(graph.module("solo").is_some());
}

#[test]
fn pinned_imports_reach_old_versions() {
    let (mut graph, _) = linked_graph();
    let v1 = graph.set_source("lib", "export k = 1");
    graph.set_source("lib", "export k = 2");
    graph.set_source("main", "import \"lib\" as L\nL.k");
    assert_eq!(number(&graph.run("main").expect("runs")), 2.0);

    let unpinned = graph.module("main").expect("registered").hash();
    graph.set_pins("main", [("lib".to_string(), v1)].into_iter().collect());
    assert_ne!(graph.module("main").expect("registered").hash(), unpinned);
    assert!(graph.get_output("main").needs_run());
    assert_eq!(number(&graph.run("main").expect("runs")), 1.0);
}

#[test]
fn closures_cross_module_and_worker_boundaries() {
    let sources = [
        ("lib", "k = 3\nexport scale(x) = x * k"),
        ("main", "import \"lib\" as L\nexport r = L.scale(5)\nList.map([1, 2], L.scale)"),
    ];
    let run_with = |runner: Arc<dyn Runner>| -> Arc<CachedOutput> {
        let mut graph = graph_with_runner(runner);
        for (id, source) in sources {
            graph.set_source(id, source);
        }
        graph.run("main").expect("runs")
    };

    let local = run_with(in_process());
    let isolated = run_with(Arc::new(IsolatedWorkerRunner::default()));
    assert!(local.same_values(&isolated));
    assert_eq!(local.exports(), Some(&numbers(&[("r", 15.0)])));
}

#[test]
fn switching_runners_keeps_cached_outputs() {
    let mut graph = graph_with_sources(&[("a", "1 + 1")]);
    let first = graph.run("a").expect("runs");
    graph.set_runner(Arc::new(WorkerPoolRunner::new(
        2,
        Registry::standard(),
        EvalLimits::default(),
    )));
    assert_eq!(graph.runner().name(), "worker-pool");
    assert!(Arc::ptr_eq(&first, &graph.run("a").expect("cached")));
}

#[test]
fn pool_runs_independent_imports_side_by_side() {
    let pool = Arc::new(WorkerPoolRunner::new(
        2,
        sleepy_registry(),
        EvalLimits::default(),
    ));
    let mut graph = graph_with_runner(pool.clone());
    for i in 1..=3 {
        graph.set_source(&format!("l{i}"), format!("export v = sleep(50) + {i}"));
    }
    graph.set_source(
        "main",
        "import \"l1\" as A\nimport \"l2\" as B\nimport \"l3\" as C\nA.v + B.v + C.v",
    );

    assert_eq!(number(&graph.run("main").expect("runs")), 156.0);
    let stats = pool.stats();
    assert_eq!(stats.peak_in_flight, 2);
    assert_eq!(stats.completed, 4);
}

#[test]
fn pool_and_in_process_graphs_agree() {
    let sources = [
        ("base", "export n = 12"),
        ("fact", "import \"base\"\nf(k) = if k <= 1 then 1 else k * f(k - 1)\nexport r = f(n)"),
        ("dist", "import \"base\"\nexport d = uniform(0, n)\nexport m = mean(d)"),
        ("main", "import \"fact\" as F\nimport \"dist\" as D\nimport \"base\"\nF.r + D.m"),
    ];
    let build = |runner: Arc<dyn Runner>| -> ModuleGraph {
        let mut graph = graph_with_runner(runner);
        for (id, source) in sources {
            graph.set_source(id, source);
        }
        graph
    };
    let mut local = build(in_process());
    let mut pooled = build(Arc::new(WorkerPoolRunner::new(
        3,
        Registry::standard(),
        EvalLimits::default(),
    )));
    let a = local.run("main").expect("runs");
    let b = pooled.run("main").expect("runs");
    assert!(a.same_values(&b));
}
