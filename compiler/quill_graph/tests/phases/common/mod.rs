//! Shared fixtures for graph tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use quill_eval::{
    Bindings, CallContext, Environment, EvalResult, ParamType, Registry, Value,
};
use quill_graph::{CachedOutput, MemoryLinker, ModuleGraph};
use quill_runner::{InProcessRunner, Runner};

/// Small samples keep distribution-heavy tests fast.
pub fn test_environment() -> Environment {
    Environment::default().with_sample_count(200)
}

/// A graph over an in-memory linker, which the test keeps a handle to.
pub fn linked_graph() -> (ModuleGraph, Arc<MemoryLinker>) {
    let linker = Arc::new(MemoryLinker::new());
    let graph = ModuleGraph::builder()
        .linker(linker.clone())
        .environment(test_environment())
        .build();
    (graph, linker)
}

pub fn graph_with_runner(runner: Arc<dyn Runner>) -> ModuleGraph {
    ModuleGraph::builder()
        .linker(Arc::new(MemoryLinker::new()))
        .runner(runner)
        .environment(test_environment())
        .build()
}

pub fn graph_with_sources(sources: &[(&str, &str)]) -> ModuleGraph {
    let (mut graph, _) = linked_graph();
    for (id, source) in sources {
        graph.set_source(id, *source);
    }
    graph
}

pub fn number(output: &CachedOutput) -> f64 {
    output
        .value()
        .and_then(Value::as_number)
        .unwrap_or_else(|| panic!("{} did not produce a number: {:?}", output.module_id, output.result))
}

pub fn numbers(pairs: &[(&str, f64)]) -> Bindings {
    pairs
        .iter()
        .map(|(name, n)| ((*name).to_string(), Value::number(*n)))
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sleep_ms(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let ms = args[0].as_number().unwrap_or(0.0);
    thread::sleep(Duration::from_millis(ms as u64));
    Ok(Value::number(ms))
}

/// Standard library plus `sleep(ms)`.
pub fn sleepy_registry() -> Arc<Registry> {
    let mut builder = Registry::builder().with_standard_library();
    builder.function("sleep", vec![ParamType::Number], "Number", sleep_ms);
    Arc::new(builder.build())
}

pub fn in_process() -> Arc<dyn Runner> {
    Arc::new(InProcessRunner::default())
}
