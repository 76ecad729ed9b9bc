//! What edits drop from the cache, and what they keep.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quill_graph::{ContentHash, ModuleGraph, OutputState, Pins};

use crate::common::{graph_with_sources, linked_graph, number, test_environment};

fn chain_graph() -> ModuleGraph {
    let mut graph = graph_with_sources(&[
        ("a", "x = 1"),
        ("b", "import \"a\" as A\ny = A.x + 1"),
        ("c", "import \"b\" as B\nB.y * 10"),
        ("d", "42"),
    ]);
    graph.run("c").expect("c runs");
    graph.run("d").expect("d runs");
    graph
}

fn pins_to(target: &str, version: ContentHash) -> Pins {
    [(target.to_string(), version)].into_iter().collect()
}

#[test]
fn edits_drop_transitive_dependents_only() {
    let mut graph = chain_graph();
    for id in ["a", "b", "c", "d"] {
        assert!(graph.get_output(id).is_ready(), "{id} should be cached");
    }

    graph.set_source("a", "x = 2");
    for id in ["a", "b", "c"] {
        assert!(graph.get_output(id).needs_run(), "{id} should be dropped");
    }
    assert!(graph.get_output("d").is_ready());
    assert_eq!(number(&graph.run("c").expect("runs")), 30.0);
}

#[test]
fn editing_the_middle_keeps_upstream() {
    let mut graph = chain_graph();
    graph.set_source("b", "import \"a\" as A\ny = A.x + 5");
    assert!(graph.get_output("a").is_ready());
    assert!(graph.get_output("b").needs_run());
    assert!(graph.get_output("c").needs_run());
}

#[test]
fn unchanged_source_is_a_no_op() {
    let mut graph = chain_graph();
    let hash = graph.module("a").expect("registered").hash();
    assert_eq!(graph.set_source("a", "x = 1"), hash);
    assert!(graph.get_output("c").is_ready());
}

#[test]
fn reverting_a_source_restores_its_hash() {
    let mut graph = chain_graph();
    let original = graph.module("a").expect("registered").hash();
    graph.set_source("a", "x = 7");
    assert_eq!(graph.set_source("a", "x = 1"), original);
    assert!(graph.get_output("a").needs_run());
}

#[test]
fn dependents_follow_import_edges() {
    let mut graph = chain_graph();
    assert_eq!(graph.dependents("a"), vec!["b".to_string()]);
    assert_eq!(graph.dependents("b"), vec!["c".to_string()]);
    assert!(graph.dependents("d").is_empty());

    graph.set_source("b", "y = 1");
    assert!(graph.dependents("a").is_empty());
    assert!(graph.verify_inverse_index());
}

#[test]
fn set_continues_drops_own_and_dependent_outputs() {
    let mut graph = chain_graph();
    graph.set_source("cell", "x = 5");
    graph.set_continues("a", vec!["cell".to_string()]);
    for id in ["a", "b", "c"] {
        assert!(graph.get_output(id).needs_run(), "{id} should be dropped");
    }
    assert_eq!(graph.dependents("cell"), vec!["a".to_string()]);

    graph.run("c").expect("runs");
    graph.set_source("cell", "x = 6");
    assert!(graph.get_output("c").needs_run());
}

#[test]
fn remove_source_forgets_the_module() {
    let mut graph = chain_graph();
    assert!(graph.remove_source("a"));
    assert!(!graph.remove_source("a"));
    assert!(graph.module("a").is_none());
    assert!(matches!(graph.get_output("a"), OutputState::Unknown));
    assert!(graph.get_output("b").needs_run());
    assert!(graph.get_output("d").is_ready());
    // `b` still imports `a`, so the edge stays in the index.
    assert_eq!(graph.dependents("a"), vec!["b".to_string()]);
    assert!(graph.verify_inverse_index());

    let err = graph.run("b").expect_err("a is gone");
    assert_eq!(err.import_trace[0].target, "a");
}

#[test]
fn pinned_importers_keep_outputs_across_edits() {
    let (mut graph, _) = linked_graph();
    let v1 = graph.set_source("lib", "export k = 1");
    graph.set_source("main", "import \"lib\" as L\nL.k");
    graph.set_pins("main", pins_to("lib", v1));
    graph.set_source("free", "import \"lib\" as L\nL.k * 10");
    let pinned = graph.run("main").expect("runs");
    graph.run("free").expect("runs");

    graph.set_source("lib", "export k = 2");
    assert!(graph.get_output("lib").needs_run());
    assert!(graph.get_output("free").needs_run());
    let kept = graph.get_output("main").ready().expect("pinned to an unchanged version");
    assert!(Arc::ptr_eq(&pinned, &kept));
    assert!(graph.verify_inverse_index());

    assert_eq!(number(&graph.run("free").expect("runs")), 20.0);
    assert_eq!(number(&graph.run("main").expect("cached")), 1.0);

    // Going back to the pinned version is still an edit of `lib`.
    graph.set_source("lib", "export k = 1");
    assert!(graph.get_output("lib").needs_run());
    assert!(graph.get_output("main").needs_run());
}

#[test]
fn pinned_versions_follow_their_own_imports() {
    let (mut graph, _) = linked_graph();
    graph.set_source("dep", "export n = 1");
    let v1 = graph.set_source("lib", "import \"dep\" as D\nexport k = D.n");
    graph.set_source("main", "import \"lib\" as L\nL.k");
    graph.set_pins("main", pins_to("lib", v1));
    graph.set_source("lib", "export k = 100");
    assert_eq!(number(&graph.run("main").expect("runs")), 1.0);

    // Only the pinned version of `lib` still imports `dep`.
    assert_eq!(graph.dependents("dep"), vec!["lib".to_string()]);
    assert!(graph.verify_inverse_index());

    graph.set_source("dep", "export n = 5");
    assert!(graph.get_output("main").needs_run());
    assert_eq!(number(&graph.run("main").expect("runs")), 5.0);

    graph.set_pins("main", Pins::new());
    assert!(graph.dependents("dep").is_empty());
    assert!(graph.verify_inverse_index());
}

#[test]
fn environment_is_part_of_the_output_key() {
    let mut graph = chain_graph();
    graph.set_environment(test_environment().with_seed("other"));
    assert!(graph.get_output("d").needs_run());
    assert_eq!(graph.environment().seed, "other");

    graph.set_environment(test_environment());
    assert!(graph.get_output("d").is_ready());
}

#[test]
fn evict_outputs_empties_the_cache() {
    let mut graph = chain_graph();
    assert_eq!(graph.evict_outputs(), 4);
    assert!(graph.get_output("a").needs_run());
    assert!(graph.verify_inverse_index());
}

// === Random edit sequences ===

const IDS: [&str; 5] = ["m0", "m1", "m2", "m3", "m4"];

#[derive(Clone, Debug)]
enum Edit {
    Source { id: usize, imports: Vec<usize>, salt: u8 },
    Remove(usize),
    Continues { id: usize, targets: Vec<usize> },
}

fn edit() -> impl Strategy<Value = Edit> {
    let ids = || prop::collection::vec(0..IDS.len(), 0..3);
    prop_oneof![
        3 => (0..IDS.len(), ids(), any::<u8>())
            .prop_map(|(id, imports, salt)| Edit::Source { id, imports, salt }),
        1 => (0..IDS.len()).prop_map(Edit::Remove),
        1 => (0..IDS.len(), ids()).prop_map(|(id, targets)| Edit::Continues { id, targets }),
    ]
}

fn apply(graph: &mut ModuleGraph, edit: &Edit) {
    match edit {
        Edit::Source { id, imports, salt } => {
            let mut source: String = imports
                .iter()
                .map(|i| format!("import \"{}\" as I{i}\n", IDS[*i]))
                .collect();
            source.push_str(&format!("v = {salt}"));
            graph.set_source(IDS[*id], source);
        }
        Edit::Remove(id) => {
            graph.remove_source(IDS[*id]);
        }
        Edit::Continues { id, targets } => {
            let targets = targets.iter().map(|t| IDS[*t].to_string()).collect();
            graph.set_continues(IDS[*id], targets);
        }
    }
}

fn reachable_dependents(graph: &ModuleGraph, id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([id.to_string()]);
    while let Some(current) = queue.pop_front() {
        if seen.insert(current.clone()) {
            queue.extend(graph.dependents(&current));
        }
    }
    seen
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn inverse_index_mirrors_edges(edits in prop::collection::vec(edit(), 1..40)) {
        let (mut graph, _) = linked_graph();
        for edit in &edits {
            apply(&mut graph, edit);
            prop_assert!(graph.verify_inverse_index(), "after {:?}", edit);
        }
    }

    #[test]
    fn edits_invalidate_exactly_the_dependents(
        edits in prop::collection::vec(edit(), 1..30),
        pick in any::<prop::sample::Index>(),
    ) {
        let (mut graph, _) = linked_graph();
        for edit in &edits {
            apply(&mut graph, edit);
        }
        let ids: Vec<String> = graph.module_ids().map(str::to_string).collect();
        prop_assume!(!ids.is_empty());
        for id in &ids {
            // Cycles and missing imports are cached failures; either way
            // the module ends up with an output.
            let _ = graph.run(id);
        }

        let edited = pick.get(&ids);
        graph.set_source(edited, "edited = true");
        let reached = reachable_dependents(&graph, edited);
        for id in &ids {
            let state = graph.get_output(id);
            if reached.contains(id) {
                prop_assert!(state.needs_run(), "{} should be dropped", id);
            } else {
                prop_assert!(state.is_ready(), "{} should be kept", id);
            }
        }
    }
}
