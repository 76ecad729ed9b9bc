//! Quill Graph - modules, their imports, and the cache of their outputs.
//!
//! A `ModuleGraph` owns every registered source as an immutable,
//! content-hashed `Module`. Running a module runs its imports first, hands
//! the program and the imported bindings to the configured `Runner`, and
//! caches the outcome under the hash of (module, environment). Editing a
//! source drops the cached outputs of everything downstream of it and
//! nothing else.
//!
//! ```ignore
//! let mut graph = ModuleGraph::builder()
//!     .linker(Arc::new(MemoryLinker::new()))
//!     .build();
//! graph.set_source("a", "export x = 1");
//! graph.set_source("b", "import \"a\" as A\nexport y = A.x + 1");
//! let output = graph.run("b")?;
//! ```
//!
//! # Tracing
//!
//! Set `RUST_LOG` and call [`init_tracing`] to see invalidation, runner and
//! worker events as a tree:
//!
//! ```bash
//! RUST_LOG=quill_graph=debug,quill_runner=debug cargo test -p quill_graph
//! ```

mod graph;
pub mod hash;
mod linker;
mod module;
mod output;
pub mod report;

use std::sync::Once;

pub use graph::{ModuleGraph, ModuleGraphBuilder, DEFAULT_MAX_IMPORT_DEPTH};
pub use hash::ContentHash;
pub use linker::{LinkError, Linker, MemoryLinker};
pub use module::{Import, Module, Pins};
pub use output::{CachedOutput, OutputState};

static TRACING_INIT: Once = Once::new();

/// Install a tracing subscriber driven by `RUST_LOG`.
///
/// Only takes effect if `RUST_LOG` is set, and only once per process.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .with(filter)
                .init();
        }
    });
}
