//! The module graph: registered sources, their dependency edges and the
//! output cache.
//!
//! # Invalidation
//!
//! `inverse_deps` maps a target module id to every registered module with
//! an import or continues edge to it, from its current version or from a
//! version another module pins. Changing a module's source or edges walks
//! that map breadth-first from the module and drops the cached outputs of
//! everything it reaches:
//!
//! ```text
//! set_source("a")     a ◄── b ◄── c        d
//!                     ✗     ✗     ✗        (kept)
//! ```
//!
//! A new version leaves the pinned versions of the same module untouched,
//! so the walk keeps their outputs and skips importers pinned to them.
//!
//! # Running
//!
//! `run` resolves dependencies depth-first in declaration order, imports
//! before continues. Cached outputs are leaves; a module id seen twice on
//! the current path is a cycle. Each module is handed to the runner only
//! once all of its dependencies succeeded, and its output is cached once the
//! runner answered with a program outcome.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use quill_eval::errors::{cyclic_import, import_depth_exceeded, import_load_failed};
use quill_eval::{Environment, EvalError, Externals, ImportEdge, Value};
use quill_ir::{ImportBinding, Span};
use quill_runner::{InProcessRunner, RunRequest, RunResult, RunTicket, Runner};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::hash::{environment_hash, output_hash, ContentHash};
use crate::linker::Linker;
use crate::module::{Module, Pins};
use crate::output::{CachedOutput, OutputState};
use crate::report;

pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 64;

pub struct ModuleGraphBuilder {
    linker: Option<Arc<dyn Linker>>,
    runner: Option<Arc<dyn Runner>>,
    environment: Environment,
    max_import_depth: usize,
}

impl ModuleGraphBuilder {
    /// Without a linker, modules that import anything fail with
    /// `ImportsForbidden`.
    #[must_use]
    pub fn linker(mut self, linker: Arc<dyn Linker>) -> Self {
        self.linker = Some(linker);
        self
    }

    /// Defaults to an `InProcessRunner` over the standard library.
    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    pub fn build(self) -> ModuleGraph {
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(InProcessRunner::default()));
        ModuleGraph {
            linker: self.linker,
            runner,
            environment_hash: environment_hash(&self.environment),
            environment: self.environment,
            max_import_depth: self.max_import_depth,
            modules: FxHashMap::default(),
            latest: BTreeMap::new(),
            pins: FxHashMap::default(),
            continues: FxHashMap::default(),
            edges: FxHashMap::default(),
            inverse_deps: FxHashMap::default(),
            outputs: FxHashMap::default(),
            outputs_by_id: FxHashMap::default(),
        }
    }
}

/// Registered modules, their edges, and cached outputs.
pub struct ModuleGraph {
    linker: Option<Arc<dyn Linker>>,
    runner: Arc<dyn Runner>,
    environment: Environment,
    environment_hash: ContentHash,
    max_import_depth: usize,

    /// Every module version still reachable, current or pinned.
    modules: FxHashMap<ContentHash, Arc<Module>>,
    /// Current version of each registered id.
    latest: BTreeMap<String, ContentHash>,
    pins: FxHashMap<String, Pins>,
    continues: FxHashMap<String, Vec<String>>,

    /// Targets of each registered module's edges, imports then continues,
    /// over its current and pinned versions.
    edges: FxHashMap<String, Vec<String>>,
    /// Inverse of `edges`, keyed by target id.
    inverse_deps: FxHashMap<String, FxHashSet<String>>,

    outputs: FxHashMap<ContentHash, Arc<CachedOutput>>,
    /// Output hashes cached for each module id, any version.
    outputs_by_id: FxHashMap<String, FxHashSet<ContentHash>>,
}

/// One edge out of a module, in the order its outputs are consumed.
#[derive(Clone, Debug)]
struct Dependency {
    target: String,
    pinned: Option<ContentHash>,
    /// `None` for a continues edge.
    binding: Option<ImportBinding>,
    span: Option<Span>,
}

impl Dependency {
    fn edge(&self, from: &str) -> ImportEdge {
        ImportEdge {
            from: from.to_string(),
            target: self.target.clone(),
            span: self.span,
        }
    }
}

/// Bookkeeping for one `run` call.
#[derive(Default)]
struct RunState {
    /// Ids on the current resolution path, outermost first.
    pending: Vec<String>,
    /// Speculatively submitted runs, by output hash.
    inflight: FxHashMap<ContentHash, RunTicket>,
}

impl RunState {
    fn on_path(&self, id: &str) -> Option<usize> {
        self.pending.iter().position(|p| p == id)
    }

    /// Cancel speculative runs nothing ended up waiting for.
    fn abandon(&mut self) {
        for (_, ticket) in self.inflight.drain() {
            ticket.cancel();
        }
    }
}

impl ModuleGraph {
    pub fn builder() -> ModuleGraphBuilder {
        ModuleGraphBuilder {
            linker: None,
            runner: None,
            environment: Environment::default(),
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
        }
    }

    // === Mutation ===

    /// Register `source` as the current version of `id`.
    ///
    /// An unchanged source is a no-op. Otherwise the cached outputs of `id`
    /// and of every module that transitively depends on it are dropped.
    /// Versions of `id` that other modules pin keep theirs, and so do the
    /// importers pinned to them.
    pub fn set_source(&mut self, id: &str, source: impl Into<String>) -> ContentHash {
        let pins = self.pins.get(id).cloned().unwrap_or_default();
        self.register(Module::new(id, source, pins))
    }

    /// Forget every version of `id`. Returns whether it was registered.
    pub fn remove_source(&mut self, id: &str) -> bool {
        if self.latest.remove(id).is_none() {
            return false;
        }
        self.invalidate(id);
        self.set_edges(id, Vec::new());
        self.modules.retain(|_, module| module.id() != id);
        let pinned_targets = self.pins.remove(id).unwrap_or_default();
        self.continues.remove(id);
        for target in pinned_targets.keys() {
            self.refresh_edges(target);
        }
        debug!(module = id, "module removed");
        true
    }

    /// Evaluate `id` in the scope of the full bindings of `continues`, in
    /// order, before its own imports.
    pub fn set_continues(&mut self, id: &str, continues: Vec<String>) {
        if continues.is_empty() {
            self.continues.remove(id);
        } else {
            self.continues.insert(id.to_string(), continues);
        }
        self.refresh_edges(id);
        // The scope of every version changed under an unchanged hash.
        self.invalidate(id);
    }

    /// Pin imports of `id` to specific module versions.
    ///
    /// Pins are part of a module's identity, so a registered module is
    /// re-registered under a new hash.
    pub fn set_pins(&mut self, id: &str, pins: Pins) {
        let previous = if pins.is_empty() {
            self.pins.remove(id)
        } else {
            self.pins.insert(id.to_string(), pins.clone())
        };
        if let Some(module) = self.latest_module(id) {
            let source = module.source().to_string();
            self.register(Module::new(id, source, pins));
        }
        for target in previous.unwrap_or_default().keys() {
            self.refresh_edges(target);
        }
    }

    /// Outputs cached under other environments stay cached; switching back
    /// reuses them.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment_hash = environment_hash(&environment);
        self.environment = environment;
        debug!(environment = %self.environment_hash.short(), "environment changed");
    }

    /// Runners are interchangeable, so cached outputs stay valid.
    pub fn set_runner(&mut self, runner: Arc<dyn Runner>) {
        debug!(runner = runner.name(), "runner changed");
        self.runner = runner;
    }

    /// Drop every cached output. Returns how many were dropped.
    pub fn evict_outputs(&mut self) -> usize {
        let dropped = self.outputs.len();
        self.outputs.clear();
        self.outputs_by_id.clear();
        dropped
    }

    // === Queries ===

    /// Current version of `id`.
    pub fn module(&self, id: &str) -> Option<&Arc<Module>> {
        self.latest.get(id).and_then(|hash| self.modules.get(hash))
    }

    /// Registered ids in sorted order.
    pub fn module_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.latest.keys().map(String::as_str)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.runner
    }

    /// Registered modules with an edge to `id`, sorted.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .inverse_deps
            .get(id)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        dependents.sort();
        dependents
    }

    /// Cached output of the current version of `id` under the current
    /// environment.
    pub fn get_output(&self, id: &str) -> OutputState {
        let Some(&hash) = self.latest.get(id) else {
            return OutputState::Unknown;
        };
        match self.outputs.get(&output_hash(hash, self.environment_hash)) {
            Some(output) => OutputState::Ready(Arc::clone(output)),
            None => OutputState::NeedsRun,
        }
    }

    /// Whether the inverse index mirrors exactly the edges of the registered
    /// modules.
    pub fn verify_inverse_index(&self) -> bool {
        let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for id in self.latest.keys() {
            if self.latest_module(id).is_none() {
                return false;
            }
            for target in self.edge_targets(id) {
                expected.entry(target).or_default().insert(id.clone());
            }
        }
        let actual: BTreeMap<String, BTreeSet<String>> = self
            .inverse_deps
            .iter()
            .map(|(target, sources)| (target.clone(), sources.iter().cloned().collect()))
            .collect();
        expected == actual
    }

    /// Render `error`, raised while running `id`, against the registered
    /// sources.
    pub fn render_error(&self, id: &str, error: &EvalError) -> String {
        report::render(error, id, |module_id| {
            self.module(module_id).map(|m| m.source().to_string())
        })
    }

    // === Running ===

    /// Run `id` and everything it depends on, reusing cached outputs.
    ///
    /// Program errors are returned and cached. Infrastructure errors and
    /// `ImportDepthExceeded` are returned without caching anything on the
    /// failing path, so the next run retries.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn run(&mut self, id: &str) -> Result<Arc<CachedOutput>, EvalError> {
        let module = match self.latest_module(id) {
            Some(module) => module,
            None => self.load(id)?,
        };
        let mut state = RunState::default();
        let output = self.resolve(&module, &mut state, 0);
        state.abandon();
        let output = output?;
        match &output.result {
            Ok(_) => Ok(output),
            Err(err) => Err(err.clone()),
        }
    }

    /// Output of `module`, from the cache or by running it. `Err` only for
    /// failures that must not be cached.
    fn resolve(
        &mut self,
        module: &Arc<Module>,
        state: &mut RunState,
        depth: usize,
    ) -> Result<Arc<CachedOutput>, EvalError> {
        let key = output_hash(module.hash(), self.environment_hash);
        if let Some(output) = self.outputs.get(&key) {
            return Ok(Arc::clone(output));
        }
        state.pending.push(module.id().to_string());
        let outcome = self.execute(module, state, depth);
        state.pending.pop();
        Ok(self.cache(module, outcome?))
    }

    fn execute(
        &mut self,
        module: &Arc<Module>,
        state: &mut RunState,
        depth: usize,
    ) -> Result<RunResult, EvalError> {
        let program = match module.parse() {
            Ok(program) => program,
            Err(err) => return Ok(Err(err)),
        };
        let dependencies = match self.dependencies(module) {
            Ok(dependencies) => dependencies,
            Err(err) => return Ok(Err(err)),
        };
        if !dependencies.is_empty() && depth >= self.max_import_depth {
            // Depends on the path that got here, so nothing on it is cached.
            return Err(import_depth_exceeded(self.max_import_depth));
        }
        if self.runner.parallelism() > 1 {
            self.speculate(&dependencies, state);
        }

        let mut resolved = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            match self.resolve_dependency(&dependency, state, depth)? {
                Ok(output) => resolved.push((dependency, output)),
                Err(err) => return Ok(Err(err.through_import(dependency.edge(module.id())))),
            }
        }

        let key = output_hash(module.hash(), self.environment_hash);
        let ticket = match state.inflight.remove(&key) {
            Some(ticket) => ticket,
            None => self.runner.submit(RunRequest {
                program,
                environment: self.environment.clone(),
                externals: assemble_externals(&resolved),
            }),
        };
        match ticket.wait() {
            Err(err) if err.is_transient() => {
                debug!(module = module.id(), error = %err, "run failed, not cached");
                Err(err)
            }
            outcome => Ok(outcome),
        }
    }

    /// The target's output, or the program error that stands in for it.
    fn resolve_dependency(
        &mut self,
        dependency: &Dependency,
        state: &mut RunState,
        depth: usize,
    ) -> Result<Result<Arc<CachedOutput>, EvalError>, EvalError> {
        if let Some(start) = state.on_path(&dependency.target) {
            let mut cycle = state.pending[start..].to_vec();
            cycle.push(dependency.target.clone());
            return Ok(Err(cyclic_import(cycle)));
        }
        let target = match self.dependency_module(dependency) {
            Ok(target) => target,
            Err(err) => return Ok(Err(err)),
        };
        let output = self.resolve(&target, state, depth + 1)?;
        Ok(match &output.result {
            Ok(_) => Ok(output),
            Err(err) => Err(err.clone()),
        })
    }

    /// Submit every dependency that can already run, so the runner's
    /// workers overlap. Results are collected in declaration order later.
    fn speculate(&mut self, dependencies: &[Dependency], state: &mut RunState) {
        let mut ready = Vec::new();
        for dependency in dependencies {
            if state.on_path(&dependency.target).is_some() {
                continue;
            }
            let Some(target) = self.registered_dependency(dependency) else {
                continue;
            };
            let key = output_hash(target.hash(), self.environment_hash);
            if self.outputs.contains_key(&key)
                || state.inflight.contains_key(&key)
                || ready.iter().any(|(k, _)| *k == key)
            {
                continue;
            }
            if let Some(request) = self.ready_request(&target, state) {
                ready.push((key, request));
            }
        }
        if ready.len() < 2 {
            return;
        }
        debug!(count = ready.len(), runner = self.runner.name(), "speculative submit");
        for (key, request) in ready {
            state.inflight.insert(key, self.runner.submit(request));
        }
    }

    /// A request for `module` if all of its dependencies already have
    /// successful cached outputs.
    fn ready_request(&self, module: &Module, state: &RunState) -> Option<RunRequest> {
        let program = module.parse().ok()?;
        let dependencies = self.dependencies(module).ok()?;
        let mut resolved = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            if state.on_path(&dependency.target).is_some() {
                return None;
            }
            let target = self.registered_dependency(&dependency)?;
            let output = self
                .outputs
                .get(&output_hash(target.hash(), self.environment_hash))
                .filter(|output| output.is_ok())?;
            resolved.push((dependency, Arc::clone(output)));
        }
        Some(RunRequest {
            program,
            environment: self.environment.clone(),
            externals: assemble_externals(&resolved),
        })
    }

    fn dependencies(&self, module: &Module) -> Result<Vec<Dependency>, EvalError> {
        let imports = module.imports(self.linker.as_deref())?;
        let mut dependencies: Vec<Dependency> = imports
            .iter()
            .map(|import| Dependency {
                target: import.target_id.clone(),
                pinned: import.pinned_hash,
                binding: Some(import.binding.clone()),
                span: Some(import.span),
            })
            .collect();
        let continues = self.continues.get(module.id()).into_iter().flatten();
        dependencies.extend(continues.map(|target| Dependency {
            target: target.clone(),
            pinned: None,
            binding: None,
            span: None,
        }));
        Ok(dependencies)
    }

    fn registered_dependency(&self, dependency: &Dependency) -> Option<Arc<Module>> {
        match dependency.pinned {
            Some(pinned) => self.modules.get(&pinned).cloned(),
            None => self.latest_module(&dependency.target),
        }
    }

    /// The module a dependency refers to, loading it through the linker if
    /// it is not registered yet.
    fn dependency_module(&mut self, dependency: &Dependency) -> Result<Arc<Module>, EvalError> {
        if let Some(module) = self.registered_dependency(dependency) {
            return Ok(module);
        }
        if let Some(pinned) = dependency.pinned {
            return Err(import_load_failed(
                &dependency.target,
                format!("pinned version {} is not registered", pinned.short()),
            ));
        }
        self.load(&dependency.target)
    }

    fn load(&mut self, id: &str) -> Result<Arc<Module>, EvalError> {
        let Some(linker) = self.linker.clone() else {
            return Err(import_load_failed(id, "module is not registered"));
        };
        let source = linker
            .load_source(id)
            .map_err(|err| import_load_failed(id, err))?;
        debug!(module = id, "loaded through linker");
        self.set_source(id, source);
        self.latest_module(id)
            .ok_or_else(|| import_load_failed(id, "module is not registered"))
    }

    // === Bookkeeping ===

    fn latest_module(&self, id: &str) -> Option<Arc<Module>> {
        self.module(id).cloned()
    }

    fn register(&mut self, module: Module) -> ContentHash {
        let hash = module.hash();
        let id = module.id().to_string();
        if self.latest.get(&id) == Some(&hash) {
            return hash;
        }
        // A reverted source gets its old instance, memoized parse included.
        let module = Arc::clone(self.modules.entry(hash).or_insert_with(|| Arc::new(module)));
        self.latest.insert(id.clone(), hash);
        self.refresh_edges(&id);
        for target in module.pins().keys() {
            self.refresh_edges(target);
        }
        self.invalidate_edit(&id, hash);
        debug!(module = %id, hash = %hash.short(), "module registered");
        hash
    }

    /// Target ids of `module`'s edges. A module whose imports cannot be
    /// resolved has import edges to nothing until its source changes.
    fn dependency_targets(&self, module: &Module) -> Vec<String> {
        let mut targets: Vec<String> = match module.imports(self.linker.as_deref()) {
            Ok(imports) => imports.iter().map(|i| i.target_id.clone()).collect(),
            Err(_) => Vec::new(),
        };
        if let Some(continues) = self.continues.get(module.id()) {
            targets.extend(continues.iter().cloned());
        }
        targets
    }

    /// Versions of `id` other than the current one that a registered module
    /// pins.
    fn pinned_versions(&self, id: &str) -> Vec<Arc<Module>> {
        let current = self.latest.get(id);
        let mut hashes: Vec<ContentHash> = self
            .latest
            .keys()
            .filter_map(|importer| self.pins.get(importer)?.get(id).copied())
            .filter(|hash| Some(hash) != current)
            .collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes
            .into_iter()
            .filter_map(|hash| self.modules.get(&hash).cloned())
            .collect()
    }

    /// The current version of `id` followed by its pinned versions.
    fn indexed_versions(&self, id: &str) -> Vec<Arc<Module>> {
        let mut versions: Vec<Arc<Module>> = self.latest_module(id).into_iter().collect();
        if !versions.is_empty() {
            versions.extend(self.pinned_versions(id));
        }
        versions
    }

    /// Edge targets of every indexed version of `id`, without repeats.
    fn edge_targets(&self, id: &str) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for version in self.indexed_versions(id) {
            for target in self.dependency_targets(&version) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        targets
    }

    fn refresh_edges(&mut self, id: &str) {
        let targets = self.edge_targets(id);
        self.set_edges(id, targets);
    }

    /// Whether every indexed version of `dependent` with an edge to `target`
    /// pins it to a version other than `current`.
    fn pins_other_version(&self, dependent: &str, target: &str, current: ContentHash) -> bool {
        let continued = self
            .continues
            .get(dependent)
            .is_some_and(|continues| continues.iter().any(|t| t == target));
        if continued {
            return false;
        }
        self.indexed_versions(dependent)
            .iter()
            .filter(|version| self.dependency_targets(version).iter().any(|t| t == target))
            .all(|version| version.pins().get(target).is_some_and(|pinned| *pinned != current))
    }

    /// Replace the edges of `id`, keeping the inverse index in step.
    fn set_edges(&mut self, id: &str, targets: Vec<String>) {
        if let Some(old) = self.edges.remove(id) {
            for target in old {
                let emptied = self.inverse_deps.get_mut(&target).is_some_and(|sources| {
                    sources.remove(id);
                    sources.is_empty()
                });
                if emptied {
                    self.inverse_deps.remove(&target);
                }
            }
        }
        for target in &targets {
            self.inverse_deps
                .entry(target.clone())
                .or_default()
                .insert(id.to_string());
        }
        if !targets.is_empty() {
            self.edges.insert(id.to_string(), targets);
        }
    }

    /// Drop the outputs of every version of `id` and of everything that
    /// transitively depends on it.
    fn invalidate(&mut self, id: &str) {
        let dropped = self.drop_outputs_where(id, |_| true);
        let dependents = self.dependents(id);
        self.invalidate_dependents(id, dependents, dropped);
    }

    /// `current` just became the current version of `id`. Pinned versions
    /// of `id` keep their outputs, and so do importers pinned to them.
    fn invalidate_edit(&mut self, id: &str, current: ContentHash) {
        let pinned: FxHashSet<ContentHash> = self
            .pinned_versions(id)
            .iter()
            .map(|version| version.hash())
            .collect();
        let dropped = self.drop_outputs_where(id, |output| !pinned.contains(&output.module_hash));
        let dependents: Vec<String> = self
            .dependents(id)
            .into_iter()
            .filter(|dependent| !self.pins_other_version(dependent, id, current))
            .collect();
        self.invalidate_dependents(id, dependents, dropped);
    }

    fn invalidate_dependents(&mut self, id: &str, dependents: Vec<String>, mut dropped: usize) {
        let mut visited = FxHashSet::default();
        visited.insert(id.to_string());
        let mut queue = VecDeque::from(dependents);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            dropped += self.drop_outputs_where(&current, |_| true);
            if let Some(dependents) = self.inverse_deps.get(&current) {
                queue.extend(
                    dependents
                        .iter()
                        .filter(|dependent| !visited.contains(*dependent))
                        .cloned(),
                );
            }
        }
        if dropped > 0 {
            debug!(module = id, reached = visited.len(), dropped, "outputs invalidated");
        }
    }

    /// Drop the cached outputs of `id` that are `stale`.
    fn drop_outputs_where(&mut self, id: &str, stale: impl Fn(&CachedOutput) -> bool) -> usize {
        let Some(hashes) = self.outputs_by_id.get_mut(id) else {
            return 0;
        };
        let outputs = &mut self.outputs;
        let before = hashes.len();
        hashes.retain(|hash| {
            let keep = outputs.get(hash).is_some_and(|output| !stale(output));
            if !keep {
                outputs.remove(hash);
            }
            keep
        });
        let dropped = before - hashes.len();
        if hashes.is_empty() {
            self.outputs_by_id.remove(id);
        }
        dropped
    }

    fn cache(&mut self, module: &Module, result: RunResult) -> Arc<CachedOutput> {
        let output = Arc::new(CachedOutput::new(
            module.id(),
            module.hash(),
            self.environment_hash,
            result,
        ));
        self.outputs.insert(output.hash, Arc::clone(&output));
        self.outputs_by_id
            .entry(module.id().to_string())
            .or_default()
            .insert(output.hash);
        output
    }
}

/// Externals for a module whose dependencies all succeeded.
///
/// Continued modules contribute their full bindings; imports contribute
/// their exports, as one dict for a named import or name by name for a flat
/// one. Later entries win within each group.
fn assemble_externals(resolved: &[(Dependency, Arc<CachedOutput>)]) -> Externals {
    let mut externals = Externals::default();
    for (dependency, output) in resolved {
        let Some(success) = output.success() else {
            continue;
        };
        match &dependency.binding {
            None => externals.continued.extend(
                success
                    .bindings
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            ),
            Some(ImportBinding::Named(name)) => {
                externals
                    .imported
                    .insert(name.clone(), Value::dict(success.exports.clone()));
            }
            Some(ImportBinding::Flat) => externals.imported.extend(
                success
                    .exports
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            ),
        }
    }
    externals
}
