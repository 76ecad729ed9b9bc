//! Immutable, content-addressed modules.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use quill_eval::errors::{import_load_failed, imports_forbidden, syntax_error};
use quill_eval::EvalError;
use quill_ir::{ImportBinding, Program, Span};

use crate::hash::{module_hash, ContentHash};
use crate::linker::Linker;

/// Pinned module versions, by target module id.
pub type Pins = BTreeMap<String, ContentHash>;

/// One import statement, with its target resolved to a module id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    /// Path as written in the source.
    pub path: String,
    pub target_id: String,
    /// Set when the importer pins a specific version of the target.
    pub pinned_hash: Option<ContentHash>,
    pub binding: ImportBinding,
    pub span: Span,
}

/// A source text under an id, plus pinned import versions.
///
/// Never mutated: editing a module's source produces a new `Module` with a
/// new hash. Parsing and import resolution run at most once per instance.
#[derive(Debug)]
pub struct Module {
    id: String,
    source: String,
    pins: Pins,
    hash: ContentHash,
    ast: OnceLock<Result<Arc<Program>, EvalError>>,
    imports: OnceLock<Result<Arc<[Import]>, EvalError>>,
}

impl Module {
    pub fn new(id: impl Into<String>, source: impl Into<String>, pins: Pins) -> Self {
        let id = id.into();
        let source = source.into();
        let hash = module_hash(&id, &source, &pins);
        Module {
            id,
            source,
            pins,
            hash,
            ast: OnceLock::new(),
            imports: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pins(&self) -> &Pins {
        &self.pins
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// The parsed program, or the syntax error that prevented it.
    pub fn parse(&self) -> Result<Arc<Program>, EvalError> {
        self.ast
            .get_or_init(|| {
                quill_parse::parse(&self.source)
                    .map(Arc::new)
                    .map_err(|err| syntax_error(err.message, err.span))
            })
            .clone()
    }

    /// Import statements in declaration order, resolved through `linker`.
    ///
    /// The result is memoized against the first linker asked; a graph keeps
    /// one linker for its lifetime. Without a linker any import statement
    /// fails with `ImportsForbidden`.
    pub fn imports(&self, linker: Option<&dyn Linker>) -> Result<Arc<[Import]>, EvalError> {
        self.imports
            .get_or_init(|| self.resolve_imports(linker))
            .clone()
    }

    fn resolve_imports(&self, linker: Option<&dyn Linker>) -> Result<Arc<[Import]>, EvalError> {
        let program = self.parse()?;
        let mut imports = Vec::new();
        for stmt in program.import_statements() {
            let Some(linker) = linker else {
                return Err(imports_forbidden(stmt.path, stmt.span));
            };
            let target_id = linker
                .resolve(stmt.path, &self.id)
                .map_err(|err| import_load_failed(stmt.path, err).with_span(stmt.span))?;
            imports.push(Import {
                path: stmt.path.to_string(),
                pinned_hash: self.pins.get(&target_id).copied(),
                target_id,
                binding: stmt.binding.clone(),
                span: stmt.span,
            });
        }
        Ok(imports.into())
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests unwrap known-good modules")]

    use pretty_assertions::assert_eq;
    use quill_eval::EvalErrorKind;

    use super::*;
    use crate::linker::MemoryLinker;

    #[test]
    fn parse_is_memoized() {
        let module = Module::new("a", "x = 1", Pins::new());
        let first = module.parse().expect("parses");
        let second = module.parse().expect("parses");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn syntax_errors_keep_their_span() {
        let err = Module::new("a", "x = (1", Pins::new())
            .parse()
            .expect_err("unbalanced");
        assert!(matches!(err.kind, EvalErrorKind::Syntax { .. }));
        assert!(err.span.is_some());
    }

    #[test]
    fn imports_resolve_in_declaration_order_with_pins() {
        let pinned = Module::new("lib", "export k = 1", Pins::new()).hash();
        let mut pins = Pins::new();
        pins.insert("lib".to_string(), pinned);
        let module = Module::new(
            "main",
            "import \"./lib\" as L\nimport \"util\"\nL.k",
            pins,
        );
        let linker = MemoryLinker::new();
        let imports = module.imports(Some(&linker)).expect("resolves");

        let summary: Vec<_> = imports
            .iter()
            .map(|i| (i.target_id.as_str(), i.pinned_hash, i.binding.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("lib", Some(pinned), ImportBinding::Named("L".to_string())),
                ("util", None, ImportBinding::Flat),
            ]
        );
    }

    #[test]
    fn imports_need_a_linker() {
        let module = Module::new("main", "x = 1\nimport \"lib\"", Pins::new());
        let err = module.imports(None).expect_err("no linker");
        assert_eq!(
            err.kind,
            EvalErrorKind::ImportsForbidden {
                path: "lib".to_string()
            }
        );
        assert_eq!(err.span.map(|s| s.start), Some(6));
    }

    #[test]
    fn modules_without_imports_need_no_linker() {
        let module = Module::new("main", "x = 1", Pins::new());
        assert!(module.imports(None).expect("no imports").is_empty());
    }

    #[test]
    fn pins_change_identity() {
        let plain = Module::new("a", "1", Pins::new());
        let mut pins = Pins::new();
        pins.insert("b".to_string(), plain.hash());
        assert_ne!(plain.hash(), Module::new("a", "1", pins).hash());
    }
}
