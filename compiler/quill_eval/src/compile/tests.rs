#![expect(clippy::expect_used, reason = "tests unwrap compiled output")]

use pretty_assertions::assert_eq;

use super::*;
use crate::errors::EvalErrorKind;

fn compile_source(source: &str, externals: &[&str]) -> EvalResult<CompiledProgram> {
    let program = quill_parse::parse(source).expect("test source parses");
    let externals: Vec<String> = externals.iter().map(|s| (*s).to_string()).collect();
    compile(&program, &Registry::standard(), &externals)
}

fn compiled(source: &str) -> CompiledProgram {
    compile_source(source, &[]).expect("test source compiles")
}

fn bound_expr(program: &CompiledProgram, index: usize) -> &IrNode {
    match &program.statements[index] {
        IrStatement::Bind(binding) => &binding.value,
        IrStatement::Expr(node) => node,
    }
}

fn lambda_ir(node: &IrNode) -> &LambdaIr {
    match &node.kind {
        IrKind::Lambda(ir) => ir,
        other => panic!("expected a lambda, got {other:?}"),
    }
}

#[test]
fn unbound_identifier_fails_before_evaluation() {
    let err = compile_source("x = 1\ny = z + x", &[]).expect_err("z is unbound");
    assert_eq!(
        err.kind,
        EvalErrorKind::UnboundVariable {
            name: "z".to_string()
        }
    );
    assert_eq!(err.span, Some(Span::new(10, 11)));
}

#[test]
fn binding_is_not_visible_to_its_own_value() {
    let err = compile_source("x = x + 1", &[]).expect_err("x is not yet bound");
    assert!(matches!(err.kind, EvalErrorKind::UnboundVariable { ref name } if name == "x"));
    assert!(compile_source("x = x + 1", &["x"]).is_ok());
}

#[test]
fn externals_take_the_first_slots() {
    let program = compile_source("y = a + b", &["a", "b"]).expect("compiles");
    let IrKind::Call { args, .. } = &bound_expr(&program, 0).kind else {
        panic!("expected an add call");
    };
    let kinds: Vec<_> = args.iter().map(|a| a.kind.clone()).collect();
    assert_eq!(kinds, vec![IrKind::Local(0), IrKind::Local(1)]);
    assert_eq!(
        program.bindings,
        vec![("a".to_string(), 0), ("b".to_string(), 1), ("y".to_string(), 2)]
    );
    assert_eq!(program.frame_size, 3);
}

#[test]
fn operators_become_builtin_calls() {
    let program = compiled("1 + 2");
    let IrKind::Call { callee, .. } = &bound_expr(&program, 0).kind else {
        panic!("expected a call");
    };
    assert_eq!(callee.kind, IrKind::Builtin("add".to_string()));
    assert!(program.has_result);
}

#[test]
fn logical_operators_short_circuit() {
    let program = compiled("true && false");
    assert!(matches!(bound_expr(&program, 0).kind, IrKind::And(..)));
}

#[test]
fn recursion_uses_self_reference() {
    let program = compiled("fact(n) = if n <= 1 then 1 else n * fact(n - 1)");
    let ir = lambda_ir(bound_expr(&program, 0));
    assert_eq!(ir.name.as_deref(), Some("fact"));
    assert!(ir.captures.is_empty());
    assert_eq!(ir.frame_size, 1);
}

#[test]
fn free_variables_become_captures() {
    let program = compiled("k = 2\nscale(x) = x * k");
    let ir = lambda_ir(bound_expr(&program, 1));
    assert_eq!(ir.captures, vec![CaptureSource::Local(0)]);
}

#[test]
fn nested_captures_chain_through_enclosing_functions() {
    let program = compiled("k = 2\nouter(a) = {|b| a + b + k}");
    let outer = lambda_ir(bound_expr(&program, 1));
    assert_eq!(outer.captures, vec![CaptureSource::Local(0)]);
    let inner = lambda_ir(&outer.body);
    // `a` is outer's parameter; `k` reaches through outer's capture 0.
    assert_eq!(
        inner.captures,
        vec![CaptureSource::Local(0), CaptureSource::Capture(0)]
    );
}

#[test]
fn locals_shadow_builtins() {
    let program = compiled("add = 3\nadd");
    assert_eq!(bound_expr(&program, 1).kind, IrKind::Local(0));

    let program = compiled("add");
    assert_eq!(
        bound_expr(&program, 0).kind,
        IrKind::Builtin("add".to_string())
    );
}

#[test]
fn namespaced_builtins_resolve_when_namespace_is_unbound() {
    let program = compiled("List.length");
    assert_eq!(
        bound_expr(&program, 0).kind,
        IrKind::Builtin("List.length".to_string())
    );

    let program = compiled("List = {length: 3}\nList.length");
    assert!(matches!(bound_expr(&program, 1).kind, IrKind::Field { .. }));
}

#[test]
fn block_slots_are_reused_after_the_block() {
    let program = compiled("a = { t = 1; t + 1 }\nb = { u = 2; v = 3; u + v }");
    // t shares slot 0 with a; u and v sit above a.
    assert_eq!(program.frame_size, 3);
}

#[test]
fn rebinding_reuses_the_slot() {
    let program = compiled("x = 1\nx = x + 1");
    assert_eq!(program.bindings, vec![("x".to_string(), 0)]);
    assert_eq!(program.exports, vec!["x".to_string()]);
}

#[test]
fn exports_default_to_every_own_binding() {
    let program = compile_source("a = 1\nb = a", &["ext"]).expect("compiles");
    assert_eq!(program.exports, vec!["a".to_string(), "b".to_string()]);
    assert!(!program.has_result);
}

#[test]
fn export_markers_restrict_exports() {
    let program = compiled("a = 1\nexport b = a\nb");
    assert_eq!(program.exports, vec!["b".to_string()]);
    assert!(program.has_result);
}

#[test]
fn imports_are_skipped() {
    let program = compile_source("import \"a\" as A\ny = A.x + 1", &["A"]).expect("compiles");
    assert_eq!(program.statements.len(), 1);
}
