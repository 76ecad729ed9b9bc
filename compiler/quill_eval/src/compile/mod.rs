//! AST to slot IR.
//!
//! Name resolution happens entirely here, so an unbound identifier is
//! reported before anything is evaluated. Each identifier becomes one of:
//!
//! - `Local(slot)`: bound in the current function's frame
//! - `SelfRef`: the enclosing named lambda, for recursion
//! - `Capture(i)`: bound in an enclosing function, copied at closure creation
//! - `Builtin(name)`: an overload set from the registry
//!
//! Locals shadow builtins. A top-level binding is visible only to the
//! statements after it.

use quill_ir::{BinaryOp, Expr, ExprKind, Param, Program, Span, Stmt, StmtKind};
use quill_stack::ensure_sufficient_stack;
use rustc_hash::FxHashMap;

use crate::errors::{compile_error, unbound_variable, EvalResult};
use crate::ir::{
    CaptureSource, CompiledProgram, IrBinding, IrKind, IrNode, IrParam, IrStatement, LambdaIr,
    Slot,
};
use crate::registry::Registry;
use crate::value::Heap;
use crate::Value;

/// Compile a module body.
///
/// `external_names` are bound before the first statement, in the first
/// frame slots and in the given order.
#[tracing::instrument(level = "debug", skip_all, fields(externals = external_names.len()))]
pub fn compile(
    program: &Program,
    registry: &Registry,
    external_names: &[String],
) -> EvalResult<CompiledProgram> {
    Compiler::new(registry).compile_program(program, external_names)
}

/// How a name resolved inside one function scope.
#[derive(Copy, Clone)]
enum Resolved {
    Local(Slot),
    Capture(u32),
    SelfRef,
}

impl From<Resolved> for CaptureSource {
    fn from(resolved: Resolved) -> Self {
        match resolved {
            Resolved::Local(slot) => CaptureSource::Local(slot),
            Resolved::Capture(index) => CaptureSource::Capture(index),
            Resolved::SelfRef => CaptureSource::SelfRef,
        }
    }
}

/// Slot allocation and captures for one function body (or the module body).
#[derive(Default)]
struct FunctionScope {
    /// Innermost block last.
    blocks: Vec<FxHashMap<String, Slot>>,
    next_slot: Slot,
    frame_size: Slot,
    captures: Vec<(String, CaptureSource)>,
    self_name: Option<String>,
}

impl FunctionScope {
    fn new(self_name: Option<String>) -> Self {
        FunctionScope {
            blocks: vec![FxHashMap::default()],
            self_name,
            ..FunctionScope::default()
        }
    }

    fn lookup_local(&self, name: &str) -> Option<Slot> {
        self.blocks.iter().rev().find_map(|block| block.get(name).copied())
    }

    fn lookup_capture(&self, name: &str) -> Option<u32> {
        self.captures
            .iter()
            .position(|(captured, _)| captured == name)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Bind `name` in the innermost block, reusing its slot on rebinding.
    fn declare(&mut self, name: &str) -> Slot {
        if let Some(&slot) = self.blocks.last().and_then(|block| block.get(name)) {
            return slot;
        }
        let slot = self.fresh_slot();
        if let Some(block) = self.blocks.last_mut() {
            block.insert(name.to_string(), slot);
        }
        slot
    }

    /// A slot no name refers to.
    fn fresh_slot(&mut self) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.frame_size = self.frame_size.max(self.next_slot);
        slot
    }

    fn enter_block(&mut self) -> Slot {
        self.blocks.push(FxHashMap::default());
        self.next_slot
    }

    /// Leave a block; its slots may be reused by later siblings.
    fn exit_block(&mut self, mark: Slot) {
        self.blocks.pop();
        self.next_slot = mark;
    }
}

struct Compiler<'r> {
    registry: &'r Registry,
    /// Enclosing functions, innermost last. Index 0 is the module body.
    functions: Vec<FunctionScope>,
}

impl<'r> Compiler<'r> {
    fn new(registry: &'r Registry) -> Self {
        Compiler {
            registry,
            functions: Vec::new(),
        }
    }

    fn compile_program(
        mut self,
        program: &Program,
        external_names: &[String],
    ) -> EvalResult<CompiledProgram> {
        let mut module = FunctionScope::new(None);
        for name in external_names {
            module.declare(name);
        }
        self.functions.push(module);

        let mut statements = Vec::with_capacity(program.statements.len());
        let mut own_names: Vec<&str> = Vec::new();
        let mut has_result = false;
        for stmt in &program.statements {
            match &stmt.kind {
                // Resolved by the module graph and delivered as externals.
                StmtKind::Import { .. } => has_result = false,
                StmtKind::Let { name, value, .. } => {
                    let value = self.compile_expr(value)?;
                    let slot = self.current().declare(name);
                    statements.push(IrStatement::Bind(IrBinding { slot, value }));
                    if !own_names.contains(&name.as_str()) {
                        own_names.push(name);
                    }
                    has_result = false;
                }
                StmtKind::Expr(expr) => {
                    statements.push(IrStatement::Expr(self.compile_expr(expr)?));
                    has_result = true;
                }
            }
        }

        let exports = if program.has_export_markers() {
            let mut exported: Vec<String> = Vec::new();
            for stmt in &program.statements {
                if let StmtKind::Let {
                    name,
                    exported: true,
                    ..
                } = &stmt.kind
                {
                    if !exported.contains(name) {
                        exported.push(name.clone());
                    }
                }
            }
            exported
        } else {
            own_names.iter().map(|name| (*name).to_string()).collect()
        };

        let module = self.pop_function();
        let mut bindings: Vec<(String, Slot)> = module
            .blocks
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .collect();
        bindings.sort_unstable();

        Ok(CompiledProgram {
            statements,
            frame_size: module.frame_size,
            external_names: external_names.to_vec(),
            bindings,
            exports,
            has_result,
        })
    }

    fn current(&mut self) -> &mut FunctionScope {
        if self.functions.is_empty() {
            self.functions.push(FunctionScope::new(None));
        }
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    fn pop_function(&mut self) -> FunctionScope {
        self.functions.pop().unwrap_or_default()
    }

    fn compile_expr(&mut self, expr: &Expr) -> EvalResult<IrNode> {
        ensure_sufficient_stack(|| self.compile_expr_inner(expr))
    }

    fn compile_expr_inner(&mut self, expr: &Expr) -> EvalResult<IrNode> {
        let span = expr.span;
        let kind = match &expr.kind {
            ExprKind::Number(n) => IrKind::Literal(Value::number(*n)),
            ExprKind::Str(s) => IrKind::Literal(Value::string(s.as_str())),
            ExprKind::Bool(b) => IrKind::Literal(Value::Bool(*b)),
            ExprKind::Ident(name) => self.resolve(name, span)?,
            ExprKind::List(items) => IrKind::List(self.compile_all(items)?),
            ExprKind::Dict(entries) => IrKind::Dict(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.compile_expr(value)?)))
                    .collect::<EvalResult<_>>()?,
            ),
            ExprKind::Binary { op, left, right } => {
                let left = Box::new(self.compile_expr(left)?);
                let right = Box::new(self.compile_expr(right)?);
                match op {
                    BinaryOp::And => IrKind::And(left, right),
                    BinaryOp::Or => IrKind::Or(left, right),
                    _ => {
                        let name = op.builtin_name().ok_or_else(|| {
                            compile_error(format!("operator `{}` has no builtin", op.as_symbol()), span)
                        })?;
                        builtin_call(name, vec![*left, *right], span)
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.compile_expr(operand)?;
                builtin_call(op.builtin_name(), vec![operand], span)
            }
            ExprKind::Call { callee, args } => IrKind::Call {
                callee: Box::new(self.compile_expr(callee)?),
                args: self.compile_all(args)?,
            },
            ExprKind::Lambda { name, params, body } => {
                IrKind::Lambda(Heap::new(self.compile_lambda(name.as_deref(), params, body)?))
            }
            ExprKind::Block { statements, result } => self.compile_block(statements, result)?,
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => IrKind::If {
                condition: Box::new(self.compile_expr(condition)?),
                then_branch: Box::new(self.compile_expr(then_branch)?),
                else_branch: Box::new(self.compile_expr(else_branch)?),
            },
            ExprKind::Field { object, field } => {
                if let Some(builtin) = self.namespaced_builtin(object, field) {
                    builtin
                } else {
                    IrKind::Field {
                        object: Box::new(self.compile_expr(object)?),
                        field: field.clone(),
                    }
                }
            }
            ExprKind::Index { object, index } => IrKind::Index {
                object: Box::new(self.compile_expr(object)?),
                index: Box::new(self.compile_expr(index)?),
            },
        };
        Ok(IrNode { kind, span })
    }

    fn compile_all(&mut self, exprs: &[Expr]) -> EvalResult<Vec<IrNode>> {
        exprs.iter().map(|e| self.compile_expr(e)).collect()
    }

    fn compile_block(&mut self, statements: &[Stmt], result: &Expr) -> EvalResult<IrKind> {
        let mark = self.current().enter_block();
        let compiled = self.compile_block_body(statements, result);
        self.current().exit_block(mark);
        let (bindings, result) = compiled?;
        Ok(IrKind::Block {
            bindings,
            result: Box::new(result),
        })
    }

    fn compile_block_body(
        &mut self,
        statements: &[Stmt],
        result: &Expr,
    ) -> EvalResult<(Vec<IrBinding>, IrNode)> {
        let mut bindings = Vec::with_capacity(statements.len());
        for stmt in statements {
            match &stmt.kind {
                StmtKind::Let { name, value, .. } => {
                    let value = self.compile_expr(value)?;
                    let slot = self.current().declare(name);
                    bindings.push(IrBinding { slot, value });
                }
                StmtKind::Expr(expr) => {
                    let value = self.compile_expr(expr)?;
                    let slot = self.current().fresh_slot();
                    bindings.push(IrBinding { slot, value });
                }
                StmtKind::Import { .. } => {
                    return Err(compile_error("imports are only allowed at the top level", stmt.span));
                }
            }
        }
        Ok((bindings, self.compile_expr(result)?))
    }

    fn compile_lambda(
        &mut self,
        name: Option<&str>,
        params: &[Param],
        body: &Expr,
    ) -> EvalResult<LambdaIr> {
        let mut scope = FunctionScope::new(name.map(str::to_string));
        for param in params {
            if scope.lookup_local(&param.name).is_some() {
                return Err(compile_error(
                    format!("duplicate parameter `{}`", param.name),
                    param.span,
                ));
            }
            scope.declare(&param.name);
        }
        self.functions.push(scope);
        let body = self.compile_expr(body);
        let scope = self.pop_function();
        Ok(LambdaIr {
            name: name.map(str::to_string),
            params: params
                .iter()
                .map(|p| IrParam {
                    name: p.name.clone(),
                    domain: p.domain,
                })
                .collect(),
            captures: scope.captures.into_iter().map(|(_, source)| source).collect(),
            frame_size: scope.frame_size,
            body: body?,
        })
    }

    /// `List.map` and friends: a field access on an unbound namespace name.
    fn namespaced_builtin(&mut self, object: &Expr, field: &str) -> Option<IrKind> {
        let ExprKind::Ident(namespace) = &object.kind else {
            return None;
        };
        let depth = self.functions.len().checked_sub(1)?;
        if self.resolve_in(depth, namespace).is_some() {
            return None;
        }
        let qualified = format!("{namespace}.{field}");
        self.registry
            .contains(&qualified)
            .then_some(IrKind::Builtin(qualified))
    }

    fn resolve(&mut self, name: &str, span: Span) -> EvalResult<IrKind> {
        let resolved = match self.functions.len().checked_sub(1) {
            Some(depth) => self.resolve_in(depth, name),
            None => None,
        };
        match resolved {
            Some(Resolved::Local(slot)) => Ok(IrKind::Local(slot)),
            Some(Resolved::Capture(index)) => Ok(IrKind::Capture(index)),
            Some(Resolved::SelfRef) => Ok(IrKind::SelfRef),
            None if self.registry.contains(name) => Ok(IrKind::Builtin(name.to_string())),
            None => Err(unbound_variable(name, span)),
        }
    }

    /// Resolve `name` as seen from function `depth`, adding captures to
    /// every function between the binding and `depth`.
    fn resolve_in(&mut self, depth: usize, name: &str) -> Option<Resolved> {
        let scope = &self.functions[depth];
        if let Some(slot) = scope.lookup_local(name) {
            return Some(Resolved::Local(slot));
        }
        if scope.self_name.as_deref() == Some(name) {
            return Some(Resolved::SelfRef);
        }
        if let Some(index) = scope.lookup_capture(name) {
            return Some(Resolved::Capture(index));
        }
        let outer = self.resolve_in(depth.checked_sub(1)?, name)?;
        let scope = &mut self.functions[depth];
        let index = u32::try_from(scope.captures.len()).ok()?;
        scope.captures.push((name.to_string(), outer.into()));
        Some(Resolved::Capture(index))
    }
}

fn builtin_call(name: &str, args: Vec<IrNode>, span: Span) -> IrKind {
    IrKind::Call {
        callee: Box::new(IrNode {
            kind: IrKind::Builtin(name.to_string()),
            span,
        }),
        args,
    }
}

#[cfg(test)]
mod tests;
