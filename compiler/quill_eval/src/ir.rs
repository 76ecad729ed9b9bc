//! Slot-addressed IR produced by the compiler.
//!
//! Every identifier has been resolved: locals are frame slots, free
//! variables of a lambda are capture indices, builtins are referenced by
//! stable name. The IR is serializable because user closures carry their
//! body across the worker boundary.

use quill_ir::{Domain, Span};
use serde::{Deserialize, Serialize};

use crate::value::Heap;
use crate::Value;

/// Index into the current frame.
pub type Slot = u32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrNode {
    pub kind: IrKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum IrKind {
    Literal(Value),
    Local(Slot),
    Capture(u32),
    /// The lambda currently executing, for self-recursion.
    SelfRef,
    Builtin(String),
    List(Vec<IrNode>),
    Dict(Vec<(String, IrNode)>),
    Call {
        callee: Box<IrNode>,
        args: Vec<IrNode>,
    },
    Lambda(Heap<LambdaIr>),
    Block {
        bindings: Vec<IrBinding>,
        result: Box<IrNode>,
    },
    If {
        condition: Box<IrNode>,
        then_branch: Box<IrNode>,
        else_branch: Box<IrNode>,
    },
    And(Box<IrNode>, Box<IrNode>),
    Or(Box<IrNode>, Box<IrNode>),
    Field {
        object: Box<IrNode>,
        field: String,
    },
    Index {
        object: Box<IrNode>,
        index: Box<IrNode>,
    },
}

/// Store the value of `value` into `slot`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrBinding {
    pub slot: Slot,
    pub value: IrNode,
}

/// Where a closure's captured value comes from when the closure is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSource {
    Local(Slot),
    Capture(u32),
    SelfRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrParam {
    pub name: String,
    pub domain: Option<Domain>,
}

/// Compiled body of a user lambda. Parameters occupy slots `0..params.len()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LambdaIr {
    pub name: Option<String>,
    pub params: Vec<IrParam>,
    pub captures: Vec<CaptureSource>,
    pub frame_size: u32,
    pub body: IrNode,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrStatement {
    Bind(IrBinding),
    Expr(IrNode),
}

/// A compiled module body.
///
/// Externals occupy the first frame slots in `external_names` order; the
/// module's own bindings follow.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledProgram {
    pub statements: Vec<IrStatement>,
    pub frame_size: u32,
    pub external_names: Vec<String>,
    /// Final slot of every top-level name visible after the last statement,
    /// inherited continuation bindings included.
    pub bindings: Vec<(String, Slot)>,
    pub exports: Vec<String>,
    /// Whether the last statement is an expression whose value is the result.
    pub has_result: bool,
}
