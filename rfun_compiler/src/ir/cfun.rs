//! The Cfun control-flow-graph IR.
//!
//! Explicate-control lowers the typed tree into this form: per-definition
//! maps from block labels to [`Tail`]s. Atoms, expressions, statements and
//! tails are separate layers, so instruction selection is a flat case
//! analysis with no recursion into operands.

use crate::ast::PrimOp;
use crate::types::RfunType;

/// An atom: a value with no sub-evaluations.
#[derive(Debug, Clone, PartialEq)]
pub enum Atm {
    Int(i64),
    Bool(bool),
    Void,
    Var { name: String, ty: RfunType },
    GlobalVal(String),
}

/// A flat expression whose operands are atoms.
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Atm(Atm),
    Prim {
        op: PrimOp,
        args: Vec<Atm>,
        ty: RfunType,
    },
    FunRef(String),
    Call {
        fun: Atm,
        args: Vec<Atm>,
        ty: RfunType,
    },
}

/// A statement: an effect that does not transfer control.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name := exp`. `is_vec` records whether the assigned value is a heap
    /// pointer; instruction selection turns this into `VecVar` vs `Var`.
    Assign {
        name: String,
        exp: Exp,
        is_vec: bool,
    },
    /// Run the collector to make `bytes` available.
    Collect { bytes: i64 },
}

/// A tail: a computation that ends a basic block.
#[derive(Debug, Clone, PartialEq)]
pub enum Tail {
    Return(Exp),
    Seq {
        stmt: Stmt,
        rest: Box<Tail>,
    },
    /// Conditional branch; `cmp` is always a Bool-valued comparison `Prim`.
    If {
        cmp: Exp,
        then_label: String,
        else_label: String,
    },
    Goto(String),
    TailCall {
        fun: Atm,
        args: Vec<Atm>,
        ty: RfunType,
    },
}

/// A definition lowered to a block map. Blocks are kept in creation order;
/// the entry block is labeled `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: String,
    pub params: Vec<(String, RfunType)>,
    pub output_type: RfunType,
    pub blocks: Vec<(String, Tail)>,
}

/// A whole Cfun program. The original top-level body has become a synthetic
/// `main` definition by this point.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub defs: Vec<Def>,
}
