//! Surface AST — the handoff format from the external parser.
//!
//! The parser is a separate tool; it serializes a [`Program`] to JSON and the
//! compiler picks it up with [`Program::from_json_str`]. The same encoding is
//! handy as a debug dump for any intermediate typed tree.

use crate::types::RfunType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive operators.
///
/// `Allocate` and `Collect` never appear in parser output; the
/// expose-allocation pass introduces them when lowering `MakeVector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimOp {
    Add,
    Neg,
    Not,
    And,
    Or,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    MakeVector,
    VectorRef,
    VectorSet,
    Allocate,
    Collect,
}

impl fmt::Display for PrimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimOp::Add => "+",
            PrimOp::Neg => "neg",
            PrimOp::Not => "not",
            PrimOp::And => "&&",
            PrimOp::Or => "||",
            PrimOp::Eq => "==",
            PrimOp::Lt => "<",
            PrimOp::Le => "<=",
            PrimOp::Gt => ">",
            PrimOp::Ge => ">=",
            PrimOp::MakeVector => "vector",
            PrimOp::VectorRef => "vectorRef",
            PrimOp::VectorSet => "vectorSet",
            PrimOp::Allocate => "allocate",
            PrimOp::Collect => "collect",
        };
        write!(f, "{}", s)
    }
}

/// A surface expression as produced by the parser. Untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exp {
    Int(i64),
    Bool(bool),
    Var(String),
    Prim {
        op: PrimOp,
        args: Vec<Exp>,
    },
    Let {
        name: String,
        rhs: Box<Exp>,
        body: Box<Exp>,
    },
    If {
        test: Box<Exp>,
        then: Box<Exp>,
        els: Box<Exp>,
    },
    Funcall {
        fun: Box<Exp>,
        args: Vec<Exp>,
    },
}

/// A top-level definition. All parameters are annotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Def {
    pub name: String,
    pub params: Vec<(String, RfunType)>,
    pub output_type: RfunType,
    pub body: Exp,
}

/// A whole program: the definitions plus the main body expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub defs: Vec<Def>,
    pub body: Exp,
}

impl Program {
    /// Decode a program from the parser's JSON handoff.
    pub fn from_json_str(s: &str) -> Result<Program, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Encode a program back to JSON (pretty-printed, for debugging).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
