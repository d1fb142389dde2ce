//! The Rfun type language.
//!
//! Types are compared structurally everywhere in the compiler; two
//! `Vector` types are equal exactly when their component lists are equal.
//! `Vector` is the only heap-allocated type, which is what the register
//! allocator's root-stack discipline keys on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An Rfun type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfunType {
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// The unit type produced by `vectorSet` and `collect`
    Void,
    /// Heap-allocated tuple with per-component types
    Vector(Vec<RfunType>),
    /// Type of a top-level function
    Fun {
        args: Vec<RfunType>,
        ret: Box<RfunType>,
    },
}

impl RfunType {
    /// True for types whose values are pointers into the GC heap.
    pub fn is_vector(&self) -> bool {
        matches!(self, RfunType::Vector(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, RfunType::Fun { .. })
    }
}

impl fmt::Display for RfunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RfunType::Int => write!(f, "Int"),
            RfunType::Bool => write!(f, "Bool"),
            RfunType::Void => write!(f, "Void"),
            RfunType::Vector(elems) => {
                write!(f, "Vector[")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, "]")
            }
            RfunType::Fun { args, ret } => {
                write!(f, "(")?;
                for (i, t) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}
