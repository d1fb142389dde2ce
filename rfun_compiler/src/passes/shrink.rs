//! Shrink: eliminate the derived operators.
//!
//! `>`, `<=`, `>=` reduce to `<` and `not`; `&&` and `||` lower to `if` so
//! their short-circuit semantics survive. After this pass the only
//! comparison primitives are `==` and `<`.

use crate::ast::PrimOp;
use crate::ir::typed::{TypedDef, TypedExp, TypedProgram};
use crate::types::RfunType;

pub fn shrink(program: TypedProgram) -> TypedProgram {
    TypedProgram {
        defs: program.defs.into_iter().map(shrink_def).collect(),
        body: shrink_exp(program.body),
    }
}

fn shrink_def(def: TypedDef) -> TypedDef {
    TypedDef {
        body: shrink_exp(def.body),
        ..def
    }
}

fn shrink_exp(e: TypedExp) -> TypedExp {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::Var { .. }
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => e,
        TypedExp::Let { name, rhs, body } => TypedExp::Let {
            name,
            rhs: Box::new(shrink_exp(*rhs)),
            body: Box::new(shrink_exp(*body)),
        },
        TypedExp::Prim { op, args, ty } => {
            let mut args: Vec<TypedExp> = args.into_iter().map(shrink_exp).collect();
            match op {
                PrimOp::Gt => {
                    // a > b  :=  b < a
                    args.reverse();
                    TypedExp::Prim {
                        op: PrimOp::Lt,
                        args,
                        ty: RfunType::Bool,
                    }
                }
                PrimOp::Le => {
                    // a <= b  :=  not (b < a)
                    args.reverse();
                    not(TypedExp::Prim {
                        op: PrimOp::Lt,
                        args,
                        ty: RfunType::Bool,
                    })
                }
                PrimOp::Ge => {
                    // a >= b  :=  not (a < b)
                    not(TypedExp::Prim {
                        op: PrimOp::Lt,
                        args,
                        ty: RfunType::Bool,
                    })
                }
                PrimOp::And => match <[TypedExp; 2]>::try_from(args) {
                    Ok([lhs, rhs]) => TypedExp::If {
                        test: Box::new(lhs),
                        then: Box::new(rhs),
                        els: Box::new(TypedExp::Bool(false)),
                        ty: RfunType::Bool,
                    },
                    Err(args) => TypedExp::Prim { op, args, ty },
                },
                PrimOp::Or => match <[TypedExp; 2]>::try_from(args) {
                    Ok([lhs, rhs]) => TypedExp::If {
                        test: Box::new(lhs),
                        then: Box::new(TypedExp::Bool(true)),
                        els: Box::new(rhs),
                        ty: RfunType::Bool,
                    },
                    Err(args) => TypedExp::Prim { op, args, ty },
                },
                _ => TypedExp::Prim { op, args, ty },
            }
        }
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => TypedExp::If {
            test: Box::new(shrink_exp(*test)),
            then: Box::new(shrink_exp(*then)),
            els: Box::new(shrink_exp(*els)),
            ty,
        },
        TypedExp::Funcall { fun, args, ty } => TypedExp::Funcall {
            fun: Box::new(shrink_exp(*fun)),
            args: args.into_iter().map(shrink_exp).collect(),
            ty,
        },
    }
}

fn not(e: TypedExp) -> TypedExp {
    TypedExp::Prim {
        op: PrimOp::Not,
        args: vec![e],
        ty: RfunType::Bool,
    }
}
