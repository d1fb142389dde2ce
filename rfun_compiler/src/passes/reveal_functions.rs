//! Reveal functions: turn references to top-level functions into `FunRef`.
//!
//! After uniquify, every local variable has a fresh name, so any remaining
//! `Var` that names a definition (and carries a function type) must be a
//! first-class reference to it.

use crate::ir::typed::{TypedDef, TypedExp, TypedProgram};
use std::collections::HashSet;

pub fn reveal_functions(program: TypedProgram) -> TypedProgram {
    let top: HashSet<String> = program.defs.iter().map(|d| d.name.clone()).collect();

    TypedProgram {
        defs: program
            .defs
            .into_iter()
            .map(|d| TypedDef {
                body: reveal_exp(d.body, &top),
                ..d
            })
            .collect(),
        body: reveal_exp(program.body, &top),
    }
}

fn reveal_exp(e: TypedExp, top: &HashSet<String>) -> TypedExp {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => e,
        TypedExp::Var { name, ty } => {
            if top.contains(&name) && ty.is_function() {
                TypedExp::FunRef { name, ty }
            } else {
                TypedExp::Var { name, ty }
            }
        }
        TypedExp::Let { name, rhs, body } => TypedExp::Let {
            name,
            rhs: Box::new(reveal_exp(*rhs, top)),
            body: Box::new(reveal_exp(*body, top)),
        },
        TypedExp::Prim { op, args, ty } => TypedExp::Prim {
            op,
            args: args.into_iter().map(|a| reveal_exp(a, top)).collect(),
            ty,
        },
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => TypedExp::If {
            test: Box::new(reveal_exp(*test, top)),
            then: Box::new(reveal_exp(*then, top)),
            els: Box::new(reveal_exp(*els, top)),
            ty,
        },
        TypedExp::Funcall { fun, args, ty } => TypedExp::Funcall {
            fun: Box::new(reveal_exp(*fun, top)),
            args: args.into_iter().map(|a| reveal_exp(a, top)).collect(),
            ty,
        },
    }
}
