//! Remove complex operands: normalize into A-normal form.
//!
//! After this pass the arguments of every `Prim` and `Funcall` are atoms;
//! anything compound is hoisted into a gensym'd `Let`. `GlobalVal` reads
//! memory and must be materialized into a register, so it always gets a
//! fresh binding. A value-position `If` is hoisted as a whole — its arms
//! are normalized recursively but stay under the `If`, so evaluation stays
//! conditional.

use crate::ir::typed::{mk_let, TypedDef, TypedExp, TypedProgram};
use crate::gensym::gensym;
use crate::types::RfunType;

type Bindings = Vec<(String, TypedExp)>;

pub fn rco(program: TypedProgram) -> TypedProgram {
    TypedProgram {
        defs: program
            .defs
            .into_iter()
            .map(|d| TypedDef {
                body: rco_exp(d.body),
                ..d
            })
            .collect(),
        body: rco_exp(program.body),
    }
}

/// Normalize `e` into an atom, pushing any needed bindings onto `bindings`.
fn rco_atm(e: TypedExp, bindings: &mut Bindings) -> TypedExp {
    match e {
        TypedExp::Int(_) | TypedExp::Bool(_) | TypedExp::Void | TypedExp::Var { .. } => e,
        TypedExp::GlobalVal { .. } => {
            let tmp = gensym("tmp");
            bindings.push((tmp.clone(), e));
            TypedExp::Var {
                name: tmp,
                ty: RfunType::Int,
            }
        }
        TypedExp::Let { name, rhs, body } => {
            let rhs = rco_exp(*rhs);
            bindings.push((name, rhs));
            rco_atm(*body, bindings)
        }
        TypedExp::Prim { op, args, ty } => {
            let args = args.into_iter().map(|a| rco_atm(a, bindings)).collect();
            let tmp = gensym("tmp");
            bindings.push((
                tmp.clone(),
                TypedExp::Prim {
                    op,
                    args,
                    ty: ty.clone(),
                },
            ));
            TypedExp::Var { name: tmp, ty }
        }
        TypedExp::If { .. } => {
            let ty = e.ty();
            let tmp = gensym("tmp");
            bindings.push((tmp.clone(), rco_exp(e)));
            TypedExp::Var { name: tmp, ty }
        }
        TypedExp::FunRef { ref ty, .. } => {
            let ty = ty.clone();
            let tmp = gensym("tmp");
            bindings.push((tmp.clone(), e));
            TypedExp::Var { name: tmp, ty }
        }
        TypedExp::Funcall { fun, args, ty } => {
            let fun = rco_atm(*fun, bindings);
            let args = args.into_iter().map(|a| rco_atm(a, bindings)).collect();
            let tmp = gensym("tmp");
            bindings.push((
                tmp.clone(),
                TypedExp::Funcall {
                    fun: Box::new(fun),
                    args,
                    ty: ty.clone(),
                },
            ));
            TypedExp::Var { name: tmp, ty }
        }
    }
}

fn rco_exp(e: TypedExp) -> TypedExp {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::Var { .. }
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => e,
        TypedExp::Let { name, rhs, body } => TypedExp::Let {
            name,
            rhs: Box::new(rco_exp(*rhs)),
            body: Box::new(rco_exp(*body)),
        },
        TypedExp::Prim { op, args, ty } => {
            let mut bindings = Bindings::new();
            let args = args
                .into_iter()
                .map(|a| rco_atm(a, &mut bindings))
                .collect();
            mk_let(bindings, TypedExp::Prim { op, args, ty })
        }
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => TypedExp::If {
            test: Box::new(rco_exp(*test)),
            then: Box::new(rco_exp(*then)),
            els: Box::new(rco_exp(*els)),
            ty,
        },
        TypedExp::Funcall { fun, args, ty } => {
            let mut bindings = Bindings::new();
            let fun = rco_atm(*fun, &mut bindings);
            let args = args
                .into_iter()
                .map(|a| rco_atm(a, &mut bindings))
                .collect();
            mk_let(
                bindings,
                TypedExp::Funcall {
                    fun: Box::new(fun),
                    args,
                    ty,
                },
            )
        }
    }
}
