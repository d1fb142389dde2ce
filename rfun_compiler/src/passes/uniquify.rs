//! Uniquify: alpha-rename every let-bound variable and function parameter.
//!
//! Fresh names come from the gensym counter (`<old>_<n>`), so after this
//! pass every binder in the program is globally unique. Top-level function
//! names are left as written; call sites resolve them through a separate
//! top-level environment.

use crate::error::{CompileError, Result};
use crate::gensym::gensym;
use crate::ir::typed::{TypedDef, TypedExp, TypedProgram};
use std::collections::HashMap;

type NameEnv = HashMap<String, String>;

pub fn uniquify(program: TypedProgram) -> Result<TypedProgram> {
    // Function names map to themselves so references survive unchanged.
    let top: NameEnv = program
        .defs
        .iter()
        .map(|d| (d.name.clone(), d.name.clone()))
        .collect();

    let defs = program
        .defs
        .into_iter()
        .map(|d| uniquify_def(d, &top))
        .collect::<Result<Vec<_>>>()?;
    let body = uniquify_exp(program.body, &NameEnv::new(), &top)?;

    Ok(TypedProgram { defs, body })
}

fn uniquify_def(def: TypedDef, top: &NameEnv) -> Result<TypedDef> {
    let mut env = NameEnv::new();
    let params = def
        .params
        .into_iter()
        .map(|(name, ty)| {
            let fresh = gensym(&name);
            env.insert(name, fresh.clone());
            (fresh, ty)
        })
        .collect();

    let body = uniquify_exp(def.body, &env, top)?;
    Ok(TypedDef {
        name: def.name,
        params,
        output_type: def.output_type,
        body,
    })
}

fn uniquify_exp(e: TypedExp, env: &NameEnv, top: &NameEnv) -> Result<TypedExp> {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => Ok(e),
        TypedExp::Var { name, ty } => {
            let renamed = env
                .get(&name)
                .or_else(|| top.get(&name))
                .ok_or_else(|| {
                    CompileError::internal("uniquify", format!("unbound variable `{}`", name))
                })?;
            Ok(TypedExp::Var {
                name: renamed.clone(),
                ty,
            })
        }
        TypedExp::Let { name, rhs, body } => {
            // The binding scopes over the body only.
            let rhs = uniquify_exp(*rhs, env, top)?;
            let fresh = gensym(&name);
            let mut inner = env.clone();
            inner.insert(name, fresh.clone());
            let body = uniquify_exp(*body, &inner, top)?;
            Ok(TypedExp::Let {
                name: fresh,
                rhs: Box::new(rhs),
                body: Box::new(body),
            })
        }
        TypedExp::Prim { op, args, ty } => Ok(TypedExp::Prim {
            op,
            args: args
                .into_iter()
                .map(|a| uniquify_exp(a, env, top))
                .collect::<Result<Vec<_>>>()?,
            ty,
        }),
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => Ok(TypedExp::If {
            test: Box::new(uniquify_exp(*test, env, top)?),
            then: Box::new(uniquify_exp(*then, env, top)?),
            els: Box::new(uniquify_exp(*els, env, top)?),
            ty,
        }),
        TypedExp::Funcall { fun, args, ty } => Ok(TypedExp::Funcall {
            fun: Box::new(uniquify_exp(*fun, env, top)?),
            args: args
                .into_iter()
                .map(|a| uniquify_exp(a, env, top))
                .collect::<Result<Vec<_>>>()?,
            ty,
        }),
    }
}
