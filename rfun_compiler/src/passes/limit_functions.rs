//! Limit functions: cap every function at six register-passed parameters.
//!
//! A definition with more than six parameters keeps its first five and
//! receives a synthetic vector parameter holding the rest; references to a
//! dropped parameter become `vectorRef`s at its index. Call sites with more
//! than six arguments symmetrically pack arguments six onward into a
//! `vector`, with element types taken from the callee's function type.

use crate::ast::PrimOp;
use crate::constants::MAX_REGISTER_PARAMS;
use crate::error::{CompileError, Result};
use crate::gensym::gensym;
use crate::ir::typed::{TypedDef, TypedExp, TypedProgram};
use crate::types::RfunType;
use std::collections::HashMap;

/// Substitution from dropped parameter names to `vectorRef` expressions.
type Subst = HashMap<String, TypedExp>;

pub fn limit_functions(program: TypedProgram) -> Result<TypedProgram> {
    let defs = program
        .defs
        .into_iter()
        .map(limit_def)
        .collect::<Result<Vec<_>>>()?;
    let body = limit_exp(program.body, &Subst::new())?;
    Ok(TypedProgram { defs, body })
}

fn limit_def(def: TypedDef) -> Result<TypedDef> {
    if def.params.len() <= MAX_REGISTER_PARAMS {
        // The body may still contain over-long call sites.
        let body = limit_exp(def.body, &Subst::new())?;
        return Ok(TypedDef { body, ..def });
    }

    let mut params = def.params;
    let rest = params.split_off(MAX_REGISTER_PARAMS - 1);
    let rest_tys: Vec<RfunType> = rest.iter().map(|(_, t)| t.clone()).collect();
    let vec_ty = RfunType::Vector(rest_tys.clone());
    let vec_name = gensym("args_vec");

    let mut subst = Subst::new();
    for (index, (name, ty)) in rest.into_iter().enumerate() {
        subst.insert(
            name,
            TypedExp::Prim {
                op: PrimOp::VectorRef,
                args: vec![
                    TypedExp::Var {
                        name: vec_name.clone(),
                        ty: vec_ty.clone(),
                    },
                    TypedExp::Int(index as i64),
                ],
                ty,
            },
        );
    }

    let body = limit_exp(def.body, &subst)?;
    params.push((vec_name, vec_ty));
    Ok(TypedDef {
        name: def.name,
        params,
        output_type: def.output_type,
        body,
    })
}

fn limit_exp(e: TypedExp, subst: &Subst) -> Result<TypedExp> {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => Ok(e),
        TypedExp::Var { ref name, .. } => match subst.get(name) {
            Some(replacement) => Ok(replacement.clone()),
            None => Ok(e),
        },
        TypedExp::Let { name, rhs, body } => Ok(TypedExp::Let {
            name,
            rhs: Box::new(limit_exp(*rhs, subst)?),
            body: Box::new(limit_exp(*body, subst)?),
        }),
        TypedExp::Prim { op, args, ty } => Ok(TypedExp::Prim {
            op,
            args: args
                .into_iter()
                .map(|a| limit_exp(a, subst))
                .collect::<Result<Vec<_>>>()?,
            ty,
        }),
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => Ok(TypedExp::If {
            test: Box::new(limit_exp(*test, subst)?),
            then: Box::new(limit_exp(*then, subst)?),
            els: Box::new(limit_exp(*els, subst)?),
            ty,
        }),
        TypedExp::Funcall { fun, args, ty } => {
            let fun = limit_exp(*fun, subst)?;
            let mut args = args
                .into_iter()
                .map(|a| limit_exp(a, subst))
                .collect::<Result<Vec<_>>>()?;

            if args.len() > MAX_REGISTER_PARAMS {
                let rest = args.split_off(MAX_REGISTER_PARAMS - 1);
                let rest_tys = dropped_param_types(&fun, rest.len())?;
                let vec_exp = TypedExp::Prim {
                    op: PrimOp::MakeVector,
                    args: rest,
                    ty: RfunType::Vector(rest_tys),
                };
                args.push(vec_exp);
            }

            Ok(TypedExp::Funcall {
                fun: Box::new(fun),
                args,
                ty,
            })
        }
    }
}

/// The declared types of the arguments being packed, read off the callee's
/// function type.
fn dropped_param_types(fun: &TypedExp, count: usize) -> Result<Vec<RfunType>> {
    let fun_ty = match fun {
        TypedExp::FunRef { ty, .. } | TypedExp::Var { ty, .. } => ty,
        other => {
            return Err(CompileError::internal(
                "limit-functions",
                format!("call through non-function expression {:?}", other),
            ))
        }
    };
    match fun_ty {
        RfunType::Fun { args, .. } if args.len() >= MAX_REGISTER_PARAMS - 1 + count => {
            Ok(args[MAX_REGISTER_PARAMS - 1..MAX_REGISTER_PARAMS - 1 + count].to_vec())
        }
        other => Err(CompileError::internal(
            "limit-functions",
            format!("callee type {} does not cover packed arguments", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine_int_params() -> Vec<(String, RfunType)> {
        (0..9)
            .map(|i| (format!("p{}", i), RfunType::Int))
            .collect()
    }

    #[test]
    fn test_long_def_packs_tail_params() {
        let def = TypedDef {
            name: "g".to_string(),
            params: nine_int_params(),
            output_type: RfunType::Int,
            body: TypedExp::Prim {
                op: PrimOp::Add,
                args: vec![
                    TypedExp::Var {
                        name: "p0".to_string(),
                        ty: RfunType::Int,
                    },
                    TypedExp::Var {
                        name: "p8".to_string(),
                        ty: RfunType::Int,
                    },
                ],
                ty: RfunType::Int,
            },
        };
        let p = TypedProgram {
            defs: vec![def],
            body: TypedExp::Int(0),
        };
        let out = limit_functions(p).unwrap();
        let def = &out.defs[0];

        assert_eq!(def.params.len(), MAX_REGISTER_PARAMS);
        let (_, last_ty) = def.params.last().unwrap();
        assert_eq!(last_ty, &RfunType::Vector(vec![RfunType::Int; 4]));

        // `p8` became `vectorRef(args_vec, 3)`; `p0` stayed a parameter.
        if let TypedExp::Prim { args, .. } = &def.body {
            assert!(matches!(
                &args[0],
                TypedExp::Var { name, .. } if name == "p0"
            ));
            if let TypedExp::Prim { op, args, .. } = &args[1] {
                assert_eq!(*op, PrimOp::VectorRef);
                assert_eq!(args[1], TypedExp::Int(3));
            } else {
                panic!("expected vectorRef, got {:?}", args[1]);
            }
        } else {
            panic!("expected prim body, got {:?}", def.body);
        }
    }

    #[test]
    fn test_long_call_site_packs_tail_args() {
        let fun_ty = RfunType::Fun {
            args: vec![RfunType::Int; 9],
            ret: Box::new(RfunType::Int),
        };
        let call = TypedExp::Funcall {
            fun: Box::new(TypedExp::FunRef {
                name: "g".to_string(),
                ty: fun_ty,
            }),
            args: (1..=9).map(TypedExp::Int).collect(),
            ty: RfunType::Int,
        };
        let p = TypedProgram {
            defs: vec![],
            body: call,
        };
        let out = limit_functions(p).unwrap();

        if let TypedExp::Funcall { args, .. } = &out.body {
            assert_eq!(args.len(), MAX_REGISTER_PARAMS);
            if let TypedExp::Prim { op, args, ty } = args.last().unwrap() {
                assert_eq!(*op, PrimOp::MakeVector);
                assert_eq!(args.len(), 4);
                assert_eq!(ty, &RfunType::Vector(vec![RfunType::Int; 4]));
            } else {
                panic!("expected vector prim, got {:?}", args.last());
            }
        } else {
            panic!("expected funcall, got {:?}", out.body);
        }
    }

    #[test]
    fn test_short_functions_untouched() {
        let def = TypedDef {
            name: "f".to_string(),
            params: vec![("x_1".to_string(), RfunType::Int)],
            output_type: RfunType::Int,
            body: TypedExp::Var {
                name: "x_1".to_string(),
                ty: RfunType::Int,
            },
        };
        let p = TypedProgram {
            defs: vec![def],
            body: TypedExp::Int(0),
        };
        let out = limit_functions(p.clone()).unwrap();
        assert_eq!(out, p);
    }
}
