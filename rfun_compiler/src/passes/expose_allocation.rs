//! Expose allocation: lower `vector` into an explicit allocation protocol.
//!
//! Each `vector(e1, …, en)` becomes a chain of binds that evaluates the
//! elements, runs the collector if the allocation would overflow fromspace,
//! calls `allocate`, and stores each element with `vectorSet`. This is the
//! only pass that introduces the `allocate` and `collect` primitives.

use crate::ast::PrimOp;
use crate::error::{CompileError, Result};
use crate::gensym::gensym;
use crate::ir::typed::{mk_let, TypedDef, TypedExp, TypedProgram};
use crate::types::RfunType;

pub fn expose_allocation(program: TypedProgram) -> Result<TypedProgram> {
    let defs = program
        .defs
        .into_iter()
        .map(|d| {
            Ok(TypedDef {
                body: expose_exp(d.body)?,
                ..d
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let body = expose_exp(program.body)?;
    Ok(TypedProgram { defs, body })
}

fn expose_exp(e: TypedExp) -> Result<TypedExp> {
    match e {
        TypedExp::Int(_)
        | TypedExp::Bool(_)
        | TypedExp::Void
        | TypedExp::Var { .. }
        | TypedExp::GlobalVal { .. }
        | TypedExp::FunRef { .. } => Ok(e),
        TypedExp::Let { name, rhs, body } => Ok(TypedExp::Let {
            name,
            rhs: Box::new(expose_exp(*rhs)?),
            body: Box::new(expose_exp(*body)?),
        }),
        TypedExp::Prim { op, args, ty } => {
            let args = args
                .into_iter()
                .map(expose_exp)
                .collect::<Result<Vec<_>>>()?;
            if op == PrimOp::MakeVector {
                lower_vector(args, ty)
            } else {
                Ok(TypedExp::Prim { op, args, ty })
            }
        }
        TypedExp::If {
            test,
            then,
            els,
            ty,
        } => Ok(TypedExp::If {
            test: Box::new(expose_exp(*test)?),
            then: Box::new(expose_exp(*then)?),
            els: Box::new(expose_exp(*els)?),
            ty,
        }),
        TypedExp::Funcall { fun, args, ty } => Ok(TypedExp::Funcall {
            fun: Box::new(expose_exp(*fun)?),
            args: args
                .into_iter()
                .map(expose_exp)
                .collect::<Result<Vec<_>>>()?,
            ty,
        }),
    }
}

fn lower_vector(elems: Vec<TypedExp>, vec_ty: RfunType) -> Result<TypedExp> {
    let elem_tys = match &vec_ty {
        RfunType::Vector(tys) => tys.clone(),
        other => {
            return Err(CompileError::internal(
                "expose-allocation",
                format!("`vector` carries non-vector type {}", other),
            ))
        }
    };

    let mut bindings: Vec<(String, TypedExp)> = Vec::new();

    // Evaluate each element into a name, left to right.
    let elem_names: Vec<String> = elems
        .into_iter()
        .map(|elem| {
            let name = gensym("v");
            bindings.push((name.clone(), elem));
            name
        })
        .collect();

    // Run the collector if the allocation would overflow fromspace:
    //   if free_ptr + bytes < fromspace_end then void else collect(bytes)
    let total_bytes = 8 + 8 * elem_names.len() as i64;
    let gc_check = TypedExp::If {
        test: Box::new(TypedExp::Prim {
            op: PrimOp::Lt,
            args: vec![
                TypedExp::Prim {
                    op: PrimOp::Add,
                    args: vec![
                        TypedExp::GlobalVal {
                            name: "free_ptr".to_string(),
                        },
                        TypedExp::Int(total_bytes),
                    ],
                    ty: RfunType::Int,
                },
                TypedExp::GlobalVal {
                    name: "fromspace_end".to_string(),
                },
            ],
            ty: RfunType::Bool,
        }),
        then: Box::new(TypedExp::Void),
        els: Box::new(TypedExp::Prim {
            op: PrimOp::Collect,
            args: vec![TypedExp::Int(total_bytes)],
            ty: RfunType::Void,
        }),
        ty: RfunType::Void,
    };
    bindings.push((gensym("_"), gc_check));

    // Allocate the vector itself.
    let vec_name = gensym("vec");
    bindings.push((
        vec_name.clone(),
        TypedExp::Prim {
            op: PrimOp::Allocate,
            args: vec![TypedExp::Int(elem_names.len() as i64)],
            ty: vec_ty.clone(),
        },
    ));

    // Initialize each component from its name.
    for (index, (elem_name, elem_ty)) in elem_names.iter().zip(&elem_tys).enumerate() {
        bindings.push((
            gensym("_"),
            TypedExp::Prim {
                op: PrimOp::VectorSet,
                args: vec![
                    TypedExp::Var {
                        name: vec_name.clone(),
                        ty: vec_ty.clone(),
                    },
                    TypedExp::Int(index as i64),
                    TypedExp::Var {
                        name: elem_name.clone(),
                        ty: elem_ty.clone(),
                    },
                ],
                ty: RfunType::Void,
            },
        ));
    }

    Ok(mk_let(
        bindings,
        TypedExp::Var {
            name: vec_name,
            ty: vec_ty,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Count `allocate` and `collect` prims in a tree.
    fn count_ops(e: &TypedExp, op: PrimOp) -> usize {
        match e {
            TypedExp::Prim { op: o, args, .. } => {
                (*o == op) as usize + args.iter().map(|a| count_ops(a, op)).sum::<usize>()
            }
            TypedExp::Let { rhs, body, .. } => count_ops(rhs, op) + count_ops(body, op),
            TypedExp::If {
                test, then, els, ..
            } => count_ops(test, op) + count_ops(then, op) + count_ops(els, op),
            TypedExp::Funcall { fun, args, .. } => {
                count_ops(fun, op) + args.iter().map(|a| count_ops(a, op)).sum::<usize>()
            }
            _ => 0,
        }
    }

    #[test]
    fn test_vector_becomes_allocate_and_sets() {
        let vec_ty = RfunType::Vector(vec![RfunType::Int, RfunType::Int]);
        let p = TypedProgram {
            defs: vec![],
            body: TypedExp::Prim {
                op: PrimOp::MakeVector,
                args: vec![TypedExp::Int(10), TypedExp::Int(20)],
                ty: vec_ty,
            },
        };
        let out = expose_allocation(p).unwrap();

        assert_eq!(count_ops(&out.body, PrimOp::MakeVector), 0);
        assert_eq!(count_ops(&out.body, PrimOp::Allocate), 1);
        assert_eq!(count_ops(&out.body, PrimOp::Collect), 1);
        assert_eq!(count_ops(&out.body, PrimOp::VectorSet), 2);
    }

    #[test]
    fn test_gc_check_guards_allocation() {
        let vec_ty = RfunType::Vector(vec![RfunType::Int]);
        let p = TypedProgram {
            defs: vec![],
            body: TypedExp::Prim {
                op: PrimOp::MakeVector,
                args: vec![TypedExp::Int(1)],
                ty: vec_ty,
            },
        };
        let out = expose_allocation(p).unwrap();

        // 8-byte header + one 8-byte slot.
        fn find_collect_bytes(e: &TypedExp) -> Option<i64> {
            match e {
                TypedExp::Prim {
                    op: PrimOp::Collect,
                    args,
                    ..
                } => match args.first() {
                    Some(TypedExp::Int(n)) => Some(*n),
                    _ => None,
                },
                TypedExp::Let { rhs, body, .. } => {
                    find_collect_bytes(rhs).or_else(|| find_collect_bytes(body))
                }
                TypedExp::If {
                    test, then, els, ..
                } => find_collect_bytes(test)
                    .or_else(|| find_collect_bytes(then))
                    .or_else(|| find_collect_bytes(els)),
                _ => None,
            }
        }
        assert_eq!(find_collect_bytes(&out.body), Some(16));
    }
}
