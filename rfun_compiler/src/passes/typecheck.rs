//! Typecheck: compute a type for every node, reject ill-typed programs.
//!
//! Top-level definitions are entered into the environment before any body is
//! checked, so mutually recursive calls typecheck. Each body is checked
//! under its own parameters only (plus the definition environment), and its
//! inferred type must equal the declared output type.

use crate::ast::{self, PrimOp};
use crate::error::{CompileError, Result};
use crate::ir::typed::{TypedDef, TypedExp, TypedProgram};
use crate::types::RfunType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

type TEnv = HashMap<String, RfunType>;

/// Fixed argument/result types for the uniform primitives. `==` and the
/// vector operations have their own rules and are not listed.
static PRIM_SIGNATURES: Lazy<HashMap<PrimOp, (Vec<RfunType>, RfunType)>> = Lazy::new(|| {
    use RfunType::{Bool, Int};
    let mut sigs = HashMap::new();
    sigs.insert(PrimOp::Add, (vec![Int, Int], Int));
    sigs.insert(PrimOp::Neg, (vec![Int], Int));
    sigs.insert(PrimOp::Not, (vec![Bool], Bool));
    sigs.insert(PrimOp::And, (vec![Bool, Bool], Bool));
    sigs.insert(PrimOp::Or, (vec![Bool, Bool], Bool));
    sigs.insert(PrimOp::Lt, (vec![Int, Int], Bool));
    sigs.insert(PrimOp::Le, (vec![Int, Int], Bool));
    sigs.insert(PrimOp::Gt, (vec![Int, Int], Bool));
    sigs.insert(PrimOp::Ge, (vec![Int, Int], Bool));
    sigs
});

/// Typecheck a surface program, producing the typed tree.
pub fn typecheck(program: &ast::Program) -> Result<TypedProgram> {
    // First pass: collect every definition's function type so bodies can
    // call each other in any order.
    let mut top = TEnv::new();
    for def in &program.defs {
        let fun_ty = RfunType::Fun {
            args: def.params.iter().map(|(_, t)| t.clone()).collect(),
            ret: Box::new(def.output_type.clone()),
        };
        top.insert(def.name.clone(), fun_ty);
    }

    let checker = Typechecker { top };

    let defs = program
        .defs
        .iter()
        .map(|d| checker.check_def(d))
        .collect::<Result<Vec<_>>>()?;

    let body = checker.check_exp(&program.body, &TEnv::new())?;

    Ok(TypedProgram { defs, body })
}

struct Typechecker {
    /// Types of the top-level definitions.
    top: TEnv,
}

impl Typechecker {
    fn check_def(&self, def: &ast::Def) -> Result<TypedDef> {
        let env: TEnv = def.params.iter().cloned().collect();
        let body = self.check_exp(&def.body, &env)?;

        let body_ty = body.ty();
        if body_ty != def.output_type {
            return Err(CompileError::TypeMismatch {
                context: format!("body of `{}`", def.name),
                expected: def.output_type.clone(),
                found: body_ty,
            });
        }

        Ok(TypedDef {
            name: def.name.clone(),
            params: def.params.clone(),
            output_type: def.output_type.clone(),
            body,
        })
    }

    fn check_exp(&self, e: &ast::Exp, env: &TEnv) -> Result<TypedExp> {
        match e {
            ast::Exp::Int(n) => Ok(TypedExp::Int(*n)),
            ast::Exp::Bool(b) => Ok(TypedExp::Bool(*b)),
            ast::Exp::Var(name) => {
                let ty = env
                    .get(name)
                    .or_else(|| self.top.get(name))
                    .ok_or_else(|| CompileError::UnboundVariable(name.clone()))?;
                Ok(TypedExp::Var {
                    name: name.clone(),
                    ty: ty.clone(),
                })
            }
            ast::Exp::Prim { op, args } => self.check_prim(*op, args, env),
            ast::Exp::Let { name, rhs, body } => {
                let rhs = self.check_exp(rhs, env)?;
                let mut inner = env.clone();
                inner.insert(name.clone(), rhs.ty());
                let body = self.check_exp(body, &inner)?;
                Ok(TypedExp::Let {
                    name: name.clone(),
                    rhs: Box::new(rhs),
                    body: Box::new(body),
                })
            }
            ast::Exp::If { test, then, els } => {
                let test = self.check_exp(test, env)?;
                let test_ty = test.ty();
                if test_ty != RfunType::Bool {
                    return Err(CompileError::TypeMismatch {
                        context: "`if` test".to_string(),
                        expected: RfunType::Bool,
                        found: test_ty,
                    });
                }
                let then = self.check_exp(then, env)?;
                let els = self.check_exp(els, env)?;
                let then_ty = then.ty();
                let else_ty = els.ty();
                if then_ty != else_ty {
                    return Err(CompileError::BranchMismatch { then_ty, else_ty });
                }
                Ok(TypedExp::If {
                    test: Box::new(test),
                    then: Box::new(then),
                    els: Box::new(els),
                    ty: then_ty,
                })
            }
            ast::Exp::Funcall { fun, args } => {
                let fun = self.check_exp(fun, env)?;
                let fun_ty = fun.ty();
                let (param_tys, ret) = match fun_ty {
                    RfunType::Fun { args, ret } => (args, ret),
                    other => return Err(CompileError::NotAFunction(other)),
                };
                if args.len() != param_tys.len() {
                    return Err(CompileError::ArityMismatch {
                        expected: param_tys.len(),
                        found: args.len(),
                    });
                }
                let mut checked = Vec::with_capacity(args.len());
                for (i, (arg, expected)) in args.iter().zip(&param_tys).enumerate() {
                    let arg = self.check_exp(arg, env)?;
                    let found = arg.ty();
                    if found != *expected {
                        return Err(CompileError::TypeMismatch {
                            context: format!("argument {} of call", i + 1),
                            expected: expected.clone(),
                            found,
                        });
                    }
                    checked.push(arg);
                }
                Ok(TypedExp::Funcall {
                    fun: Box::new(fun),
                    args: checked,
                    ty: *ret,
                })
            }
        }
    }

    fn check_prim(&self, op: PrimOp, args: &[ast::Exp], env: &TEnv) -> Result<TypedExp> {
        match op {
            PrimOp::Eq => {
                let (lhs, rhs) = self.two_args(args, env)?;
                let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
                if lhs_ty != rhs_ty {
                    return Err(CompileError::TypeMismatch {
                        context: "`==`".to_string(),
                        expected: lhs_ty,
                        found: rhs_ty,
                    });
                }
                Ok(TypedExp::Prim {
                    op,
                    args: vec![lhs, rhs],
                    ty: RfunType::Bool,
                })
            }
            PrimOp::MakeVector => {
                let args = args
                    .iter()
                    .map(|a| self.check_exp(a, env))
                    .collect::<Result<Vec<_>>>()?;
                let ty = RfunType::Vector(args.iter().map(TypedExp::ty).collect());
                Ok(TypedExp::Prim { op, args, ty })
            }
            PrimOp::VectorRef => {
                if args.len() != 2 {
                    return Err(CompileError::ArityMismatch {
                        expected: 2,
                        found: args.len(),
                    });
                }
                let vec = self.check_exp(&args[0], env)?;
                let (elem_tys, idx) = self.vector_index(&vec, &args[1])?;
                let ty = elem_tys[idx as usize].clone();
                Ok(TypedExp::Prim {
                    op,
                    args: vec![vec, TypedExp::Int(idx)],
                    ty,
                })
            }
            PrimOp::VectorSet => {
                if args.len() != 3 {
                    return Err(CompileError::ArityMismatch {
                        expected: 3,
                        found: args.len(),
                    });
                }
                let vec = self.check_exp(&args[0], env)?;
                let (elem_tys, idx) = self.vector_index(&vec, &args[1])?;
                let value = self.check_exp(&args[2], env)?;
                let expected = elem_tys[idx as usize].clone();
                let found = value.ty();
                if found != expected {
                    return Err(CompileError::TypeMismatch {
                        context: "`vectorSet` value".to_string(),
                        expected,
                        found,
                    });
                }
                Ok(TypedExp::Prim {
                    op,
                    args: vec![vec, TypedExp::Int(idx), value],
                    ty: RfunType::Void,
                })
            }
            PrimOp::Allocate | PrimOp::Collect => Err(CompileError::internal(
                "typecheck",
                format!("`{}` cannot appear in a source program", op),
            )),
            _ => {
                let (param_tys, ret) = PRIM_SIGNATURES.get(&op).ok_or_else(|| {
                    CompileError::internal("typecheck", format!("no signature for `{}`", op))
                })?;
                if args.len() != param_tys.len() {
                    return Err(CompileError::ArityMismatch {
                        expected: param_tys.len(),
                        found: args.len(),
                    });
                }
                let mut checked = Vec::with_capacity(args.len());
                for (arg, expected) in args.iter().zip(param_tys) {
                    let arg = self.check_exp(arg, env)?;
                    let found = arg.ty();
                    if found != *expected {
                        return Err(CompileError::TypeMismatch {
                            context: format!("argument of `{}`", op),
                            expected: expected.clone(),
                            found,
                        });
                    }
                    checked.push(arg);
                }
                Ok(TypedExp::Prim {
                    op,
                    args: checked,
                    ty: ret.clone(),
                })
            }
        }
    }

    fn two_args(&self, args: &[ast::Exp], env: &TEnv) -> Result<(TypedExp, TypedExp)> {
        if args.len() != 2 {
            return Err(CompileError::ArityMismatch {
                expected: 2,
                found: args.len(),
            });
        }
        let lhs = self.check_exp(&args[0], env)?;
        let rhs = self.check_exp(&args[1], env)?;
        Ok((lhs, rhs))
    }

    /// Check a vector-indexing pair: the subject must have a vector type and
    /// the index must be an in-range integer literal.
    fn vector_index(&self, vec: &TypedExp, index: &ast::Exp) -> Result<(Vec<RfunType>, i64)> {
        let elem_tys = match vec.ty() {
            RfunType::Vector(tys) => tys,
            other => return Err(CompileError::NotAVector(other)),
        };
        let idx = match index {
            ast::Exp::Int(n) => *n,
            _ => return Err(CompileError::NonConstantIndex),
        };
        if idx < 0 || idx as usize >= elem_tys.len() {
            return Err(CompileError::IndexOutOfBounds {
                index: idx,
                ty: RfunType::Vector(elem_tys),
            });
        }
        Ok((elem_tys, idx))
    }
}
