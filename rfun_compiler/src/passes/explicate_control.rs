//! Explicate control: lower the typed tree into the Cfun CFG.
//!
//! Three mutually recursive builders: `ec_tail` places an expression in tail
//! position, `ec_assign` sequences an assignment in front of a continuation,
//! and `ec_pred` compiles a test into a conditional branch. A `Let` whose
//! right-hand side is an `If` duplicates control but not the continuation:
//! the continuation is stored once under a fresh label and both arms jump to
//! it. The program's top-level body becomes a synthetic `main` definition.

use crate::ast::PrimOp;
use crate::error::{CompileError, Result};
use crate::gensym::gensym;
use crate::ir::cfun;
use crate::ir::typed::{TypedExp, TypedProgram};
use crate::types::RfunType;

pub fn explicate_control(program: TypedProgram) -> Result<cfun::Program> {
    let mut defs = Vec::with_capacity(program.defs.len() + 1);
    for def in program.defs {
        defs.push(cfun::Def {
            name: def.name,
            params: def.params,
            output_type: def.output_type,
            blocks: explicate_body(def.body)?,
        });
    }
    defs.push(cfun::Def {
        name: "main".to_string(),
        params: Vec::new(),
        output_type: RfunType::Int,
        blocks: explicate_body(program.body)?,
    });
    Ok(cfun::Program { defs })
}

fn explicate_body(body: TypedExp) -> Result<Vec<(String, cfun::Tail)>> {
    let mut builder = BlockBuilder { blocks: Vec::new() };
    let entry = builder.ec_tail(body)?;
    builder.blocks.push(("start".to_string(), entry));
    Ok(builder.blocks)
}

/// Owns the block map under construction for one definition.
struct BlockBuilder {
    blocks: Vec<(String, cfun::Tail)>,
}

impl BlockBuilder {
    /// Store `tail` under a fresh label and return the label.
    fn add_block(&mut self, tail: cfun::Tail) -> String {
        let label = gensym("label");
        self.blocks.push((label.clone(), tail));
        label
    }

    fn ec_tail(&mut self, e: TypedExp) -> Result<cfun::Tail> {
        match e {
            TypedExp::Let { name, rhs, body } => {
                let rest = self.ec_tail(*body)?;
                self.ec_assign(name, *rhs, rest)
            }
            TypedExp::If {
                test, then, els, ..
            } => {
                let then_tail = self.ec_tail(*then)?;
                let else_tail = self.ec_tail(*els)?;
                self.ec_pred(*test, then_tail, else_tail)
            }
            TypedExp::Funcall { fun, args, ty } => Ok(cfun::Tail::TailCall {
                fun: ec_atm(*fun)?,
                args: args.into_iter().map(ec_atm).collect::<Result<Vec<_>>>()?,
                ty,
            }),
            other => Ok(cfun::Tail::Return(ec_exp(other)?)),
        }
    }

    fn ec_assign(&mut self, x: String, e: TypedExp, k: cfun::Tail) -> Result<cfun::Tail> {
        match e {
            TypedExp::Int(_) | TypedExp::Bool(_) | TypedExp::Void | TypedExp::GlobalVal { .. } => {
                Ok(seq_assign(x, ec_exp(e)?, false, k))
            }
            TypedExp::Var { .. } | TypedExp::FunRef { .. } => {
                let is_vec = e.ty().is_vector();
                Ok(seq_assign(x, ec_exp(e)?, is_vec, k))
            }
            TypedExp::Prim {
                op: PrimOp::Collect,
                args,
                ..
            } => {
                let bytes = match args.as_slice() {
                    [TypedExp::Int(n)] => *n,
                    other => {
                        return Err(CompileError::internal(
                            "explicate-control",
                            format!("malformed collect arguments {:?}", other),
                        ))
                    }
                };
                Ok(cfun::Tail::Seq {
                    stmt: cfun::Stmt::Collect { bytes },
                    rest: Box::new(k),
                })
            }
            TypedExp::Prim { .. } => {
                let is_vec = e.ty().is_vector();
                Ok(seq_assign(x, ec_exp(e)?, is_vec, k))
            }
            TypedExp::Let { name, rhs, body } => {
                let rest = self.ec_assign(x, *body, k)?;
                self.ec_assign(name, *rhs, rest)
            }
            TypedExp::If {
                test, then, els, ..
            } => {
                // Store the continuation once; both arms assign then jump
                // to it.
                let finally = self.add_block(k);
                let then_tail =
                    self.ec_assign(x.clone(), *then, cfun::Tail::Goto(finally.clone()))?;
                let else_tail = self.ec_assign(x, *els, cfun::Tail::Goto(finally))?;
                self.ec_pred(*test, then_tail, else_tail)
            }
            TypedExp::Funcall { fun, args, ty } => {
                let is_vec = ty.is_vector();
                let call = cfun::Exp::Call {
                    fun: ec_atm(*fun)?,
                    args: args.into_iter().map(ec_atm).collect::<Result<Vec<_>>>()?,
                    ty,
                };
                Ok(seq_assign(x, call, is_vec, k))
            }
        }
    }

    fn ec_pred(
        &mut self,
        test: TypedExp,
        then_tail: cfun::Tail,
        else_tail: cfun::Tail,
    ) -> Result<cfun::Tail> {
        match test {
            TypedExp::Bool(true) => Ok(then_tail),
            TypedExp::Bool(false) => Ok(else_tail),
            TypedExp::Var { name, ty } => {
                let then_label = self.add_block(then_tail);
                let else_label = self.add_block(else_tail);
                Ok(cfun::Tail::If {
                    cmp: cfun::Exp::Prim {
                        op: PrimOp::Eq,
                        args: vec![cfun::Atm::Var { name, ty }, cfun::Atm::Bool(true)],
                        ty: RfunType::Bool,
                    },
                    then_label,
                    else_label,
                })
            }
            TypedExp::Prim {
                op: PrimOp::Not,
                mut args,
                ..
            } => {
                let arg = args.pop().ok_or_else(|| {
                    CompileError::internal("explicate-control", "`not` with no argument")
                })?;
                self.ec_pred(arg, else_tail, then_tail)
            }
            TypedExp::Prim { op, args, ty } => {
                let then_label = self.add_block(then_tail);
                let else_label = self.add_block(else_tail);
                Ok(cfun::Tail::If {
                    cmp: cfun::Exp::Prim {
                        op,
                        args: args.into_iter().map(ec_atm).collect::<Result<Vec<_>>>()?,
                        ty,
                    },
                    then_label,
                    else_label,
                })
            }
            TypedExp::Let { name, rhs, body } => {
                let rest = self.ec_pred(*body, then_tail, else_tail)?;
                self.ec_assign(name, *rhs, rest)
            }
            TypedExp::If {
                test, then, els, ..
            } => {
                let then_label = self.add_block(then_tail);
                let else_label = self.add_block(else_tail);
                let then_branch = self.ec_pred(
                    *then,
                    cfun::Tail::Goto(then_label.clone()),
                    cfun::Tail::Goto(else_label.clone()),
                )?;
                let else_branch = self.ec_pred(
                    *els,
                    cfun::Tail::Goto(then_label),
                    cfun::Tail::Goto(else_label),
                )?;
                self.ec_pred(*test, then_branch, else_branch)
            }
            TypedExp::Funcall { .. } => {
                // Branch on the call's result through a fresh variable.
                let tmp = gensym("tmp");
                let var_test = TypedExp::Var {
                    name: tmp.clone(),
                    ty: RfunType::Bool,
                };
                let branch = self.ec_pred(var_test, then_tail, else_tail)?;
                self.ec_assign(tmp, test, branch)
            }
            other => Err(CompileError::internal(
                "explicate-control",
                format!("non-boolean test expression {:?}", other),
            )),
        }
    }
}

fn seq_assign(name: String, exp: cfun::Exp, is_vec: bool, rest: cfun::Tail) -> cfun::Tail {
    cfun::Tail::Seq {
        stmt: cfun::Stmt::Assign { name, exp, is_vec },
        rest: Box::new(rest),
    }
}

fn ec_atm(e: TypedExp) -> Result<cfun::Atm> {
    match e {
        TypedExp::Int(n) => Ok(cfun::Atm::Int(n)),
        TypedExp::Bool(b) => Ok(cfun::Atm::Bool(b)),
        TypedExp::Void => Ok(cfun::Atm::Void),
        TypedExp::Var { name, ty } => Ok(cfun::Atm::Var { name, ty }),
        TypedExp::GlobalVal { name } => Ok(cfun::Atm::GlobalVal(name)),
        other => Err(CompileError::internal(
            "explicate-control",
            format!("expected an atom, found {:?}", other),
        )),
    }
}

fn ec_exp(e: TypedExp) -> Result<cfun::Exp> {
    match e {
        TypedExp::Prim { op, args, ty } => Ok(cfun::Exp::Prim {
            op,
            args: args.into_iter().map(ec_atm).collect::<Result<Vec<_>>>()?,
            ty,
        }),
        TypedExp::FunRef { name, .. } => Ok(cfun::Exp::FunRef(name)),
        other => Ok(cfun::Exp::Atm(ec_atm(other)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail_ends_ok(tail: &cfun::Tail) -> bool {
        match tail {
            cfun::Tail::Seq { rest, .. } => tail_ends_ok(rest),
            cfun::Tail::Return(_)
            | cfun::Tail::If { .. }
            | cfun::Tail::Goto(_)
            | cfun::Tail::TailCall { .. } => true,
        }
    }

    #[test]
    fn test_literal_body_returns() {
        let p = TypedProgram {
            defs: vec![],
            body: TypedExp::Int(42),
        };
        let out = explicate_control(p).unwrap();
        assert_eq!(out.defs.len(), 1);
        let main = &out.defs[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.output_type, RfunType::Int);
        assert_eq!(main.blocks.len(), 1);
        let (label, tail) = &main.blocks[0];
        assert_eq!(label, "start");
        assert_eq!(
            tail,
            &cfun::Tail::Return(cfun::Exp::Atm(cfun::Atm::Int(42)))
        );
    }

    #[test]
    fn test_let_of_if_shares_continuation() {
        // let x = (if b 1 2) in x
        let body = TypedExp::Let {
            name: "x_1".to_string(),
            rhs: Box::new(TypedExp::If {
                test: Box::new(TypedExp::Var {
                    name: "b_1".to_string(),
                    ty: RfunType::Bool,
                }),
                then: Box::new(TypedExp::Int(1)),
                els: Box::new(TypedExp::Int(2)),
                ty: RfunType::Int,
            }),
            body: Box::new(TypedExp::Var {
                name: "x_1".to_string(),
                ty: RfunType::Int,
            }),
        };
        let p = TypedProgram {
            defs: vec![],
            body,
        };
        let out = explicate_control(p).unwrap();
        let main = &out.defs[0];

        // continuation block + two arm blocks + start
        assert_eq!(main.blocks.len(), 4);
        assert!(main.blocks.iter().all(|(_, t)| tail_ends_ok(t)));

        // Both arm blocks assign x and jump to the same label.
        let gotos: Vec<&String> = main
            .blocks
            .iter()
            .filter_map(|(_, t)| match t {
                cfun::Tail::Seq { rest, .. } => match rest.as_ref() {
                    cfun::Tail::Goto(l) => Some(l),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(gotos.len(), 2);
        assert_eq!(gotos[0], gotos[1]);
    }

    #[test]
    fn test_var_test_branches_on_equality_with_true() {
        let body = TypedExp::If {
            test: Box::new(TypedExp::Var {
                name: "b_1".to_string(),
                ty: RfunType::Bool,
            }),
            then: Box::new(TypedExp::Int(1)),
            els: Box::new(TypedExp::Int(2)),
            ty: RfunType::Int,
        };
        let p = TypedProgram {
            defs: vec![],
            body,
        };
        let out = explicate_control(p).unwrap();
        let main = &out.defs[0];
        let (_, start) = main.blocks.iter().find(|(l, _)| l == "start").unwrap();
        match start {
            cfun::Tail::If { cmp, .. } => match cmp {
                cfun::Exp::Prim { op, args, .. } => {
                    assert_eq!(*op, PrimOp::Eq);
                    assert_eq!(args[1], cfun::Atm::Bool(true));
                }
                other => panic!("expected prim, got {:?}", other),
            },
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_not_swaps_branches() {
        let body = TypedExp::If {
            test: Box::new(TypedExp::Prim {
                op: PrimOp::Not,
                args: vec![TypedExp::Var {
                    name: "b_1".to_string(),
                    ty: RfunType::Bool,
                }],
                ty: RfunType::Bool,
            }),
            then: Box::new(TypedExp::Int(1)),
            els: Box::new(TypedExp::Int(2)),
            ty: RfunType::Int,
        };
        let p = TypedProgram {
            defs: vec![],
            body,
        };
        let out = explicate_control(p).unwrap();
        let main = &out.defs[0];
        let (_, start) = main.blocks.iter().find(|(l, _)| l == "start").unwrap();
        let (then_label, else_label) = match start {
            cfun::Tail::If {
                then_label,
                else_label,
                ..
            } => (then_label, else_label),
            other => panic!("expected if, got {:?}", other),
        };
        let tail_of = |label: &String| {
            &main
                .blocks
                .iter()
                .find(|(l, _)| l == label)
                .unwrap()
                .1
        };
        // Branches swapped: taking the comparison means b was true, which
        // selects the else arm.
        assert_eq!(
            tail_of(then_label),
            &cfun::Tail::Return(cfun::Exp::Atm(cfun::Atm::Int(2)))
        );
        assert_eq!(
            tail_of(else_label),
            &cfun::Tail::Return(cfun::Exp::Atm(cfun::Atm::Int(1)))
        );
    }

    #[test]
    fn test_tail_call_in_tail_position() {
        let fun_ty = RfunType::Fun {
            args: vec![RfunType::Int],
            ret: Box::new(RfunType::Int),
        };
        let body = TypedExp::Let {
            name: "tmp_1".to_string(),
            rhs: Box::new(TypedExp::FunRef {
                name: "f".to_string(),
                ty: fun_ty.clone(),
            }),
            body: Box::new(TypedExp::Funcall {
                fun: Box::new(TypedExp::Var {
                    name: "tmp_1".to_string(),
                    ty: fun_ty,
                }),
                args: vec![TypedExp::Int(5)],
                ty: RfunType::Int,
            }),
        };
        let p = TypedProgram {
            defs: vec![],
            body,
        };
        let out = explicate_control(p).unwrap();
        let main = &out.defs[0];
        let (_, start) = main.blocks.iter().find(|(l, _)| l == "start").unwrap();
        match start {
            cfun::Tail::Seq { rest, .. } => {
                assert!(matches!(rest.as_ref(), cfun::Tail::TailCall { .. }))
            }
            other => panic!("expected seq, got {:?}", other),
        }
    }
}
