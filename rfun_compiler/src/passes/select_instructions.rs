//! Select instructions: lower each Cfun definition to pseudo-x86.
//!
//! Assignments become short fixed instruction sequences; `%r11` is the
//! scratch register for vector addressing and `%rax` carries return values.
//! The entry block is renamed `<fname>_start` and, for every function except
//! `main`, prefixed with moves copying the parameter registers into the
//! named parameter variables (`VecVar` for vector-typed parameters).

use crate::ast::PrimOp;
use crate::constants::PARAMETER_PASSING_REGISTERS;
use crate::error::{CompileError, Result};
use crate::gensym::gensym;
use crate::ir::cfun;
use crate::ir::x86::{Arg, Block, ByteReg, Cc, Fun, Instr, Program, Reg};
use crate::types::RfunType;

pub fn select_instructions(program: cfun::Program) -> Result<Program> {
    let funs = program
        .defs
        .into_iter()
        .map(select_def)
        .collect::<Result<Vec<_>>>()?;
    Ok(Program { funs })
}

fn select_def(def: cfun::Def) -> Result<Fun> {
    let start_label = format!("{}_start", def.name);
    let conclusion_label = format!("{}_conclusion", def.name);

    if def.params.len() > PARAMETER_PASSING_REGISTERS.len() {
        return Err(CompileError::internal(
            "select-instructions",
            format!(
                "`{}` still has {} parameters after limit-functions",
                def.name,
                def.params.len()
            ),
        ));
    }

    let mut blocks = Vec::with_capacity(def.blocks.len());
    for (label, tail) in def.blocks {
        let mut instrs = Vec::new();
        let label = if label == "start" {
            // Parameters arrive in registers; name them. main has none.
            for ((name, ty), reg) in def.params.iter().zip(PARAMETER_PASSING_REGISTERS) {
                instrs.push(Instr::Movq(
                    Arg::Reg(reg),
                    mk_var(name.clone(), ty.is_vector()),
                ));
            }
            start_label.clone()
        } else {
            label
        };
        si_tail(tail, &conclusion_label, &mut instrs)?;
        blocks.push(Block { label, instrs });
    }

    Ok(Fun {
        name: def.name,
        blocks,
    })
}

fn mk_var(name: String, is_vec: bool) -> Arg {
    if is_vec {
        Arg::VecVar(name)
    } else {
        Arg::Var(name)
    }
}

fn si_atm(atm: cfun::Atm) -> Arg {
    match atm {
        cfun::Atm::Int(n) => Arg::Imm(n),
        cfun::Atm::Bool(true) => Arg::Imm(1),
        cfun::Atm::Bool(false) | cfun::Atm::Void => Arg::Imm(0),
        cfun::Atm::Var { name, ty } => mk_var(name, ty.is_vector()),
        cfun::Atm::GlobalVal(label) => Arg::Global(label),
    }
}

fn cc_of(op: PrimOp) -> Result<Cc> {
    match op {
        PrimOp::Eq => Ok(Cc::E),
        PrimOp::Lt => Ok(Cc::L),
        other => Err(CompileError::internal(
            "select-instructions",
            format!("`{}` is not a comparison surviving shrink", other),
        )),
    }
}

/// Build a vector tag: forwarding bit 1, 6 bits of length, then one pointer
/// bit per component (1 where the component is itself a vector).
pub(crate) fn mk_tag(types: &[RfunType]) -> i64 {
    let mut pointer_mask: i64 = 0;
    for ty in types {
        pointer_mask <<= 1;
        if ty.is_vector() {
            pointer_mask |= 1;
        }
    }
    let mask_and_len = (pointer_mask << 6) | types.len() as i64;
    (mask_and_len << 1) | 1
}

fn move_args_into_registers(args: Vec<cfun::Atm>, out: &mut Vec<Instr>) -> Result<usize> {
    if args.len() > PARAMETER_PASSING_REGISTERS.len() {
        return Err(CompileError::internal(
            "select-instructions",
            format!("call with {} arguments after limit-functions", args.len()),
        ));
    }
    let count = args.len();
    for (arg, reg) in args.into_iter().zip(PARAMETER_PASSING_REGISTERS) {
        out.push(Instr::Movq(si_atm(arg), Arg::Reg(reg)));
    }
    Ok(count)
}

fn si_stmt(stmt: cfun::Stmt, out: &mut Vec<Instr>) -> Result<()> {
    match stmt {
        cfun::Stmt::Collect { bytes } => {
            out.push(Instr::Movq(Arg::Reg(Reg::R15), Arg::Reg(Reg::Rdi)));
            out.push(Instr::Movq(Arg::Imm(bytes), Arg::Reg(Reg::Rsi)));
            out.push(Instr::Callq("collect".to_string()));
            Ok(())
        }
        cfun::Stmt::Assign { name, exp, is_vec } => {
            let dst = mk_var(name, is_vec);
            si_assign(exp, dst, out)
        }
    }
}

fn si_assign(exp: cfun::Exp, dst: Arg, out: &mut Vec<Instr>) -> Result<()> {
    match exp {
        cfun::Exp::Atm(atm) => {
            out.push(Instr::Movq(si_atm(atm), dst));
            Ok(())
        }
        cfun::Exp::FunRef(label) => {
            out.push(Instr::Leaq(Arg::FunRef(label), dst));
            Ok(())
        }
        cfun::Exp::Call { fun, args, .. } => {
            let count = move_args_into_registers(args, out)?;
            out.push(Instr::IndirectCallq(si_atm(fun), count));
            out.push(Instr::Movq(Arg::Reg(Reg::Rax), dst));
            Ok(())
        }
        cfun::Exp::Prim { op, args, ty } => si_prim(op, args, ty, dst, out),
    }
}

fn si_prim(
    op: PrimOp,
    args: Vec<cfun::Atm>,
    ty: RfunType,
    dst: Arg,
    out: &mut Vec<Instr>,
) -> Result<()> {
    let bad_shape = || {
        CompileError::internal(
            "select-instructions",
            format!("malformed `{}` primitive", op),
        )
    };
    match op {
        PrimOp::Add => {
            let [a1, a2] = <[cfun::Atm; 2]>::try_from(args).map_err(|_| bad_shape())?;
            out.push(Instr::Movq(si_atm(a1), dst.clone()));
            out.push(Instr::Addq(si_atm(a2), dst));
            Ok(())
        }
        PrimOp::Neg => {
            let [a] = <[cfun::Atm; 1]>::try_from(args).map_err(|_| bad_shape())?;
            out.push(Instr::Movq(si_atm(a), dst.clone()));
            out.push(Instr::Negq(dst));
            Ok(())
        }
        PrimOp::Eq | PrimOp::Lt => {
            let [a1, a2] = <[cfun::Atm; 2]>::try_from(args).map_err(|_| bad_shape())?;
            out.push(Instr::Cmpq(si_atm(a2), si_atm(a1)));
            out.push(Instr::Set(cc_of(op)?, Arg::ByteReg(ByteReg::Al)));
            out.push(Instr::Movzbq(Arg::ByteReg(ByteReg::Al), dst));
            Ok(())
        }
        PrimOp::Not => {
            let [a] = <[cfun::Atm; 1]>::try_from(args).map_err(|_| bad_shape())?;
            out.push(Instr::Movq(si_atm(a), dst.clone()));
            out.push(Instr::Xorq(Arg::Imm(1), dst));
            Ok(())
        }
        PrimOp::Allocate => {
            let elem_tys = match &ty {
                RfunType::Vector(tys) => tys,
                other => {
                    return Err(CompileError::internal(
                        "select-instructions",
                        format!("`allocate` of non-vector type {}", other),
                    ))
                }
            };
            let tag = mk_tag(elem_tys);
            let total_bytes = 8 + 8 * elem_tys.len() as i64;
            out.push(Instr::Movq(
                Arg::Global("free_ptr".to_string()),
                dst.clone(),
            ));
            out.push(Instr::Addq(
                Arg::Imm(total_bytes),
                Arg::Global("free_ptr".to_string()),
            ));
            out.push(Instr::Movq(dst, Arg::Reg(Reg::R11)));
            out.push(Instr::Movq(Arg::Imm(tag), Arg::Deref(0, Reg::R11)));
            Ok(())
        }
        PrimOp::VectorRef => {
            let [vec, idx] = <[cfun::Atm; 2]>::try_from(args).map_err(|_| bad_shape())?;
            let offset = vector_offset(&idx)?;
            out.push(Instr::Movq(si_atm(vec), Arg::Reg(Reg::R11)));
            out.push(Instr::Movq(Arg::Deref(offset, Reg::R11), dst));
            Ok(())
        }
        PrimOp::VectorSet => {
            let [vec, idx, value] = <[cfun::Atm; 3]>::try_from(args).map_err(|_| bad_shape())?;
            let offset = vector_offset(&idx)?;
            out.push(Instr::Movq(si_atm(vec), Arg::Reg(Reg::R11)));
            out.push(Instr::Movq(si_atm(value), Arg::Deref(offset, Reg::R11)));
            out.push(Instr::Movq(Arg::Imm(0), dst));
            Ok(())
        }
        other => Err(CompileError::internal(
            "select-instructions",
            format!("`{}` should not reach instruction selection", other),
        )),
    }
}

/// Byte offset of component `idx`, past the 8-byte tag.
fn vector_offset(idx: &cfun::Atm) -> Result<i64> {
    match idx {
        cfun::Atm::Int(k) => Ok(8 * (k + 1)),
        other => Err(CompileError::internal(
            "select-instructions",
            format!("non-literal vector index {:?}", other),
        )),
    }
}

fn si_tail(tail: cfun::Tail, conclusion: &str, out: &mut Vec<Instr>) -> Result<()> {
    match tail {
        cfun::Tail::Return(exp) => {
            let retvar = gensym("retvar");
            si_assign(exp, Arg::Var(retvar.clone()), out)?;
            out.push(Instr::Movq(Arg::Var(retvar), Arg::Reg(Reg::Rax)));
            out.push(Instr::Jmp(conclusion.to_string()));
            Ok(())
        }
        cfun::Tail::Seq { stmt, rest } => {
            si_stmt(stmt, out)?;
            si_tail(*rest, conclusion, out)
        }
        cfun::Tail::If {
            cmp,
            then_label,
            else_label,
        } => {
            let (op, args) = match cmp {
                cfun::Exp::Prim { op, args, .. } => (op, args),
                other => {
                    return Err(CompileError::internal(
                        "select-instructions",
                        format!("branch on non-comparison {:?}", other),
                    ))
                }
            };
            let [a1, a2] = <[cfun::Atm; 2]>::try_from(args).map_err(|_| {
                CompileError::internal("select-instructions", "comparison is not binary")
            })?;
            out.push(Instr::Cmpq(si_atm(a2), si_atm(a1)));
            out.push(Instr::JmpIf(cc_of(op)?, then_label));
            out.push(Instr::Jmp(else_label));
            Ok(())
        }
        cfun::Tail::Goto(label) => {
            out.push(Instr::Jmp(label));
            Ok(())
        }
        cfun::Tail::TailCall { fun, args, .. } => {
            let count = move_args_into_registers(args, out)?;
            out.push(Instr::TailJmp(si_atm(fun), count));
            Ok(())
        }
    }
}
