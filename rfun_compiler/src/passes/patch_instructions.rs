//! Patch instructions: repair operand combinations x86 does not accept.
//!
//! Register allocation can leave two memory operands (frame slots, root
//! stack slots, RIP-relative globals) on one instruction, a `cmpq` whose
//! second operand is an immediate, or a `movzbq`/`leaq` landing in memory.
//! Each is split through `%rax`. Tail and indirect jumps are likewise
//! funneled through `%rax` so emit can expand them uniformly.

use crate::ir::x86::{AllocatedFun, AllocatedProgram, Arg, Block, Fun, Instr, Reg};

pub fn patch_instructions(program: AllocatedProgram) -> AllocatedProgram {
    AllocatedProgram {
        funs: program
            .funs
            .into_iter()
            .map(|af| AllocatedFun {
                fun: Fun {
                    name: af.fun.name,
                    blocks: af.fun.blocks.into_iter().map(patch_block).collect(),
                },
                frame: af.frame,
            })
            .collect(),
    }
}

fn patch_block(block: Block) -> Block {
    Block {
        label: block.label,
        instrs: block.instrs.into_iter().flat_map(patch_instr).collect(),
    }
}

fn rax() -> Arg {
    Arg::Reg(Reg::Rax)
}

fn patch_instr(instr: Instr) -> Vec<Instr> {
    match instr {
        Instr::Movq(src, dst) if src.is_mem() && dst.is_mem() => {
            vec![Instr::Movq(src, rax()), Instr::Movq(rax(), dst)]
        }
        Instr::Addq(src, dst) if src.is_mem() && dst.is_mem() => {
            vec![Instr::Movq(src, rax()), Instr::Addq(rax(), dst)]
        }
        // cmpq cannot take an immediate second operand.
        Instr::Cmpq(lhs, Arg::Imm(n)) => {
            vec![Instr::Movq(Arg::Imm(n), rax()), Instr::Cmpq(lhs, rax())]
        }
        Instr::Cmpq(lhs, rhs) if lhs.is_mem() && rhs.is_mem() => {
            vec![Instr::Movq(rhs, rax()), Instr::Cmpq(lhs, rax())]
        }
        // movzbq and leaq need a register destination.
        Instr::Movzbq(src, dst) if dst.is_mem() => {
            vec![Instr::Movzbq(src, rax()), Instr::Movq(rax(), dst)]
        }
        Instr::Leaq(src, dst) if dst.is_mem() => {
            vec![Instr::Leaq(src, rax()), Instr::Movq(rax(), dst)]
        }
        // Tail and indirect jumps always go through rax.
        Instr::TailJmp(arg, n) => {
            vec![Instr::Movq(arg, rax()), Instr::TailJmp(rax(), n)]
        }
        Instr::IndirectCallq(arg, n) => {
            vec![Instr::Movq(arg, rax()), Instr::IndirectCallq(rax(), n)]
        }
        other => vec![other],
    }
}
