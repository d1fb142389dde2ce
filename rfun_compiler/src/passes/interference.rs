//! Build interference: one undirected graph per function over variables and
//! registers.
//!
//! Writes interfere with everything live after the instruction; call-like
//! instructions clobber every caller-saved register, and a `VecVar` live
//! across a call additionally interferes with every callee-saved register —
//! that is what forces heap pointers out of registers and onto the root
//! stack at call sites.

use crate::constants::{CALLEE_SAVED_REGISTERS, CALLER_SAVED_REGISTERS};
use crate::error::{CompileError, Result};
use crate::ir::x86::{Arg, Instr, Program};
use crate::passes::liveness::{LiveSet, Liveness};
use std::collections::{HashMap, HashSet};

/// A sparse undirected graph over pseudo-x86 locations. Nodes are variables
/// (by unique name) or precolored registers.
#[derive(Debug, Default)]
pub struct InterferenceGraph {
    edges: HashMap<Arg, HashSet<Arg>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, a: Arg, b: Arg) {
        if a == b {
            return;
        }
        self.edges.entry(a.clone()).or_default().insert(b.clone());
        self.edges.entry(b).or_default().insert(a);
    }

    /// Neighbors of `node`; empty if the node is unknown.
    pub fn neighbors(&self, node: &Arg) -> impl Iterator<Item = &Arg> {
        self.edges.get(node).into_iter().flatten()
    }

    pub fn interferes(&self, a: &Arg, b: &Arg) -> bool {
        self.edges.get(a).is_some_and(|ns| ns.contains(b))
    }
}

/// Build each function's interference graph from its live-after sets.
pub fn build_interference(
    program: &Program,
    liveness: &Liveness,
) -> Result<HashMap<String, InterferenceGraph>> {
    let mut graphs = HashMap::new();
    for fun in &program.funs {
        let mut graph = InterferenceGraph::new();
        for block in &fun.blocks {
            let live_afters = liveness.live_after.get(&block.label).ok_or_else(|| {
                CompileError::internal(
                    "build-interference",
                    format!("no liveness for block `{}`", block.label),
                )
            })?;
            if live_afters.len() != block.instrs.len() {
                return Err(CompileError::internal(
                    "build-interference",
                    format!("liveness shape mismatch in `{}`", block.label),
                ));
            }
            for (instr, live_after) in block.instrs.iter().zip(live_afters) {
                add_instr_edges(instr, live_after, &mut graph);
            }
        }
        graphs.insert(fun.name.clone(), graph);
    }
    Ok(graphs)
}

fn add_instr_edges(instr: &Instr, live_after: &LiveSet, graph: &mut InterferenceGraph) {
    match instr {
        Instr::Movq(_, dst)
        | Instr::Addq(_, dst)
        | Instr::Movzbq(_, dst)
        | Instr::Xorq(_, dst)
        | Instr::Leaq(_, dst) => {
            if let Some(write) = location(dst) {
                for v in live_after {
                    graph.add_edge(write.clone(), v.clone());
                }
            }
        }
        Instr::Callq(_) | Instr::IndirectCallq(_, _) | Instr::TailJmp(_, _) => {
            for v in live_after {
                for reg in CALLER_SAVED_REGISTERS {
                    graph.add_edge(v.clone(), Arg::Reg(reg));
                }
                // Heap pointers may not survive a call in any register: the
                // collector can only see them on the root stack.
                if matches!(v, Arg::VecVar(_)) {
                    for reg in CALLEE_SAVED_REGISTERS {
                        graph.add_edge(v.clone(), Arg::Reg(reg));
                    }
                }
            }
        }
        Instr::Negq(_)
        | Instr::Cmpq(_, _)
        | Instr::Set(_, _)
        | Instr::Jmp(_)
        | Instr::JmpIf(_, _)
        | Instr::Retq => {}
    }
}

/// A location node for the graph: a variable or a register.
fn location(arg: &Arg) -> Option<Arg> {
    match arg {
        Arg::Var(_) | Arg::VecVar(_) | Arg::Reg(_) => Some(arg.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::x86::{Block, Fun, Reg};
    use crate::passes::liveness::uncover_live;

    fn var(name: &str) -> Arg {
        Arg::Var(name.to_string())
    }

    fn analyze(fun: Fun) -> HashMap<String, InterferenceGraph> {
        let program = Program { funs: vec![fun] };
        let live = uncover_live(&program).unwrap();
        build_interference(&program, &live).unwrap()
    }

    #[test]
    fn test_simultaneously_live_vars_interfere() {
        let fun = Fun {
            name: "main".to_string(),
            blocks: vec![Block {
                label: "main_start".to_string(),
                instrs: vec![
                    Instr::Movq(Arg::Imm(1), var("x")),
                    Instr::Movq(Arg::Imm(2), var("y")),
                    Instr::Addq(var("x"), var("y")),
                    Instr::Movq(var("y"), Arg::Reg(Reg::Rax)),
                    Instr::Jmp("main_conclusion".to_string()),
                ],
            }],
        };
        let graphs = analyze(fun);
        let graph = &graphs["main"];
        assert!(graph.interferes(&var("x"), &var("y")));
    }

    #[test]
    fn test_dead_writes_do_not_interfere() {
        let fun = Fun {
            name: "main".to_string(),
            blocks: vec![Block {
                label: "main_start".to_string(),
                instrs: vec![
                    Instr::Movq(Arg::Imm(1), var("x")),
                    Instr::Movq(Arg::Imm(2), var("y")),
                    Instr::Movq(var("y"), Arg::Reg(Reg::Rax)),
                    Instr::Jmp("main_conclusion".to_string()),
                ],
            }],
        };
        let graphs = analyze(fun);
        let graph = &graphs["main"];
        // x is dead by the time y is written.
        assert!(!graph.interferes(&var("x"), &var("y")));
    }

    #[test]
    fn test_scalars_live_across_calls_avoid_caller_saved() {
        let fun = Fun {
            name: "main".to_string(),
            blocks: vec![Block {
                label: "main_start".to_string(),
                instrs: vec![
                    Instr::Movq(Arg::Imm(1), var("x")),
                    Instr::Callq("collect".to_string()),
                    Instr::Movq(var("x"), Arg::Reg(Reg::Rax)),
                    Instr::Jmp("main_conclusion".to_string()),
                ],
            }],
        };
        let graphs = analyze(fun);
        let graph = &graphs["main"];
        for reg in CALLER_SAVED_REGISTERS {
            assert!(graph.interferes(&var("x"), &Arg::Reg(reg)));
        }
        // A scalar may still live in a callee-saved register.
        assert!(!graph.interferes(&var("x"), &Arg::Reg(Reg::Rbx)));
    }

    #[test]
    fn test_vecvars_live_across_calls_avoid_every_register() {
        let v = Arg::VecVar("v".to_string());
        let fun = Fun {
            name: "main".to_string(),
            blocks: vec![Block {
                label: "main_start".to_string(),
                instrs: vec![
                    Instr::Movq(Arg::Global("free_ptr".to_string()), v.clone()),
                    Instr::Callq("collect".to_string()),
                    Instr::Movq(v.clone(), Arg::Reg(Reg::Rax)),
                    Instr::Jmp("main_conclusion".to_string()),
                ],
            }],
        };
        let graphs = analyze(fun);
        let graph = &graphs["main"];
        for reg in CALLER_SAVED_REGISTERS.into_iter().chain(CALLEE_SAVED_REGISTERS) {
            assert!(graph.interferes(&v, &Arg::Reg(reg)), "missing edge to {:?}", reg);
        }
    }
}
