//! Allocate registers: greedy saturation (DSATUR) graph coloring.
//!
//! Registers are precolored with their position in the allocation order
//! (caller-saved first, then callee-saved). Variables colored beyond the
//! register list spill: scalars to `-8k(%rbp)`, vector pointers to
//! `-8k(%r15)` on the root stack. Both offset sequences grow monotonically
//! from 8. Ties in saturation are broken by location order, which keeps the
//! output deterministic.

use crate::error::{CompileError, Result};
use crate::ir::x86::{
    AllocatedFun, AllocatedProgram, Arg, Block, FrameInfo, Fun, Instr, Program, Reg,
};
use crate::constants::register_allocation_order;
use crate::passes::interference::InterferenceGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub fn allocate_registers(
    program: Program,
    graphs: &HashMap<String, InterferenceGraph>,
) -> Result<AllocatedProgram> {
    let empty = InterferenceGraph::new();
    let funs = program
        .funs
        .into_iter()
        .map(|fun| {
            let graph = graphs.get(&fun.name).unwrap_or(&empty);
            allocate_fun(fun, graph)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(AllocatedProgram { funs })
}

fn allocate_fun(fun: Fun, graph: &InterferenceGraph) -> Result<AllocatedFun> {
    let locals = collect_locals(&fun);
    let registers = register_allocation_order();
    let coloring = color_graph(&locals, graph, &registers);

    // Two home maps, both seeded with the registers: scalars spill to the
    // rbp frame, vector pointers to the root stack.
    let mut scalar_homes: BTreeMap<usize, Arg> = BTreeMap::new();
    let mut vector_homes: BTreeMap<usize, Arg> = BTreeMap::new();
    for (color, reg) in registers.iter().enumerate() {
        scalar_homes.insert(color, Arg::Reg(*reg));
        vector_homes.insert(color, Arg::Reg(*reg));
    }

    let mut stack_spills: usize = 0;
    let mut root_stack_spills: usize = 0;
    let mut homes: BTreeMap<Arg, Arg> = BTreeMap::new();
    for (var, color) in &coloring {
        let home = match var {
            Arg::VecVar(_) => vector_homes.entry(*color).or_insert_with(|| {
                root_stack_spills += 1;
                Arg::Deref(-8 * root_stack_spills as i64, Reg::R15)
            }),
            _ => scalar_homes.entry(*color).or_insert_with(|| {
                stack_spills += 1;
                Arg::Deref(-8 * stack_spills as i64, Reg::Rbp)
            }),
        };
        homes.insert(var.clone(), home.clone());
    }

    let blocks = fun
        .blocks
        .into_iter()
        .map(|block| {
            let instrs = block
                .instrs
                .into_iter()
                .map(|i| assign_homes_instr(i, &homes))
                .collect::<Result<Vec<_>>>()?;
            Ok(Block {
                label: block.label,
                instrs,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AllocatedFun {
        fun: Fun {
            name: fun.name,
            blocks,
        },
        frame: FrameInfo {
            stack_bytes: align16(8 * stack_spills),
            root_stack_spills,
        },
    })
}

/// Every abstract location mentioned by the function, in sorted order.
fn collect_locals(fun: &Fun) -> BTreeSet<Arg> {
    let mut locals = BTreeSet::new();
    for block in &fun.blocks {
        for instr in &block.instrs {
            match instr {
                Instr::Movq(a, b)
                | Instr::Addq(a, b)
                | Instr::Xorq(a, b)
                | Instr::Cmpq(a, b)
                | Instr::Movzbq(a, b)
                | Instr::Leaq(a, b) => {
                    if a.is_abstract() {
                        locals.insert(a.clone());
                    }
                    if b.is_abstract() {
                        locals.insert(b.clone());
                    }
                }
                Instr::Negq(a)
                | Instr::Set(_, a)
                | Instr::TailJmp(a, _)
                | Instr::IndirectCallq(a, _) => {
                    if a.is_abstract() {
                        locals.insert(a.clone());
                    }
                }
                Instr::Callq(_) | Instr::Retq | Instr::Jmp(_) | Instr::JmpIf(_, _) => {}
            }
        }
    }
    locals
}

/// DSATUR: repeatedly color the node with the most saturated neighborhood,
/// using the smallest color its neighbors have not taken.
fn color_graph(
    locals: &BTreeSet<Arg>,
    graph: &InterferenceGraph,
    registers: &[Reg],
) -> BTreeMap<Arg, usize> {
    let mut saturation: BTreeMap<&Arg, BTreeSet<usize>> =
        locals.iter().map(|v| (v, BTreeSet::new())).collect();

    // Precolored register nodes push their color into neighboring
    // variables' saturation sets.
    for (color, reg) in registers.iter().enumerate() {
        for neighbor in graph.neighbors(&Arg::Reg(*reg)) {
            if let Some(sat) = saturation.get_mut(neighbor) {
                sat.insert(color);
            }
        }
    }

    let mut coloring: BTreeMap<Arg, usize> = BTreeMap::new();
    let mut to_color: BTreeSet<&Arg> = locals.iter().collect();

    // Most saturated first; ties fall to location order.
    while let Some(next) = to_color
        .iter()
        .max_by_key(|v| saturation.get(*v).map_or(0, BTreeSet::len))
        .copied()
    {
        to_color.remove(next);

        let sat = saturation.remove(next).unwrap_or_default();
        let mut color = 0;
        while sat.contains(&color) {
            color += 1;
        }
        coloring.insert(next.clone(), color);

        for neighbor in graph.neighbors(next) {
            if let Some(sat) = saturation.get_mut(neighbor) {
                sat.insert(color);
            }
        }
    }

    coloring
}

fn assign_homes_instr(instr: Instr, homes: &BTreeMap<Arg, Arg>) -> Result<Instr> {
    let home = |arg: Arg| -> Result<Arg> {
        if arg.is_abstract() {
            homes.get(&arg).cloned().ok_or_else(|| {
                CompileError::internal(
                    "allocate-registers",
                    format!("no home assigned for {}", arg),
                )
            })
        } else {
            Ok(arg)
        }
    };
    Ok(match instr {
        Instr::Movq(a, b) => Instr::Movq(home(a)?, home(b)?),
        Instr::Addq(a, b) => Instr::Addq(home(a)?, home(b)?),
        Instr::Negq(a) => Instr::Negq(home(a)?),
        Instr::Xorq(a, b) => Instr::Xorq(home(a)?, home(b)?),
        Instr::Cmpq(a, b) => Instr::Cmpq(home(a)?, home(b)?),
        Instr::Movzbq(a, b) => Instr::Movzbq(home(a)?, home(b)?),
        Instr::Set(cc, a) => Instr::Set(cc, home(a)?),
        Instr::Leaq(a, b) => Instr::Leaq(home(a)?, home(b)?),
        Instr::TailJmp(a, n) => Instr::TailJmp(home(a)?, n),
        Instr::IndirectCallq(a, n) => Instr::IndirectCallq(home(a)?, n),
        Instr::Callq(_) | Instr::Retq | Instr::Jmp(_) | Instr::JmpIf(_, _) => instr,
    })
}

/// Round up to the 16-byte stack alignment the ABI requires.
fn align16(bytes: usize) -> usize {
    if bytes % 16 == 0 {
        bytes
    } else {
        bytes + (16 - bytes % 16)
    }
}
