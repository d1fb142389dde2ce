//! Uncover live: backward liveness over each function's blocks.
//!
//! Only abstract locations (`Var`/`VecVar`) participate; registers and
//! immediates are ignored here. Blocks form a DAG (explicate-control builds
//! them by recursion), so a jump target's live-in is computed on demand and
//! memoized. `<fname>_conclusion` has empty live-in by convention.

use crate::error::{CompileError, Result};
use crate::ir::x86::{Arg, Instr, Program};
use std::collections::{HashMap, HashSet};

pub type LiveSet = HashSet<Arg>;

/// Live-after sets for every instruction, keyed by block label (labels are
/// globally unique across functions).
#[derive(Debug, Default)]
pub struct Liveness {
    pub live_after: HashMap<String, Vec<LiveSet>>,
}

pub fn uncover_live(program: &Program) -> Result<Liveness> {
    let mut liveness = Liveness::default();
    for fun in &program.funs {
        let mut analysis = BlockAnalysis {
            blocks: fun
                .blocks
                .iter()
                .map(|b| (b.label.as_str(), b.instrs.as_slice()))
                .collect(),
            label_live: HashMap::new(),
            in_progress: HashSet::new(),
            live_after: HashMap::new(),
        };
        analysis
            .label_live
            .insert(format!("{}_conclusion", fun.name), LiveSet::new());

        for block in &fun.blocks {
            analysis.analyze_block(&block.label)?;
        }
        liveness.live_after.extend(analysis.live_after);
    }
    Ok(liveness)
}

struct BlockAnalysis<'a> {
    blocks: HashMap<&'a str, &'a [Instr]>,
    /// Memoized live-in per label.
    label_live: HashMap<String, LiveSet>,
    in_progress: HashSet<String>,
    live_after: HashMap<String, Vec<LiveSet>>,
}

impl BlockAnalysis<'_> {
    fn analyze_block(&mut self, label: &str) -> Result<()> {
        if self.label_live.contains_key(label) {
            return Ok(());
        }
        if !self.in_progress.insert(label.to_string()) {
            return Err(CompileError::internal(
                "uncover-live",
                format!("cyclic control flow through `{}`", label),
            ));
        }
        let instrs = *self.blocks.get(label).ok_or_else(|| {
            CompileError::internal("uncover-live", format!("jump to unknown label `{}`", label))
        })?;

        let mut current = LiveSet::new();
        let mut after_sets = Vec::with_capacity(instrs.len());
        for instr in instrs.iter().rev() {
            after_sets.push(current.clone());
            current = self.live_before(instr, current)?;
        }
        after_sets.reverse();

        self.live_after.insert(label.to_string(), after_sets);
        self.label_live.insert(label.to_string(), current);
        self.in_progress.remove(label);
        Ok(())
    }

    fn live_before(&mut self, instr: &Instr, after: LiveSet) -> Result<LiveSet> {
        let mut live = after;
        match instr {
            Instr::Movq(src, dst) | Instr::Movzbq(src, dst) | Instr::Leaq(src, dst) => {
                for v in abstract_vars(dst) {
                    live.remove(&v);
                }
                live.extend(abstract_vars(src));
            }
            Instr::Addq(a, b) | Instr::Xorq(a, b) | Instr::Cmpq(a, b) => {
                live.extend(abstract_vars(a));
                live.extend(abstract_vars(b));
            }
            Instr::Negq(a) | Instr::TailJmp(a, _) | Instr::IndirectCallq(a, _) => {
                live.extend(abstract_vars(a));
            }
            Instr::Callq(_) | Instr::Retq | Instr::Set(_, _) => {}
            Instr::Jmp(target) | Instr::JmpIf(_, target) => {
                if !self.label_live.contains_key(target) {
                    let target = target.clone();
                    self.analyze_block(&target)?;
                }
                if let Some(target_live) = self.label_live.get(target) {
                    live.extend(target_live.iter().cloned());
                }
            }
        }
        Ok(live)
    }
}

/// The abstract locations mentioned by an operand.
fn abstract_vars(arg: &Arg) -> Option<Arg> {
    if arg.is_abstract() {
        Some(arg.clone())
    } else {
        None
    }
}
