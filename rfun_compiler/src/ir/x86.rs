//! Pseudo-x86.
//!
//! Real x86-64 instructions over abstract locations: `Var` (scalar) and
//! `VecVar` (pointer into the GC heap) stand in for registers or stack slots
//! until the allocator assigns homes. The scalar/vector split is load-bearing
//! for GC safety and persists through liveness and interference analysis.
//!
//! `Display` on the operand types renders GAS syntax; instruction rendering
//! lives in the emit pass because tail jumps depend on the enclosing
//! function's frame.

use std::fmt;

/// A 64-bit general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::Rbp => "rbp",
            Reg::Rsp => "rsp",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        };
        write!(f, "%{}", s)
    }
}

/// An 8-bit register, as written by `set<cc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ByteReg {
    Al,
}

impl fmt::Display for ByteReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteReg::Al => write!(f, "%al"),
        }
    }
}

/// Condition codes. Shrink reduces every comparison to `==` and `<`, so only
/// `e` and `l` ever reach the back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cc {
    E,
    L,
}

impl fmt::Display for Cc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cc::E => write!(f, "e"),
            Cc::L => write!(f, "l"),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arg {
    Imm(i64),
    Reg(Reg),
    ByteReg(ByteReg),
    /// `offset(%base)`
    Deref(i64, Reg),
    /// Abstract scalar location, eliminated by register allocation.
    Var(String),
    /// Abstract heap-pointer location; may only spill to the root stack.
    VecVar(String),
    /// RIP-relative reference to a runtime global.
    Global(String),
    /// RIP-relative reference to a function label (for `leaq`).
    FunRef(String),
}

impl Arg {
    /// True for the abstract locations the allocator must eliminate.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Arg::Var(_) | Arg::VecVar(_))
    }

    /// True for operands that address memory.
    pub fn is_mem(&self) -> bool {
        matches!(self, Arg::Deref(_, _) | Arg::Global(_))
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Imm(n) => write!(f, "${}", n),
            Arg::Reg(r) => write!(f, "{}", r),
            Arg::ByteReg(r) => write!(f, "{}", r),
            Arg::Deref(offset, base) => write!(f, "{}({})", offset, base),
            // Abstract locations only show up in debug dumps.
            Arg::Var(name) => write!(f, "#{}", name),
            Arg::VecVar(name) => write!(f, "##{}", name),
            Arg::Global(label) => write!(f, "{}(%rip)", label),
            Arg::FunRef(label) => write!(f, "{}(%rip)", label),
        }
    }
}

/// A pseudo-x86 instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Movq(Arg, Arg),
    Addq(Arg, Arg),
    Negq(Arg),
    Xorq(Arg, Arg),
    Cmpq(Arg, Arg),
    Movzbq(Arg, Arg),
    Set(Cc, Arg),
    Callq(String),
    /// Call through a function pointer; the arity is carried for liveness.
    IndirectCallq(Arg, usize),
    Leaq(Arg, Arg),
    Jmp(String),
    JmpIf(Cc, String),
    /// Tail transfer through a function pointer; expanded by emit into the
    /// epilogue-plus-jump sequence.
    TailJmp(Arg, usize),
    Retq,
}

/// A labeled basic block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Instr>,
}

/// One function's pseudo-x86: its blocks in creation order. The entry block
/// is `<name>_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fun {
    pub name: String,
    pub blocks: Vec<Block>,
}

impl Fun {
    /// Look up a block by label.
    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }
}

/// A pseudo-x86 program, one [`Fun`] per Rfun definition plus `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub funs: Vec<Fun>,
}

/// Frame facts computed by the register allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Bytes of rbp-relative spill space, 16-byte aligned.
    pub stack_bytes: usize,
    /// Number of root-stack slots this function owns.
    pub root_stack_spills: usize,
}

/// A function with homes assigned and its frame facts.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedFun {
    pub fun: Fun,
    pub frame: FrameInfo,
}

/// The program after register allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedProgram {
    pub funs: Vec<AllocatedFun>,
}
