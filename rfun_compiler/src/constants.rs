//! Target-machine tables shared across the back-end passes.

use crate::ir::x86::Reg;

/// Caller-saved registers available to the allocator. `rax` and `r11` are
/// scratch registers for patching and vector addressing and never allocated.
pub const CALLER_SAVED_REGISTERS: [Reg; 7] = [
    Reg::Rdx,
    Reg::Rcx,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
];

/// Callee-saved registers available to the allocator. `r15` is reserved as
/// the root-stack pointer, `rbp`/`rsp` frame the stack.
pub const CALLEE_SAVED_REGISTERS: [Reg; 4] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14];

/// System V AMD64 integer parameter registers, in order.
pub const PARAMETER_PASSING_REGISTERS: [Reg; 6] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
];

/// Maximum number of register-passed parameters; the limit-functions pass
/// packs everything beyond this into a vector.
pub const MAX_REGISTER_PARAMS: usize = PARAMETER_PASSING_REGISTERS.len();

/// Default root (shadow) stack size in bytes, passed to `initialize`.
pub const DEFAULT_ROOT_STACK_SIZE: usize = 16384;

/// Default heap size in bytes, passed to `initialize`.
pub const DEFAULT_HEAP_SIZE: usize = 16384;

/// The register allocation order: all caller-saved, then all callee-saved.
/// A color index below this list's length is a register; anything beyond
/// spills.
pub fn register_allocation_order() -> Vec<Reg> {
    let mut regs = Vec::with_capacity(CALLER_SAVED_REGISTERS.len() + CALLEE_SAVED_REGISTERS.len());
    regs.extend_from_slice(&CALLER_SAVED_REGISTERS);
    regs.extend_from_slice(&CALLEE_SAVED_REGISTERS);
    regs
}
