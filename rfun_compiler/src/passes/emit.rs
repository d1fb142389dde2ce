//! Print x86: render the patched program as GAS-syntax assembly.
//!
//! Every function gets a prologue (save `%rbp`, reserve the spill frame,
//! save the callee-saved registers, zero its root-stack slots while bumping
//! `%r15` past them) and a conclusion that reverses it exactly. `main`
//! additionally calls `initialize` before touching the heap and hands its
//! result to `print_int` in the conclusion. A `tailjmp` expands to the
//! epilogue followed by an indirect jump — except inside `main`, which must
//! still reach `print_int`, so there it is an ordinary indirect call.

use crate::constants::CALLEE_SAVED_REGISTERS;
use crate::ir::x86::{AllocatedFun, AllocatedProgram, FrameInfo, Instr};

/// Render the whole program, using the given heap parameters for `main`'s
/// `initialize` call.
pub fn print_x86(program: &AllocatedProgram, root_stack_size: usize, heap_size: usize) -> String {
    let mut emitter = AsmEmitter::default();
    for fun in &program.funs {
        emitter.emit_fun(fun, root_stack_size, heap_size);
    }
    emitter.out
}

/// Line-oriented assembly writer.
#[derive(Debug, Default)]
struct AsmEmitter {
    out: String,
}

impl AsmEmitter {
    /// An indented instruction or directive line.
    fn line(&mut self, text: &str) {
        self.out.push_str("  ");
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":\n");
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn emit_fun(&mut self, af: &AllocatedFun, root_stack_size: usize, heap_size: usize) {
        let name = af.fun.name.as_str();
        let is_main = name == "main";

        self.blank();
        self.line(&format!(".globl {}", name));
        self.label(name);
        self.line("pushq %rbp");
        self.line("movq %rsp, %rbp");
        self.line(&format!("subq ${}, %rsp", af.frame.stack_bytes));
        for reg in CALLEE_SAVED_REGISTERS {
            self.line(&format!("pushq {}", reg));
        }
        if is_main {
            self.line(&format!("movq ${}, %rdi", root_stack_size));
            self.line(&format!("movq ${}, %rsi", heap_size));
            self.line("callq initialize");
            self.line("movq rootstack_begin(%rip), %r15");
        }
        // Claim and zero this function's root-stack slots; the collector
        // scans everything below %r15.
        for _ in 0..af.frame.root_stack_spills {
            self.line("movq $0, (%r15)");
            self.line("addq $8, %r15");
        }
        self.line(&format!("jmp {}_start", name));

        for block in &af.fun.blocks {
            self.label(&block.label);
            for instr in &block.instrs {
                self.emit_instr(instr, name, &af.frame);
            }
        }

        self.label(&format!("{}_conclusion", name));
        if is_main {
            self.line("movq %rax, %rdi");
            self.line("callq print_int");
            self.line("movq $0, %rax");
        }
        self.emit_epilogue(&af.frame);
        self.line("retq");
    }

    /// The exact reversal of the prologue, minus the final `retq`.
    fn emit_epilogue(&mut self, frame: &FrameInfo) {
        for reg in CALLEE_SAVED_REGISTERS.iter().rev() {
            self.line(&format!("popq {}", reg));
        }
        self.line(&format!("addq ${}, %rsp", frame.stack_bytes));
        self.line(&format!("subq ${}, %r15", 8 * frame.root_stack_spills));
        self.line("popq %rbp");
    }

    fn emit_instr(&mut self, instr: &Instr, fun_name: &str, frame: &FrameInfo) {
        match instr {
            Instr::Movq(src, dst) => self.line(&format!("movq {}, {}", src, dst)),
            Instr::Addq(src, dst) => self.line(&format!("addq {}, {}", src, dst)),
            Instr::Negq(arg) => self.line(&format!("negq {}", arg)),
            Instr::Xorq(src, dst) => self.line(&format!("xorq {}, {}", src, dst)),
            Instr::Cmpq(src, dst) => self.line(&format!("cmpq {}, {}", src, dst)),
            Instr::Movzbq(src, dst) => self.line(&format!("movzbq {}, {}", src, dst)),
            Instr::Set(cc, arg) => self.line(&format!("set{} {}", cc, arg)),
            Instr::Callq(label) => self.line(&format!("callq {}", label)),
            Instr::IndirectCallq(arg, _) => self.line(&format!("callq *{}", arg)),
            Instr::Leaq(src, dst) => self.line(&format!("leaq {}, {}", src, dst)),
            Instr::Jmp(label) => self.line(&format!("jmp {}", label)),
            Instr::JmpIf(cc, label) => self.line(&format!("j{} {}", cc, label)),
            Instr::TailJmp(arg, _) => {
                if fun_name == "main" {
                    // main's frame stays live: it still has to print the
                    // result and tear down the heap state.
                    self.line(&format!("callq *{}", arg));
                    self.line("jmp main_conclusion");
                } else {
                    self.emit_epilogue(frame);
                    self.line(&format!("jmp *{}", arg));
                }
            }
            Instr::Retq => self.line("retq"),
        }
    }
}
