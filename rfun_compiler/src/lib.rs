//! Rfun Compiler Library
//!
//! A multi-pass compiler lowering Rfun — a small typed language with
//! first-class top-level functions and GC-managed vectors — into x86-64
//! assembly for a standard system toolchain.
//!
//! The pipeline runs fourteen passes: typecheck, shrink, uniquify,
//! reveal-functions, limit-functions, expose-allocation,
//! remove-complex-operands, explicate-control, select-instructions,
//! uncover-live, build-interference, allocate-registers,
//! patch-instructions and print-x86. See [`pipeline::compile_program`] for
//! the driver.
//!
//! The textual parser, the runtime library (`initialize`, `collect`,
//! `print_int`) and the final assemble/link step are external collaborators;
//! the parser hands over programs as serialized [`ast::Program`] values.

// Prevent accidental debug output in library code. CLI binaries may use
// eprintln!() for user-facing error messages.
#![deny(clippy::print_stderr)]

pub mod ast;
pub mod constants;
pub mod error;
pub mod gensym;
pub mod ir;
pub mod pipeline;
pub mod types;

// The compilation passes
pub mod passes;

pub use ast::{PrimOp, Program};
pub use error::CompileError;
pub use pipeline::{compile_file, compile_program, compile_program_with_options, CompileOptions};
pub use types::RfunType;
