//! The pass driver: surface AST in, assembly text out.
//!
//! Every pass consumes the previous pass's IR and returns a fresh one; the
//! driver strings them together in the fixed order and logs each completed
//! pass at debug level (`RUST_LOG=rfun_compiler=debug` to watch).

use crate::ast;
use crate::constants::{DEFAULT_HEAP_SIZE, DEFAULT_ROOT_STACK_SIZE};
use crate::error::CompileError;
use crate::passes::{
    allocate_registers::allocate_registers, emit::print_x86, explicate_control::explicate_control,
    expose_allocation::expose_allocation, interference::build_interference,
    limit_functions::limit_functions, liveness::uncover_live,
    patch_instructions::patch_instructions, rco::rco, reveal_functions::reveal_functions,
    select_instructions::select_instructions, shrink::shrink, typecheck::typecheck,
    uniquify::uniquify,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Knobs the driver passes through to emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Root (shadow) stack size in bytes, handed to `initialize`.
    pub root_stack_size: usize,
    /// Heap size in bytes, handed to `initialize`.
    pub heap_size: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            root_stack_size: DEFAULT_ROOT_STACK_SIZE,
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

/// Compile a surface program to assembly text with default options.
pub fn compile_program(program: &ast::Program) -> Result<String, CompileError> {
    compile_program_with_options(program, CompileOptions::default())
}

/// Compile a surface program to assembly text.
pub fn compile_program_with_options(
    program: &ast::Program,
    options: CompileOptions,
) -> Result<String, CompileError> {
    let typed = typecheck(program)?;
    debug!("typecheck complete");
    let shrunk = shrink(typed);
    debug!("shrink complete");
    let unique = uniquify(shrunk)?;
    debug!("uniquify complete");
    let revealed = reveal_functions(unique);
    debug!("reveal-functions complete");
    let limited = limit_functions(revealed)?;
    debug!("limit-functions complete");
    let exposed = expose_allocation(limited)?;
    debug!("expose-allocation complete");
    let normalized = rco(exposed);
    debug!("remove-complex-operands complete");
    let cfg = explicate_control(normalized)?;
    debug!("explicate-control complete");
    let pseudo = select_instructions(cfg)?;
    debug!("select-instructions complete");
    let live = uncover_live(&pseudo)?;
    debug!("uncover-live complete");
    let graphs = build_interference(&pseudo, &live)?;
    debug!("build-interference complete");
    let allocated = allocate_registers(pseudo, &graphs)?;
    debug!("allocate-registers complete");
    let patched = patch_instructions(allocated);
    debug!("patch-instructions complete");
    let asm = print_x86(&patched, options.root_stack_size, options.heap_size);
    debug!("print-x86 complete ({} bytes)", asm.len());
    Ok(asm)
}

/// Errors from the file-level entry point.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("malformed AST file: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Compile a serialized surface AST from `input` and write the assembly next
/// to it (or to `output` when given). Returns the path written.
pub fn compile_file(input: &Path, output: Option<&Path>) -> Result<PathBuf, PipelineError> {
    let source = fs::read_to_string(input)?;
    let program = ast::Program::from_json_str(&source)?;
    let asm = compile_program(&program)?;

    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".s");
            PathBuf::from(name)
        }
    };
    fs::write(&out_path, asm)?;
    Ok(out_path)
}
