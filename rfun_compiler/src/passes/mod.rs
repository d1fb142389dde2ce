//! The compilation passes, one module each, in pipeline order.

pub mod typecheck;

pub mod shrink;
pub mod uniquify;
pub mod reveal_functions;
pub mod limit_functions;

pub mod expose_allocation;
pub mod rco;

pub mod explicate_control;
pub mod select_instructions;

pub mod liveness;
pub mod interference;
pub mod allocate_registers;

pub mod patch_instructions;
pub mod emit;
