//! Code generation backend for WGSL shader fragments in PNGB artifacts.
//!
//! - `dsl`: the analyzed program handed over by the front end
//! - `emitter`: dependency resolution, substitution, and shader handle allocation
//! - `bytecode`: opcode stream, data / string / dependency sections, container
//! - `validation`: optional naga parsing of resolved WGSL

pub mod bytecode;
pub mod dsl;
pub mod emitter;
pub mod error;
pub mod validation;

pub use emitter::{CompiledProgram, DeclKind, EmitMode, EmitOptions, emit_program};
pub use error::EmitError;
