//! Lowers an accepted AST subset for a small dynamic scripting language into
//! linked PEX bytecode: a symbolic lowering pass (`lower`), a code-object
//! builder (`code`, `pool`, `label`, `frame`), and a linker (`linker`) that
//! resolves labels and interns `name` identifiers. `encode` turns linked
//! code into the closed-opcode byte format a VM or container writer
//! consumes.
//!
//! The source parser, the PEX container envelope, and any interpreter are
//! out of scope for this library; `container` and the `pexc` binary are a
//! thin demonstration harness built on top of it, not part of the core.

pub mod ast;
pub mod code;
pub mod container;
pub mod diagnostic;
pub mod encode;
pub mod frame;
pub mod label;
pub mod linker;
pub mod lower;
pub mod pool;

pub use diagnostic::{CompileError, CompileResult};
pub use lower::{compile_class, compile_function, compile_module};

/// Compile, then link, a whole module in one call — the common entry point
/// for callers that don't need the intermediate symbolic `Code`.
pub fn compile_and_link(module: &ast::Module) -> CompileResult<linker::LinkedCode> {
    let code = compile_module(module)?;
    linker::link(code)
}
