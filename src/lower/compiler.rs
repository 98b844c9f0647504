//! The `Compiler` visitor: one `Code` plus one `FrameStack` per module,
//! function, or class body (spec.md §4.E).

use crate::ast::Stmt;
use crate::code::{Code, CodeKind};
use crate::diagnostic::CompileError;
use crate::frame::FrameStack;
use crate::label::Label;

use super::stmt::lower_stmt;

pub struct Compiler {
    pub code: Code,
    pub frames: FrameStack,
}

impl Compiler {
    pub fn new(kind: CodeKind) -> Self {
        Self {
            code: Code::new(kind),
            frames: FrameStack::new(),
        }
    }

    pub fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            lower_stmt(self, stmt)?;
        }
        Ok(())
    }

    /// Run `f` with a `LoopFrame` pushed, popping it afterward whether `f`
    /// succeeds or raises — a closure-scoped substitute for an RAII guard
    /// (see `FrameStack::push_loop`'s doc comment for why a literal guard
    /// doesn't work here).
    pub fn in_loop<T>(
        &mut self,
        start_label: Label,
        else_label: Label,
        end_label: Label,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.frames.push_loop(start_label, else_label, end_label);
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Same as [`Compiler::in_loop`], for a `TryFinallyFrame`.
    pub fn in_try_finally<T>(
        &mut self,
        finally_label: Label,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.frames.push_try_finally(finally_label);
        let result = f(self);
        self.frames.pop();
        result
    }

    pub fn into_code(self) -> Code {
        self.code
    }
}
