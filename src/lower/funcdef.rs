//! Function and class definitions (spec.md §4.E "functions/classes").
//!
//! A compiled function or class body is itself a nested [`Code`], linked
//! independently and embedded by value as a `Constant::Code` in the
//! enclosing scope's pool — there is no separate "make function" opcode in
//! the closed 26-entry table, so a function *value* at this level is simply
//! its own linked code object, bound to its name with a plain `name store`.

use std::rc::Rc;

use crate::ast::{ClassDef, FunctionDef};
use crate::code::{Arg, Code, CodeKind, Op};
use crate::diagnostic::CompileError;
use crate::encode::NameAction;
use crate::linker::link;
use crate::pool::Constant;

use super::compiler::Compiler;
use super::expr::lower_expr;

/// `emit_function_prologue`: pushes, in order, the fixed constant-order
/// header — each positional name, the positional count, each default value
/// expression, the default count, then per keyword-only parameter its name
/// constant, a has-default flag, and its default expression when present,
/// then the keyword-only count — and closes it with a single
/// `init_function` (spec.md §4.E "functions and classes"). Names and counts
/// are pushed with `add_const`; default expressions are lowered with
/// `lower_expr` like any other expression, not restricted to literals.
fn emit_function_prologue(c: &mut Compiler, def: &FunctionDef) -> Result<(), CompileError> {
    for name in &def.params {
        c.code.add_const(Constant::Str(name.clone()))?;
    }
    c.code.add_const(Constant::Int(def.params.len() as i64))?;

    for default in &def.defaults {
        lower_expr(c, default)?;
    }
    c.code.add_const(Constant::Int(def.defaults.len() as i64))?;

    for kwonly in &def.kwonly {
        c.code.add_const(Constant::Str(kwonly.name.clone()))?;
        c.code.add_const(Constant::Bool(kwonly.default.is_some()))?;
        if let Some(default) = &kwonly.default {
            lower_expr(c, default)?;
        }
    }
    c.code.add_const(Constant::Int(def.kwonly.len() as i64))?;

    c.code.emit_none(Op::InitFunction);
    Ok(())
}

pub fn compile_function(def: &FunctionDef) -> Result<Code, CompileError> {
    let mut compiler = Compiler::new(CodeKind::Function);
    emit_function_prologue(&mut compiler, def)?;
    compiler.lower_block(&def.body)?;
    Ok(compiler.into_code())
}

pub fn compile_class(def: &ClassDef) -> Result<Code, CompileError> {
    let mut compiler = Compiler::new(CodeKind::Class);
    compiler.lower_block(&def.body)?;
    Ok(compiler.into_code())
}

pub fn lower_functiondef(c: &mut Compiler, def: &FunctionDef) -> Result<(), CompileError> {
    let nested = compile_function(def)?;
    let linked = link(nested)?;
    c.code.add_const(Constant::Code(Rc::new(linked)))?;
    c.code.emit(
        Op::Name,
        Arg::tuple([
            Arg::Int(NameAction::Store as i64),
            Arg::Str(def.name.clone()),
        ]),
    );
    Ok(())
}

pub fn lower_classdef(c: &mut Compiler, def: &ClassDef) -> Result<(), CompileError> {
    // spec.md §4.E: base-class expressions first, in source order, then the
    // linked class body constant, then `make_class`.
    for base in &def.bases {
        lower_expr(c, base)?;
    }
    let nested = compile_class(def)?;
    let linked = link(nested)?;
    c.code.add_const(Constant::Code(Rc::new(linked)))?;
    c.code
        .emit(Op::MakeClass, Arg::Int(def.bases.len() as i64));
    c.code.emit(
        Op::Name,
        Arg::tuple([
            Arg::Int(NameAction::Store as i64),
            Arg::Str(def.name.clone()),
        ]),
    );
    Ok(())
}
