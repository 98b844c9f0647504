//! `try`/`except`/`else`/`finally` lowering (spec.md §4.E, §9 Design Notes).
//!
//! `Try { body, handlers, orelse, finalbody }` is reshaped exactly as the
//! Design Notes describe: with a non-empty `finalbody` it is equivalent to
//! `TryFinally { body = [TryExcept { body, handlers }, *orelse], finalbody }`.
//! With an empty `finalbody` the two forms collapse to the same
//! `try`/`except`/`else` lowering, so both paths share `lower_try_except`.

use crate::ast::{ExceptHandler, Stmt};
use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::encode::{NameAction, StackOp};
use crate::label::Label;

use super::compiler::Compiler;
use super::expr::lower_expr;

/// `handling` discriminator for the `finally` opcode (spec.md §4.E
/// `TryFinally`): `false` on the normal non-exceptional exit (the pending
/// finally block runs but must not re-raise afterward), `true` on the
/// uncaught-exception path (the finally block runs, then the exception is
/// re-raised).
const FINALLY_NORMAL: i64 = 0;
const FINALLY_RERAISE: i64 = 1;

pub fn lower_try(
    c: &mut Compiler,
    body: &[Stmt],
    handlers: &[ExceptHandler],
    orelse: &[Stmt],
    finalbody: &[Stmt],
) -> Result<(), CompileError> {
    if finalbody.is_empty() {
        return lower_try_except(c, body, handlers, orelse);
    }

    let try_label = c.code.new_label("finally_try");
    let finally_label = c.code.new_label("finally");
    let exit_label = c.code.new_label("finally_exit");

    c.code.emit(Op::Try, Arg::Label(try_label.clone()));
    c.in_try_finally(finally_label.clone(), |c| {
        lower_try_except(c, body, handlers, orelse)
    })?;
    c.code.emit_none(Op::EndTry);
    c.code.emit(
        Op::Finally,
        Arg::tuple([Arg::Label(finally_label.clone()), Arg::Int(FINALLY_NORMAL)]),
    );
    c.code.emit(Op::Jump, Arg::Label(exit_label.clone()));

    c.code.add_label(try_label)?;
    c.code.emit(
        Op::Finally,
        Arg::tuple([Arg::Label(finally_label.clone()), Arg::Int(FINALLY_RERAISE)]),
    );
    c.code.emit_none(Op::Raise);

    c.code.add_label(finally_label)?;
    c.lower_block(finalbody)?;
    c.code.emit_none(Op::EndFinally);

    c.code.add_label(exit_label)
}

/// Exactly spec.md §4.E's `TryExcept` shape: at `try_label` the active
/// exception is already the stack top, so it tries every handler's type test
/// in order (`except`/`except_all`) directly, falling through to an
/// unconditional `raise` if none match. Only *then* do the individual
/// `handler_label` bodies follow, each binding or discarding the exception
/// before its body and jumping to `end_label`.
fn lower_try_except(
    c: &mut Compiler,
    body: &[Stmt],
    handlers: &[ExceptHandler],
    orelse: &[Stmt],
) -> Result<(), CompileError> {
    if handlers.is_empty() {
        c.lower_block(body)?;
        return c.lower_block(orelse);
    }

    let try_label = c.code.new_label("try_except");
    let end_label = c.code.new_label("try_end");
    let handler_labels: Vec<Label> = handlers
        .iter()
        .enumerate()
        .map(|(i, _)| c.code.new_label(&format!("handler{i}")))
        .collect();

    c.code.emit(Op::Try, Arg::Label(try_label.clone()));
    c.lower_block(body)?;
    c.code.emit_none(Op::EndTry);
    c.lower_block(orelse)?;
    c.code.emit(Op::Jump, Arg::Label(end_label.clone()));

    c.code.add_label(try_label)?;
    for (handler, handler_label) in handlers.iter().zip(&handler_labels) {
        match &handler.ty {
            Some(ty_expr) => {
                lower_expr(c, ty_expr)?;
                c.code.emit(Op::Except, Arg::Label(handler_label.clone()));
            }
            None => {
                c.code
                    .emit(Op::ExceptAll, Arg::Label(handler_label.clone()));
            }
        }
    }
    // No handler matched the active exception: propagate it.
    c.code.emit_none(Op::Raise);

    for (handler, handler_label) in handlers.iter().zip(handler_labels) {
        c.code.add_label(handler_label)?;
        match &handler.name {
            Some(name) => c.code.emit(
                Op::Name,
                Arg::tuple([Arg::Int(NameAction::Store as i64), Arg::Str(name.clone())]),
            ),
            None => c.code.emit(Op::Stack, Arg::Int(StackOp::Pop as i64)),
        }
        c.lower_block(&handler.body)?;
        c.code.emit(Op::Jump, Arg::Label(end_label.clone()));
    }

    c.code.add_label(end_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Number};
    use crate::code::{CodeItem, CodeKind};

    #[test]
    fn try_except_with_no_matching_handler_re_raises() {
        let mut c = Compiler::new(CodeKind::Module);
        lower_try(
            &mut c,
            &[Stmt::Pass],
            &[ExceptHandler {
                ty: Some(Expr::Name("ValueError".to_string())),
                name: None,
                body: vec![Stmt::Pass],
            }],
            &[],
            &[],
        )
        .unwrap();
        assert!(
            c.code
                .items()
                .iter()
                .any(|item| matches!(item, CodeItem::Instr(Op::Raise, _))),
            "an unmatched exception must be re-raised, not silently swallowed"
        );
        assert!(
            !c.code
                .items()
                .iter()
                .any(|item| matches!(item, CodeItem::Instr(Op::GetException, _))),
            "the active exception is already the stack top at try_label"
        );
    }

    #[test]
    fn try_finally_emits_both_handling_discriminators() {
        let mut c = Compiler::new(CodeKind::Module);
        lower_try(
            &mut c,
            &[Stmt::Pass],
            &[],
            &[],
            &[Stmt::Expr(Expr::Num(Number::Int(1)))],
        )
        .unwrap();
        let finally_flags: Vec<i64> = c
            .code
            .items()
            .iter()
            .filter_map(|item| match item {
                CodeItem::Instr(Op::Finally, Arg::Tuple(args)) => match &args[1] {
                    Arg::Int(v) => Some(*v),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(finally_flags, vec![FINALLY_NORMAL, FINALLY_RERAISE]);
        assert!(c
            .code
            .items()
            .iter()
            .any(|item| matches!(item, CodeItem::Instr(Op::EndFinally, _))));
    }
}
