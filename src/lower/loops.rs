//! Loop lowering: `while`, `for`, and the `break`/`continue` frame-stack
//! scan (spec.md §4.E "loops" and "break/continue").

use crate::ast::{Expr, Stmt};
use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::encode::{NameAction, PseudoCall, StackOp};
use crate::frame::Frame;
use crate::label::Label;

use super::compiler::Compiler;
use super::expr::lower_expr;
use super::stmt::lower_assign_target;

pub fn lower_while(c: &mut Compiler, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<(), CompileError> {
    let start = c.code.new_label("while_start");
    let else_label = c.code.new_label("while_else");
    let end = c.code.new_label("while_end");

    c.code.add_label(start.clone())?;
    lower_expr(c, test)?;
    c.code.emit(
        Op::CJump,
        Arg::tuple([
            Arg::bool_flag(false),
            Arg::bool_flag(false),
            Arg::Label(else_label.clone()),
        ]),
    );
    c.in_loop(start.clone(), else_label.clone(), end.clone(), |c| {
        c.lower_block(body)
    })?;
    c.code.emit(Op::Jump, Arg::Label(start));
    c.code.add_label(else_label)?;
    c.lower_block(orelse)?;
    c.code.add_label(end)
}

/// `for target in iter: body else: orelse`, via the iterator protocol: an
/// `iter` pseudo-call turns the iterable into an iterator, then each `next`
/// pseudo-call is wrapped in a `try` whose handler distinguishes
/// `StopIteration` (falls through to `else`) from any other exception
/// (re-raised) — spec.md §8 scenario 4's exact instruction sequence, using
/// the `LoadGlobal` `name` action spec.md §9 Open Question 4 adds for this
/// lookup.
pub fn lower_for(c: &mut Compiler, target: &Expr, iter: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<(), CompileError> {
    lower_expr(c, iter)?;
    c.code.emit(Op::PseudoCall, Arg::Int(PseudoCall::Iter as i64));

    let start = c.code.new_label("for_start");
    let else_label = c.code.new_label("for_else");
    let try_label = c.code.new_label("for_try");
    let except_label = c.code.new_label("for_except");
    let end = c.code.new_label("for_end");

    c.code.add_label(start.clone())?;
    c.code.emit(Op::Try, Arg::Label(try_label.clone()));
    c.code.emit(Op::Stack, Arg::Int(StackOp::Dup as i64));
    c.code.emit(Op::PseudoCall, Arg::Int(PseudoCall::Next as i64));
    c.code.emit_none(Op::EndTry);

    lower_assign_target(c, target, NameAction::Store)?;
    c.in_loop(start.clone(), else_label.clone(), end.clone(), |c| {
        c.lower_block(body)
    })?;
    c.code.emit(Op::Jump, Arg::Label(start));

    c.code.add_label(else_label.clone())?;
    c.code.emit(Op::Stack, Arg::Int(StackOp::Pop as i64));
    c.lower_block(orelse)?;
    c.code.emit(Op::Jump, Arg::Label(end.clone()));

    c.code.add_label(try_label)?;
    c.code.emit(
        Op::Name,
        Arg::tuple([
            Arg::Int(NameAction::LoadGlobal as i64),
            Arg::Str("StopIteration".to_string()),
        ]),
    );
    c.code.emit(Op::Except, Arg::Label(except_label.clone()));
    c.code.emit_none(Op::Raise);

    c.code.add_label(except_label)?;
    c.code.emit(Op::Stack, Arg::Int(StackOp::Pop as i64));
    c.code.emit(Op::Jump, Arg::Label(else_label));

    c.code.add_label(end)
}

#[derive(Clone, Copy)]
enum LoopTarget {
    Break,
    Continue,
}

/// Scan the frame stack innermost-first for the nearest loop, emitting a
/// `finally` marker for every intervening `try`/`finally` so its cleanup
/// still runs on the way out (spec.md §3 "Frame").
fn unwind_to_loop(c: &mut Compiler, target: LoopTarget) -> Result<Label, CompileError> {
    let mut destination = None;
    let mut pending_finally = Vec::new();
    for frame in c.frames.iter_innermost_first() {
        match frame {
            Frame::TryFinally { .. } => {
                if let Some(label) = frame.finally_label() {
                    pending_finally.push(label.clone());
                }
            }
            Frame::Loop { .. } => {
                let label = match target {
                    LoopTarget::Break => frame.end_label(),
                    LoopTarget::Continue => frame.start_label(),
                };
                destination = label.cloned();
                break;
            }
        }
    }
    let destination = destination.ok_or_else(|| {
        let what = match target {
            LoopTarget::Break => "break",
            LoopTarget::Continue => "continue",
        };
        CompileError::structural(format!("`{what}` outside loop"))
    })?;
    for finally_label in pending_finally {
        // `handling = false` (0): a non-local `break`/`continue` exit runs
        // the pending finally block without re-raising afterward (spec.md
        // §4.E "break / continue").
        c.code.emit(
            Op::Finally,
            Arg::tuple([Arg::Label(finally_label), Arg::Int(0)]),
        );
    }
    Ok(destination)
}

pub fn lower_break(c: &mut Compiler) -> Result<(), CompileError> {
    let label = unwind_to_loop(c, LoopTarget::Break)?;
    c.code.emit(Op::Jump, Arg::Label(label));
    Ok(())
}

pub fn lower_continue(c: &mut Compiler) -> Result<(), CompileError> {
    let label = unwind_to_loop(c, LoopTarget::Continue)?;
    c.code.emit(Op::Jump, Arg::Label(label));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CodeItem, CodeKind};
    use crate::label::LabelAllocator;

    #[test]
    fn for_loop_emits_stop_iteration_lookup_before_raise() {
        let mut c = Compiler::new(CodeKind::Module);
        lower_for(
            &mut c,
            &Expr::Name("item".to_string()),
            &Expr::Name("items".to_string()),
            &[Stmt::Pass],
            &[Stmt::Pass],
        )
        .unwrap();
        let items = c.code.items();
        let name_load_global = items.iter().any(|item| matches!(
            item,
            CodeItem::Instr(Op::Name, Arg::Tuple(args))
                if matches!(args.as_slice(), [Arg::Int(a), Arg::Str(s)]
                    if *a == NameAction::LoadGlobal as i64 && s == "StopIteration")
        ));
        assert!(name_load_global, "for-loop must look up StopIteration by name");
        let raise_count = items
            .iter()
            .filter(|item| matches!(item, CodeItem::Instr(Op::Raise, _)))
            .count();
        assert_eq!(raise_count, 1, "any exception besides StopIteration re-raises");
    }

    #[test]
    fn break_crossing_a_try_finally_emits_a_finally_marker() {
        let mut alloc = LabelAllocator::new();
        let mut c = Compiler::new(CodeKind::Module);
        let start = alloc.new_label(None);
        let else_label = alloc.new_label(None);
        let end = alloc.new_label(None);
        let finally_label = alloc.new_label(None);
        c.frames.push_loop(start, else_label, end);
        c.frames.push_try_finally(finally_label);
        lower_break(&mut c).unwrap();
        let items = c.code.items();
        assert!(items
            .iter()
            .any(|item| matches!(item, CodeItem::Instr(Op::Finally, _))));
        assert!(items
            .iter()
            .any(|item| matches!(item, CodeItem::Instr(Op::Jump, _))));
    }
}
