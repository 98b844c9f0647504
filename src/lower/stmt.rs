//! Statement lowering: expression statements, assignment/delete targets,
//! conditionals, pass/return/raise (spec.md §4.E).

use crate::ast::{Expr, Stmt};
use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::encode::{IndexAction, NameAction, StackOp};
use crate::pool::Constant;

use super::compiler::Compiler;
use super::expr::lower_expr;
use super::funcdef::{lower_classdef, lower_functiondef};
use super::loops::{lower_for, lower_while};

pub fn lower_stmt(c: &mut Compiler, stmt: &Stmt) -> Result<(), CompileError> {
    match stmt {
        Stmt::Expr(expr) => {
            lower_expr(c, expr)?;
            c.code.emit(Op::Stack, Arg::Int(StackOp::Pop as i64));
            Ok(())
        }

        Stmt::Assign { targets, value } => {
            lower_expr(c, value)?;
            for (i, target) in targets.iter().enumerate() {
                if i + 1 < targets.len() {
                    c.code.emit(Op::Stack, Arg::Int(StackOp::Dup as i64));
                }
                lower_assign_target(c, target, NameAction::Store)?;
            }
            Ok(())
        }

        Stmt::If { test, body, orelse } => lower_if(c, test, body, orelse),

        Stmt::While { test, body, orelse } => lower_while(c, test, body, orelse),

        Stmt::For {
            target,
            iter,
            body,
            orelse,
        } => lower_for(c, target, iter, body, orelse),

        Stmt::Pass => {
            c.code.emit_none(Op::Nop);
            Ok(())
        }

        Stmt::Break => super::loops::lower_break(c),
        Stmt::Continue => super::loops::lower_continue(c),

        Stmt::Delete(targets) => {
            for target in targets {
                lower_assign_target(c, target, NameAction::Del)?;
            }
            Ok(())
        }

        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => super::tryexcept::lower_try(c, body, handlers, orelse, finalbody),

        Stmt::Raise { exc, cause } => {
            match exc {
                None => c.code.emit_none(Op::GetException),
                Some(exc) => lower_expr(c, exc)?,
            }
            if let Some(cause) = cause {
                // stack: [exc]. Attach `None` to `__context__`, then `cause`
                // to `__cause__`, keeping `exc` on top for the final raise —
                // `dup`/`swap2` re-present `exc` as the attribute target
                // after each value, matching the `attribute`/Store
                // convention (`lower_assign_target`'s `Expr::Attribute` arm:
                // value below, object on top, both consumed).
                c.code.emit(Op::Stack, Arg::Int(StackOp::Dup as i64));
                c.code.add_const(Constant::None)?;
                c.code.emit(Op::Stack, Arg::Int(StackOp::Swap2 as i64));
                let context_id = c.code.intern(Constant::Str("__context__".to_string()))?;
                c.code.emit(
                    Op::Attribute,
                    Arg::tuple([Arg::Int(NameAction::Store as i64), Arg::Int(context_id as i64)]),
                );

                c.code.emit(Op::Stack, Arg::Int(StackOp::Dup as i64));
                lower_expr(c, cause)?;
                c.code.emit(Op::Stack, Arg::Int(StackOp::Swap2 as i64));
                let cause_id = c.code.intern(Constant::Str("__cause__".to_string()))?;
                c.code.emit(
                    Op::Attribute,
                    Arg::tuple([Arg::Int(NameAction::Store as i64), Arg::Int(cause_id as i64)]),
                );
            }
            c.code.emit_none(Op::Raise);
            Ok(())
        }

        Stmt::Return(value) => {
            match value {
                Some(expr) => lower_expr(c, expr)?,
                None => c.code.add_const(Constant::None)?,
            }
            c.code.emit_none(Op::Return);
            Ok(())
        }

        Stmt::FunctionDef(def) => lower_functiondef(c, def),
        Stmt::ClassDef(def) => lower_classdef(c, def),
    }
}

fn lower_if(c: &mut Compiler, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<(), CompileError> {
    let else_label = c.code.new_label("if_else");
    let end_label = c.code.new_label("if_end");
    lower_expr(c, test)?;
    c.code.emit(
        Op::CJump,
        Arg::tuple([
            Arg::bool_flag(false),
            Arg::bool_flag(false),
            Arg::Label(else_label.clone()),
        ]),
    );
    c.lower_block(body)?;
    c.code.emit(Op::Jump, Arg::Label(end_label.clone()));
    c.code.add_label(else_label)?;
    c.lower_block(orelse)?;
    c.code.add_label(end_label)
}

/// Store and Delete contexts for aggregate targets are handled identically
/// (spec.md §9 Open Question 3): both emit `eager_unpack_list n` followed by
/// reversed per-element lowering.
pub fn lower_assign_target(c: &mut Compiler, target: &Expr, action: NameAction) -> Result<(), CompileError> {
    match target {
        Expr::Name(name) => {
            c.code.emit(
                Op::Name,
                Arg::tuple([Arg::Int(action as i64), Arg::Str(name.clone())]),
            );
            Ok(())
        }

        Expr::Attribute { value, attr } => {
            lower_expr(c, value)?;
            let id = c.code.intern(Constant::Str(attr.clone()))?;
            c.code.emit(
                Op::Attribute,
                Arg::tuple([Arg::Int(action as i64), Arg::Int(id as i64)]),
            );
            Ok(())
        }

        Expr::Subscript { value, index } => {
            lower_expr(c, value)?;
            lower_expr(c, index)?;
            let index_action = match action {
                NameAction::Del => IndexAction::Del,
                _ => IndexAction::Set,
            };
            c.code.emit(Op::Index, Arg::Int(index_action as i64));
            Ok(())
        }

        Expr::Tuple(items) | Expr::List(items) => {
            c.code
                .emit(Op::EagerUnpackList, Arg::Int(items.len() as i64));
            for item in items.iter().rev() {
                lower_assign_target(c, item, action)?;
            }
            Ok(())
        }

        Expr::Starred(inner) => match inner.as_ref() {
            Expr::Name(_) => lower_assign_target(c, inner, action),
            other => Err(CompileError::unsupported_in(
                format!("{other:?}"),
                "starred assignment target",
            )),
        },

        other => Err(CompileError::unsupported_in(
            format!("{other:?}"),
            "assignment target",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Code, CodeItem, CodeKind};

    fn compile_stmt(stmt: &Stmt) -> Code {
        let mut compiler = Compiler::new(CodeKind::Module);
        lower_stmt(&mut compiler, stmt).unwrap();
        compiler.into_code()
    }

    #[test]
    fn bare_raise_emits_get_exception_then_raise() {
        let code = compile_stmt(&Stmt::Raise {
            exc: None,
            cause: None,
        });
        let items = code.items();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], CodeItem::Instr(Op::GetException, _)));
        assert!(matches!(items[1], CodeItem::Instr(Op::Raise, _)));
    }

    #[test]
    fn raise_with_cause_attaches_context_and_cause_then_raises() {
        let code = compile_stmt(&Stmt::Raise {
            exc: Some(Expr::Name("err".to_string())),
            cause: Some(Expr::Name("orig".to_string())),
        });
        let items = code.items();
        let attribute_count = items
            .iter()
            .filter(|item| matches!(item, CodeItem::Instr(Op::Attribute, _)))
            .count();
        assert_eq!(
            attribute_count, 2,
            "__context__ and __cause__ are each attached once"
        );
        assert!(matches!(items.last(), Some(CodeItem::Instr(Op::Raise, _))));
        assert!(
            !items
                .iter()
                .any(|item| matches!(item, CodeItem::Instr(Op::GetException, _))),
            "an explicit exception expression never needs get_exception"
        );
    }
}
