//! Expression lowering in load context: literals, aggregates, names,
//! attributes, subscripts, operators, calls (spec.md §4.E).

use crate::ast::{BoolOp, Expr, NamedConstant, Number, UnaryOp};
use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::encode::{binop_index, IndexAction, MakeStructKind, NameAction, UnOpKind};
use crate::pool::Constant;

use super::compare::lower_compare;
use super::compiler::Compiler;

pub fn lower_expr(c: &mut Compiler, expr: &Expr) -> Result<(), CompileError> {
    match expr {
        Expr::Num(Number::Int(v)) => c.code.add_const(Constant::Int(*v)),
        Expr::Num(Number::Float(v)) => c.code.add_const(Constant::Float(*v)),
        Expr::Str(s) => c.code.add_const(Constant::Str(s.clone())),
        Expr::Bytes(b) => c.code.add_const(Constant::Bytes(b.clone())),
        Expr::NamedConstant(NamedConstant::True) => c.code.add_const(Constant::Bool(true)),
        Expr::NamedConstant(NamedConstant::False) => c.code.add_const(Constant::Bool(false)),
        Expr::NamedConstant(NamedConstant::None) => c.code.add_const(Constant::None),

        Expr::Name(name) => {
            c.code.emit(
                Op::Name,
                Arg::tuple([Arg::Int(NameAction::Load as i64), Arg::Str(name.clone())]),
            );
            Ok(())
        }

        Expr::Attribute { value, attr } => {
            lower_expr(c, value)?;
            let id = c.code.intern(Constant::Str(attr.clone()))?;
            c.code.emit(
                Op::Attribute,
                Arg::tuple([Arg::Int(NameAction::Load as i64), Arg::Int(id as i64)]),
            );
            Ok(())
        }

        Expr::Subscript { value, index } => {
            lower_expr(c, value)?;
            lower_expr(c, index)?;
            c.code.emit(Op::Index, Arg::Int(IndexAction::Get as i64));
            Ok(())
        }

        Expr::Tuple(items) => lower_aggregate(c, items, MakeStructKind::Tuple),
        Expr::List(items) => lower_aggregate(c, items, MakeStructKind::List),
        Expr::Set(items) => lower_aggregate(c, items, MakeStructKind::Set),

        Expr::Dict(entries) => {
            for (key, value) in entries {
                let key = key.as_ref().ok_or_else(|| {
                    CompileError::unsupported_in("**-splat entry", "dict literal")
                })?;
                lower_expr(c, key)?;
                lower_expr(c, value)?;
            }
            c.code.emit(
                Op::MakeStruct,
                Arg::tuple([
                    Arg::Int(entries.len() as i64),
                    Arg::Int(MakeStructKind::Dict as i64),
                ]),
            );
            Ok(())
        }

        Expr::Starred(_) => Err(CompileError::unsupported_in("Starred", "load context")),

        Expr::UnaryOp { op, operand } => {
            lower_expr(c, operand)?;
            let kind = match op {
                UnaryOp::UAdd => UnOpKind::Add,
                UnaryOp::USub => UnOpKind::Sub,
                UnaryOp::Not => UnOpKind::Not,
                UnaryOp::Invert => UnOpKind::Invert,
            };
            c.code.emit(Op::UnOp, Arg::Int(kind as i64));
            Ok(())
        }

        Expr::BinOp { op, left, right } => {
            lower_expr(c, left)?;
            lower_expr(c, right)?;
            let index = binop_index(op.as_str())?;
            c.code.emit(Op::BinOp, Arg::Int(index));
            Ok(())
        }

        Expr::BoolOp { op, values } => lower_boolop(c, *op, values),

        Expr::Compare {
            left,
            ops,
            comparators,
        } => lower_compare(c, left, ops, comparators),

        Expr::Call { func, args } => {
            lower_expr(c, func)?;
            for arg in args {
                if matches!(arg, Expr::Starred(_)) {
                    return Err(CompileError::unsupported_in(
                        "Starred",
                        "call argument (no splat-call opcode)",
                    ));
                }
                lower_expr(c, arg)?;
            }
            c.code
                .emit(Op::CallFunction, Arg::Int(args.len() as i64));
            Ok(())
        }

        Expr::IfExp { test, body, orelse } => {
            let else_label = c.code.new_label("ifexp_else");
            let end_label = c.code.new_label("ifexp_end");
            lower_expr(c, test)?;
            c.code.emit(
                Op::CJump,
                Arg::tuple([
                    Arg::bool_flag(false),
                    Arg::bool_flag(false),
                    Arg::Label(else_label.clone()),
                ]),
            );
            lower_expr(c, body)?;
            c.code.emit(Op::Jump, Arg::Label(end_label.clone()));
            c.code.add_label(else_label)?;
            lower_expr(c, orelse)?;
            c.code.add_label(end_label)?;
            Ok(())
        }
    }
}

fn lower_aggregate(c: &mut Compiler, items: &[Expr], kind: MakeStructKind) -> Result<(), CompileError> {
    for item in items {
        lower_expr(c, item)?;
    }
    c.code.emit(
        Op::MakeStruct,
        Arg::tuple([Arg::Int(items.len() as i64), Arg::Int(kind as i64)]),
    );
    Ok(())
}

/// `and`/`or` short-circuit (spec.md §9 Open Question 1: `keep_value = true`
/// — the short-circuited operand survives the jump as the overall result).
/// Lowers the first operand, then for each remaining operand emits a
/// conditional jump to the exit label (taken when short-circuiting),
/// followed — on fallthrough — by lowering the next operand and combining
/// the two with the boolean `binop`, leaving one value on the stack either
/// way.
fn lower_boolop(c: &mut Compiler, op: BoolOp, values: &[Expr]) -> Result<(), CompileError> {
    let end = c.code.new_label("boolop_end");
    // `and` short-circuits on the first falsy operand; `or` on the first
    // truthy one.
    let jump_if_truth = matches!(op, BoolOp::Or);
    let binop_symbol = match op {
        BoolOp::And => "and",
        BoolOp::Or => "or",
    };

    let mut values = values.iter();
    let first = values
        .next()
        .ok_or_else(|| CompileError::structural("boolop with no operands"))?;
    lower_expr(c, first)?;

    for value in values {
        c.code.emit(
            Op::CJump,
            Arg::tuple([
                Arg::bool_flag(jump_if_truth),
                Arg::bool_flag(true),
                Arg::Label(end.clone()),
            ]),
        );
        lower_expr(c, value)?;
        let index = binop_index(binop_symbol)?;
        c.code.emit(Op::BinOp, Arg::Int(index));
    }
    c.code.add_label(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Code, CodeItem, CodeKind};

    fn compile_expr(expr: &Expr) -> Code {
        let mut compiler = Compiler::new(CodeKind::Module);
        lower_expr(&mut compiler, expr).unwrap();
        compiler.into_code()
    }

    #[test]
    fn two_operand_and_emits_cjump_then_operand_then_and_binop() {
        let code = compile_expr(&Expr::BoolOp {
            op: BoolOp::And,
            values: vec![
                Expr::Name("a".to_string()),
                Expr::Name("b".to_string()),
            ],
        });
        let items = code.items();
        let cjump_pos = items
            .iter()
            .position(|item| matches!(item, CodeItem::Instr(Op::CJump, _)))
            .expect("cjump must be emitted for the short-circuit test");
        let binop_pos = items
            .iter()
            .position(|item| matches!(item, CodeItem::Instr(Op::BinOp, _)))
            .expect("binop must combine the fallthrough operand");
        assert!(binop_pos > cjump_pos, "binop follows the lowered second operand");
        assert!(
            !items
                .iter()
                .any(|item| matches!(item, CodeItem::Instr(Op::Stack, _))),
            "boolop lowering never pops — the binop consumes both operands"
        );
    }

    #[test]
    fn three_operand_or_emits_two_cjumps_and_two_or_binops() {
        let code = compile_expr(&Expr::BoolOp {
            op: BoolOp::Or,
            values: vec![
                Expr::Name("a".to_string()),
                Expr::Name("b".to_string()),
                Expr::Name("c".to_string()),
            ],
        });
        let cjumps = code
            .items()
            .iter()
            .filter(|item| matches!(item, CodeItem::Instr(Op::CJump, _)))
            .count();
        let binops = code
            .items()
            .iter()
            .filter(|item| matches!(item, CodeItem::Instr(Op::BinOp, _)))
            .count();
        assert_eq!(cjumps, 2);
        assert_eq!(binops, 2);
    }
}
