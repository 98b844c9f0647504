//! Chained comparison lowering (spec.md §4.E "chained comparisons").
//!
//! `a < b < c` must evaluate `b` exactly once. The accumulator-on-stack
//! protocol, exactly as spec.md §4.E lays it out: push a `True` accumulator,
//! lower `v0`, then for each `(opk, vk)` lower `vk`, `dupdown3` it under the
//! pending `lhs`/accumulator pair, `binop opk`, fold the result into the
//! accumulator with `binop and`, and `cjump` out to `exit_label` the moment
//! the accumulator goes false (spec.md §9 Open Question 1: `keep_value =
//! true` — the tested pair survives the jump for the trailing cleanup).
//! Between comparisons (but not after the last) `swap2` promotes `rhs` to be
//! the next comparison's `lhs`. At `exit_label`, `swap2; pop` discards
//! whichever operand is left sitting under the accumulator.

use crate::ast::{CmpOp, Expr};
use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::encode::{binop_index, StackOp};
use crate::pool::Constant;

use super::compiler::Compiler;
use super::expr::lower_expr;

pub fn lower_compare(
    c: &mut Compiler,
    left: &Expr,
    ops: &[CmpOp],
    comparators: &[Expr],
) -> Result<(), CompileError> {
    c.code.add_const(Constant::Bool(true))?;
    lower_expr(c, left)?;

    let exit_label = c.code.new_label("compare_exit");
    let last = ops.len().saturating_sub(1);
    let and_index = binop_index("and")?;

    for (i, (op, comparator)) in ops.iter().zip(comparators).enumerate() {
        lower_expr(c, comparator)?;
        c.code
            .emit(Op::Stack, Arg::Int(StackOp::DupDown3 as i64));
        c.code.emit(Op::BinOp, Arg::Int(binop_index(op.as_str())?));
        c.code.emit(Op::BinOp, Arg::Int(and_index));
        c.code.emit(
            Op::CJump,
            Arg::tuple([
                Arg::bool_flag(false),
                Arg::bool_flag(true),
                Arg::Label(exit_label.clone()),
            ]),
        );
        if i < last {
            c.code.emit(Op::Stack, Arg::Int(StackOp::Swap2 as i64));
        }
    }

    c.code.add_label(exit_label)?;
    c.code.emit(Op::Stack, Arg::Int(StackOp::Swap2 as i64));
    c.code.emit(Op::Stack, Arg::Int(StackOp::Pop as i64));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Number;
    use crate::code::{CodeItem, CodeKind};

    #[test]
    fn single_comparison_has_no_intermediate_swap() {
        let mut c = Compiler::new(CodeKind::Module);
        lower_compare(
            &mut c,
            &Expr::Num(Number::Int(1)),
            &[CmpOp::Lt],
            &[Expr::Num(Number::Int(2))],
        )
        .unwrap();
        let stack_ops: Vec<_> = c
            .code
            .items()
            .iter()
            .filter_map(|item| match item {
                CodeItem::Instr(Op::Stack, Arg::Int(v)) => Some(*v),
                _ => None,
            })
            .collect();
        // dupdown3 before the comparison, swap2+pop at exit — no
        // intermediate swap2 since there's only one comparison.
        assert_eq!(
            stack_ops,
            vec![
                StackOp::DupDown3 as i64,
                StackOp::Swap2 as i64,
                StackOp::Pop as i64
            ]
        );
    }

    #[test]
    fn chained_compare_matches_the_spec_scenario_sequence() {
        let mut c = Compiler::new(CodeKind::Module);
        lower_compare(
            &mut c,
            &Expr::Num(Number::Int(1)),
            &[CmpOp::Lt, CmpOp::Lt],
            &[Expr::Num(Number::Int(2)), Expr::Num(Number::Int(3))],
        )
        .unwrap();
        let items = c.code.items();
        // load_const(True), load_const(1), load_const(2), dupdown3, binop(<),
        // binop(and), cjump, swap2, load_const(3), dupdown3, binop(<),
        // binop(and), cjump, define_label(exit), swap2, pop
        assert_eq!(items.len(), 16);
        assert!(matches!(items[0], CodeItem::Instr(Op::LoadConst, Arg::Int(0))));
        let binop_count = items
            .iter()
            .filter(|i| matches!(i, CodeItem::Instr(Op::BinOp, _)))
            .count();
        assert_eq!(binop_count, 4, "two `<` plus two `and` folds");
        let cjump_count = items
            .iter()
            .filter(|i| matches!(i, CodeItem::Instr(Op::CJump, _)))
            .count();
        assert_eq!(cjump_count, 2);
    }
}
