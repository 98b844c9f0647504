//! Component E — AST lowering (spec.md §4.E).
//!
//! One [`compiler::Compiler`] per `Code` (module, function, or class body),
//! dispatching on `ast::Stmt`/`ast::Expr` via exhaustive `match`. Submodule
//! split mirrors the prose groupings in spec.md §4.E.

mod compare;
mod compiler;
mod expr;
mod funcdef;
mod loops;
mod stmt;
mod tryexcept;

pub use compiler::Compiler;

use crate::ast::Module;
use crate::code::{Code, CodeKind};
use crate::diagnostic::CompileError;

/// Lower a whole module's statement list into a single symbolic `Code`.
pub fn compile_module(module: &Module) -> Result<Code, CompileError> {
    let mut compiler = Compiler::new(CodeKind::Module);
    compiler.lower_block(&module.body)?;
    Ok(compiler.into_code())
}

pub use funcdef::{compile_class, compile_function};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, BoolOp, CmpOp, Expr, NamedConstant, Number, Stmt};
    use crate::code::{CodeItem, Op};
    use crate::linker::link;

    #[test]
    fn empty_module_compiles_and_links_to_nothing() {
        let module = Module { body: vec![] };
        let code = compile_module(&module).unwrap();
        let linked = link(code).unwrap();
        assert_eq!(linked.instruction_count(), 0);
    }

    #[test]
    fn expression_statement_discards_its_value() {
        let module = Module {
            body: vec![Stmt::Expr(Expr::Num(Number::Int(1)))],
        };
        let code = compile_module(&module).unwrap();
        let pops = code
            .items()
            .iter()
            .filter(|item| matches!(item, CodeItem::Instr(Op::Stack, _)))
            .count();
        assert_eq!(pops, 1);
    }

    #[test]
    fn chained_compare_one_lt_two_lt_three_links_without_error() {
        let module = Module {
            body: vec![Stmt::Expr(Expr::Compare {
                left: Box::new(Expr::Num(Number::Int(1))),
                ops: vec![CmpOp::Lt, CmpOp::Lt],
                comparators: vec![Expr::Num(Number::Int(2)), Expr::Num(Number::Int(3))],
            })],
        };
        let code = compile_module(&module).unwrap();
        let linked = link(code).unwrap();
        assert!(linked.instruction_count() > 0);
    }

    #[test]
    fn while_with_break_links_cleanly() {
        let module = Module {
            body: vec![Stmt::While {
                test: Expr::NamedConstant(NamedConstant::True),
                body: vec![Stmt::Break],
                orelse: vec![],
            }],
        };
        let code = compile_module(&module).unwrap();
        link(code).unwrap();
    }

    #[test]
    fn break_outside_loop_is_structural_error() {
        let module = Module {
            body: vec![Stmt::Break],
        };
        let err = compile_module(&module).unwrap_err();
        assert!(matches!(err, CompileError::Structural(_)));
    }

    #[test]
    fn bool_op_and_or_link_cleanly() {
        let module = Module {
            body: vec![Stmt::Expr(Expr::BoolOp {
                op: BoolOp::And,
                values: vec![
                    Expr::NamedConstant(NamedConstant::True),
                    Expr::NamedConstant(NamedConstant::False),
                ],
            })],
        };
        let code = compile_module(&module).unwrap();
        assert!(
            code.items()
                .iter()
                .any(|item| matches!(item, CodeItem::Instr(Op::BinOp, _))),
            "a short-circuit `and`/`or` must combine fallthrough operands with `binop`"
        );
        link(code).unwrap();
    }

    #[test]
    fn arithmetic_binop_emits_binop_instruction() {
        let module = Module {
            body: vec![Stmt::Expr(Expr::BinOp {
                op: BinOp::Add,
                left: Box::new(Expr::Num(Number::Int(1))),
                right: Box::new(Expr::Num(Number::Int(2))),
            })],
        };
        let code = compile_module(&module).unwrap();
        assert!(code
            .items()
            .iter()
            .any(|item| matches!(item, CodeItem::Instr(Op::BinOp, _))));
    }
}
