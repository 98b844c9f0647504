//! The accepted AST subset this core consumes.
//!
//! Produced by an external parser (out of scope here). No source positions
//! are carried — position retention is an explicit non-goal, and `serde`
//! derives let a demo front-end (see `src/main.rs`) hand the core a
//! JSON-serialized tree without a real parser.

use serde::{Deserialize, Serialize};

/// A compilation unit: the top-level statement list of one source file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Pass,
    Break,
    Continue,
    Delete(Vec<Expr>),
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Return(Option<Expr>),
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// `None` matches any exception (`except:`).
    pub ty: Option<Expr>,
    /// `except E as name:`.
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Positional parameter names, declaration order.
    pub params: Vec<String>,
    /// Default values for the trailing `defaults.len()` positional params.
    pub defaults: Vec<Expr>,
    pub kwonly: Vec<KwOnlyParam>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KwOnlyParam {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// Positional base-class expressions. Metaclass / keyword bases are not
    /// part of the accepted subset.
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    Num(Number),
    Str(String),
    Bytes(Vec<u8>),
    NamedConstant(NamedConstant),
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    /// Subscript with a single index. Slices / extended slices are not part
    /// of the accepted subset.
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    /// `None` key marks a `**mapping` splat entry.
    Dict(Vec<(Option<Expr>, Expr)>),
    /// `*x` — valid as a call argument (load context) or an assignment /
    /// delete / for-target element (store context, inner must be `Name`).
    Starred(Box<Expr>),
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    /// Positional arguments only; `*args` is expressed via `Expr::Starred`.
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedConstant {
    True,
    False,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    UAdd,
    USub,
    Not,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    MatMult,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::MatMult => "@",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is_not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not_in",
        }
    }
}
