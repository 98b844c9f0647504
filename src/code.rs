//! Component C — the code builder (spec.md §4, "Code (symbolic)" in §3).
//!
//! A `Code` accumulates an ordered instruction stream against one
//! [`ConstantPool`] and one [`LabelAllocator`]; it is the thing `lower`
//! writes into and `linker` reads from.

use crate::diagnostic::CompileError;
use crate::label::{Label, LabelAllocator};
use crate::pool::{Constant, ConstantPool};

/// The closed 26-opcode table from spec.md §4.G, in the fixed order the
/// encoder assigns indices from. `DEFINE_LABEL` is deliberately *not* a
/// variant here — it is a pseudo-instruction, modeled by [`CodeItem`]
/// instead, so this enum is exactly the encoder's closed table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Nop = 0,
    Attribute = 1,
    GetException = 2,
    Index = 3,
    LoadConst = 4,
    Name = 5,
    EagerUnpackList = 6,
    MakeStruct = 7,
    Stack = 8,
    Unpack = 9,
    BinOp = 10,
    CallFunction = 11,
    PseudoCall = 12,
    UnOp = 13,
    CJump = 14,
    EndFinally = 15,
    EndTry = 16,
    Except = 17,
    ExceptAll = 18,
    Finally = 19,
    Jump = 20,
    Raise = 21,
    Return = 22,
    Try = 23,
    InitFunction = 24,
    MakeClass = 25,
}

impl Op {
    pub const COUNT: usize = 26;

    pub fn index(self) -> u8 {
        self as u8
    }

    /// The opcode's symbolic name, exactly as spec.md §4.G lists it. Used by
    /// the disassembly pretty-printer (`linker::disassemble`), not by
    /// encoding itself.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Nop => "nop",
            Op::Attribute => "attribute",
            Op::GetException => "get_exception",
            Op::Index => "index",
            Op::LoadConst => "load_const",
            Op::Name => "name",
            Op::EagerUnpackList => "eager_unpack_list",
            Op::MakeStruct => "make_struct",
            Op::Stack => "stack",
            Op::Unpack => "unpack",
            Op::BinOp => "binop",
            Op::CallFunction => "call_function",
            Op::PseudoCall => "pseudo_call",
            Op::UnOp => "unop",
            Op::CJump => "cjump",
            Op::EndFinally => "end_finally",
            Op::EndTry => "end_try",
            Op::Except => "except",
            Op::ExceptAll => "except_all",
            Op::Finally => "finally",
            Op::Jump => "jump",
            Op::Raise => "raise",
            Op::Return => "return",
            Op::Try => "try",
            Op::InitFunction => "init_function",
            Op::MakeClass => "make_class",
        }
    }
}

/// An instruction argument: none, a scalar, a label, or an arbitrarily
/// nested flat tuple of the above (spec.md Design Notes: "Model arguments
/// as a small recursive sum").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arg {
    None,
    Int(i64),
    Str(String),
    Label(Label),
    Tuple(Vec<Arg>),
}

impl Arg {
    pub fn tuple(items: impl IntoIterator<Item = Arg>) -> Arg {
        Arg::Tuple(items.into_iter().collect())
    }

    pub fn bool_flag(value: bool) -> Arg {
        Arg::Int(value as i64)
    }
}

impl std::fmt::Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::None => Ok(()),
            Arg::Int(v) => write!(f, "{v}"),
            Arg::Str(s) => write!(f, "{s:?}"),
            Arg::Label(l) => write!(f, "{l}"),
            Arg::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One emitted symbolic instruction, or a label definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodeItem {
    Instr(Op, Arg),
    /// The `DEFINE_LABEL` pseudo-instruction: occupies no runtime address.
    DefineLabel(Label),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Module,
    Function,
    Class,
}

/// The in-progress build product for one function/class/module body.
#[derive(Debug)]
pub struct Code {
    pub kind: CodeKind,
    pool: ConstantPool,
    items: Vec<CodeItem>,
    labels: LabelAllocator,
    defined: std::collections::HashSet<Label>,
}

impl Code {
    pub fn new(kind: CodeKind) -> Self {
        Self {
            kind,
            pool: ConstantPool::new(),
            items: Vec::new(),
            labels: LabelAllocator::new(),
            defined: std::collections::HashSet::new(),
        }
    }

    /// Component B: mint a fresh label scoped to this code object.
    pub fn new_label(&mut self, comment: &str) -> Label {
        self.labels.new_label(Some(comment))
    }

    /// Append a `DEFINE_LABEL` pseudo-instruction. Defining the same label
    /// twice is a structural compile error (spec.md §4.B).
    pub fn add_label(&mut self, label: Label) -> Result<(), CompileError> {
        if !self.defined.insert(label.clone()) {
            return Err(CompileError::structural(format!(
                "label `{label}` defined more than once"
            )));
        }
        self.items.push(CodeItem::DefineLabel(label));
        Ok(())
    }

    /// Emit a plain instruction.
    pub fn emit(&mut self, op: Op, arg: Arg) {
        self.items.push(CodeItem::Instr(op, arg));
    }

    pub fn emit_none(&mut self, op: Op) {
        self.emit(op, Arg::None);
    }

    /// `add_const` from spec.md §4.A: intern `value` and emit `load_const id`.
    pub fn add_const(&mut self, value: Constant) -> Result<(), CompileError> {
        let id = self.pool.intern(value)?;
        self.emit(Op::LoadConst, Arg::Int(id as i64));
        Ok(())
    }

    /// Intern `value` without emitting an instruction (used for attribute
    /// name constants, which are embedded as part of another opcode's
    /// argument rather than via `load_const`).
    pub fn intern(&mut self, value: Constant) -> Result<u32, CompileError> {
        self.pool.intern(value)
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn items(&self) -> &[CodeItem] {
        &self.items
    }

    pub fn into_parts(self) -> (CodeKind, ConstantPool, Vec<CodeItem>) {
        (self.kind, self.pool, self.items)
    }
}
