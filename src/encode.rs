//! Component G — the instruction encoder (spec.md §4.G).
//!
//! Packs a linked, symbolic (opcode, argument) pair into one fixed 32-bit
//! little-endian word: low 8 bits opcode index, high 24 bits argument
//! payload. This module is invoked by the external PEX container writer
//! (`crate::container`); it has no knowledge of the envelope format.

use crate::code::{Arg, Op};
use crate::diagnostic::CompileError;
use crate::linker::{LinkedCode, LinkedInstr};

/// Maximum value representable in the 24-bit argument payload.
pub const MAX_PAYLOAD: u32 = 0x00FF_FFFF;

/// `binop`'s fixed operator list (spec.md §4.G), in table order.
pub const BINOPS: &[&str] = &[
    "+", "-", "*", "/", "//", "%", "**", "<<", ">>", "|", "^", "&", "@", "and", "or", "==", "!=",
    "<", "<=", ">", ">=", "is", "is_not", "in", "not_in",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameAction {
    Load = 0,
    Store = 1,
    Del = 2,
    /// spec.md §9 Open Question 4: the for-loop's `StopIteration` lookup
    /// needs a fourth `name` action; it fits the existing 2-bit field.
    LoadGlobal = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexAction {
    Get = 0,
    Set = 1,
    Del = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackOp {
    Pop = 0,
    Dup = 1,
    DupDown3 = 2,
    Swap2 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MakeStructKind {
    List = 0,
    Tuple = 1,
    Dict = 2,
    Set = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PseudoCall {
    Iter = 0,
    Next = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOpKind {
    Add = 0,
    Sub = 1,
    Not = 2,
    Invert = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnpackKind {
    Dict = 0,
    Iterable = 1,
}

/// Look up a binary/comparison/short-circuit operator's fixed index in
/// [`BINOPS`], for use as a `binop` instruction's symbolic argument.
pub fn binop_index(symbol: &str) -> Result<i64, CompileError> {
    BINOPS
        .iter()
        .position(|candidate| *candidate == symbol)
        .map(|index| index as i64)
        .ok_or_else(|| CompileError::encoding(format!("`{symbol}` is not a known binop symbol")))
}

fn require_payload(value: i64, what: &str) -> Result<u32, CompileError> {
    if value < 0 {
        return Err(CompileError::encoding(format!(
            "{what} argument is negative: {value}"
        )));
    }
    let value = value as u64;
    if value > MAX_PAYLOAD as u64 {
        return Err(CompileError::encoding(format!(
            "{what} argument {value} exceeds the 24-bit payload"
        )));
    }
    Ok(value as u32)
}

fn as_int(arg: &Arg, what: &str) -> Result<i64, CompileError> {
    match arg {
        Arg::Int(v) => Ok(*v),
        other => Err(CompileError::encoding(format!(
            "{what} expects an integer argument, got {other:?}"
        ))),
    }
}

fn as_tuple<'a>(arg: &'a Arg, what: &str) -> Result<&'a [Arg], CompileError> {
    match arg {
        Arg::Tuple(items) => Ok(items),
        other => Err(CompileError::encoding(format!(
            "{what} expects a tuple argument, got {other:?}"
        ))),
    }
}

/// Encode one linked instruction into its 4-byte little-endian word.
pub fn encode_instruction(instr: &LinkedInstr) -> Result<[u8; 4], CompileError> {
    let payload = encode_payload(instr.op, &instr.arg)?;
    let word = (payload << 8) | instr.op.index() as u32;
    Ok(word.to_le_bytes())
}

fn encode_payload(op: Op, arg: &Arg) -> Result<u32, CompileError> {
    match op {
        Op::Nop
        | Op::EndFinally
        | Op::EndTry
        | Op::InitFunction
        | Op::Raise
        | Op::Return
        | Op::GetException => Ok(0),

        Op::LoadConst => require_payload(as_int(arg, "load_const")?, "load_const"),

        Op::MakeClass => require_payload(as_int(arg, "make_class")?, "make_class"),

        Op::EagerUnpackList => {
            require_payload(as_int(arg, "eager_unpack_list")?, "eager_unpack_list")
        }

        Op::CallFunction => require_payload(as_int(arg, "call_function")?, "call_function"),

        Op::Jump | Op::Try | Op::Except | Op::ExceptAll => {
            require_payload(as_int(arg, "jump target")?, "jump target")
        }

        Op::Index => require_payload(as_int(arg, "index")?, "index"),

        Op::PseudoCall => require_payload(as_int(arg, "pseudo_call")?, "pseudo_call"),

        Op::Stack => require_payload(as_int(arg, "stack")?, "stack"),

        Op::UnOp => require_payload(as_int(arg, "unop")?, "unop"),

        Op::Unpack => require_payload(as_int(arg, "unpack")?, "unpack"),

        Op::BinOp => require_payload(as_int(arg, "binop")?, "binop"),

        Op::Attribute | Op::Name => {
            // Symbolic argument order is `(action, name_const_id)` — the
            // same order the linker's `rewrite_name_arg` produces.
            let items = as_tuple(arg, "attribute/name")?;
            let [action, name_const_id] = match items {
                [a, b] => [as_int(a, "action")?, as_int(b, "name const id")?],
                _ => {
                    return Err(CompileError::encoding(
                        "attribute/name argument must have exactly two elements",
                    ))
                }
            };
            let packed = (name_const_id << 2) | action;
            require_payload(packed, "attribute/name")
        }

        Op::MakeStruct => {
            let items = as_tuple(arg, "make_struct")?;
            let [count, kind] = match items {
                [a, b] => [as_int(a, "element count")?, as_int(b, "kind")?],
                _ => {
                    return Err(CompileError::encoding(
                        "make_struct argument must have exactly two elements",
                    ))
                }
            };
            let packed = (count << 2) | kind;
            require_payload(packed, "make_struct")
        }

        Op::CJump => {
            let items = as_tuple(arg, "cjump")?;
            let [jump_if_truth, keep_value, address] = match items {
                [a, b, c] => [
                    as_int(a, "jump_if_truth")?,
                    as_int(b, "keep_value")?,
                    as_int(c, "address")?,
                ],
                _ => {
                    return Err(CompileError::encoding(
                        "cjump argument must have exactly three elements",
                    ))
                }
            };
            let packed = (address << 2) | (keep_value << 1) | jump_if_truth;
            require_payload(packed, "cjump")
        }

        Op::Finally => {
            let items = as_tuple(arg, "finally")?;
            let [address, handling] = match items {
                [a, b] => [as_int(a, "address")?, as_int(b, "handling")?],
                _ => {
                    return Err(CompileError::encoding(
                        "finally argument must have exactly two elements",
                    ))
                }
            };
            let packed = (address << 1) | handling;
            require_payload(packed, "finally")
        }
    }
}

/// Encode every instruction of a linked code object, in order.
pub fn encode(linked: &LinkedCode) -> Result<Vec<u8>, CompileError> {
    let mut bytes = Vec::with_capacity(linked.instructions.len() * 4);
    for instr in &linked.instructions {
        bytes.extend_from_slice(&encode_instruction(instr)?);
    }
    Ok(bytes)
}
