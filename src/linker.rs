//! Component F — the linker (spec.md §4.F).
//!
//! Two passes over one symbolic [`Code`]: pass 1 assigns addresses to
//! labels by walking the instruction list (mirroring the `address`
//! counter loop in `ir/tir/linker.rs`'s address-assignment style, adapted
//! to per-instruction rather than per-line granularity); pass 2 walks each
//! instruction's argument recursively (spec.md Design Notes: "the linker's
//! pass-2 walk is a straightforward structural map"), resolving labels to
//! addresses and interning `name` identifiers into the pool.

use std::collections::HashMap;

use crate::code::{Arg, Code, CodeItem, CodeKind, Op};
use crate::diagnostic::CompileError;
use crate::label::Label;
use crate::pool::Constant;

/// One instruction with all labels resolved to integer addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkedInstr {
    pub op: Op,
    pub arg: Arg,
}

/// The immutable result of linking one symbolic `Code`. Structurally
/// hashable (spec.md §3 "Linked Code is itself hashable") so it can
/// re-enter interning when embedded as a constant in an outer pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkedCode {
    pub kind: CodeKind,
    pub instructions: Vec<LinkedInstr>,
    pub pool: Vec<Constant>,
}

impl LinkedCode {
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Content-addressed fingerprint, used by the CLI pretty-printer and by
    /// `container::build` for reproducibility diagnostics. Grounded in
    /// `trident-lang`'s use of `blake3` for content hashing (`src/hash.rs`).
    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.kind as u8]);
        for instr in &self.instructions {
            hasher.update(&[instr.op.index()]);
            hash_arg(&mut hasher, &instr.arg);
        }
        hasher.finalize()
    }
}

/// Human-readable disassembly, one resolved instruction per line:
/// `<address> <mnemonic> <arg>`. Used by the `pexc --dump` flag and exercised
/// by snapshot tests so the instruction stream a reader would actually
/// inspect is checked, not just its length.
pub fn disassemble(linked: &LinkedCode) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for (addr, instr) in linked.instructions.iter().enumerate() {
        match &instr.arg {
            Arg::None => {
                let _ = writeln!(out, "{addr:04} {}", instr.op.mnemonic());
            }
            arg => {
                let _ = writeln!(out, "{addr:04} {} {arg}", instr.op.mnemonic());
            }
        }
    }
    out
}

fn hash_arg(hasher: &mut blake3::Hasher, arg: &Arg) {
    match arg {
        Arg::None => {
            hasher.update(b"N");
        }
        Arg::Int(v) => {
            hasher.update(b"I");
            hasher.update(&v.to_le_bytes());
        }
        Arg::Str(s) => {
            hasher.update(b"S");
            hasher.update(s.as_bytes());
        }
        Arg::Label(l) => {
            hasher.update(b"L");
            hasher.update(&l.id().to_le_bytes());
        }
        Arg::Tuple(items) => {
            hasher.update(b"T");
            for item in items {
                hash_arg(hasher, item);
            }
        }
    }
}

/// Link a finished symbolic `Code` into an immutable [`LinkedCode`].
pub fn link(code: Code) -> Result<LinkedCode, CompileError> {
    let (kind, pool, items) = code.into_parts();
    let mut values: Vec<Constant> = pool.into_values();
    let mut index: HashMap<Constant, u32> = values
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i as u32))
        .collect();

    // Pass 1 — address assignment. A `DEFINE_LABEL` records an address but
    // is not emitted and does not advance the counter; anything else is
    // emitted and advances the counter by exactly one.
    let mut addresses: HashMap<Label, i64> = HashMap::new();
    let mut emitted: Vec<(Op, Arg)> = Vec::with_capacity(items.len());
    let mut address: i64 = 0;
    for item in items {
        match item {
            CodeItem::DefineLabel(label) => {
                if addresses.insert(label.clone(), address).is_some() {
                    return Err(CompileError::structural(format!(
                        "label `{label}` defined more than once"
                    )));
                }
            }
            CodeItem::Instr(op, arg) => {
                emitted.push((op, arg));
                address += 1;
            }
        }
    }

    // Pass 2 — argument rewriting: resolve labels to addresses, then intern
    // `name` identifiers into the pool.
    let mut instructions = Vec::with_capacity(emitted.len());
    for (op, arg) in emitted {
        let resolved = resolve_arg(arg, &addresses)?;
        let rewritten = if op == Op::Name {
            rewrite_name_arg(resolved, &mut values, &mut index)?
        } else {
            resolved
        };
        instructions.push(LinkedInstr { op, arg: rewritten });
    }

    Ok(LinkedCode {
        kind,
        instructions,
        pool: values,
    })
}

fn resolve_arg(arg: Arg, addresses: &HashMap<Label, i64>) -> Result<Arg, CompileError> {
    match arg {
        Arg::Label(label) => {
            let address = addresses.get(&label).ok_or_else(|| {
                CompileError::structural(format!(
                    "label `{label}` referenced but never defined"
                ))
            })?;
            Ok(Arg::Int(*address))
        }
        Arg::Tuple(items) => {
            let resolved: Result<Vec<Arg>, CompileError> =
                items.into_iter().map(|item| resolve_arg(item, addresses)).collect();
            Ok(Arg::Tuple(resolved?))
        }
        other => Ok(other),
    }
}

/// `name (action, identifier_string)` -> `name (action, const_id)`.
fn rewrite_name_arg(
    arg: Arg,
    pool: &mut Vec<Constant>,
    index: &mut HashMap<Constant, u32>,
) -> Result<Arg, CompileError> {
    let Arg::Tuple(items) = arg else {
        return Err(CompileError::structural(
            "`name` instruction argument must be a (action, identifier) tuple",
        ));
    };
    let [action, identifier] = <[Arg; 2]>::try_from(items).map_err(|_| {
        CompileError::structural("`name` instruction argument must have exactly two elements")
    })?;
    let Arg::Str(identifier) = identifier else {
        return Err(CompileError::structural(
            "`name` instruction identifier must be a string",
        ));
    };
    let const_id = intern_name(pool, index, identifier)?;
    Ok(Arg::Tuple(vec![action, Arg::Int(const_id as i64)]))
}

/// Dedups by the same `(type-tag, value)` identity `ConstantPool::intern`
/// uses, via a side index kept in sync with `pool` — an O(1) lookup instead
/// of a linear scan over every previously interned constant.
fn intern_name(
    pool: &mut Vec<Constant>,
    index: &mut HashMap<Constant, u32>,
    name: String,
) -> Result<u32, CompileError> {
    let key = Constant::Str(name);
    if let Some(&id) = index.get(&key) {
        return Ok(id);
    }
    let id = u32::try_from(pool.len())
        .map_err(|_| CompileError::encoding("constant pool exceeds representable indices"))?;
    index.insert(key.clone(), id);
    pool.push(key);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Arg, Code, CodeKind, Op};

    #[test]
    fn empty_module_links_to_zero_instructions() {
        let code = Code::new(CodeKind::Module);
        let linked = link(code).unwrap();
        assert_eq!(linked.instruction_count(), 0);
        assert!(linked.pool.is_empty());
    }

    #[test]
    fn every_define_label_is_removed_and_jump_resolves_to_its_address() {
        let mut code = Code::new(CodeKind::Module);
        let target = code.new_label("target");
        code.emit(Op::Jump, Arg::Label(target.clone()));
        code.emit_none(Op::Nop);
        code.add_label(target).unwrap();
        code.emit_none(Op::Nop);

        let linked = link(code).unwrap();
        assert_eq!(linked.instructions.len(), 3);
        assert_eq!(linked.instructions[0].arg, Arg::Int(2));
        for instr in &linked.instructions {
            assert!(!matches!(instr.arg, Arg::Label(_)));
        }
    }

    #[test]
    fn dangling_label_reference_is_structural_error() {
        let mut code = Code::new(CodeKind::Module);
        let dangling = code.new_label("nope");
        code.emit(Op::Jump, Arg::Label(dangling));
        let err = link(code).unwrap_err();
        assert!(matches!(err, CompileError::Structural(_)));
    }

    #[test]
    fn name_instruction_interns_identifier_and_rewrites_to_const_id() {
        let mut code = Code::new(CodeKind::Module);
        code.emit(
            Op::Name,
            Arg::tuple([Arg::Int(0), Arg::Str("x".to_string())]),
        );
        code.emit(
            Op::Name,
            Arg::tuple([Arg::Int(1), Arg::Str("x".to_string())]),
        );
        let linked = link(code).unwrap();
        assert_eq!(linked.pool.len(), 1);
        assert_eq!(
            linked.instructions[0].arg,
            Arg::tuple([Arg::Int(0), Arg::Int(0)])
        );
        assert_eq!(
            linked.instructions[1].arg,
            Arg::tuple([Arg::Int(1), Arg::Int(0)])
        );
    }

    #[test]
    fn disassembly_of_a_single_chained_comparison_matches_the_accumulator_protocol() {
        use crate::ast::{CmpOp, Expr, Module, Number, Stmt};
        use crate::lower::compile_module;

        let module = Module {
            body: vec![Stmt::Expr(Expr::Compare {
                left: Box::new(Expr::Num(Number::Int(1))),
                ops: vec![CmpOp::Lt],
                comparators: vec![Expr::Num(Number::Int(2))],
            })],
        };
        let linked = link(compile_module(&module).unwrap()).unwrap();
        let disasm = disassemble(&linked);
        insta::assert_snapshot!(disasm, @r###"
        0000 load_const 0
        0001 load_const 1
        0002 load_const 2
        0003 stack 2
        0004 binop 17
        0005 binop 13
        0006 cjump (0, 1, 7)
        0007 stack 3
        0008 stack 0
        0009 stack 0
        "###);
    }

    #[test]
    fn labels_inside_nested_tuple_arguments_resolve() {
        let mut code = Code::new(CodeKind::Module);
        let label = code.new_label("exit");
        code.emit(
            Op::CJump,
            Arg::tuple([
                Arg::bool_flag(false),
                Arg::bool_flag(true),
                Arg::Label(label.clone()),
            ]),
        );
        code.add_label(label).unwrap();
        let linked = link(code).unwrap();
        assert_eq!(
            linked.instructions[0].arg,
            Arg::tuple([Arg::Int(0), Arg::Int(1), Arg::Int(1)])
        );
    }
}
