//! The PEX container envelope writer. **Ambient demo code**, not part of
//! the lowering/linking core (spec.md §1 scope boundary): grounded
//! byte-for-byte in `examples/original_source/pex-compile/pex_compile/build_pex.py`.
//!
//! Layout: `b"PEX"` magic, one type byte, a 4-byte big-endian format
//! version, an 8-byte big-endian section count, then per section an 8-byte
//! big-endian length followed by a 4-byte `code` tag and the encoded
//! instruction bytes for one linked code object.

use crate::diagnostic::CompileError;
use crate::encode::encode;
use crate::linker::LinkedCode;

pub const MAGIC: &[u8; 3] = b"PEX";
pub const CONTAINER_TYPE: u8 = 1;
/// Fixed at `0x00000000` per spec.md §6 — there is only one format version.
pub const FORMAT_VERSION: u32 = 0x0000_0000;
const SECTION_TAG: &[u8; 4] = b"code";

/// Build one envelope containing one `code` section per linked module,
/// in order.
pub fn build(modules: &[LinkedCode]) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(CONTAINER_TYPE);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&(modules.len() as u64).to_be_bytes());

    for module in modules {
        let instructions = encode(module)?;
        let mut section = Vec::with_capacity(SECTION_TAG.len() + instructions.len());
        section.extend_from_slice(SECTION_TAG);
        section.extend_from_slice(&instructions);
        out.extend_from_slice(&(section.len() as u64).to_be_bytes());
        out.extend_from_slice(&section);
    }

    Ok(out)
}
