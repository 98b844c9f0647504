//! Compile errors. Modeled on `trident-lang`'s `Diagnostic` (a plain struct,
//! hand-rolled `Display`, no `thiserror`) but without a `Span` field — this
//! core never sees source positions (see spec.md §1 Non-goals).

use std::fmt;

/// The three fatal error kinds from spec.md §7. Every compile call aborts
/// on the first one raised; the core never recovers or emits partial
/// bytecode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// A node whose variant is outside the accepted subset, or an accepted
    /// variant used in a context it does not support.
    Unsupported {
        construct: String,
        context: Option<String>,
    },
    /// `break`/`continue` outside a loop; duplicate label definition;
    /// dangling label reference at link time.
    Structural(String),
    /// An argument exceeds the 24-bit encoder payload, or the constant pool
    /// exceeds representable indices.
    Encoding(String),
}

impl CompileError {
    pub fn unsupported(construct: impl Into<String>) -> Self {
        CompileError::Unsupported {
            construct: construct.into(),
            context: None,
        }
    }

    pub fn unsupported_in(construct: impl Into<String>, context: impl Into<String>) -> Self {
        CompileError::Unsupported {
            construct: construct.into(),
            context: Some(context.into()),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        CompileError::Structural(message.into())
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        CompileError::Encoding(message.into())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Unsupported { construct, context } => match context {
                Some(ctx) => write!(f, "unsupported construct `{construct}` in {ctx} context"),
                None => write!(f, "unsupported construct `{construct}`"),
            },
            CompileError::Structural(message) => write!(f, "structural error: {message}"),
            CompileError::Encoding(message) => write!(f, "encoding error: {message}"),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;
