//! Codec error contracts.

use crate::til::TilError;

/// Stable codec error categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytecodeErrorKind {
    /// The byte sink or source failed.
    Io,
    /// The source ended before the requested bits.
    UnexpectedEof,
    /// A variable-byte integer exceeded its permitted group count.
    VbrOverrun,
    /// A single atom exceeded the maximum atom size.
    AtomOverflow,
    /// An opcode outside the defined code space was read.
    UnknownOpcode,
    /// The stream violated the serialization protocol.
    MalformedStream,
    /// A variable, block, or instruction index was out of range.
    SymbolOutOfRange,
    /// The expression cannot be represented in the stream format.
    Unserializable,
}

/// Codec error payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeError {
    /// Error category.
    pub kind: BytecodeErrorKind,
    /// Human-readable error summary.
    pub message: String,
    /// Optional additional detail.
    pub detail: Option<String>,
}

impl BytecodeError {
    /// Creates a codec error.
    pub fn new(
        kind: BytecodeErrorKind,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail,
        }
    }

    /// Creates an `UnexpectedEof` error.
    pub fn unexpected_eof(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            BytecodeErrorKind::UnexpectedEof,
            message,
            Some(detail.into()),
        )
    }

    /// Creates a `VbrOverrun` error.
    pub fn vbr_overrun(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(BytecodeErrorKind::VbrOverrun, message, Some(detail.into()))
    }

    /// Creates an `AtomOverflow` error.
    pub fn atom_overflow(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(BytecodeErrorKind::AtomOverflow, message, Some(detail.into()))
    }

    /// Creates an `UnknownOpcode` error.
    pub fn unknown_opcode(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            BytecodeErrorKind::UnknownOpcode,
            message,
            Some(detail.into()),
        )
    }

    /// Creates a `MalformedStream` error.
    pub fn malformed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            BytecodeErrorKind::MalformedStream,
            message,
            Some(detail.into()),
        )
    }

    /// Creates a `SymbolOutOfRange` error.
    pub fn symbol_out_of_range(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            BytecodeErrorKind::SymbolOutOfRange,
            message,
            Some(detail.into()),
        )
    }

    /// Creates an `Unserializable` error.
    pub fn unserializable(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            BytecodeErrorKind::Unserializable,
            message,
            Some(detail.into()),
        )
    }
}

impl From<std::io::Error> for BytecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::new(
            BytecodeErrorKind::Io,
            "byte sink or source failure",
            Some(err.to_string()),
        )
    }
}

impl From<TilError> for BytecodeError {
    fn from(err: TilError) -> Self {
        let TilError {
            kind,
            message,
            detail,
        } = err;
        Self::new(
            BytecodeErrorKind::MalformedStream,
            message,
            Some(detail.unwrap_or_else(|| format!("{kind:?}"))),
        )
    }
}
