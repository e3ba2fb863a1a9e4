//! IR construction error contracts.

/// Stable IR error categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilErrorKind {
    /// A scope was exited with no scope open.
    ScopeUnderflow,
    /// A node of the wrong kind was supplied where a specific kind is required.
    KindMismatch,
    /// Block assembly order or fill state was violated.
    BlockDiscipline,
    /// A variable, block, or instruction index is out of range.
    IndexOutOfRange,
}

/// IR construction error payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilError {
    /// Error category.
    pub kind: TilErrorKind,
    /// Human-readable error summary.
    pub message: String,
    /// Optional additional detail.
    pub detail: Option<String>,
}

impl TilError {
    /// Creates an IR construction error.
    pub fn new(kind: TilErrorKind, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail,
        }
    }

    /// Creates a `ScopeUnderflow` error.
    pub fn scope_underflow(message: impl Into<String>) -> Self {
        Self::new(TilErrorKind::ScopeUnderflow, message, None)
    }

    /// Creates a `KindMismatch` error.
    pub fn kind_mismatch(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(TilErrorKind::KindMismatch, message, Some(detail.into()))
    }

    /// Creates a `BlockDiscipline` error.
    pub fn block_discipline(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(TilErrorKind::BlockDiscipline, message, Some(detail.into()))
    }

    /// Creates an `IndexOutOfRange` error.
    pub fn index_out_of_range(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(TilErrorKind::IndexOutOfRange, message, Some(detail.into()))
    }
}
