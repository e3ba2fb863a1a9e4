//! Canonical bit widths for enumerated stream fields.
//!
//! Both codec directions consult the same table, so widths are never
//! transmitted. Changing any value is a format break.

/// Stream opcode (marker or expression).
pub const OPCODE_BITS: u32 = 6;

/// Annotation kind tag.
pub const ANN_KIND_BITS: u32 = 8;

/// Unary, binary, and cast operator flavors.
pub const OPERATOR_BITS: u32 = 6;

/// Variable declaration kind.
pub const VARIABLE_KIND_BITS: u32 = 2;

/// Calling convention.
pub const CALLING_CONVENTION_BITS: u32 = 4;

/// Application kind.
pub const APPLY_KIND_BITS: u32 = 2;

/// Allocation kind.
pub const ALLOC_KIND_BITS: u32 = 2;

/// Boolean value.
pub const BOOL_BITS: u32 = 1;
