//! Bit-packed bytecode serialization for a typed intermediate language.
//!
//! The [`til`] module defines the expression vocabulary: typed literals,
//! lexically scoped bindings, records and arrays, loads and stores, and
//! structured control-flow graphs with phi arguments and indexed back
//! references. The [`bytecode`] module is the binary codec: a
//! bit-granular buffered stream pair with variable-byte integers and
//! atom boundaries, a post-order serializing traversal, and a
//! stack-driven deserializing driver that rebuilds expressions through
//! the construction builder.
//!
//! ```
//! use tilbc::bytecode::{read_expr, write_expr};
//! use tilbc::til::{LiteralValue, SExpr};
//!
//! let root = SExpr::literal(LiteralValue::Bool(true));
//! let bytes = write_expr(&root).expect("serialize");
//! let back = read_expr(&bytes).expect("deserialize");
//! assert_eq!(back, root);
//! ```

pub mod bytecode;
pub mod til;
