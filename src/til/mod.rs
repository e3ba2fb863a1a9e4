//! Typed intermediate language (TIL) vocabulary the bytecode codec
//! serializes: expression nodes, base types, operator enumerations,
//! annotations, and construction builders.

pub mod builder;
pub mod error;
pub mod expr;
pub mod ids;
pub mod ops;
pub mod types;

pub use builder::{Builder, CfgBuilder};
pub use error::{TilError, TilErrorKind};
pub use expr::{
    Alloc, Annotation, Apply, Array, ArrayAdd, ArrayIndex, BasicBlock, BinaryOp, Branch, Call,
    Cast, Cfg, Code, ExprKind, Field, Function, Goto, Identifier, IfThenElse, Let, Literal,
    LiteralValue, Load, Phi, Project, Record, Return, SExpr, ScalarType, Slot, Store, Switch,
    SwitchCase, UnaryOp, VarDecl, Variable,
};
pub use ids::{BlockId, InstrId, VarIndex};
pub use ops::{
    AllocKind, AnnKind, ApplyKind, BinaryOpcode, CallingConvention, CastOpcode, OpCode,
    UnaryOpcode, VariableKind,
};
pub use types::{BaseKind, BaseType, SizeClass};
