//! Typed expression nodes and annotations.

use crate::til::ids::{BlockId, InstrId, VarIndex};
use crate::til::ops::{
    AllocKind, AnnKind, ApplyKind, BinaryOpcode, CallingConvention, CastOpcode, OpCode,
    UnaryOpcode, VariableKind,
};
use crate::til::types::{BaseKind, BaseType, SizeClass};

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Value payload of a literal, one variant per base type.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Boolean.
    Bool(bool),
    /// 8-bit unsigned integer.
    U8(u8),
    /// 16-bit unsigned integer.
    U16(u16),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// 8-bit signed integer.
    I8(i8),
    /// 16-bit signed integer.
    I16(i16),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Byte string.
    Str(String),
    /// Host pointer address. Only 0 can be serialized.
    Ptr(usize),
}

impl LiteralValue {
    /// Base type implied by the payload variant.
    pub fn base_type(&self) -> BaseType {
        match self {
            LiteralValue::Bool(_) => BaseType::new(BaseKind::Bool, SizeClass::S8),
            LiteralValue::U8(_) => BaseType::new(BaseKind::UInt, SizeClass::S8),
            LiteralValue::U16(_) => BaseType::new(BaseKind::UInt, SizeClass::S16),
            LiteralValue::U32(_) => BaseType::new(BaseKind::UInt, SizeClass::S32),
            LiteralValue::U64(_) => BaseType::new(BaseKind::UInt, SizeClass::S64),
            LiteralValue::I8(_) => BaseType::new(BaseKind::Int, SizeClass::S8),
            LiteralValue::I16(_) => BaseType::new(BaseKind::Int, SizeClass::S16),
            LiteralValue::I32(_) => BaseType::new(BaseKind::Int, SizeClass::S32),
            LiteralValue::I64(_) => BaseType::new(BaseKind::Int, SizeClass::S64),
            LiteralValue::F32(_) => BaseType::new(BaseKind::Float, SizeClass::S32),
            LiteralValue::F64(_) => BaseType::new(BaseKind::Float, SizeClass::S64),
            LiteralValue::Str(_) => BaseType::new(BaseKind::String, SizeClass::S0),
            LiteralValue::Ptr(_) => BaseType::new(BaseKind::Pointer, SizeClass::S64),
        }
    }
}

/// Literal expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    /// Value payload.
    pub value: LiteralValue,
}

// ---------------------------------------------------------------------------
// Scoped terms
// ---------------------------------------------------------------------------

/// Reference to a lexically bound variable by declaration-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    /// 1-based index into the enclosing scope stack.
    pub index: VarIndex,
}

/// Named binding introducing a lexical scope.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    /// Declaration kind.
    pub kind: VariableKind,
    /// Binding name.
    pub name: String,
    /// Bound definition, absent for plain parameters.
    pub definition: Option<SExpr>,
}

/// Function abstraction over one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Parameter declaration; must be a [`VarDecl`] node.
    pub param: SExpr,
    /// Body, evaluated in the parameter's scope.
    pub body: SExpr,
}

/// Code abstraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    /// Calling convention.
    pub conv: CallingConvention,
    /// Return type expression.
    pub return_type: Option<SExpr>,
    /// Body; absent for declarations without a definition.
    pub body: Option<SExpr>,
}

/// Let binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    /// Bound declaration; must be a [`VarDecl`] node.
    pub decl: SExpr,
    /// Body, evaluated in the binding's scope.
    pub body: SExpr,
}

/// Conditional expression.
#[derive(Debug, Clone, PartialEq)]
pub struct IfThenElse {
    /// Condition.
    pub condition: SExpr,
    /// Value when the condition holds.
    pub then_expr: SExpr,
    /// Value when the condition fails.
    pub else_expr: SExpr,
}

/// Unresolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Name text.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Range (type) expression.
    pub range: SExpr,
    /// Body expression.
    pub body: SExpr,
}

/// Named record slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Slot name.
    pub name: String,
    /// Slot definition.
    pub definition: SExpr,
}

/// Record of named slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Slots in declaration order; each must be a [`Slot`] node.
    pub slots: Vec<SExpr>,
}

/// Array of elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// Elements in order.
    pub elements: Vec<SExpr>,
}

/// Scalar type expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarType {
    /// Denoted base type.
    pub base_type: BaseType,
}

// ---------------------------------------------------------------------------
// Application and memory
// ---------------------------------------------------------------------------

/// Application of a function to an argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Apply {
    /// Application kind.
    pub kind: ApplyKind,
    /// Applied function.
    pub fun: SExpr,
    /// Argument; absent for self application.
    pub arg: Option<SExpr>,
}

/// Projection of a named record slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Projected record.
    pub record: SExpr,
    /// Slot name.
    pub slot_name: String,
}

/// Call of a fully applied code value.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Call target.
    pub target: SExpr,
}

/// Allocation of mutable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Alloc {
    /// Allocation kind.
    pub kind: AllocKind,
    /// Initializer expression.
    pub init: SExpr,
}

/// Memory load.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// Loaded pointer.
    pub pointer: SExpr,
}

/// Memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    /// Destination pointer.
    pub dest: SExpr,
    /// Stored value.
    pub value: SExpr,
}

/// Array element address.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayIndex {
    /// Indexed array.
    pub array: SExpr,
    /// Element index.
    pub index: SExpr,
}

/// Array pointer offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAdd {
    /// Offset array.
    pub array: SExpr,
    /// Added index.
    pub index: SExpr,
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Unary operator application.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOp {
    /// Operator flavor.
    pub op: UnaryOpcode,
    /// Result base type.
    pub base_type: BaseType,
    /// Operand.
    pub operand: SExpr,
}

/// Binary operator application.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    /// Operator flavor.
    pub op: BinaryOpcode,
    /// Result base type.
    pub base_type: BaseType,
    /// Left operand.
    pub lhs: SExpr,
    /// Right operand.
    pub rhs: SExpr,
}

/// Cast application.
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    /// Cast flavor.
    pub op: CastOpcode,
    /// Result base type.
    pub base_type: BaseType,
    /// Operand.
    pub operand: SExpr,
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

/// Structured control-flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    /// Basic blocks; block ids are positions in this vector.
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    /// Total number of value-producing members (arguments plus
    /// instructions) across all blocks; the instruction id range.
    pub fn instr_count(&self) -> u32 {
        self.blocks
            .iter()
            .map(|b| (b.args.len() + b.instrs.len()) as u32)
            .sum()
    }
}

/// One basic block: phi arguments, instructions, and a terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// Block arguments; each must be a [`Phi`] node.
    pub args: Vec<SExpr>,
    /// Value-producing instructions in order.
    pub instrs: Vec<SExpr>,
    /// Block terminator; must be a terminator node.
    pub terminator: SExpr,
}

/// Basic-block argument joining one value per predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// Incoming values, in predecessor order.
    pub values: Vec<SExpr>,
}

/// Unconditional terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goto {
    /// Target block.
    pub target: BlockId,
}

/// Two-way conditional terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Branch condition.
    pub condition: SExpr,
    /// Target when the condition holds.
    pub then_block: BlockId,
    /// Target when the condition fails.
    pub else_block: BlockId,
}

/// One switch case.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case label expression.
    pub label: SExpr,
    /// Target block.
    pub target: BlockId,
}

/// Multi-way conditional terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    /// Scrutinized condition.
    pub condition: SExpr,
    /// Cases in match order.
    pub cases: Vec<SwitchCase>,
}

/// Returning terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    /// Returned value.
    pub value: SExpr,
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Side metadata attached to an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Human-readable instruction name.
    InstrName(String),
    /// Source position.
    SourceLoc(u64),
    /// Precondition expression; traversed and reconstructed like any
    /// other sub-expression.
    Precondition(Box<SExpr>),
}

impl Annotation {
    /// Wire kind tag of this annotation.
    pub fn ann_kind(&self) -> AnnKind {
        match self {
            Annotation::InstrName(_) => AnnKind::InstrName,
            Annotation::SourceLoc(_) => AnnKind::SourceLoc,
            Annotation::Precondition(_) => AnnKind::Precondition,
        }
    }
}

// ---------------------------------------------------------------------------
// The expression node
// ---------------------------------------------------------------------------

/// Payload of an expression node, one variant per opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value.
    Literal(Literal),
    /// Variable reference.
    Variable(Variable),
    /// Variable declaration.
    VarDecl(Box<VarDecl>),
    /// Function abstraction.
    Function(Box<Function>),
    /// Code abstraction.
    Code(Box<Code>),
    /// Record field.
    Field(Box<Field>),
    /// Record slot.
    Slot(Box<Slot>),
    /// Record.
    Record(Record),
    /// Array.
    Array(Array),
    /// Scalar type.
    ScalarType(ScalarType),
    /// Control-flow graph.
    Cfg(Cfg),
    /// Application.
    Apply(Box<Apply>),
    /// Slot projection.
    Project(Box<Project>),
    /// Call.
    Call(Box<Call>),
    /// Allocation.
    Alloc(Box<Alloc>),
    /// Load.
    Load(Box<Load>),
    /// Store.
    Store(Box<Store>),
    /// Array element address.
    ArrayIndex(Box<ArrayIndex>),
    /// Array pointer offset.
    ArrayAdd(Box<ArrayAdd>),
    /// Unary operator.
    UnaryOp(Box<UnaryOp>),
    /// Binary operator.
    BinaryOp(Box<BinaryOp>),
    /// Cast.
    Cast(Box<Cast>),
    /// Basic-block argument.
    Phi(Phi),
    /// Unconditional terminator.
    Goto(Goto),
    /// Conditional terminator.
    Branch(Box<Branch>),
    /// Multi-way terminator.
    Switch(Box<Switch>),
    /// Returning terminator.
    Return(Box<Return>),
    /// Undefined expression.
    Undefined,
    /// Pattern wildcard.
    Wildcard,
    /// Unresolved identifier.
    Identifier(Identifier),
    /// Let binding.
    Let(Box<Let>),
    /// Conditional expression.
    IfThenElse(Box<IfThenElse>),
    /// Weak reference to a numbered instruction in the enclosing CFG.
    InstrRef(InstrId),
}

/// A typed expression node with its attached annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct SExpr {
    /// Node payload.
    pub kind: ExprKind,
    /// Annotations in attachment order.
    pub anns: Vec<Annotation>,
}

impl SExpr {
    /// Creates an unannotated node.
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            anns: Vec::new(),
        }
    }

    /// Attaches an annotation, returning the node.
    pub fn annotate(mut self, ann: Annotation) -> Self {
        self.anns.push(ann);
        self
    }

    /// Creates a literal node.
    pub fn literal(value: LiteralValue) -> Self {
        Self::new(ExprKind::Literal(Literal { value }))
    }

    /// Creates a variable reference node.
    pub fn variable(index: u32) -> Self {
        Self::new(ExprKind::Variable(Variable {
            index: VarIndex::new(index),
        }))
    }

    /// Creates a weak instruction reference node.
    pub fn instr_ref(id: u32) -> Self {
        Self::new(ExprKind::InstrRef(InstrId::new(id)))
    }

    /// Creates an identifier node.
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Identifier(Identifier { name: name.into() }))
    }

    /// The stream opcode this node serializes under.
    pub fn opcode(&self) -> OpCode {
        match &self.kind {
            ExprKind::Literal(_) => OpCode::Literal,
            ExprKind::Variable(_) => OpCode::Variable,
            ExprKind::VarDecl(_) => OpCode::VarDecl,
            ExprKind::Function(_) => OpCode::Function,
            ExprKind::Code(_) => OpCode::Code,
            ExprKind::Field(_) => OpCode::Field,
            ExprKind::Slot(_) => OpCode::Slot,
            ExprKind::Record(_) => OpCode::Record,
            ExprKind::Array(_) => OpCode::Array,
            ExprKind::ScalarType(_) => OpCode::ScalarType,
            ExprKind::Cfg(_) => OpCode::Cfg,
            ExprKind::Apply(_) => OpCode::Apply,
            ExprKind::Project(_) => OpCode::Project,
            ExprKind::Call(_) => OpCode::Call,
            ExprKind::Alloc(_) => OpCode::Alloc,
            ExprKind::Load(_) => OpCode::Load,
            ExprKind::Store(_) => OpCode::Store,
            ExprKind::ArrayIndex(_) => OpCode::ArrayIndex,
            ExprKind::ArrayAdd(_) => OpCode::ArrayAdd,
            ExprKind::UnaryOp(_) => OpCode::UnaryOp,
            ExprKind::BinaryOp(_) => OpCode::BinaryOp,
            ExprKind::Cast(_) => OpCode::Cast,
            ExprKind::Phi(_) => OpCode::Phi,
            ExprKind::Goto(_) => OpCode::Goto,
            ExprKind::Branch(_) => OpCode::Branch,
            ExprKind::Switch(_) => OpCode::Switch,
            ExprKind::Return(_) => OpCode::Return,
            ExprKind::Undefined => OpCode::Undefined,
            ExprKind::Wildcard => OpCode::Wildcard,
            ExprKind::Identifier(_) => OpCode::Identifier,
            ExprKind::Let(_) => OpCode::Let,
            ExprKind::IfThenElse(_) => OpCode::IfThenElse,
            ExprKind::InstrRef(_) => OpCode::WeakInstrRef,
        }
    }

    /// Whether this node terminates a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Goto(_) | ExprKind::Branch(_) | ExprKind::Switch(_) | ExprKind::Return(_)
        )
    }
}
