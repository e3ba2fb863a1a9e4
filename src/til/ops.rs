//! Opcode and flag enumerations shared by the IR and the bytecode codec.

// ---------------------------------------------------------------------------
// Stream opcodes
// ---------------------------------------------------------------------------

/// One 6-bit stream opcode.
///
/// Codes 0..=8 are structural markers that do not denote an expression;
/// expression opcodes occupy the contiguous range starting at
/// [`OpCode::VarDecl`]. A reader distinguishes the two by numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Absent optional operand.
    Null = 0,
    /// Non-owning reference to a numbered instruction in the current CFG.
    WeakInstrRef = 1,
    /// Splices the last produced node as the next block argument.
    BBArgument = 2,
    /// Splices the last produced node as the next block instruction.
    BBInstruction = 3,
    /// Opens the lexical scope of the preceding declaration.
    EnterScope = 4,
    /// Closes the innermost lexical scope.
    ExitScope = 5,
    /// Starts the next basic block of the current CFG.
    EnterBlock = 6,
    /// Starts a control-flow graph and declares its table sizes.
    EnterCfg = 7,
    /// Attaches an annotation to the last produced node.
    Annotation = 8,

    /// Variable declaration.
    VarDecl = 9,
    /// Function abstraction.
    Function = 10,
    /// Code abstraction with a calling convention.
    Code = 11,
    /// Field of a record type.
    Field = 12,
    /// Named record slot.
    Slot = 13,
    /// Record of slots.
    Record = 14,
    /// Array of elements.
    Array = 15,
    /// Scalar type expression.
    ScalarType = 16,
    /// Structured control-flow graph.
    Cfg = 17,
    /// Closes the current basic block.
    BasicBlock = 18,
    /// Literal value.
    Literal = 19,
    /// Reference to a lexically bound variable.
    Variable = 20,
    /// Application of a function to an argument.
    Apply = 21,
    /// Projection of a named record slot.
    Project = 22,
    /// Call of a fully applied code value.
    Call = 23,
    /// Allocation.
    Alloc = 24,
    /// Memory load.
    Load = 25,
    /// Memory store.
    Store = 26,
    /// Array element address.
    ArrayIndex = 27,
    /// Array pointer offset.
    ArrayAdd = 28,
    /// Unary arithmetic or logical operator.
    UnaryOp = 29,
    /// Binary arithmetic, relational, or logical operator.
    BinaryOp = 30,
    /// Numeric or pointer cast.
    Cast = 31,
    /// Basic-block argument joining predecessor values.
    Phi = 32,
    /// Unconditional terminator.
    Goto = 33,
    /// Two-way conditional terminator.
    Branch = 34,
    /// Multi-way conditional terminator.
    Switch = 35,
    /// Returning terminator.
    Return = 36,
    /// Undefined expression.
    Undefined = 37,
    /// Pattern wildcard.
    Wildcard = 38,
    /// Unresolved identifier.
    Identifier = 39,
    /// Let binding.
    Let = 40,
    /// Conditional expression.
    IfThenElse = 41,
}

impl OpCode {
    /// Returns the 6-bit wire code.
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Whether this opcode denotes an expression rather than a marker.
    pub const fn is_expr(self) -> bool {
        self.as_raw() >= OpCode::VarDecl.as_raw()
    }

    /// Decodes a 6-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => OpCode::Null,
            1 => OpCode::WeakInstrRef,
            2 => OpCode::BBArgument,
            3 => OpCode::BBInstruction,
            4 => OpCode::EnterScope,
            5 => OpCode::ExitScope,
            6 => OpCode::EnterBlock,
            7 => OpCode::EnterCfg,
            8 => OpCode::Annotation,
            9 => OpCode::VarDecl,
            10 => OpCode::Function,
            11 => OpCode::Code,
            12 => OpCode::Field,
            13 => OpCode::Slot,
            14 => OpCode::Record,
            15 => OpCode::Array,
            16 => OpCode::ScalarType,
            17 => OpCode::Cfg,
            18 => OpCode::BasicBlock,
            19 => OpCode::Literal,
            20 => OpCode::Variable,
            21 => OpCode::Apply,
            22 => OpCode::Project,
            23 => OpCode::Call,
            24 => OpCode::Alloc,
            25 => OpCode::Load,
            26 => OpCode::Store,
            27 => OpCode::ArrayIndex,
            28 => OpCode::ArrayAdd,
            29 => OpCode::UnaryOp,
            30 => OpCode::BinaryOp,
            31 => OpCode::Cast,
            32 => OpCode::Phi,
            33 => OpCode::Goto,
            34 => OpCode::Branch,
            35 => OpCode::Switch,
            36 => OpCode::Return,
            37 => OpCode::Undefined,
            38 => OpCode::Wildcard,
            39 => OpCode::Identifier,
            40 => OpCode::Let,
            41 => OpCode::IfThenElse,
            _ => return None,
        })
    }

    /// Human-readable name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Null => "Null",
            OpCode::WeakInstrRef => "WeakInstrRef",
            OpCode::BBArgument => "BBArgument",
            OpCode::BBInstruction => "BBInstruction",
            OpCode::EnterScope => "EnterScope",
            OpCode::ExitScope => "ExitScope",
            OpCode::EnterBlock => "EnterBlock",
            OpCode::EnterCfg => "EnterCfg",
            OpCode::Annotation => "Annotation",
            OpCode::VarDecl => "VarDecl",
            OpCode::Function => "Function",
            OpCode::Code => "Code",
            OpCode::Field => "Field",
            OpCode::Slot => "Slot",
            OpCode::Record => "Record",
            OpCode::Array => "Array",
            OpCode::ScalarType => "ScalarType",
            OpCode::Cfg => "Cfg",
            OpCode::BasicBlock => "BasicBlock",
            OpCode::Literal => "Literal",
            OpCode::Variable => "Variable",
            OpCode::Apply => "Apply",
            OpCode::Project => "Project",
            OpCode::Call => "Call",
            OpCode::Alloc => "Alloc",
            OpCode::Load => "Load",
            OpCode::Store => "Store",
            OpCode::ArrayIndex => "ArrayIndex",
            OpCode::ArrayAdd => "ArrayAdd",
            OpCode::UnaryOp => "UnaryOp",
            OpCode::BinaryOp => "BinaryOp",
            OpCode::Cast => "Cast",
            OpCode::Phi => "Phi",
            OpCode::Goto => "Goto",
            OpCode::Branch => "Branch",
            OpCode::Switch => "Switch",
            OpCode::Return => "Return",
            OpCode::Undefined => "Undefined",
            OpCode::Wildcard => "Wildcard",
            OpCode::Identifier => "Identifier",
            OpCode::Let => "Let",
            OpCode::IfThenElse => "IfThenElse",
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation kinds
// ---------------------------------------------------------------------------

/// 8-bit annotation kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnKind {
    /// Instruction name.
    InstrName,
    /// Source position.
    SourceLoc,
    /// Precondition expression.
    Precondition,
}

impl AnnKind {
    /// Returns the 8-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            AnnKind::InstrName => 0,
            AnnKind::SourceLoc => 1,
            AnnKind::Precondition => 2,
        }
    }

    /// Decodes an 8-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => AnnKind::InstrName,
            1 => AnnKind::SourceLoc,
            2 => AnnKind::Precondition,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Operator flavors
// ---------------------------------------------------------------------------

/// Unary operator flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpcode {
    /// Arithmetic negation.
    Minus,
    /// Bitwise complement.
    BitNot,
    /// Logical negation.
    LogicNot,
}

impl UnaryOpcode {
    /// Returns the 6-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            UnaryOpcode::Minus => 0,
            UnaryOpcode::BitNot => 1,
            UnaryOpcode::LogicNot => 2,
        }
    }

    /// Decodes a 6-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => UnaryOpcode::Minus,
            1 => UnaryOpcode::BitNot,
            2 => UnaryOpcode::LogicNot,
            _ => return None,
        })
    }
}

/// Binary operator flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpcode {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Rem,
    /// Left shift.
    Shl,
    /// Right shift.
    Shr,
    /// Bitwise and.
    BitAnd,
    /// Bitwise exclusive or.
    BitXor,
    /// Bitwise or.
    BitOr,
    /// Equality.
    Eq,
    /// Inequality.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Leq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Geq,
    /// Short-circuit logical and.
    LogicAnd,
    /// Short-circuit logical or.
    LogicOr,
}

impl BinaryOpcode {
    /// Returns the 6-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            BinaryOpcode::Add => 0,
            BinaryOpcode::Sub => 1,
            BinaryOpcode::Mul => 2,
            BinaryOpcode::Div => 3,
            BinaryOpcode::Rem => 4,
            BinaryOpcode::Shl => 5,
            BinaryOpcode::Shr => 6,
            BinaryOpcode::BitAnd => 7,
            BinaryOpcode::BitXor => 8,
            BinaryOpcode::BitOr => 9,
            BinaryOpcode::Eq => 10,
            BinaryOpcode::Neq => 11,
            BinaryOpcode::Lt => 12,
            BinaryOpcode::Leq => 13,
            BinaryOpcode::Gt => 14,
            BinaryOpcode::Geq => 15,
            BinaryOpcode::LogicAnd => 16,
            BinaryOpcode::LogicOr => 17,
        }
    }

    /// Decodes a 6-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => BinaryOpcode::Add,
            1 => BinaryOpcode::Sub,
            2 => BinaryOpcode::Mul,
            3 => BinaryOpcode::Div,
            4 => BinaryOpcode::Rem,
            5 => BinaryOpcode::Shl,
            6 => BinaryOpcode::Shr,
            7 => BinaryOpcode::BitAnd,
            8 => BinaryOpcode::BitXor,
            9 => BinaryOpcode::BitOr,
            10 => BinaryOpcode::Eq,
            11 => BinaryOpcode::Neq,
            12 => BinaryOpcode::Lt,
            13 => BinaryOpcode::Leq,
            14 => BinaryOpcode::Gt,
            15 => BinaryOpcode::Geq,
            16 => BinaryOpcode::LogicAnd,
            17 => BinaryOpcode::LogicOr,
            _ => return None,
        })
    }
}

/// Cast operator flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOpcode {
    /// Widening numeric cast.
    Extend,
    /// Narrowing numeric cast.
    Trunc,
    /// Integer to floating point.
    ToFloat,
    /// Floating point to integer.
    ToInt,
}

impl CastOpcode {
    /// Returns the 6-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            CastOpcode::Extend => 0,
            CastOpcode::Trunc => 1,
            CastOpcode::ToFloat => 2,
            CastOpcode::ToInt => 3,
        }
    }

    /// Decodes a 6-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => CastOpcode::Extend,
            1 => CastOpcode::Trunc,
            2 => CastOpcode::ToFloat,
            3 => CastOpcode::ToInt,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Node flags
// ---------------------------------------------------------------------------

/// Kind of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableKind {
    /// Function parameter.
    #[default]
    Fun,
    /// Self parameter.
    SFun,
    /// Let-bound value.
    Let,
}

impl VariableKind {
    /// Returns the 2-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            VariableKind::Fun => 0,
            VariableKind::SFun => 1,
            VariableKind::Let => 2,
        }
    }

    /// Decodes a 2-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => VariableKind::Fun,
            1 => VariableKind::SFun,
            2 => VariableKind::Let,
            _ => return None,
        })
    }
}

/// Calling convention of a code abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallingConvention {
    /// Platform default.
    #[default]
    Default,
    /// C ABI.
    C,
    /// Register-heavy fast call.
    Fast,
    /// Rarely-taken cold call.
    Cold,
}

impl CallingConvention {
    /// Returns the 4-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            CallingConvention::Default => 0,
            CallingConvention::C => 1,
            CallingConvention::Fast => 2,
            CallingConvention::Cold => 3,
        }
    }

    /// Decodes a 4-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => CallingConvention::Default,
            1 => CallingConvention::C,
            2 => CallingConvention::Fast,
            3 => CallingConvention::Cold,
            _ => return None,
        })
    }
}

/// Kind of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplyKind {
    /// Ordinary application.
    #[default]
    Apply,
    /// Self application.
    SelfApply,
}

impl ApplyKind {
    /// Returns the 2-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            ApplyKind::Apply => 0,
            ApplyKind::SelfApply => 1,
        }
    }

    /// Decodes a 2-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => ApplyKind::Apply,
            1 => ApplyKind::SelfApply,
            _ => return None,
        })
    }
}

/// Kind of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocKind {
    /// Stack allocation.
    #[default]
    Stack,
    /// Heap allocation.
    Heap,
}

impl AllocKind {
    /// Returns the 2-bit wire code.
    pub const fn as_raw(self) -> u8 {
        match self {
            AllocKind::Stack => 0,
            AllocKind::Heap => 1,
        }
    }

    /// Decodes a 2-bit wire code.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => AllocKind::Stack,
            1 => AllocKind::Heap,
            _ => return None,
        })
    }
}
