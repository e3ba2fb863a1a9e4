//! Stack-driven deserializing driver from the bytecode stream to IR.

use std::io::Read;

use crate::bytecode::error::BytecodeError;
use crate::bytecode::stream::BitStreamReader;
use crate::bytecode::widths::{
    ALLOC_KIND_BITS, ANN_KIND_BITS, APPLY_KIND_BITS, CALLING_CONVENTION_BITS, OPCODE_BITS,
    OPERATOR_BITS, VARIABLE_KIND_BITS,
};
use crate::til::builder::{Builder, CfgBuilder};
use crate::til::expr::{
    Alloc, Annotation, Apply, Array, ArrayAdd, ArrayIndex, BinaryOp, Branch, Call, Cast, Code,
    ExprKind, Field, Goto, IfThenElse, LiteralValue, Load, Phi, Project, Return, SExpr,
    ScalarType, Slot, Store, Switch, SwitchCase, UnaryOp,
};
use crate::til::ids::BlockId;
use crate::til::ops::{
    AllocKind, AnnKind, ApplyKind, BinaryOpcode, CallingConvention, CastOpcode, OpCode,
    UnaryOpcode, VariableKind,
};
use crate::til::types::{BaseKind, BaseType, SizeClass};

// ---------------------------------------------------------------------------
// Per-CFG read state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct BlockCounts {
    declared_args: u32,
    declared_instrs: u32,
    args_seen: u32,
    instrs_seen: u32,
}

#[derive(Debug)]
struct CfgReadState {
    declared_blocks: u32,
    declared_instrs: u32,
    builder: CfgBuilder,
    current: Option<BlockCounts>,
    stack_floor: usize,
}

// ---------------------------------------------------------------------------
// The driver
// ---------------------------------------------------------------------------

/// Reconstructs one expression from a bytecode stream.
///
/// The driver reads one opcode at a time and never recurses: produced
/// sub-expressions accumulate on a value stack in post-order, and each
/// expression opcode pops the operand count its kind prescribes. Block
/// and instruction tables are pre-sized from the `EnterCfg` marker, so
/// references to blocks and instructions not yet materialized resolve
/// by index range.
#[derive(Debug)]
pub struct BytecodeReader<R: Read> {
    stream: BitStreamReader<R>,
    builder: Builder,
    stack: Vec<Option<SExpr>>,
    cfg: Option<CfgReadState>,
}

impl<R: Read> BytecodeReader<R> {
    /// Creates a driver over the given builder and byte source.
    pub fn new(builder: Builder, source: R) -> Result<Self, BytecodeError> {
        Ok(Self {
            stream: BitStreamReader::new(source)?,
            builder,
            stack: Vec::new(),
            cfg: None,
        })
    }

    /// Reads the stream to exhaustion and returns the single root.
    ///
    /// Any protocol violation, including residual value-stack state,
    /// fails the whole decode; no partial IR is returned.
    pub fn read(mut self) -> Result<SExpr, BytecodeError> {
        while !self.stream.empty() {
            let raw = self.stream.read_bits32(OPCODE_BITS)? as u8;
            let op = OpCode::from_raw(raw).ok_or_else(|| {
                BytecodeError::unknown_opcode(
                    "opcode outside the defined code space",
                    format!("raw value {raw:#04x}"),
                )
            })?;
            self.dispatch(op)?;
            self.stream.end_atom()?;
        }

        if self.builder.scope_depth() != 0 {
            return Err(BytecodeError::malformed(
                "stream ended with open scopes",
                format!("{} scopes still open", self.builder.scope_depth()),
            ));
        }
        if self.cfg.is_some() {
            return Err(BytecodeError::malformed(
                "stream ended inside a CFG",
                "no closing graph atom",
            ));
        }
        if self.stack.len() != 1 {
            return Err(BytecodeError::malformed(
                "stream did not reduce to a single root",
                format!("{} entries left on the value stack", self.stack.len()),
            ));
        }
        match self.stack.pop() {
            Some(Some(root)) => Ok(root),
            _ => Err(BytecodeError::malformed(
                "root expression is null",
                "top-level null atom",
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, op: OpCode) -> Result<(), BytecodeError> {
        match op {
            OpCode::Null => {
                self.stack.push(None);
                Ok(())
            }
            OpCode::WeakInstrRef => self.read_weak_ref(),
            OpCode::BBArgument => self.read_bb_argument(),
            OpCode::BBInstruction => self.read_bb_instruction(),
            OpCode::EnterScope => self.read_enter_scope(),
            OpCode::ExitScope => {
                self.builder.exit_scope()?;
                Ok(())
            }
            OpCode::EnterBlock => self.read_enter_block(),
            OpCode::EnterCfg => self.read_enter_cfg(),
            OpCode::Annotation => self.read_annotation(),
            OpCode::BasicBlock => self.read_basic_block_end(),
            OpCode::Cfg => self.read_cfg_end(),
            _ => self.read_node(op),
        }
    }

    // -----------------------------------------------------------------------
    // Structural markers
    // -----------------------------------------------------------------------

    fn read_weak_ref(&mut self) -> Result<(), BytecodeError> {
        let index = self.stream.read_u32_vbr()?;
        let cfg = self.cfg.as_ref().ok_or_else(|| {
            BytecodeError::malformed(
                "weak instruction reference outside a CFG",
                format!("instruction {index}"),
            )
        })?;
        if index >= cfg.declared_instrs {
            return Err(BytecodeError::symbol_out_of_range(
                "weak instruction reference is out of range",
                format!("instruction {index} of {}", cfg.declared_instrs),
            ));
        }
        self.stack.push(Some(SExpr::instr_ref(index)));
        Ok(())
    }

    fn read_bb_argument(&mut self) -> Result<(), BytecodeError> {
        let node = self.pop_node()?;
        let cfg = self.cfg_mut("block argument marker")?;
        let counts = current_counts(&mut cfg.current, "block argument marker")?;
        if counts.args_seen >= counts.declared_args {
            return Err(BytecodeError::malformed(
                "more block arguments than declared",
                format!("declared {}", counts.declared_args),
            ));
        }
        counts.args_seen += 1;
        cfg.builder.add_arg(node)?;
        Ok(())
    }

    fn read_bb_instruction(&mut self) -> Result<(), BytecodeError> {
        let node = self.pop_node()?;
        let cfg = self.cfg_mut("block instruction marker")?;
        let counts = current_counts(&mut cfg.current, "block instruction marker")?;
        if counts.instrs_seen >= counts.declared_instrs {
            return Err(BytecodeError::malformed(
                "more block instructions than declared",
                format!("declared {}", counts.declared_instrs),
            ));
        }
        counts.instrs_seen += 1;
        cfg.builder.add_instr(node)?;
        Ok(())
    }

    fn read_enter_scope(&mut self) -> Result<(), BytecodeError> {
        let name = match self.stack.last() {
            Some(Some(expr)) => match &expr.kind {
                ExprKind::VarDecl(decl) => decl.name.clone(),
                _ => {
                    return Err(BytecodeError::malformed(
                        "scope entered without a preceding declaration",
                        format!("top of stack is {}", expr.opcode().name()),
                    ))
                }
            },
            _ => {
                return Err(BytecodeError::malformed(
                    "scope entered without a preceding declaration",
                    "value stack is empty or null",
                ))
            }
        };
        self.builder.enter_scope(name);
        Ok(())
    }

    fn read_enter_block(&mut self) -> Result<(), BytecodeError> {
        let declared_args = self.stream.read_u32_vbr()?;
        let declared_instrs = self.stream.read_u32_vbr()?;
        let cfg = self.cfg_mut("block marker")?;
        cfg.builder.begin_block()?;
        cfg.current = Some(BlockCounts {
            declared_args,
            declared_instrs,
            args_seen: 0,
            instrs_seen: 0,
        });
        Ok(())
    }

    fn read_enter_cfg(&mut self) -> Result<(), BytecodeError> {
        if self.cfg.is_some() {
            return Err(BytecodeError::malformed(
                "nested CFG in the stream",
                "a CFG is already open",
            ));
        }
        let declared_blocks = self.stream.read_u32_vbr()?;
        let declared_instrs = self.stream.read_u32_vbr()?;
        let mut builder = CfgBuilder::new();
        for _ in 0..declared_blocks {
            builder.declare_block();
        }
        self.cfg = Some(CfgReadState {
            declared_blocks,
            declared_instrs,
            builder,
            current: None,
            stack_floor: self.stack.len(),
        });
        Ok(())
    }

    fn read_basic_block_end(&mut self) -> Result<(), BytecodeError> {
        let terminator = self.pop_node()?;
        let cfg = self.cfg_mut("block-closing atom")?;
        let counts = current_counts(&mut cfg.current, "block-closing atom")?;
        if counts.args_seen != counts.declared_args {
            return Err(BytecodeError::malformed(
                "block closed with missing arguments",
                format!("{} of {}", counts.args_seen, counts.declared_args),
            ));
        }
        if counts.instrs_seen != counts.declared_instrs {
            return Err(BytecodeError::malformed(
                "block closed with missing instructions",
                format!("{} of {}", counts.instrs_seen, counts.declared_instrs),
            ));
        }
        cfg.builder.end_block(terminator)?;
        cfg.current = None;
        Ok(())
    }

    fn read_cfg_end(&mut self) -> Result<(), BytecodeError> {
        let cfg = self.cfg.take().ok_or_else(|| {
            BytecodeError::malformed("graph atom outside a CFG", "no CFG is open")
        })?;
        if self.stack.len() != cfg.stack_floor {
            return Err(BytecodeError::malformed(
                "value stack imbalance across a CFG",
                format!(
                    "{} entries above the graph floor",
                    self.stack.len() - cfg.stack_floor.min(self.stack.len())
                ),
            ));
        }
        if cfg.builder.instr_count() != cfg.declared_instrs {
            return Err(BytecodeError::malformed(
                "instruction count differs from the declared total",
                format!(
                    "declared {}, materialized {}",
                    cfg.declared_instrs,
                    cfg.builder.instr_count()
                ),
            ));
        }
        let graph = cfg.builder.finish()?;
        self.stack.push(Some(SExpr::new(ExprKind::Cfg(graph))));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    fn read_annotation(&mut self) -> Result<(), BytecodeError> {
        let raw = self.stream.read_bits32(ANN_KIND_BITS)? as u8;
        let kind = AnnKind::from_raw(raw).ok_or_else(|| {
            BytecodeError::malformed("unknown annotation kind", format!("raw value {raw:#04x}"))
        })?;
        let ann = match kind {
            AnnKind::InstrName => Annotation::InstrName(self.stream.read_string()?),
            AnnKind::SourceLoc => Annotation::SourceLoc(self.stream.read_u64_vbr()?),
            AnnKind::Precondition => Annotation::Precondition(Box::new(self.pop_node()?)),
        };
        match self.stack.last_mut() {
            Some(Some(expr)) => {
                expr.anns.push(ann);
                Ok(())
            }
            _ => Err(BytecodeError::malformed(
                "annotation with no target node",
                "value stack is empty or null",
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Expression nodes
    // -----------------------------------------------------------------------

    fn read_node(&mut self, op: OpCode) -> Result<(), BytecodeError> {
        let expr = match op {
            OpCode::Literal => self.read_literal()?,
            OpCode::Variable => {
                let index = self.stream.read_u32_vbr()?;
                if index == 0 || index > self.builder.scope_depth() {
                    return Err(BytecodeError::symbol_out_of_range(
                        "variable index is not in scope",
                        format!(
                            "index {index} with {} open scopes",
                            self.builder.scope_depth()
                        ),
                    ));
                }
                SExpr::variable(index)
            }
            OpCode::VarDecl => {
                let raw = self.stream.read_bits32(VARIABLE_KIND_BITS)? as u8;
                let kind = VariableKind::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown variable kind",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let name = self.stream.read_string()?;
                let definition = self.pop_opt()?;
                self.builder.var_decl(kind, name, definition)
            }
            OpCode::Function => {
                let body = self.pop_node()?;
                let param = self.pop_node()?;
                self.builder.function(param, body)?
            }
            OpCode::Code => {
                let raw = self.stream.read_bits32(CALLING_CONVENTION_BITS)? as u8;
                let conv = CallingConvention::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown calling convention",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let body = self.pop_opt()?;
                let return_type = self.pop_opt()?;
                SExpr::new(ExprKind::Code(Box::new(Code {
                    conv,
                    return_type,
                    body,
                })))
            }
            OpCode::Field => {
                let body = self.pop_node()?;
                let range = self.pop_node()?;
                SExpr::new(ExprKind::Field(Box::new(Field { range, body })))
            }
            OpCode::Slot => {
                let name = self.stream.read_string()?;
                let definition = self.pop_node()?;
                SExpr::new(ExprKind::Slot(Box::new(Slot { name, definition })))
            }
            OpCode::Record => {
                let count = self.stream.read_u32_vbr()?;
                let slots = self.pop_nodes(count)?;
                self.builder.record(slots)?
            }
            OpCode::Array => {
                let count = self.stream.read_u32_vbr()?;
                let elements = self.pop_nodes(count)?;
                SExpr::new(ExprKind::Array(Array { elements }))
            }
            OpCode::ScalarType => {
                let base_type = self.read_base_type()?;
                SExpr::new(ExprKind::ScalarType(ScalarType { base_type }))
            }
            OpCode::Apply => {
                let raw = self.stream.read_bits32(APPLY_KIND_BITS)? as u8;
                let kind = ApplyKind::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown apply kind",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let arg = self.pop_opt()?;
                let fun = self.pop_node()?;
                SExpr::new(ExprKind::Apply(Box::new(Apply { kind, fun, arg })))
            }
            OpCode::Project => {
                let slot_name = self.stream.read_string()?;
                let record = self.pop_node()?;
                SExpr::new(ExprKind::Project(Box::new(Project { record, slot_name })))
            }
            OpCode::Call => {
                let target = self.pop_node()?;
                SExpr::new(ExprKind::Call(Box::new(Call { target })))
            }
            OpCode::Alloc => {
                let raw = self.stream.read_bits32(ALLOC_KIND_BITS)? as u8;
                let kind = AllocKind::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown alloc kind",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let init = self.pop_node()?;
                SExpr::new(ExprKind::Alloc(Box::new(Alloc { kind, init })))
            }
            OpCode::Load => {
                let pointer = self.pop_node()?;
                SExpr::new(ExprKind::Load(Box::new(Load { pointer })))
            }
            OpCode::Store => {
                let value = self.pop_node()?;
                let dest = self.pop_node()?;
                SExpr::new(ExprKind::Store(Box::new(Store { dest, value })))
            }
            OpCode::ArrayIndex => {
                let index = self.pop_node()?;
                let array = self.pop_node()?;
                SExpr::new(ExprKind::ArrayIndex(Box::new(ArrayIndex { array, index })))
            }
            OpCode::ArrayAdd => {
                let index = self.pop_node()?;
                let array = self.pop_node()?;
                SExpr::new(ExprKind::ArrayAdd(Box::new(ArrayAdd { array, index })))
            }
            OpCode::UnaryOp => {
                let raw = self.stream.read_bits32(OPERATOR_BITS)? as u8;
                let op = UnaryOpcode::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown unary operator",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let base_type = self.read_base_type()?;
                let operand = self.pop_node()?;
                SExpr::new(ExprKind::UnaryOp(Box::new(UnaryOp {
                    op,
                    base_type,
                    operand,
                })))
            }
            OpCode::BinaryOp => {
                let raw = self.stream.read_bits32(OPERATOR_BITS)? as u8;
                let op = BinaryOpcode::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown binary operator",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let base_type = self.read_base_type()?;
                let rhs = self.pop_node()?;
                let lhs = self.pop_node()?;
                SExpr::new(ExprKind::BinaryOp(Box::new(BinaryOp {
                    op,
                    base_type,
                    lhs,
                    rhs,
                })))
            }
            OpCode::Cast => {
                let raw = self.stream.read_bits32(OPERATOR_BITS)? as u8;
                let op = CastOpcode::from_raw(raw).ok_or_else(|| {
                    BytecodeError::malformed(
                        "unknown cast operator",
                        format!("raw value {raw:#04x}"),
                    )
                })?;
                let base_type = self.read_base_type()?;
                let operand = self.pop_node()?;
                SExpr::new(ExprKind::Cast(Box::new(Cast {
                    op,
                    base_type,
                    operand,
                })))
            }
            OpCode::Phi => {
                let count = self.stream.read_u32_vbr()?;
                let values = self.pop_nodes(count)?;
                SExpr::new(ExprKind::Phi(Phi { values }))
            }
            OpCode::Goto => {
                let target = self.stream.read_u32_vbr()?;
                self.check_block_target(target)?;
                SExpr::new(ExprKind::Goto(Goto {
                    target: BlockId::new(target),
                }))
            }
            OpCode::Branch => {
                let then_block = self.stream.read_u32_vbr()?;
                let else_block = self.stream.read_u32_vbr()?;
                self.check_block_target(then_block)?;
                self.check_block_target(else_block)?;
                let condition = self.pop_node()?;
                SExpr::new(ExprKind::Branch(Box::new(Branch {
                    condition,
                    then_block: BlockId::new(then_block),
                    else_block: BlockId::new(else_block),
                })))
            }
            OpCode::Switch => {
                let count = self.stream.read_u32_vbr()?;
                let mut targets = Vec::with_capacity((count as usize).min(self.stack.len()));
                for _ in 0..count {
                    let target = self.stream.read_u32_vbr()?;
                    self.check_block_target(target)?;
                    targets.push(BlockId::new(target));
                }
                let labels = self.pop_nodes(count)?;
                let condition = self.pop_node()?;
                let cases = labels
                    .into_iter()
                    .zip(targets)
                    .map(|(label, target)| SwitchCase { label, target })
                    .collect();
                SExpr::new(ExprKind::Switch(Box::new(Switch { condition, cases })))
            }
            OpCode::Return => {
                let value = self.pop_node()?;
                SExpr::new(ExprKind::Return(Box::new(Return { value })))
            }
            OpCode::Undefined => SExpr::new(ExprKind::Undefined),
            OpCode::Wildcard => SExpr::new(ExprKind::Wildcard),
            OpCode::Identifier => SExpr::identifier(self.stream.read_string()?),
            OpCode::Let => {
                let body = self.pop_node()?;
                let decl = self.pop_node()?;
                self.builder.let_in(decl, body)?
            }
            OpCode::IfThenElse => {
                let else_expr = self.pop_node()?;
                let then_expr = self.pop_node()?;
                let condition = self.pop_node()?;
                SExpr::new(ExprKind::IfThenElse(Box::new(IfThenElse {
                    condition,
                    then_expr,
                    else_expr,
                })))
            }
            _ => {
                return Err(BytecodeError::malformed(
                    "marker opcode where an expression was expected",
                    op.name(),
                ))
            }
        };
        self.stack.push(Some(expr));
        Ok(())
    }

    fn read_literal(&mut self) -> Result<SExpr, BytecodeError> {
        let base_type = self.read_base_type()?;
        if base_type.has_vector_width() {
            return Err(BytecodeError::malformed(
                "vector literals are not supported",
                format!("vector width {}", base_type.vect_size),
            ));
        }
        let value = match (base_type.kind, base_type.size) {
            (BaseKind::Bool, SizeClass::S8) => LiteralValue::Bool(self.stream.read_bool()?),
            (BaseKind::UInt, SizeClass::S8) => LiteralValue::U8(self.stream.read_u8()?),
            (BaseKind::UInt, SizeClass::S16) => LiteralValue::U16(self.stream.read_u16()?),
            (BaseKind::UInt, SizeClass::S32) => LiteralValue::U32(self.stream.read_u32()?),
            (BaseKind::UInt, SizeClass::S64) => LiteralValue::U64(self.stream.read_u64()?),
            (BaseKind::Int, SizeClass::S8) => LiteralValue::I8(self.stream.read_i8()?),
            (BaseKind::Int, SizeClass::S16) => LiteralValue::I16(self.stream.read_i16()?),
            (BaseKind::Int, SizeClass::S32) => LiteralValue::I32(self.stream.read_i32()?),
            (BaseKind::Int, SizeClass::S64) => LiteralValue::I64(self.stream.read_i64()?),
            (BaseKind::Float, SizeClass::S32) => LiteralValue::F32(self.stream.read_f32()?),
            (BaseKind::Float, SizeClass::S64) => LiteralValue::F64(self.stream.read_f64()?),
            (BaseKind::String, SizeClass::S0) => LiteralValue::Str(self.stream.read_string()?),
            (BaseKind::Pointer, SizeClass::S64) => LiteralValue::Ptr(0),
            (kind, size) => {
                return Err(BytecodeError::malformed(
                    "literal base type has no value form",
                    format!("{kind:?}/{size:?}"),
                ))
            }
        };
        Ok(SExpr::literal(value))
    }

    fn read_base_type(&mut self) -> Result<BaseType, BytecodeError> {
        let raw = self.stream.read_u8()?;
        let (mut base_type, has_vect) = BaseType::from_raw(raw).ok_or_else(|| {
            BytecodeError::malformed("unknown base type", format!("raw value {raw:#04x}"))
        })?;
        if has_vect {
            base_type.vect_size = self.stream.read_u8()?;
        }
        Ok(base_type)
    }

    // -----------------------------------------------------------------------
    // Stack and state helpers
    // -----------------------------------------------------------------------

    fn pop_opt(&mut self) -> Result<Option<SExpr>, BytecodeError> {
        if let Some(cfg) = &self.cfg {
            if self.stack.len() <= cfg.stack_floor {
                return Err(BytecodeError::malformed(
                    "operand underflow across the graph floor",
                    format!("floor at {}", cfg.stack_floor),
                ));
            }
        }
        self.stack.pop().ok_or_else(|| {
            BytecodeError::malformed(
                "operand underflow on the value stack",
                "stream ordered a pop from an empty stack",
            )
        })
    }

    fn pop_node(&mut self) -> Result<SExpr, BytecodeError> {
        self.pop_opt()?.ok_or_else(|| {
            BytecodeError::malformed(
                "unexpected null operand",
                "a required operand was a null atom",
            )
        })
    }

    fn pop_nodes(&mut self, count: u32) -> Result<Vec<SExpr>, BytecodeError> {
        // The count comes from the stream; never preallocate past what
        // the value stack can actually supply.
        let mut nodes = Vec::with_capacity((count as usize).min(self.stack.len()));
        for _ in 0..count {
            nodes.push(self.pop_node()?);
        }
        nodes.reverse();
        Ok(nodes)
    }

    fn cfg_mut(&mut self, what: &str) -> Result<&mut CfgReadState, BytecodeError> {
        self.cfg.as_mut().ok_or_else(|| {
            BytecodeError::malformed(format!("{what} outside a CFG"), "no CFG is open")
        })
    }

    fn check_block_target(&self, target: u32) -> Result<(), BytecodeError> {
        let cfg = self.cfg.as_ref().ok_or_else(|| {
            BytecodeError::malformed("terminator outside a CFG", format!("target block {target}"))
        })?;
        if target >= cfg.declared_blocks {
            return Err(BytecodeError::symbol_out_of_range(
                "terminator target is out of range",
                format!("block {target} of {}", cfg.declared_blocks),
            ));
        }
        Ok(())
    }
}

fn current_counts<'a>(
    current: &'a mut Option<BlockCounts>,
    what: &str,
) -> Result<&'a mut BlockCounts, BytecodeError> {
    current.as_mut().ok_or_else(|| {
        BytecodeError::malformed(format!("{what} outside a block"), "no block is open")
    })
}
