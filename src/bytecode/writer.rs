//! Serializing traversal from IR to the bytecode stream.

use std::io::Write;

use crate::bytecode::error::BytecodeError;
use crate::bytecode::stream::BitStreamWriter;
use crate::bytecode::widths::{
    ALLOC_KIND_BITS, ANN_KIND_BITS, APPLY_KIND_BITS, CALLING_CONVENTION_BITS, OPCODE_BITS,
    OPERATOR_BITS, VARIABLE_KIND_BITS,
};
use crate::til::expr::{Annotation, Cfg, ExprKind, LiteralValue, SExpr};
use crate::til::ops::OpCode;
use crate::til::types::BaseType;

/// Per-CFG write state used to validate indices against declared sizes.
#[derive(Debug, Clone, Copy)]
struct CfgWriteState {
    num_blocks: u32,
    num_instrs: u32,
}

/// Serializes expressions onto a bit stream.
///
/// The traversal is post-order: every child is emitted, one atom per
/// node, before its parent's atom, so the reader can reconstruct
/// parents from a value stack. Scope, block, and CFG boundaries are
/// emitted as explicit marker atoms around the bodies they delimit.
#[derive(Debug)]
pub struct BytecodeWriter<W: Write> {
    stream: BitStreamWriter<W>,
    scope_depth: u32,
    cfg: Option<CfgWriteState>,
}

impl<W: Write> BytecodeWriter<W> {
    /// Creates a writer over the given sink.
    pub fn new(sink: W) -> Self {
        Self {
            stream: BitStreamWriter::new(sink),
            scope_depth: 0,
            cfg: None,
        }
    }

    /// Serializes one root expression and flushes the stream.
    ///
    /// On failure the buffered suffix is discarded; the sink never
    /// receives a torn stream.
    pub fn write(&mut self, root: &SExpr) -> Result<(), BytecodeError> {
        match self.traverse(root) {
            Ok(()) => self.stream.flush(),
            Err(err) => {
                self.stream.abandon();
                Err(err)
            }
        }
    }

    /// Flushes and returns the sink.
    pub fn finish(self) -> Result<W, BytecodeError> {
        self.stream.finish()
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    fn traverse(&mut self, expr: &SExpr) -> Result<(), BytecodeError> {
        self.reduce(expr)?;
        self.stream.end_atom()?;
        for ann in &expr.anns {
            self.write_annotation(ann)?;
        }
        Ok(())
    }

    fn traverse_opt(&mut self, child: &Option<SExpr>) -> Result<(), BytecodeError> {
        match child {
            Some(expr) => self.traverse(expr),
            None => {
                self.write_opcode(OpCode::Null)?;
                self.stream.end_atom()
            }
        }
    }

    fn reduce(&mut self, expr: &SExpr) -> Result<(), BytecodeError> {
        match &expr.kind {
            ExprKind::Literal(lit) => {
                if let LiteralValue::Ptr(addr) = lit.value {
                    if addr != 0 {
                        return Err(BytecodeError::unserializable(
                            "non-null pointer literal",
                            format!("address {addr:#x}"),
                        ));
                    }
                }
                self.write_opcode(OpCode::Literal)?;
                self.write_base_type(lit.value.base_type())?;
                self.write_literal_value(&lit.value)
            }
            ExprKind::Variable(var) => {
                let index = var.index.value();
                if index == 0 || index > self.scope_depth {
                    return Err(BytecodeError::symbol_out_of_range(
                        "variable index is not in scope",
                        format!("index {index} with {} open scopes", self.scope_depth),
                    ));
                }
                self.write_opcode(OpCode::Variable)?;
                self.stream.write_u32_vbr(index)
            }
            ExprKind::VarDecl(decl) => {
                self.traverse_opt(&decl.definition)?;
                self.write_opcode(OpCode::VarDecl)?;
                self.stream
                    .write_bits32(u32::from(decl.kind.as_raw()), VARIABLE_KIND_BITS)?;
                self.stream.write_str(&decl.name)
            }
            ExprKind::Function(fun) => {
                self.expect_kind(&fun.param, OpCode::VarDecl, "function parameter")?;
                self.traverse(&fun.param)?;
                self.enter_scope()?;
                self.traverse(&fun.body)?;
                self.exit_scope()?;
                self.write_opcode(OpCode::Function)
            }
            ExprKind::Code(code) => {
                self.traverse_opt(&code.return_type)?;
                self.traverse_opt(&code.body)?;
                self.write_opcode(OpCode::Code)?;
                self.stream
                    .write_bits32(u32::from(code.conv.as_raw()), CALLING_CONVENTION_BITS)
            }
            ExprKind::Field(field) => {
                self.traverse(&field.range)?;
                self.traverse(&field.body)?;
                self.write_opcode(OpCode::Field)
            }
            ExprKind::Slot(slot) => {
                self.traverse(&slot.definition)?;
                self.write_opcode(OpCode::Slot)?;
                self.stream.write_str(&slot.name)
            }
            ExprKind::Record(record) => {
                for slot in &record.slots {
                    self.expect_kind(slot, OpCode::Slot, "record member")?;
                    self.traverse(slot)?;
                }
                self.write_opcode(OpCode::Record)?;
                self.stream.write_u32_vbr(record.slots.len() as u32)
            }
            ExprKind::Array(array) => {
                for element in &array.elements {
                    self.traverse(element)?;
                }
                self.write_opcode(OpCode::Array)?;
                self.stream.write_u32_vbr(array.elements.len() as u32)
            }
            ExprKind::ScalarType(scalar) => {
                self.write_opcode(OpCode::ScalarType)?;
                self.write_base_type(scalar.base_type)
            }
            ExprKind::Cfg(cfg) => self.reduce_cfg(cfg),
            ExprKind::InstrRef(id) => {
                let cfg = self.cfg.ok_or_else(|| {
                    BytecodeError::unserializable(
                        "weak instruction reference outside a CFG",
                        format!("instruction {}", id.value()),
                    )
                })?;
                if id.value() >= cfg.num_instrs {
                    return Err(BytecodeError::symbol_out_of_range(
                        "weak instruction reference is out of range",
                        format!("instruction {} of {}", id.value(), cfg.num_instrs),
                    ));
                }
                self.write_opcode(OpCode::WeakInstrRef)?;
                self.stream.write_u32_vbr(id.value())
            }
            ExprKind::Apply(apply) => {
                self.traverse(&apply.fun)?;
                self.traverse_opt(&apply.arg)?;
                self.write_opcode(OpCode::Apply)?;
                self.stream
                    .write_bits32(u32::from(apply.kind.as_raw()), APPLY_KIND_BITS)
            }
            ExprKind::Project(project) => {
                self.traverse(&project.record)?;
                self.write_opcode(OpCode::Project)?;
                self.stream.write_str(&project.slot_name)
            }
            ExprKind::Call(call) => {
                self.traverse(&call.target)?;
                self.write_opcode(OpCode::Call)
            }
            ExprKind::Alloc(alloc) => {
                self.traverse(&alloc.init)?;
                self.write_opcode(OpCode::Alloc)?;
                self.stream
                    .write_bits32(u32::from(alloc.kind.as_raw()), ALLOC_KIND_BITS)
            }
            ExprKind::Load(load) => {
                self.traverse(&load.pointer)?;
                self.write_opcode(OpCode::Load)
            }
            ExprKind::Store(store) => {
                self.traverse(&store.dest)?;
                self.traverse(&store.value)?;
                self.write_opcode(OpCode::Store)
            }
            ExprKind::ArrayIndex(index) => {
                self.traverse(&index.array)?;
                self.traverse(&index.index)?;
                self.write_opcode(OpCode::ArrayIndex)
            }
            ExprKind::ArrayAdd(add) => {
                self.traverse(&add.array)?;
                self.traverse(&add.index)?;
                self.write_opcode(OpCode::ArrayAdd)
            }
            ExprKind::UnaryOp(unary) => {
                self.traverse(&unary.operand)?;
                self.write_opcode(OpCode::UnaryOp)?;
                self.stream
                    .write_bits32(u32::from(unary.op.as_raw()), OPERATOR_BITS)?;
                self.write_base_type(unary.base_type)
            }
            ExprKind::BinaryOp(binary) => {
                self.traverse(&binary.lhs)?;
                self.traverse(&binary.rhs)?;
                self.write_opcode(OpCode::BinaryOp)?;
                self.stream
                    .write_bits32(u32::from(binary.op.as_raw()), OPERATOR_BITS)?;
                self.write_base_type(binary.base_type)
            }
            ExprKind::Cast(cast) => {
                self.traverse(&cast.operand)?;
                self.write_opcode(OpCode::Cast)?;
                self.stream
                    .write_bits32(u32::from(cast.op.as_raw()), OPERATOR_BITS)?;
                self.write_base_type(cast.base_type)
            }
            ExprKind::Phi(phi) => {
                for value in &phi.values {
                    self.traverse(value)?;
                }
                self.write_opcode(OpCode::Phi)?;
                self.stream.write_u32_vbr(phi.values.len() as u32)
            }
            ExprKind::Goto(goto) => {
                self.check_block_target(goto.target.value())?;
                self.write_opcode(OpCode::Goto)?;
                self.stream.write_u32_vbr(goto.target.value())
            }
            ExprKind::Branch(branch) => {
                self.traverse(&branch.condition)?;
                self.check_block_target(branch.then_block.value())?;
                self.check_block_target(branch.else_block.value())?;
                self.write_opcode(OpCode::Branch)?;
                self.stream.write_u32_vbr(branch.then_block.value())?;
                self.stream.write_u32_vbr(branch.else_block.value())
            }
            ExprKind::Switch(switch) => {
                self.traverse(&switch.condition)?;
                for case in &switch.cases {
                    self.traverse(&case.label)?;
                }
                self.write_opcode(OpCode::Switch)?;
                self.stream.write_u32_vbr(switch.cases.len() as u32)?;
                for case in &switch.cases {
                    self.check_block_target(case.target.value())?;
                    self.stream.write_u32_vbr(case.target.value())?;
                }
                Ok(())
            }
            ExprKind::Return(ret) => {
                self.traverse(&ret.value)?;
                self.write_opcode(OpCode::Return)
            }
            ExprKind::Undefined => self.write_opcode(OpCode::Undefined),
            ExprKind::Wildcard => self.write_opcode(OpCode::Wildcard),
            ExprKind::Identifier(ident) => {
                self.write_opcode(OpCode::Identifier)?;
                self.stream.write_str(&ident.name)
            }
            ExprKind::Let(binding) => {
                self.expect_kind(&binding.decl, OpCode::VarDecl, "let binding")?;
                self.traverse(&binding.decl)?;
                self.enter_scope()?;
                self.traverse(&binding.body)?;
                self.exit_scope()?;
                self.write_opcode(OpCode::Let)
            }
            ExprKind::IfThenElse(ite) => {
                self.traverse(&ite.condition)?;
                self.traverse(&ite.then_expr)?;
                self.traverse(&ite.else_expr)?;
                self.write_opcode(OpCode::IfThenElse)
            }
        }
    }

    fn reduce_cfg(&mut self, cfg: &Cfg) -> Result<(), BytecodeError> {
        if self.cfg.is_some() {
            return Err(BytecodeError::unserializable(
                "nested CFGs are not representable in the stream",
                "serialize the inner graph behind a code abstraction boundary",
            ));
        }
        let num_blocks = cfg.blocks.len() as u32;
        let num_instrs = cfg.instr_count();
        self.write_opcode(OpCode::EnterCfg)?;
        self.stream.write_u32_vbr(num_blocks)?;
        self.stream.write_u32_vbr(num_instrs)?;
        self.stream.end_atom()?;
        self.cfg = Some(CfgWriteState {
            num_blocks,
            num_instrs,
        });

        for block in &cfg.blocks {
            self.write_opcode(OpCode::EnterBlock)?;
            self.stream.write_u32_vbr(block.args.len() as u32)?;
            self.stream.write_u32_vbr(block.instrs.len() as u32)?;
            self.stream.end_atom()?;
            for arg in &block.args {
                self.expect_kind(arg, OpCode::Phi, "block argument")?;
                self.traverse(arg)?;
                self.write_opcode(OpCode::BBArgument)?;
                self.stream.end_atom()?;
            }
            for instr in &block.instrs {
                if instr.is_terminator() {
                    return Err(BytecodeError::unserializable(
                        "terminator in block instruction list",
                        format!("got {}", instr.opcode().name()),
                    ));
                }
                self.traverse(instr)?;
                self.write_opcode(OpCode::BBInstruction)?;
                self.stream.end_atom()?;
            }
            if !block.terminator.is_terminator() {
                return Err(BytecodeError::unserializable(
                    "block does not end in a terminator",
                    format!("got {}", block.terminator.opcode().name()),
                ));
            }
            self.traverse(&block.terminator)?;
            self.write_opcode(OpCode::BasicBlock)?;
            self.stream.end_atom()?;
        }

        self.cfg = None;
        self.write_opcode(OpCode::Cfg)
    }

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    fn write_annotation(&mut self, ann: &Annotation) -> Result<(), BytecodeError> {
        match ann {
            Annotation::InstrName(name) => {
                self.write_opcode(OpCode::Annotation)?;
                self.write_ann_kind(ann)?;
                self.stream.write_str(name)?;
            }
            Annotation::SourceLoc(position) => {
                self.write_opcode(OpCode::Annotation)?;
                self.write_ann_kind(ann)?;
                self.stream.write_u64_vbr(*position)?;
            }
            Annotation::Precondition(condition) => {
                // Emit the condition first so it sits on the reader's
                // stack when the annotation atom arrives.
                self.traverse(condition)?;
                self.write_opcode(OpCode::Annotation)?;
                self.write_ann_kind(ann)?;
            }
        }
        self.stream.end_atom()
    }

    fn write_ann_kind(&mut self, ann: &Annotation) -> Result<(), BytecodeError> {
        self.stream
            .write_bits32(u32::from(ann.ann_kind().as_raw()), ANN_KIND_BITS)
    }

    // -----------------------------------------------------------------------
    // Field helpers
    // -----------------------------------------------------------------------

    fn write_opcode(&mut self, op: OpCode) -> Result<(), BytecodeError> {
        self.stream.write_bits32(u32::from(op.as_raw()), OPCODE_BITS)
    }

    fn write_base_type(&mut self, base_type: BaseType) -> Result<(), BytecodeError> {
        self.stream.write_u8(base_type.as_raw())?;
        if base_type.has_vector_width() {
            self.stream.write_u8(base_type.vect_size)?;
        }
        Ok(())
    }

    fn write_literal_value(&mut self, value: &LiteralValue) -> Result<(), BytecodeError> {
        match value {
            LiteralValue::Bool(v) => self.stream.write_bool(*v),
            LiteralValue::U8(v) => self.stream.write_u8(*v),
            LiteralValue::U16(v) => self.stream.write_u16(*v),
            LiteralValue::U32(v) => self.stream.write_u32(*v),
            LiteralValue::U64(v) => self.stream.write_u64(*v),
            LiteralValue::I8(v) => self.stream.write_i8(*v),
            LiteralValue::I16(v) => self.stream.write_i16(*v),
            LiteralValue::I32(v) => self.stream.write_i32(*v),
            LiteralValue::I64(v) => self.stream.write_i64(*v),
            LiteralValue::F32(v) => self.stream.write_f32(*v),
            LiteralValue::F64(v) => self.stream.write_f64(*v),
            LiteralValue::Str(v) => self.stream.write_str(v),
            // The null check ran before the opcode was written.
            LiteralValue::Ptr(_) => Ok(()),
        }
    }

    fn enter_scope(&mut self) -> Result<(), BytecodeError> {
        self.write_opcode(OpCode::EnterScope)?;
        self.stream.end_atom()?;
        self.scope_depth += 1;
        Ok(())
    }

    fn exit_scope(&mut self) -> Result<(), BytecodeError> {
        self.write_opcode(OpCode::ExitScope)?;
        self.stream.end_atom()?;
        self.scope_depth -= 1;
        Ok(())
    }

    fn check_block_target(&self, target: u32) -> Result<(), BytecodeError> {
        let cfg = self.cfg.ok_or_else(|| {
            BytecodeError::unserializable(
                "terminator outside a CFG",
                format!("target block {target}"),
            )
        })?;
        if target >= cfg.num_blocks {
            return Err(BytecodeError::symbol_out_of_range(
                "terminator target is out of range",
                format!("block {target} of {}", cfg.num_blocks),
            ));
        }
        Ok(())
    }

    fn expect_kind(
        &self,
        expr: &SExpr,
        expected: OpCode,
        what: &str,
    ) -> Result<(), BytecodeError> {
        if expr.opcode() != expected {
            return Err(BytecodeError::unserializable(
                format!("{what} has the wrong node kind"),
                format!("expected {}, got {}", expected.name(), expr.opcode().name()),
            ));
        }
        Ok(())
    }
}
