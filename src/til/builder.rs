//! Construction helpers with scope and control-flow bookkeeping.

use crate::til::error::TilError;
use crate::til::expr::{BasicBlock, Cfg, ExprKind, Function, Let, Record, SExpr, VarDecl};
use crate::til::ids::{BlockId, InstrId, VarIndex};
use crate::til::ops::VariableKind;

// ---------------------------------------------------------------------------
// Expression builder
// ---------------------------------------------------------------------------

/// Builds expressions while tracking the lexical scope stack.
///
/// Scope entries are numbered in declaration order starting at 1, the
/// same numbering variable references carry on the wire; index 0 is
/// reserved for "no variable".
#[derive(Debug, Default, Clone)]
pub struct Builder {
    scopes: Vec<String>,
}

impl Builder {
    /// Creates a builder with no open scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open scopes.
    pub fn scope_depth(&self) -> u32 {
        self.scopes.len() as u32
    }

    /// Opens the scope of a named declaration and returns its 1-based index.
    pub fn enter_scope(&mut self, name: impl Into<String>) -> VarIndex {
        self.scopes.push(name.into());
        VarIndex::new(self.scopes.len() as u32)
    }

    /// Closes the innermost scope.
    pub fn exit_scope(&mut self) -> Result<(), TilError> {
        if self.scopes.pop().is_none() {
            return Err(TilError::scope_underflow(
                "scope exited with no scope open",
            ));
        }
        Ok(())
    }

    /// Builds a variable reference, validating the index is in scope.
    pub fn variable(&self, index: VarIndex) -> Result<SExpr, TilError> {
        if index.value() == 0 || index.value() > self.scope_depth() {
            return Err(TilError::index_out_of_range(
                "variable index is not in scope",
                format!(
                    "index {} with {} open scopes",
                    index.value(),
                    self.scope_depth()
                ),
            ));
        }
        Ok(SExpr::variable(index.value()))
    }

    /// Builds a variable declaration node.
    pub fn var_decl(
        &self,
        kind: VariableKind,
        name: impl Into<String>,
        definition: Option<SExpr>,
    ) -> SExpr {
        SExpr::new(ExprKind::VarDecl(Box::new(VarDecl {
            kind,
            name: name.into(),
            definition,
        })))
    }

    /// Builds a function node, validating the parameter is a declaration.
    pub fn function(&self, param: SExpr, body: SExpr) -> Result<SExpr, TilError> {
        expect_var_decl(&param, "function parameter")?;
        Ok(SExpr::new(ExprKind::Function(Box::new(Function {
            param,
            body,
        }))))
    }

    /// Builds a let node, validating the binding is a declaration.
    pub fn let_in(&self, decl: SExpr, body: SExpr) -> Result<SExpr, TilError> {
        expect_var_decl(&decl, "let binding")?;
        Ok(SExpr::new(ExprKind::Let(Box::new(Let { decl, body }))))
    }

    /// Builds a record node, validating every member is a slot.
    pub fn record(&self, slots: Vec<SExpr>) -> Result<SExpr, TilError> {
        for (i, slot) in slots.iter().enumerate() {
            if !matches!(slot.kind, ExprKind::Slot(_)) {
                return Err(TilError::kind_mismatch(
                    "record member is not a slot",
                    format!("member {i} is {}", slot.opcode().name()),
                ));
            }
        }
        Ok(SExpr::new(ExprKind::Record(Record { slots })))
    }
}

fn expect_var_decl(expr: &SExpr, what: &str) -> Result<(), TilError> {
    if !matches!(expr.kind, ExprKind::VarDecl(_)) {
        return Err(TilError::kind_mismatch(
            format!("{what} is not a variable declaration"),
            format!("got {}", expr.opcode().name()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Control-flow graph builder
// ---------------------------------------------------------------------------

/// Assembles a [`Cfg`] with dense block and instruction ids.
///
/// Blocks are declared up front so terminators can name blocks that are
/// filled later, then filled strictly in declaration order. Instruction
/// ids count every block argument and instruction in emission order.
#[derive(Debug, Default, Clone)]
pub struct CfgBuilder {
    declared: u32,
    filled: Vec<BasicBlock>,
    pending: Option<PendingBlock>,
    next_instr: u32,
}

#[derive(Debug, Clone, Default)]
struct PendingBlock {
    args: Vec<SExpr>,
    instrs: Vec<SExpr>,
}

impl CfgBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the next block and returns its id.
    pub fn declare_block(&mut self) -> BlockId {
        let id = BlockId::new(self.declared);
        self.declared += 1;
        id
    }

    /// Number of declared blocks.
    pub fn declared_blocks(&self) -> u32 {
        self.declared
    }

    /// Instruction ids assigned so far.
    pub fn instr_count(&self) -> u32 {
        self.next_instr
    }

    /// Starts filling the next declared block, in declaration order.
    pub fn begin_block(&mut self) -> Result<BlockId, TilError> {
        if self.pending.is_some() {
            return Err(TilError::block_discipline(
                "block started while another block is open",
                format!("open block {}", self.filled.len()),
            ));
        }
        if self.filled.len() as u32 >= self.declared {
            return Err(TilError::block_discipline(
                "more blocks filled than declared",
                format!("declared {}", self.declared),
            ));
        }
        self.pending = Some(PendingBlock::default());
        Ok(BlockId::new(self.filled.len() as u32))
    }

    /// Appends a phi argument to the open block and numbers it.
    pub fn add_arg(&mut self, phi: SExpr) -> Result<InstrId, TilError> {
        if !matches!(phi.kind, ExprKind::Phi(_)) {
            return Err(TilError::kind_mismatch(
                "block argument is not a phi",
                format!("got {}", phi.opcode().name()),
            ));
        }
        let pending = self.open_block("argument added")?;
        if !pending.instrs.is_empty() {
            return Err(TilError::block_discipline(
                "block argument added after instructions",
                format!("{} instructions already present", pending.instrs.len()),
            ));
        }
        pending.args.push(phi);
        Ok(self.assign_instr_id())
    }

    /// Appends an instruction to the open block and numbers it.
    pub fn add_instr(&mut self, instr: SExpr) -> Result<InstrId, TilError> {
        if instr.is_terminator() {
            return Err(TilError::kind_mismatch(
                "terminator used as block instruction",
                format!("got {}", instr.opcode().name()),
            ));
        }
        let pending = self.open_block("instruction added")?;
        pending.instrs.push(instr);
        Ok(self.assign_instr_id())
    }

    /// Closes the open block with a terminator.
    pub fn end_block(&mut self, terminator: SExpr) -> Result<(), TilError> {
        if !terminator.is_terminator() {
            return Err(TilError::kind_mismatch(
                "block closed without a terminator",
                format!("got {}", terminator.opcode().name()),
            ));
        }
        let Some(pending) = self.pending.take() else {
            return Err(TilError::block_discipline(
                "block closed with no block open",
                "call begin_block first",
            ));
        };
        self.filled.push(BasicBlock {
            args: pending.args,
            instrs: pending.instrs,
            terminator,
        });
        Ok(())
    }

    /// Finishes the graph, validating fill state and terminator targets.
    pub fn finish(self) -> Result<Cfg, TilError> {
        if self.pending.is_some() {
            return Err(TilError::block_discipline(
                "graph finished with an open block",
                format!("block {} is unterminated", self.filled.len()),
            ));
        }
        if self.filled.len() as u32 != self.declared {
            return Err(TilError::block_discipline(
                "graph finished with unfilled blocks",
                format!("declared {}, filled {}", self.declared, self.filled.len()),
            ));
        }
        for (i, block) in self.filled.iter().enumerate() {
            for target in terminator_targets(&block.terminator) {
                if target.value() >= self.declared {
                    return Err(TilError::index_out_of_range(
                        "terminator target is out of range",
                        format!(
                            "block {i} targets block {} of {}",
                            target.value(),
                            self.declared
                        ),
                    ));
                }
            }
        }
        Ok(Cfg {
            blocks: self.filled,
        })
    }

    fn open_block(&mut self, action: &str) -> Result<&mut PendingBlock, TilError> {
        self.pending.as_mut().ok_or_else(|| {
            TilError::block_discipline(
                format!("{action} with no block open"),
                "call begin_block first",
            )
        })
    }

    fn assign_instr_id(&mut self) -> InstrId {
        let id = InstrId::new(self.next_instr);
        self.next_instr += 1;
        id
    }
}

fn terminator_targets(terminator: &SExpr) -> Vec<BlockId> {
    match &terminator.kind {
        ExprKind::Goto(goto) => vec![goto.target],
        ExprKind::Branch(branch) => vec![branch.then_block, branch.else_block],
        ExprKind::Switch(switch) => switch.cases.iter().map(|c| c.target).collect(),
        _ => Vec::new(),
    }
}
