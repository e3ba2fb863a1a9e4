//! Builder contracts: scope bookkeeping and graph assembly rules.

use tilbc::til::{
    Builder, CfgBuilder, ExprKind, Goto, LiteralValue, Return, SExpr, TilErrorKind, VarIndex,
    VariableKind,
};
use tilbc::til::BlockId;

fn lit(value: i32) -> SExpr {
    SExpr::literal(LiteralValue::I32(value))
}

fn goto(target: u32) -> SExpr {
    SExpr::new(ExprKind::Goto(Goto {
        target: BlockId::new(target),
    }))
}

fn ret(value: SExpr) -> SExpr {
    SExpr::new(ExprKind::Return(Box::new(Return { value })))
}

fn phi() -> SExpr {
    SExpr::new(ExprKind::Phi(tilbc::til::Phi { values: vec![lit(0)] }))
}

// ===========================================================================
// 1. Scope bookkeeping
// ===========================================================================

#[test]
fn scope_indices_count_from_one() {
    let mut builder = Builder::new();
    assert_eq!(builder.enter_scope("a"), VarIndex::new(1));
    assert_eq!(builder.enter_scope("b"), VarIndex::new(2));
    assert_eq!(builder.scope_depth(), 2);
    builder.exit_scope().expect("exit");
    assert_eq!(builder.enter_scope("c"), VarIndex::new(2));
}

#[test]
fn scope_underflow_is_an_error() {
    let mut builder = Builder::new();
    let err = builder.exit_scope().expect_err("underflow must fail");
    assert_eq!(err.kind, TilErrorKind::ScopeUnderflow);
}

#[test]
fn variable_references_validate_against_open_scopes() {
    let mut builder = Builder::new();
    builder.enter_scope("x");

    builder.variable(VarIndex::new(1)).expect("in range");
    let err = builder
        .variable(VarIndex::new(2))
        .expect_err("beyond depth must fail");
    assert_eq!(err.kind, TilErrorKind::IndexOutOfRange);
    let err = builder
        .variable(VarIndex::new(0))
        .expect_err("reserved index must fail");
    assert_eq!(err.kind, TilErrorKind::IndexOutOfRange);
}

#[test]
fn composite_constructors_check_kinds() {
    let builder = Builder::new();
    let decl = builder.var_decl(VariableKind::Fun, "p", None);

    builder.function(decl.clone(), lit(1)).expect("function");
    let err = builder
        .function(lit(0), lit(1))
        .expect_err("non-declaration parameter must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);

    let err = builder
        .let_in(lit(0), lit(1))
        .expect_err("non-declaration binding must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);

    let err = builder
        .record(vec![lit(1)])
        .expect_err("non-slot member must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);
}

// ===========================================================================
// 2. Graph assembly
// ===========================================================================

#[test]
fn blocks_fill_in_declaration_order_with_dense_ids() {
    let mut builder = CfgBuilder::new();
    let b0 = builder.declare_block();
    let b1 = builder.declare_block();
    assert_eq!(b0, BlockId::new(0));
    assert_eq!(b1, BlockId::new(1));

    assert_eq!(builder.begin_block().expect("begin"), b0);
    assert_eq!(builder.add_arg(phi()).expect("arg").value(), 0);
    assert_eq!(builder.add_instr(lit(1)).expect("instr").value(), 1);
    builder.end_block(goto(1)).expect("end");

    assert_eq!(builder.begin_block().expect("begin"), b1);
    assert_eq!(builder.add_instr(lit(2)).expect("instr").value(), 2);
    builder.end_block(ret(lit(3))).expect("end");

    let graph = builder.finish().expect("finish");
    assert_eq!(graph.blocks.len(), 2);
    assert_eq!(graph.instr_count(), 3);
}

#[test]
fn unfilled_blocks_fail_finish() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.declare_block();
    builder.begin_block().expect("begin");
    builder.end_block(ret(lit(0))).expect("end");

    let err = builder.finish().expect_err("unfilled block must fail");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
}

#[test]
fn open_block_fails_finish() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.begin_block().expect("begin");

    let err = builder.finish().expect_err("open block must fail");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
}

#[test]
fn target_out_of_range_fails_finish() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.begin_block().expect("begin");
    builder.end_block(goto(9)).expect("end");

    let err = builder.finish().expect_err("bad target must fail");
    assert_eq!(err.kind, TilErrorKind::IndexOutOfRange);
}

#[test]
fn arguments_precede_instructions() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.begin_block().expect("begin");
    builder.add_instr(lit(1)).expect("instr");

    let err = builder.add_arg(phi()).expect_err("late argument must fail");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
}

#[test]
fn member_kinds_are_checked() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.begin_block().expect("begin");

    let err = builder.add_arg(lit(1)).expect_err("non-phi argument must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);
    let err = builder
        .add_instr(goto(0))
        .expect_err("terminator instruction must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);
    let err = builder
        .end_block(lit(1))
        .expect_err("non-terminator close must fail");
    assert_eq!(err.kind, TilErrorKind::KindMismatch);
}

#[test]
fn block_operations_require_an_open_block() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();

    let err = builder.add_instr(lit(1)).expect_err("no open block");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
    let err = builder.end_block(ret(lit(0))).expect_err("no open block");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
}

#[test]
fn beginning_past_the_declaration_count_fails() {
    let mut builder = CfgBuilder::new();
    builder.declare_block();
    builder.begin_block().expect("begin");
    builder.end_block(ret(lit(0))).expect("end");

    let err = builder.begin_block().expect_err("over-fill must fail");
    assert_eq!(err.kind, TilErrorKind::BlockDiscipline);
}
