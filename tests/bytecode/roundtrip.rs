use tilbc::bytecode::{read_expr, write_expr};
use tilbc::til::{
    Alloc, AllocKind, Annotation, Apply, ApplyKind, Array, ArrayAdd, ArrayIndex, BaseKind,
    BaseType, BasicBlock, BinaryOp, BinaryOpcode, Branch, Call, CallingConvention, Cast,
    CastOpcode, Cfg, Code, ExprKind, Field, Function, Goto, IfThenElse, Let, LiteralValue, Load,
    Phi, Project, Record, Return, SExpr, ScalarType, SizeClass, Slot, Store, Switch, SwitchCase,
    UnaryOp, UnaryOpcode, VarDecl, VariableKind,
};
use tilbc::til::{BlockId, InstrId, VarIndex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roundtrip(expr: &SExpr) -> SExpr {
    let bytes = write_expr(expr).expect("serialization should succeed");
    read_expr(&bytes).expect("deserialization should succeed")
}

fn assert_roundtrip(expr: SExpr) {
    assert_eq!(roundtrip(&expr), expr);
}

fn lit_i32(value: i32) -> SExpr {
    SExpr::literal(LiteralValue::I32(value))
}

fn lit_bool(value: bool) -> SExpr {
    SExpr::literal(LiteralValue::Bool(value))
}

fn i32_type() -> BaseType {
    BaseType::new(BaseKind::Int, SizeClass::S32)
}

fn add(lhs: SExpr, rhs: SExpr) -> SExpr {
    SExpr::new(ExprKind::BinaryOp(Box::new(BinaryOp {
        op: BinaryOpcode::Add,
        base_type: i32_type(),
        lhs,
        rhs,
    })))
}

fn param(name: &str) -> SExpr {
    SExpr::new(ExprKind::VarDecl(Box::new(VarDecl {
        kind: VariableKind::Fun,
        name: name.to_string(),
        definition: None,
    })))
}

fn function(param_decl: SExpr, body: SExpr) -> SExpr {
    SExpr::new(ExprKind::Function(Box::new(Function {
        param: param_decl,
        body,
    })))
}

fn goto(target: u32) -> SExpr {
    SExpr::new(ExprKind::Goto(Goto {
        target: BlockId::new(target),
    }))
}

fn ret(value: SExpr) -> SExpr {
    SExpr::new(ExprKind::Return(Box::new(Return { value })))
}

fn phi(values: Vec<SExpr>) -> SExpr {
    SExpr::new(ExprKind::Phi(Phi { values }))
}

fn cfg(blocks: Vec<BasicBlock>) -> SExpr {
    SExpr::new(ExprKind::Cfg(Cfg { blocks }))
}

// ===========================================================================
// 1. Literals of every base type
// ===========================================================================

#[test]
fn literals_of_every_base_type_round_trip() {
    let values = vec![
        LiteralValue::Bool(true),
        LiteralValue::Bool(false),
        LiteralValue::U8(0xFE),
        LiteralValue::U16(0xBEEF),
        LiteralValue::U32(0xDEAD_BEEF),
        LiteralValue::U64(u64::MAX),
        LiteralValue::I8(-1),
        LiteralValue::I16(i16::MIN),
        LiteralValue::I32(i32::MIN),
        LiteralValue::I64(i64::MIN),
        LiteralValue::F32(3.25),
        LiteralValue::F64(-1.5e200),
        LiteralValue::Str(String::new()),
        LiteralValue::Str("a string literal".to_string()),
        LiteralValue::Ptr(0),
    ];
    for value in values {
        assert_roundtrip(SExpr::literal(value));
    }
}

#[test]
fn extreme_unsigned_literals_round_trip() {
    for value in [0u32, 1, 127, 128, (1 << 14) - 1, 1 << 21, 1 << 28, u32::MAX] {
        assert_roundtrip(SExpr::literal(LiteralValue::U32(value)));
    }
    for value in [0u64, 1 << 32, 1 << 56, 1 << 63, u64::MAX] {
        assert_roundtrip(SExpr::literal(LiteralValue::U64(value)));
    }
}

// ===========================================================================
// 2. Operator flavors
// ===========================================================================

#[test]
fn every_unary_flavor_round_trips() {
    let flavors = [UnaryOpcode::Minus, UnaryOpcode::BitNot, UnaryOpcode::LogicNot];
    for op in flavors {
        assert_roundtrip(SExpr::new(ExprKind::UnaryOp(Box::new(UnaryOp {
            op,
            base_type: i32_type(),
            operand: lit_i32(7),
        }))));
    }
}

#[test]
fn every_binary_flavor_round_trips() {
    let flavors = [
        BinaryOpcode::Add,
        BinaryOpcode::Sub,
        BinaryOpcode::Mul,
        BinaryOpcode::Div,
        BinaryOpcode::Rem,
        BinaryOpcode::Shl,
        BinaryOpcode::Shr,
        BinaryOpcode::BitAnd,
        BinaryOpcode::BitXor,
        BinaryOpcode::BitOr,
        BinaryOpcode::Eq,
        BinaryOpcode::Neq,
        BinaryOpcode::Lt,
        BinaryOpcode::Leq,
        BinaryOpcode::Gt,
        BinaryOpcode::Geq,
        BinaryOpcode::LogicAnd,
        BinaryOpcode::LogicOr,
    ];
    for op in flavors {
        assert_roundtrip(SExpr::new(ExprKind::BinaryOp(Box::new(BinaryOp {
            op,
            base_type: i32_type(),
            lhs: lit_i32(1),
            rhs: lit_i32(2),
        }))));
    }
}

#[test]
fn every_cast_flavor_round_trips() {
    let flavors = [
        CastOpcode::Extend,
        CastOpcode::Trunc,
        CastOpcode::ToFloat,
        CastOpcode::ToInt,
    ];
    for op in flavors {
        assert_roundtrip(SExpr::new(ExprKind::Cast(Box::new(Cast {
            op,
            base_type: BaseType::new(BaseKind::Float, SizeClass::S64),
            operand: lit_i32(9),
        }))));
    }
}

// ===========================================================================
// 3. Scoped terms
// ===========================================================================

#[test]
fn function_with_variable_reference_round_trips() {
    assert_roundtrip(function(param("x"), SExpr::variable(1)));
}

#[test]
fn nested_scopes_index_from_the_outside_in() {
    let inner = add(SExpr::variable(1), SExpr::variable(2));
    assert_roundtrip(function(param("a"), function(param("b"), inner)));
}

#[test]
fn every_variable_kind_round_trips() {
    let kinds = [VariableKind::Fun, VariableKind::SFun, VariableKind::Let];
    for kind in kinds {
        let decl = SExpr::new(ExprKind::VarDecl(Box::new(VarDecl {
            kind,
            name: "v".to_string(),
            definition: Some(lit_i32(3)),
        })));
        assert_roundtrip(function(decl, SExpr::variable(1)));
    }
}

#[test]
fn let_binding_round_trips() {
    let decl = SExpr::new(ExprKind::VarDecl(Box::new(VarDecl {
        kind: VariableKind::Let,
        name: "bound".to_string(),
        definition: Some(lit_i32(12)),
    })));
    assert_roundtrip(SExpr::new(ExprKind::Let(Box::new(Let {
        decl,
        body: add(SExpr::variable(1), lit_i32(1)),
    }))));
}

#[test]
fn every_calling_convention_round_trips() {
    let convs = [
        CallingConvention::Default,
        CallingConvention::C,
        CallingConvention::Fast,
        CallingConvention::Cold,
    ];
    for conv in convs {
        assert_roundtrip(SExpr::new(ExprKind::Code(Box::new(Code {
            conv,
            return_type: Some(SExpr::new(ExprKind::ScalarType(ScalarType {
                base_type: i32_type(),
            }))),
            body: Some(lit_i32(0)),
        }))));
    }
}

#[test]
fn code_without_body_round_trips() {
    assert_roundtrip(SExpr::new(ExprKind::Code(Box::new(Code {
        conv: CallingConvention::Default,
        return_type: None,
        body: None,
    }))));
}

#[test]
fn identifier_undefined_and_wildcard_round_trip() {
    assert_roundtrip(SExpr::identifier("unresolved_name"));
    assert_roundtrip(SExpr::new(ExprKind::Undefined));
    assert_roundtrip(SExpr::new(ExprKind::Wildcard));
}

#[test]
fn if_then_else_round_trips() {
    assert_roundtrip(SExpr::new(ExprKind::IfThenElse(Box::new(IfThenElse {
        condition: lit_bool(true),
        then_expr: lit_i32(1),
        else_expr: lit_i32(2),
    }))));
}

// ===========================================================================
// 4. Aggregates
// ===========================================================================

#[test]
fn records_round_trip() {
    let slot = |name: &str, value: i32| {
        SExpr::new(ExprKind::Slot(Box::new(Slot {
            name: name.to_string(),
            definition: lit_i32(value),
        })))
    };
    assert_roundtrip(SExpr::new(ExprKind::Record(Record { slots: vec![] })));
    assert_roundtrip(SExpr::new(ExprKind::Record(Record {
        slots: vec![slot("first", 1), slot("second", 2), slot("third", 3)],
    })));
}

#[test]
fn arrays_round_trip() {
    assert_roundtrip(SExpr::new(ExprKind::Array(Array { elements: vec![] })));
    assert_roundtrip(SExpr::new(ExprKind::Array(Array {
        elements: (0..17).map(lit_i32).collect(),
    })));
}

#[test]
fn field_round_trips() {
    assert_roundtrip(SExpr::new(ExprKind::Field(Box::new(Field {
        range: SExpr::new(ExprKind::ScalarType(ScalarType {
            base_type: i32_type(),
        })),
        body: lit_i32(4),
    }))));
}

#[test]
fn scalar_types_round_trip() {
    assert_roundtrip(SExpr::new(ExprKind::ScalarType(ScalarType {
        base_type: BaseType::new(BaseKind::Float, SizeClass::S32),
    })));
    assert_roundtrip(SExpr::new(ExprKind::ScalarType(ScalarType {
        base_type: BaseType::vector(BaseKind::Int, SizeClass::S16, 8),
    })));
}

// ===========================================================================
// 5. Application and memory
// ===========================================================================

#[test]
fn apply_round_trips_with_and_without_argument() {
    assert_roundtrip(SExpr::new(ExprKind::Apply(Box::new(Apply {
        kind: ApplyKind::Apply,
        fun: SExpr::identifier("f"),
        arg: Some(lit_i32(10)),
    }))));
    assert_roundtrip(SExpr::new(ExprKind::Apply(Box::new(Apply {
        kind: ApplyKind::SelfApply,
        fun: SExpr::identifier("self_fun"),
        arg: None,
    }))));
}

#[test]
fn project_and_call_round_trip() {
    let applied = SExpr::new(ExprKind::Apply(Box::new(Apply {
        kind: ApplyKind::Apply,
        fun: SExpr::identifier("f"),
        arg: Some(lit_i32(1)),
    })));
    assert_roundtrip(SExpr::new(ExprKind::Call(Box::new(Call {
        target: applied,
    }))));
    assert_roundtrip(SExpr::new(ExprKind::Project(Box::new(Project {
        record: SExpr::identifier("r"),
        slot_name: "field_a".to_string(),
    }))));
}

#[test]
fn memory_nodes_round_trip() {
    for kind in [AllocKind::Stack, AllocKind::Heap] {
        assert_roundtrip(SExpr::new(ExprKind::Alloc(Box::new(Alloc {
            kind,
            init: lit_i32(0),
        }))));
    }
    let pointer = SExpr::identifier("p");
    assert_roundtrip(SExpr::new(ExprKind::Load(Box::new(Load {
        pointer: pointer.clone(),
    }))));
    assert_roundtrip(SExpr::new(ExprKind::Store(Box::new(Store {
        dest: pointer.clone(),
        value: lit_i32(42),
    }))));
    assert_roundtrip(SExpr::new(ExprKind::ArrayIndex(Box::new(ArrayIndex {
        array: pointer.clone(),
        index: lit_i32(3),
    }))));
    assert_roundtrip(SExpr::new(ExprKind::ArrayAdd(Box::new(ArrayAdd {
        array: pointer,
        index: lit_i32(4),
    }))));
}

// ===========================================================================
// 6. Control-flow graphs
// ===========================================================================

#[test]
fn two_block_goto_graph_round_trips() {
    let entry = BasicBlock {
        args: vec![],
        instrs: vec![add(lit_i32(1), lit_i32(2))],
        terminator: goto(1),
    };
    let exit = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: ret(lit_i32(42)),
    };
    assert_roundtrip(cfg(vec![entry, exit]));
}

#[test]
fn phi_may_reference_a_later_instruction() {
    // The loop-head phi joins an initial value with the increment
    // computed later in the same block, a legal forward reference.
    let head = BasicBlock {
        args: vec![phi(vec![lit_i32(0), SExpr::instr_ref(1)])],
        instrs: vec![add(SExpr::instr_ref(0), lit_i32(1))],
        terminator: SExpr::new(ExprKind::Branch(Box::new(Branch {
            condition: lit_bool(true),
            then_block: BlockId::new(0),
            else_block: BlockId::new(1),
        }))),
    };
    let exit = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: ret(SExpr::instr_ref(0)),
    };
    assert_roundtrip(cfg(vec![head, exit]));
}

#[test]
fn switch_graph_round_trips() {
    let entry = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: SExpr::new(ExprKind::Switch(Box::new(Switch {
            condition: lit_i32(2),
            cases: vec![
                SwitchCase {
                    label: lit_i32(1),
                    target: BlockId::new(1),
                },
                SwitchCase {
                    label: lit_i32(2),
                    target: BlockId::new(2),
                },
            ],
        }))),
    };
    let one = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: ret(lit_i32(10)),
    };
    let two = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: ret(lit_i32(20)),
    };
    assert_roundtrip(cfg(vec![entry, one, two]));
}

#[test]
fn graph_members_keep_their_annotations() {
    let named_phi = phi(vec![lit_i32(1)]).annotate(Annotation::InstrName("p".to_string()));
    let located_add = add(SExpr::instr_ref(0), lit_i32(5))
        .annotate(Annotation::SourceLoc(0x1000));
    let entry = BasicBlock {
        args: vec![named_phi],
        instrs: vec![located_add],
        terminator: goto(1).annotate(Annotation::InstrName("jump".to_string())),
    };
    let exit = BasicBlock {
        args: vec![],
        instrs: vec![],
        terminator: ret(SExpr::instr_ref(1)),
    };
    let graph = cfg(vec![entry, exit]).annotate(Annotation::SourceLoc(7));
    assert_roundtrip(graph);
}

#[test]
fn graph_inside_a_function_round_trips() {
    let body = cfg(vec![BasicBlock {
        args: vec![],
        instrs: vec![add(SExpr::variable(1), lit_i32(1))],
        terminator: ret(SExpr::instr_ref(0)),
    }]);
    assert_roundtrip(function(param("n"), body));
}

// ===========================================================================
// 7. Annotations
// ===========================================================================

#[test]
fn every_annotation_kind_round_trips() {
    assert_roundtrip(lit_i32(1).annotate(Annotation::InstrName("one".to_string())));
    assert_roundtrip(lit_i32(2).annotate(Annotation::SourceLoc(u64::MAX)));
    assert_roundtrip(
        lit_i32(3).annotate(Annotation::Precondition(Box::new(lit_bool(true)))),
    );
}

#[test]
fn annotation_order_is_preserved() {
    let expr = lit_i32(9)
        .annotate(Annotation::InstrName("first".to_string()))
        .annotate(Annotation::SourceLoc(2))
        .annotate(Annotation::InstrName("third".to_string()));
    let back = roundtrip(&expr);
    assert_eq!(back.anns.len(), 3);
    assert_eq!(back, expr);
}

#[test]
fn annotations_on_inner_nodes_stay_attached() {
    let inner = lit_i32(5).annotate(Annotation::InstrName("inner".to_string()));
    let outer = add(inner, lit_i32(6)).annotate(Annotation::InstrName("outer".to_string()));
    assert_roundtrip(outer);
}

// ===========================================================================
// 8. Composites
// ===========================================================================

#[test]
fn deep_operator_chain_round_trips() {
    let mut expr = lit_i32(0);
    for i in 0..256 {
        expr = add(expr, lit_i32(i));
    }
    assert_roundtrip(expr);
}

#[test]
fn representative_program_round_trips() {
    // A function whose body mixes a record, memory traffic, and a
    // two-block graph, with annotations sprinkled across levels.
    let slot = SExpr::new(ExprKind::Slot(Box::new(Slot {
        name: "count".to_string(),
        definition: SExpr::variable(1),
    })));
    let record = SExpr::new(ExprKind::Record(Record { slots: vec![slot] }));
    let store = SExpr::new(ExprKind::Store(Box::new(Store {
        dest: SExpr::identifier("cell"),
        value: record,
    })));
    let graph = cfg(vec![
        BasicBlock {
            args: vec![],
            instrs: vec![store, add(SExpr::variable(1), lit_i32(1))],
            terminator: goto(1),
        },
        BasicBlock {
            args: vec![phi(vec![SExpr::instr_ref(1)])],
            instrs: vec![],
            terminator: ret(SExpr::instr_ref(2)),
        },
    ]);
    let root = function(param("n"), graph)
        .annotate(Annotation::InstrName("entry".to_string()))
        .annotate(Annotation::SourceLoc(99));
    assert_roundtrip(root);
}

// ===========================================================================
// 9. Index sanity
// ===========================================================================

#[test]
fn id_wrappers_expose_raw_values() {
    assert_eq!(VarIndex::new(3).value(), 3);
    assert_eq!(BlockId::new(2).value(), 2);
    assert_eq!(InstrId::new(9).value(), 9);
}
