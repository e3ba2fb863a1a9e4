//! Property-based round-trip tests over generated expression trees.

use proptest::prelude::*;
use tilbc::bytecode::{read_expr, write_expr};
use tilbc::til::{
    Annotation, Array, BaseKind, BaseType, BinaryOp, BinaryOpcode, Call, ExprKind, IfThenElse,
    LiteralValue, Load, Project, SExpr, SizeClass, Store, UnaryOp, UnaryOpcode,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_literal() -> impl Strategy<Value = SExpr> {
    prop_oneof![
        any::<bool>().prop_map(|v| SExpr::literal(LiteralValue::Bool(v))),
        any::<u8>().prop_map(|v| SExpr::literal(LiteralValue::U8(v))),
        any::<u16>().prop_map(|v| SExpr::literal(LiteralValue::U16(v))),
        any::<u32>().prop_map(|v| SExpr::literal(LiteralValue::U32(v))),
        any::<u64>().prop_map(|v| SExpr::literal(LiteralValue::U64(v))),
        any::<i8>().prop_map(|v| SExpr::literal(LiteralValue::I8(v))),
        any::<i16>().prop_map(|v| SExpr::literal(LiteralValue::I16(v))),
        any::<i32>().prop_map(|v| SExpr::literal(LiteralValue::I32(v))),
        any::<i64>().prop_map(|v| SExpr::literal(LiteralValue::I64(v))),
        // Floats come from integers so generated values compare equal
        // to themselves after the trip.
        any::<i16>().prop_map(|v| SExpr::literal(LiteralValue::F32(f32::from(v)))),
        any::<i32>().prop_map(|v| SExpr::literal(LiteralValue::F64(f64::from(v)))),
        "[a-z ]{0,24}".prop_map(|v| SExpr::literal(LiteralValue::Str(v))),
        Just(SExpr::literal(LiteralValue::Ptr(0))),
    ]
}

fn arb_leaf() -> impl Strategy<Value = SExpr> {
    prop_oneof![
        4 => arb_literal(),
        1 => Just(SExpr::new(ExprKind::Undefined)),
        1 => Just(SExpr::new(ExprKind::Wildcard)),
        1 => "[a-z_]{1,12}".prop_map(SExpr::identifier),
    ]
}

fn i32_type() -> BaseType {
    BaseType::new(BaseKind::Int, SizeClass::S32)
}

fn arb_expr() -> impl Strategy<Value = SExpr> {
    arb_leaf().prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(lhs, rhs)| {
                SExpr::new(ExprKind::BinaryOp(Box::new(BinaryOp {
                    op: BinaryOpcode::Add,
                    base_type: i32_type(),
                    lhs,
                    rhs,
                })))
            }),
            inner.clone().prop_map(|operand| {
                SExpr::new(ExprKind::UnaryOp(Box::new(UnaryOp {
                    op: UnaryOpcode::Minus,
                    base_type: i32_type(),
                    operand,
                })))
            }),
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|elements| SExpr::new(ExprKind::Array(Array { elements }))),
            inner.clone().prop_map(|pointer| {
                SExpr::new(ExprKind::Load(Box::new(Load { pointer })))
            }),
            (inner.clone(), inner.clone()).prop_map(|(dest, value)| {
                SExpr::new(ExprKind::Store(Box::new(Store { dest, value })))
            }),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(
                |(condition, then_expr, else_expr)| {
                    SExpr::new(ExprKind::IfThenElse(Box::new(IfThenElse {
                        condition,
                        then_expr,
                        else_expr,
                    })))
                }
            ),
            inner.clone().prop_map(|target| {
                SExpr::new(ExprKind::Call(Box::new(Call { target })))
            }),
            (inner, "[a-z]{1,8}").prop_map(|(record, slot_name)| {
                SExpr::new(ExprKind::Project(Box::new(Project { record, slot_name })))
            }),
        ]
    })
}

fn arb_annotation() -> impl Strategy<Value = Annotation> {
    prop_oneof![
        "[a-z0-9_]{1,16}".prop_map(Annotation::InstrName),
        any::<u64>().prop_map(Annotation::SourceLoc),
        arb_literal().prop_map(|expr| Annotation::Precondition(Box::new(expr))),
    ]
}

fn arb_annotated_expr() -> impl Strategy<Value = SExpr> {
    (arb_expr(), prop::collection::vec(arb_annotation(), 0..3)).prop_map(|(mut expr, anns)| {
        for ann in anns {
            expr = expr.annotate(ann);
        }
        expr
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn generated_expressions_round_trip(expr in arb_annotated_expr()) {
        let bytes = write_expr(&expr).expect("serialization should succeed");
        let back = read_expr(&bytes).expect("deserialization should succeed");
        prop_assert_eq!(back, expr);
    }

    #[test]
    fn serialization_is_deterministic(expr in arb_annotated_expr()) {
        let first = write_expr(&expr).expect("first serialization should succeed");
        let second = write_expr(&expr).expect("second serialization should succeed");
        prop_assert_eq!(first, second);
    }
}
