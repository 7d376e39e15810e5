//! End-to-end pipeline tests for six concrete type-inference and
//! fix-pass scenarios, run through the public `compile` entry point
//! exactly as a downstream backend or the CLI would invoke it.

use smm::ast::{Extra, LiteralValue, NodeKind};
use smm::error::DiagnosticKind;
use smm::types::TypeKind;
use smm::{compile, Stage};
use smm::arena::Arena;

fn first_global_decl<'a>(program: &'a smm::Node<'a>) -> &'a smm::Node<'a> {
    let block = program.next.get().unwrap();
    let Extra::Block { scope, .. } = &block.extra else { unreachable!() };
    scope.scope_decls().unwrap()
}

fn nth_global_decl<'a>(program: &'a smm::Node<'a>, n: usize) -> &'a smm::Node<'a> {
    let mut decl = first_global_decl(program);
    for _ in 0..n {
        decl = decl.decl_next().unwrap();
    }
    decl
}

#[test]
fn scenario_1_int_plus_float_widens_declaration_and_rewrites_literal() {
    let arena = Arena::new("scenario1");
    let unit = compile("x := 1 + 2.5;", "t.smm", &arena, Stage::Fix).unwrap();
    assert!(!unit.sink.has_errors());

    let decl = first_global_decl(unit.program);
    assert_eq!(decl.decl_declared_type().unwrap().kind, TypeKind::Float32);

    let assign = decl.left.get().unwrap();
    let add = assign.right.get().unwrap();
    assert_eq!(add.kind.get(), NodeKind::FAdd);
    assert_eq!(add.ty.get().kind, TypeKind::Float32);

    let one = add.left.get().unwrap();
    assert_eq!(one.literal_value(), Some(LiteralValue::Float(1.0)));
}

#[test]
fn scenario_2_narrowing_int8_truncates_and_warns() {
    let arena = Arena::new("scenario2");
    let unit = compile("x : Int8 = 300;", "t.smm", &arena, Stage::Fix).unwrap();
    assert!(!unit.sink.has_errors());

    let decl = first_global_decl(unit.program);
    assert_eq!(decl.decl_declared_type().unwrap().kind, TypeKind::Int8);

    let assign = decl.left.get().unwrap();
    let lit = assign.right.get().unwrap();
    assert_eq!(lit.literal_value(), Some(LiteralValue::SInt(44)));

    assert!(unit
        .sink
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::ConversionDataLoss { .. })));
}

#[test]
fn scenario_3_signed_unsigned_comparison_widens_to_int64_and_warns() {
    let arena = Arena::new("scenario3");
    let unit = compile(
        "u : UInt32 = 5; i : Int32 = -3; b := u < i;",
        "t.smm",
        &arena,
        Stage::Fix,
    )
    .unwrap();
    assert!(!unit.sink.has_errors());

    let b_decl = nth_global_decl(unit.program, 2);
    assert_eq!(b_decl.decl_declared_type().unwrap().kind, TypeKind::Bool);

    let assign = b_decl.left.get().unwrap();
    let cmp = assign.right.get().unwrap();
    assert_eq!(cmp.kind.get(), NodeKind::Lt);
    let left = cmp.left.get().unwrap();
    assert_eq!(left.kind.get(), NodeKind::Cast);
    assert_eq!(left.ty.get().kind, TypeKind::Int64);

    assert!(unit
        .sink
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::ComparingSignedAndUnsigned)));
}

#[test]
fn scenario_4_overload_selection_keeps_second_args_float32() {
    let arena = Arena::new("scenario4");
    let src = "f : (a: Int32, b: Float64) -> Int8 { return 0; }\n\
               f : (a: Int32, b: Float32) -> Int16 { return 0; }\n\
               x := f(1000, 54.234);";
    let unit = compile(src, "t.smm", &arena, Stage::Fix).unwrap();
    assert!(!unit.sink.has_errors());

    let x_decl = nth_global_decl(unit.program, 2);
    assert_eq!(x_decl.decl_declared_type().unwrap().kind, TypeKind::Int16);

    let assign = x_decl.left.get().unwrap();
    let call = assign.right.get().unwrap();
    let Extra::Call { args, .. } = &call.extra else { unreachable!() };
    let second_arg = args.get().unwrap().next.get().unwrap();
    assert_eq!(second_arg.ty.get().kind, TypeKind::Float32);
}

#[test]
fn scenario_5_circular_constants_both_report_errors_and_stay_unknown() {
    let arena = Arena::new("scenario5");
    let unit = compile("A :: B + 1; B :: A;", "t.smm", &arena, Stage::Fix).unwrap();

    let circular_count = unit
        .sink
        .diagnostics()
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::CircularDefinition { .. }))
        .count();
    assert_eq!(circular_count, 2);

    let a_decl = first_global_decl(unit.program);
    let b_decl = a_decl.decl_next().unwrap();
    assert_eq!(a_decl.decl_declared_type().unwrap().kind, TypeKind::Unknown);
    assert_eq!(b_decl.decl_declared_type().unwrap().kind, TypeKind::Unknown);
}

#[test]
fn scenario_6_forward_reference_reports_undefined_and_walks_to_completion() {
    let arena = Arena::new("scenario6");
    let src = "f : () -> Void {\n\
               if x then return; else x = 0;\n\
               }\n\
               x := 1;";
    let unit = compile(src, "t.smm", &arena, Stage::Fix).unwrap();

    let undefined_count = unit
        .sink
        .diagnostics()
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::UndefinedIdentifier { .. }))
        .count();
    assert_eq!(undefined_count, 2);
}
