use pretty_assertions::assert_eq;

use emberc::lexer::lex;
use emberc::parser::ast::{
    BinaryOp, Expr, ExprKind, Item, ItemKind, Literal, PatternKind, Stmt, TypeKind, UnaryOp,
    Visibility,
};
use emberc::parser::Parser;

fn parse(source: &str) -> Vec<Item> {
    let tokens = lex(source).expect("lex should succeed");
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    assert!(
        !parser.has_errors(),
        "unexpected parse errors: {:?}",
        parser.diagnostics()
    );
    module.items
}

fn parse_expr(source: &str) -> Expr {
    let items = parse(&format!("fn probe() {{ {source} }}"));
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function item");
    };
    let ExprKind::Block { tail, .. } = &function.body.as_ref().unwrap().kind else {
        panic!("expected block body");
    };
    *tail.clone().expect("expected trailing expression")
}

#[test]
fn parses_function_with_mut_parameter_through_pattern_grammar() {
    let items = parse("fn inc(mut x: i32) -> i32 { return x; }");
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function item");
    };
    assert_eq!(function.params.len(), 1);
    match &function.params[0].pattern.kind {
        PatternKind::Identifier { name, mutable } => {
            assert_eq!(name, "x");
            assert!(*mutable);
        }
        other => panic!("expected identifier pattern, got {other:?}"),
    }
    assert!(matches!(
        &function.return_type.kind,
        TypeKind::Primitive(name) if name == "i32"
    ));
}

#[test]
fn missing_return_type_defaults_to_void() {
    let items = parse("fn noop() {}");
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function item");
    };
    assert!(function.return_type.is_void());
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = parse_expr("1 + 2 * 3");
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        &right.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn equality_binds_tighter_than_bitwise_and() {
    let expr = parse_expr("1 & 2 == 3");
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::BitAnd);
    assert!(matches!(
        &right.kind,
        ExprKind::Binary {
            op: BinaryOp::Eq,
            ..
        }
    ));
}

#[test]
fn assignment_is_right_associative() {
    let expr = parse_expr("a = b = 1");
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Assign);
    assert!(matches!(
        &right.kind,
        ExprKind::Binary {
            op: BinaryOp::Assign,
            ..
        }
    ));
}

#[test]
fn range_sits_between_assignment_and_logical_or() {
    let expr = parse_expr("a = 0..10");
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected assignment");
    };
    assert_eq!(*op, BinaryOp::Assign);
    match &right.kind {
        ExprKind::Range {
            start: Some(_),
            end: Some(_),
            inclusive,
        } => assert!(!inclusive),
        other => panic!("expected range, got {other:?}"),
    }
}

#[test]
fn parses_open_ended_ranges() {
    assert!(matches!(
        parse_expr("1..").kind,
        ExprKind::Range {
            start: Some(_),
            end: None,
            ..
        }
    ));
    assert!(matches!(
        parse_expr("..=5").kind,
        ExprKind::Range {
            start: None,
            end: Some(_),
            inclusive: true,
        }
    ));
}

#[test]
fn unary_address_of_mut_is_distinct() {
    let expr = parse_expr("&mut x");
    assert!(matches!(
        expr.kind,
        ExprKind::Unary {
            op: UnaryOp::AddrOfMut,
            ..
        }
    ));
}

#[test]
fn postfix_chain_parses_left_to_right() {
    let expr = parse_expr("table[0].handler(1, 2) as i64");
    let ExprKind::Cast { value, target } = &expr.kind else {
        panic!("expected cast");
    };
    assert!(matches!(
        &target.kind,
        TypeKind::Primitive(name) if name == "i64"
    ));
    let ExprKind::Call { callee, args } = &value.kind else {
        panic!("expected call");
    };
    assert_eq!(args.len(), 2);
    assert!(matches!(&callee.kind, ExprKind::FieldAccess { .. }));
}

#[test]
fn uppercase_name_before_brace_is_a_struct_literal() {
    let expr = parse_expr("Point { x: 1, y: 2 }");
    let ExprKind::StructLiteral { path, fields } = &expr.kind else {
        panic!("expected struct literal");
    };
    assert_eq!(path, &vec!["Point".to_string()]);
    assert_eq!(fields.len(), 2);
}

#[test]
fn if_condition_comparison_is_not_a_struct_literal() {
    let expr = parse_expr("if x < y { 1 } else { 2 }");
    let ExprKind::If { condition, .. } = &expr.kind else {
        panic!("expected if expression");
    };
    assert!(matches!(
        &condition.kind,
        ExprKind::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));
}

#[test]
fn block_trailing_expression_is_its_value() {
    let expr = parse_expr("{ let a = 1; a + 1 }");
    let ExprKind::Block { stmts, tail } = &expr.kind else {
        panic!("expected block");
    };
    assert_eq!(stmts.len(), 1);
    assert!(tail.is_some());

    let expr = parse_expr("{ a + 1; }");
    let ExprKind::Block { stmts, tail } = &expr.kind else {
        panic!("expected block");
    };
    assert_eq!(stmts.len(), 1);
    assert!(tail.is_none());
    assert!(matches!(
        stmts[0],
        Stmt::Expr {
            has_semicolon: true,
            ..
        }
    ));
}

#[test]
fn let_carries_mutability_in_the_pattern() {
    let items = parse("fn probe() { let mut count: i32 = 0; }");
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function");
    };
    let ExprKind::Block { stmts, .. } = &function.body.as_ref().unwrap().kind else {
        panic!("expected block");
    };
    let Stmt::Let { pattern, ty, .. } = &stmts[0] else {
        panic!("expected let statement");
    };
    assert!(pattern.is_mutable());
    assert!(ty.is_some());
}

#[test]
fn parses_match_with_guard_or_and_range_patterns() {
    let expr = parse_expr("match n { 0 | 1 => 1, 2..=9 if n > 2 => 2, other => other, }");
    let ExprKind::Match { arms, .. } = &expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 3);
    assert!(matches!(&arms[0].pattern.kind, PatternKind::Or(p) if p.len() == 2));
    assert!(matches!(
        &arms[1].pattern.kind,
        PatternKind::Range {
            inclusive: true,
            ..
        }
    ));
    assert!(arms[1].guard.is_some());
    assert!(matches!(
        &arms[2].pattern.kind,
        PatternKind::Identifier { name, .. } if name == "other"
    ));
}

#[test]
fn match_scrutinee_is_a_full_expression() {
    let expr = parse_expr("match a + b { _ => 0 }");
    let ExprKind::Match { scrutinee, .. } = &expr.kind else {
        panic!("expected match");
    };
    assert!(matches!(
        &scrutinee.kind,
        ExprKind::Binary {
            op: BinaryOp::Add,
            ..
        }
    ));
}

#[test]
fn parses_array_literal_and_repeat_forms() {
    assert!(matches!(
        parse_expr("[1, 2, 3]").kind,
        ExprKind::ArrayLiteral(elements) if elements.len() == 3
    ));
    assert!(matches!(
        parse_expr("[0; 8]").kind,
        ExprKind::ArrayRepeat { .. }
    ));
}

#[test]
fn every_item_keyword_produces_an_item() {
    let items = parse(
        "pub fn f() {}\n\
         struct S { pub x: i32 }\n\
         enum E { A, B(i32) }\n\
         trait T { fn req() -> i32; }\n\
         impl S { fn m() {} }\n\
         type Alias = *mut S;\n\
         mod inner { fn g() {} }\n\
         import std::mem as memory;\n\
         extern { fn malloc(size: usize) -> *mut u8; }",
    );
    assert_eq!(items.len(), 9);
    assert_eq!(items[0].visibility, Visibility::Public);
    assert!(matches!(items[1].kind, ItemKind::Struct { .. }));
    match &items[2].kind {
        ItemKind::Enum { variants } => {
            assert_eq!(variants.len(), 2);
            assert_eq!(variants[1].payload.len(), 1);
        }
        other => panic!("expected enum, got {other:?}"),
    }
    assert!(matches!(items[3].kind, ItemKind::Trait { .. }));
    assert!(matches!(items[4].kind, ItemKind::Impl { .. }));
    assert!(matches!(items[5].kind, ItemKind::TypeAlias { .. }));
    assert!(matches!(items[6].kind, ItemKind::Module { .. }));
    match &items[7].kind {
        ItemKind::Import { path, alias } => {
            assert_eq!(path, &vec!["std".to_string(), "mem".to_string()]);
            assert_eq!(alias.as_deref(), Some("memory"));
        }
        other => panic!("expected import, got {other:?}"),
    }
    match &items[8].kind {
        ItemKind::Extern { items } => {
            let ItemKind::Function(function) = &items[0].kind else {
                panic!("expected function in extern block");
            };
            assert!(function.is_extern);
            assert!(function.body.is_none());
        }
        other => panic!("expected extern block, got {other:?}"),
    }
}

#[test]
fn parses_nested_generic_arguments() {
    let items = parse("fn f(x: Map<i32, List<i32>>) {}");
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function");
    };
    let TypeKind::Named { path, generic_args } = &function.params[0].ty.kind else {
        panic!("expected named type");
    };
    assert_eq!(path[0], "Map");
    assert_eq!(generic_args.len(), 2);
    let TypeKind::Named { path, generic_args } = &generic_args[1].kind else {
        panic!("expected nested named type");
    };
    assert_eq!(path[0], "List");
    assert_eq!(generic_args.len(), 1);
}

#[test]
fn parses_compound_type_grammar() {
    let items = parse("fn f(a: [i32; 4], b: [u8], c: (i32, bool), d: fn(i32) -> i32) {}");
    let ItemKind::Function(function) = &items[0].kind else {
        panic!("expected function");
    };
    assert!(matches!(
        &function.params[0].ty.kind,
        TypeKind::Array { size: 4, .. }
    ));
    assert!(matches!(&function.params[1].ty.kind, TypeKind::Slice { .. }));
    assert!(matches!(
        &function.params[2].ty.kind,
        TypeKind::Tuple(types) if types.len() == 2
    ));
    assert!(matches!(
        &function.params[3].ty.kind,
        TypeKind::Function { .. }
    ));
}

#[test]
fn recovers_at_item_boundary_and_keeps_parsing() {
    let tokens = lex("fn broken( -> ; fn main() -> i32 { return 1; }").expect("lex");
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    assert!(parser.has_errors());
    // The malformed item costs one diagnostic; `main` still parses.
    assert!(module.items.iter().any(|item| item.name == "main"));
}

#[test]
fn parser_terminates_on_garbage_input() {
    let tokens = lex("???? @@ ## ,,,, )))) }}}}").expect("lex");
    let mut parser = Parser::new(tokens);
    let _ = parser.parse_module();
    assert!(parser.has_errors());
}

#[test]
fn literal_values_are_decoded_into_the_ast() {
    let expr = parse_expr("{ 0x10; }");
    let ExprKind::Block { stmts, .. } = &expr.kind else {
        panic!("expected block");
    };
    let Stmt::Expr { expr, .. } = &stmts[0] else {
        panic!("expected expression statement");
    };
    assert!(matches!(&expr.kind, ExprKind::Literal(Literal::Int(16))));
}

#[test]
fn while_and_for_parse_as_expressions() {
    assert!(matches!(
        parse_expr("while n < 7 { n = n + 1; }").kind,
        ExprKind::While { .. }
    ));
    let expr = parse_expr("for i in 0..10 { i; }");
    let ExprKind::For {
        pattern, iterator, ..
    } = &expr.kind
    else {
        panic!("expected for expression");
    };
    assert_eq!(pattern.binding_name(), Some("i"));
    assert!(matches!(&iterator.kind, ExprKind::Range { .. }));
}
