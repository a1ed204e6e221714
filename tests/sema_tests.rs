use emberc::lexer::lex;
use emberc::parser::Parser;
use emberc::sema::SemanticAnalyzer;

fn analyze(source: &str) -> SemanticAnalyzer {
    let tokens = lex(source).expect("lex should succeed");
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    assert!(
        !parser.has_errors(),
        "unexpected parse errors: {:?}",
        parser.diagnostics()
    );
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze(&module);
    analyzer
}

fn error_messages(analyzer: &SemanticAnalyzer) -> Vec<String> {
    analyzer
        .diagnostics()
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn clean_module_passes() {
    let analyzer = analyze(
        "fn helper(x: i32) -> i32 { return x; }\n\
         fn main() -> i32 { let y: i32 = helper(1); return y; }",
    );
    assert!(!analyzer.has_errors());
}

#[test]
fn scope_count_is_restored_after_each_function() {
    let analyzer = analyze(
        "fn deep() { let a = 1; { let b = a; { let c = b; } } }\n\
         fn main() { for i in 0..3 { match i { n => { let d = n; } } } }",
    );
    assert!(!analyzer.has_errors());
    assert_eq!(analyzer.scope_depth(), 1);
}

#[test]
fn duplicate_struct_field_reports_once_at_second_field() {
    let analyzer = analyze("struct Pair { first: i32, second: i32, first: i32 }");
    let errors = error_messages(&analyzer);
    assert_eq!(errors, vec!["duplicate field 'first'".to_string()]);

    let diagnostic = &analyzer.diagnostics()[0];
    // The second occurrence is the one flagged.
    assert_eq!(diagnostic.location.line, 1);
    assert!(diagnostic.location.column > 20);
}

#[test]
fn duplicate_enum_variant_is_an_error() {
    let analyzer = analyze("enum Tone { Low, High, Low }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["duplicate variant 'Low'".to_string()]
    );
}

#[test]
fn top_level_redefinition_is_an_error() {
    let analyzer = analyze("fn twice() {}\nstruct twice { x: i32 }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["redefinition of 'twice'".to_string()]
    );
}

#[test]
fn let_redefinition_in_same_scope_is_an_error() {
    let analyzer = analyze("fn main() { let x = 1; let x = 2; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["redefinition of 'x'".to_string()]
    );
}

#[test]
fn shadowing_across_nested_scopes_is_allowed() {
    let analyzer = analyze("fn main() { let x = 1; { let x = 2; let y = x; } }");
    assert!(!analyzer.has_errors());
}

#[test]
fn undefined_identifier_is_an_error() {
    let analyzer = analyze("fn main() { let x = missing; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["undefined identifier 'missing'".to_string()]
    );
}

#[test]
fn assignment_to_immutable_binding_warns_but_does_not_fail() {
    let analyzer = analyze("fn main() { let x = 1; x = 2; }");
    assert!(!analyzer.has_errors());
    let warnings: Vec<_> = analyzer.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0]
        .message
        .contains("assignment to immutable binding 'x'"));
}

#[test]
fn assignment_to_undefined_identifier_is_an_error() {
    let analyzer = analyze("fn main() { ghost = 1; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["undefined identifier 'ghost'".to_string()]
    );
}

#[test]
fn match_arm_binding_is_scoped_to_its_arm() {
    let analyzer = analyze("fn main() { let r = match 1 { n => n, _ => 0 }; }");
    assert!(!analyzer.has_errors());

    let analyzer = analyze("fn main() { let r = match 1 { n => n, _ => n }; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["undefined identifier 'n'".to_string()]
    );
}

#[test]
fn for_loop_variable_does_not_leak() {
    let analyzer = analyze("fn main() -> i32 { for i in 0..3 { let x = i; } return i; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["undefined identifier 'i'".to_string()]
    );
}

#[test]
fn for_loop_variable_shadows_and_restores() {
    let analyzer = analyze(
        "fn main() -> i32 { let i = 100; for i in 0..3 { let x = i; } return i; }",
    );
    assert!(!analyzer.has_errors());
}

#[test]
fn break_and_continue_outside_a_loop_are_errors() {
    let analyzer = analyze("fn main() { break; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["'break' outside of a loop".to_string()]
    );

    let analyzer = analyze("fn main() { continue; }");
    assert_eq!(
        error_messages(&analyzer),
        vec!["'continue' outside of a loop".to_string()]
    );

    let analyzer = analyze("fn main() { while 1 < 2 { break; continue; } }");
    assert!(!analyzer.has_errors());
}

#[test]
fn duplicate_parameter_names_are_an_error() {
    let analyzer = analyze("fn f(a: i32, a: i32) {}");
    assert_eq!(
        error_messages(&analyzer),
        vec!["redefinition of parameter 'a'".to_string()]
    );
}

#[test]
fn parameters_resolve_inside_the_body() {
    let analyzer = analyze("fn f(a: i32) -> i32 { return a + 1; }");
    assert!(!analyzer.has_errors());
}
