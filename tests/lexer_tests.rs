use emberc::lexer::token::{LiteralValue, TokenKind};
use emberc::lexer::{lex, Lexer};

#[test]
fn lexes_basic_function_header() {
    let tokens = lex("fn main() -> i32 {").expect("lex should succeed");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Fn,
            TokenKind::Identifier,
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::Arrow,
            TokenKind::I32,
            TokenKind::LeftBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn round_trips_lexemes_modulo_whitespace() {
    let source = "fn add(mut a: i32, b: i32) -> i32 { let c = a <<= 2; a += b; c ..= 9 }";
    let tokens = lex(source).expect("lex should succeed");

    let rejoined = tokens
        .iter()
        .map(|t| t.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let relexed = lex(&rejoined).expect("rejoined source should lex");

    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    let rekinds: Vec<_> = relexed.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, rekinds);
}

#[test]
fn decodes_integer_bases_and_separators() {
    let tokens = lex("0xFF 0b1010 0o17 1_000_000 42i64").expect("lex should succeed");
    let values: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::IntegerLiteral)
        .map(|t| match t.value {
            Some(LiteralValue::Int(v)) => v,
            ref other => panic!("expected integer value, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![255, 10, 15, 1_000_000, 42]);

    // The suffix stays part of the lexeme.
    assert_eq!(tokens[4].lexeme, "42i64");
}

#[test]
fn promotes_to_float_on_fraction_and_exponent() {
    let tokens = lex("3.25 1e3 2.5e-1 7f32").expect("lex should succeed");
    let values: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::FloatLiteral)
        .map(|t| match t.value {
            Some(LiteralValue::Float(v)) => v,
            ref other => panic!("expected float value, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![3.25, 1000.0, 0.25, 7.0]);
}

#[test]
fn integer_followed_by_range_is_not_a_float() {
    let tokens = lex("0..10").expect("lex should succeed");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::IntegerLiteral,
            TokenKind::DotDot,
            TokenKind::IntegerLiteral,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn decodes_string_escapes() {
    let tokens = lex(r#""line\none\ttab\" end\0""#).expect("lex should succeed");
    match &tokens[0].value {
        Some(LiteralValue::Str(value)) => {
            assert_eq!(value, "line\none\ttab\" end\0");
        }
        other => panic!("expected string value, got {other:?}"),
    }
}

#[test]
fn invalid_escape_keeps_character_and_reports() {
    let mut lexer = Lexer::new(r#""bad\qescape""#);
    let tokens = lexer.tokenize_all();
    assert!(lexer.has_errors());
    match &tokens[0].value {
        Some(LiteralValue::Str(value)) => assert_eq!(value, "badqescape"),
        other => panic!("expected string value, got {other:?}"),
    }
}

#[test]
fn decodes_char_literals() {
    let tokens = lex(r"'a' '\n' '\\'").expect("lex should succeed");
    let values: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::CharLiteral)
        .map(|t| match t.value {
            Some(LiteralValue::Char(v)) => v,
            ref other => panic!("expected char value, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec!['a', '\n', '\\']);
}

#[test]
fn nested_block_comments_are_whitespace() {
    let tokens = lex("/* outer /* inner */ still outer */ 7").expect("lex should succeed");
    assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
    assert_eq!(tokens[1].kind, TokenKind::Eof);
}

#[test]
fn unterminated_nested_comment_reports() {
    let mut lexer = Lexer::new("/* /* */");
    let _ = lexer.tokenize_all();
    assert!(lexer.has_errors());
    assert!(lexer.diagnostics()[0]
        .message
        .contains("unterminated block comment"));
}

#[test]
fn unterminated_string_stops_lexing() {
    let mut lexer = Lexer::new("let x = \"no end");
    let tokens = lexer.tokenize_all();
    assert!(lexer.has_errors());
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Error);
}

#[test]
fn unexpected_character_is_recoverable() {
    let mut lexer = Lexer::new("let $ x");
    let tokens = lexer.tokenize_all();
    assert!(lexer.has_errors());
    // Lexing continued past the error token.
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Let,
            TokenKind::Error,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn tracks_line_and_column() {
    let tokens = lex("fn\n  main").expect("lex should succeed");
    assert_eq!((tokens[0].location.line, tokens[0].location.column), (1, 1));
    assert_eq!((tokens[1].location.line, tokens[1].location.column), (2, 3));
}

#[test]
fn maximal_munch_prefers_longest_operator() {
    let tokens = lex(">>= >> >= > :: : ..= .. . => =").expect("lex should succeed");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::ShrEqual,
            TokenKind::Shr,
            TokenKind::GreaterEqual,
            TokenKind::Greater,
            TokenKind::ColonColon,
            TokenKind::Colon,
            TokenKind::DotDotEqual,
            TokenKind::DotDot,
            TokenKind::Dot,
            TokenKind::FatArrow,
            TokenKind::Equal,
            TokenKind::Eof,
        ]
    );
}
