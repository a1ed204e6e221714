pub mod token;

use thiserror::Error;

use crate::diagnostics::{self, Diagnostic};
use token::{keyword_kind, LiteralValue, SourceLocation, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated character literal")]
    UnterminatedChar,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("character literal must contain exactly one character")]
    InvalidChar,
    #[error("invalid numeric literal")]
    InvalidNumber,
}

/// Lex the whole buffer, failing if any lexical error was recorded.
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize_all();
    if lexer.has_errors() {
        Err(lexer.into_diagnostics())
    } else {
        Ok(tokens)
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    current: usize,
    line: u32,
    column: u32,
    token_start: usize,
    token_location: SourceLocation,
    diagnostics: Vec<Diagnostic>,
    // Set on unterminated string/char literals; tokenize_all stops there.
    fatal: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            current: 0,
            line: 1,
            column: 1,
            token_start: 0,
            token_location: SourceLocation::default(),
            diagnostics: Vec::new(),
            fatal: false,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        diagnostics::has_errors(&self.diagnostics)
    }

    pub fn tokenize_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let kind = token.kind;
            tokens.push(token);
            if kind == TokenKind::Eof || (kind == TokenKind::Error && self.fatal) {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start_token();

        if self.is_at_end() {
            return Token::new(TokenKind::Eof, "", self.token_location);
        }

        let c = self.advance();

        if is_ident_start(c) {
            return self.scan_identifier();
        }
        if c.is_ascii_digit() {
            return self.scan_number();
        }

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            '[' => self.make_token(TokenKind::LeftBracket),
            ']' => self.make_token(TokenKind::RightBracket),
            ',' => self.make_token(TokenKind::Comma),
            ';' => self.make_token(TokenKind::Semicolon),
            '~' => self.make_token(TokenKind::Tilde),
            '?' => self.make_token(TokenKind::Question),
            '@' => self.make_token(TokenKind::At),
            '#' => self.make_token(TokenKind::Hash),
            ':' => {
                if self.matches(':') {
                    self.make_token(TokenKind::ColonColon)
                } else {
                    self.make_token(TokenKind::Colon)
                }
            }
            '.' => {
                if self.matches('.') {
                    if self.matches('=') {
                        self.make_token(TokenKind::DotDotEqual)
                    } else {
                        self.make_token(TokenKind::DotDot)
                    }
                } else {
                    self.make_token(TokenKind::Dot)
                }
            }
            '+' => {
                if self.matches('=') {
                    self.make_token(TokenKind::PlusEqual)
                } else {
                    self.make_token(TokenKind::Plus)
                }
            }
            '-' => {
                if self.matches('=') {
                    self.make_token(TokenKind::MinusEqual)
                } else if self.matches('>') {
                    self.make_token(TokenKind::Arrow)
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }
            '*' => {
                if self.matches('=') {
                    self.make_token(TokenKind::StarEqual)
                } else {
                    self.make_token(TokenKind::Star)
                }
            }
            '/' => {
                if self.matches('=') {
                    self.make_token(TokenKind::SlashEqual)
                } else {
                    self.make_token(TokenKind::Slash)
                }
            }
            '%' => {
                if self.matches('=') {
                    self.make_token(TokenKind::PercentEqual)
                } else {
                    self.make_token(TokenKind::Percent)
                }
            }
            '&' => {
                if self.matches('&') {
                    self.make_token(TokenKind::AmpAmp)
                } else if self.matches('=') {
                    self.make_token(TokenKind::AmpEqual)
                } else {
                    self.make_token(TokenKind::Amp)
                }
            }
            '|' => {
                if self.matches('|') {
                    self.make_token(TokenKind::PipePipe)
                } else if self.matches('=') {
                    self.make_token(TokenKind::PipeEqual)
                } else {
                    self.make_token(TokenKind::Pipe)
                }
            }
            '^' => {
                if self.matches('=') {
                    self.make_token(TokenKind::CaretEqual)
                } else {
                    self.make_token(TokenKind::Caret)
                }
            }
            '!' => {
                if self.matches('=') {
                    self.make_token(TokenKind::BangEqual)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '=' => {
                if self.matches('=') {
                    self.make_token(TokenKind::EqualEqual)
                } else if self.matches('>') {
                    self.make_token(TokenKind::FatArrow)
                } else {
                    self.make_token(TokenKind::Equal)
                }
            }
            '<' => {
                if self.matches('<') {
                    if self.matches('=') {
                        self.make_token(TokenKind::ShlEqual)
                    } else {
                        self.make_token(TokenKind::Shl)
                    }
                } else if self.matches('=') {
                    self.make_token(TokenKind::LessEqual)
                } else {
                    self.make_token(TokenKind::Less)
                }
            }
            '>' => {
                if self.matches('>') {
                    if self.matches('=') {
                        self.make_token(TokenKind::ShrEqual)
                    } else {
                        self.make_token(TokenKind::Shr)
                    }
                } else if self.matches('=') {
                    self.make_token(TokenKind::GreaterEqual)
                } else {
                    self.make_token(TokenKind::Greater)
                }
            }
            '"' => self.scan_string(),
            '\'' => self.scan_char(),
            other => {
                self.error(LexError::UnexpectedCharacter(other));
                self.make_token(TokenKind::Error)
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while is_ident_continue(self.peek()) {
            self.advance();
        }

        let text = self.current_lexeme();
        match keyword_kind(text) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::Identifier),
        }
    }

    fn scan_number(&mut self) -> Token {
        let mut is_float = false;
        let mut radix = 10;

        if self.source.as_bytes()[self.token_start] == b'0' {
            match self.peek() {
                'x' | 'X' => {
                    self.advance();
                    radix = 16;
                    while self.peek().is_ascii_hexdigit() || self.peek() == '_' {
                        self.advance();
                    }
                }
                'b' | 'B' => {
                    self.advance();
                    radix = 2;
                    while matches!(self.peek(), '0' | '1' | '_') {
                        self.advance();
                    }
                }
                'o' | 'O' => {
                    self.advance();
                    radix = 8;
                    while matches!(self.peek(), '0'..='7' | '_') {
                        self.advance();
                    }
                }
                _ => {}
            }
        }

        if radix == 10 {
            while self.peek().is_ascii_digit() || self.peek() == '_' {
                self.advance();
            }

            if self.peek() == '.' && self.peek_next().is_ascii_digit() {
                is_float = true;
                self.advance();
                while self.peek().is_ascii_digit() || self.peek() == '_' {
                    self.advance();
                }
            }

            if matches!(self.peek(), 'e' | 'E')
                && (self.peek_next().is_ascii_digit() || matches!(self.peek_next(), '+' | '-'))
            {
                is_float = true;
                self.advance();
                if matches!(self.peek(), '+' | '-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let numeric_end = self.current;

        // Type suffix such as i32, u64, f32 rides along in the lexeme.
        if is_ident_start(self.peek()) {
            while is_ident_continue(self.peek()) {
                self.advance();
            }
            let suffix = &self.source[numeric_end..self.current];
            if suffix.starts_with('f') {
                is_float = is_float || radix == 10;
            }
        }

        let digits: String = self.source[self.token_start..numeric_end]
            .chars()
            .filter(|&c| c != '_')
            .collect();

        if is_float {
            let value = match digits.parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    self.error(LexError::InvalidNumber);
                    0.0
                }
            };
            return self.make_literal_token(TokenKind::FloatLiteral, LiteralValue::Float(value));
        }

        let unprefixed = match radix {
            16 => digits.trim_start_matches("0x").trim_start_matches("0X"),
            2 => digits.trim_start_matches("0b").trim_start_matches("0B"),
            8 => digits.trim_start_matches("0o").trim_start_matches("0O"),
            _ => digits.as_str(),
        };

        let value = match u64::from_str_radix(unprefixed, radix) {
            Ok(v) => v,
            Err(_) => {
                self.error(LexError::InvalidNumber);
                0
            }
        };
        let literal = if value <= i64::MAX as u64 {
            LiteralValue::Int(value as i64)
        } else {
            LiteralValue::UInt(value)
        };
        self.make_literal_token(TokenKind::IntegerLiteral, literal)
    }

    fn scan_string(&mut self) -> Token {
        let mut value = String::new();

        while self.peek() != '"' && !self.is_at_end() {
            let c = self.advance();
            if c == '\\' {
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '0' => value.push('\0'),
                    other => {
                        value.push(other);
                        self.error(LexError::InvalidEscape(other));
                    }
                }
            } else {
                value.push(c);
            }
        }

        if self.is_at_end() {
            self.error(LexError::UnterminatedString);
            self.fatal = true;
            return self.make_token(TokenKind::Error);
        }

        self.advance(); // closing "
        self.make_literal_token(TokenKind::StringLiteral, LiteralValue::Str(value))
    }

    fn scan_char(&mut self) -> Token {
        if self.is_at_end() {
            self.error(LexError::UnterminatedChar);
            self.fatal = true;
            return self.make_token(TokenKind::Error);
        }

        let value = if self.peek() == '\\' {
            self.advance();
            if self.is_at_end() {
                self.error(LexError::UnterminatedChar);
                self.fatal = true;
                return self.make_token(TokenKind::Error);
            }
            let escaped = self.advance();
            match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '\\' => '\\',
                '\'' => '\'',
                '0' => '\0',
                other => {
                    self.error(LexError::InvalidEscape(other));
                    other
                }
            }
        } else {
            self.advance()
        };

        if self.peek() != '\'' {
            self.error(LexError::InvalidChar);
            return self.make_token(TokenKind::Error);
        }

        self.advance(); // closing '
        self.make_literal_token(TokenKind::CharLiteral, LiteralValue::Char(value))
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == '/' => self.skip_line_comment(),
                '/' if self.peek_next() == '*' => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.start_token();
        self.advance(); // /
        self.advance(); // *

        let mut depth = 1;
        while depth > 0 && !self.is_at_end() {
            if self.peek() == '/' && self.peek_next() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }

        if depth > 0 {
            self.error(LexError::UnterminatedComment);
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_lexeme(), self.token_location)
    }

    fn make_literal_token(&self, kind: TokenKind, value: LiteralValue) -> Token {
        Token::with_value(kind, self.current_lexeme(), self.token_location, value)
    }

    fn error(&mut self, kind: LexError) {
        self.diagnostics
            .push(Diagnostic::error(kind.to_string(), self.token_location));
    }

    fn start_token(&mut self) {
        self.token_start = self.current;
        self.token_location = SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.current,
        };
    }

    fn current_lexeme(&self) -> &str {
        &self.source[self.token_start..self.current]
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_at_end() {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_covers_primitives() {
        assert_eq!(keyword_kind("usize"), Some(TokenKind::Usize));
        assert_eq!(keyword_kind("byte"), Some(TokenKind::Byte));
        assert_eq!(keyword_kind("not_a_keyword"), None);
    }

    #[test]
    fn maximal_munch_on_shift_assign() {
        let tokens = lex("<<= << <= <").expect("lex should succeed");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::ShlEqual,
                TokenKind::Shl,
                TokenKind::LessEqual,
                TokenKind::Less,
                TokenKind::Eof,
            ]
        );
    }
}
