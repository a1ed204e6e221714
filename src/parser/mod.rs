pub mod ast;
mod expr;

use crate::diagnostics::{self, Diagnostic};
use crate::lexer::token::{LiteralValue, SourceLocation, Token, TokenKind};
use ast::{
    EnumVariant, Function, GenericParam, Item, ItemKind, Literal, Module, Param, Pattern,
    PatternKind, Stmt, StructField, Type, TypeKind, Visibility,
};

/// A single parse failure; recorded and recovered from at item boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Diagnostic::error(err.message, err.location)
    }
}

pub(crate) type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
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

    /// Parse the whole token stream into a module, synchronizing at item
    /// boundaries after each error so one malformed construct costs one
    /// diagnostic.
    pub fn parse_module(&mut self) -> Module {
        let location = self.peek().location;
        let mut items = Vec::new();

        while !self.is_at_end() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    self.diagnostics.push(err.into());
                    self.synchronize();
                }
            }
        }

        Module {
            name: "<main>".to_string(),
            items,
            location,
        }
    }

    fn parse_item(&mut self) -> ParseResult<Item> {
        let visibility = if self.matches(TokenKind::Pub) {
            Visibility::Public
        } else {
            Visibility::Private
        };

        if self.matches(TokenKind::Fn) {
            self.parse_function(visibility)
        } else if self.matches(TokenKind::Struct) {
            self.parse_struct(visibility)
        } else if self.matches(TokenKind::Enum) {
            self.parse_enum(visibility)
        } else if self.matches(TokenKind::Trait) {
            self.parse_trait(visibility)
        } else if self.matches(TokenKind::Impl) {
            self.parse_impl()
        } else if self.matches(TokenKind::Type) {
            self.parse_type_alias(visibility)
        } else if self.matches(TokenKind::Mod) {
            self.parse_mod(visibility)
        } else if self.matches(TokenKind::Import) {
            self.parse_import()
        } else if self.matches(TokenKind::Extern) {
            self.parse_extern()
        } else {
            Err(self.error_here("expected item declaration"))
        }
    }

    fn parse_function(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let is_unsafe = self.matches(TokenKind::Unsafe);
        let name = self
            .consume(TokenKind::Identifier, "expected function name")?
            .lexeme;

        let generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        self.consume(TokenKind::LeftParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let param_location = self.peek().location;
                let pattern = self.parse_pattern()?;
                self.consume(TokenKind::Colon, "expected ':' after parameter name")?;
                let ty = self.parse_type()?;
                params.push(Param {
                    pattern,
                    ty,
                    location: param_location,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;

        let return_type = if self.matches(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::primitive("void", self.peek().location)
        };

        let body = if self.check(TokenKind::LeftBrace) {
            Some(self.parse_block_expr()?)
        } else {
            self.consume(TokenKind::Semicolon, "expected function body or ';'")?;
            None
        };

        Ok(Item {
            kind: ItemKind::Function(Function {
                params,
                return_type,
                body,
                is_extern: false,
                is_unsafe,
            }),
            visibility,
            name,
            generic_params,
            location,
        })
    }

    fn parse_generic_params(&mut self) -> ParseResult<Vec<GenericParam>> {
        let mut params = Vec::new();
        self.consume(TokenKind::Less, "expected '<'")?;

        if !self.check(TokenKind::Greater) {
            loop {
                let location = self.peek().location;
                let name = self
                    .consume(TokenKind::Identifier, "expected generic parameter name")?
                    .lexeme;

                let mut bounds = Vec::new();
                if self.matches(TokenKind::Colon) {
                    loop {
                        bounds.push(self.parse_path()?);
                        if !self.matches(TokenKind::Plus) {
                            break;
                        }
                    }
                }

                params.push(GenericParam {
                    name,
                    bounds,
                    location,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::Greater, "expected '>'")?;
        Ok(params)
    }

    fn parse_struct(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let name = self
            .consume(TokenKind::Identifier, "expected struct name")?
            .lexeme;

        let generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            fields.push(self.parse_struct_field()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Item {
            kind: ItemKind::Struct { fields },
            visibility,
            name,
            generic_params,
            location,
        })
    }

    fn parse_struct_field(&mut self) -> ParseResult<StructField> {
        let location = self.peek().location;
        let visibility = if self.matches(TokenKind::Pub) {
            Visibility::Public
        } else {
            Visibility::Private
        };
        let name = self
            .consume(TokenKind::Identifier, "expected field name")?
            .lexeme;
        self.consume(TokenKind::Colon, "expected ':' after field name")?;
        let ty = self.parse_type()?;
        Ok(StructField {
            visibility,
            name,
            ty,
            location,
        })
    }

    fn parse_enum(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let name = self
            .consume(TokenKind::Identifier, "expected enum name")?
            .lexeme;

        let generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            variants.push(self.parse_enum_variant()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Item {
            kind: ItemKind::Enum { variants },
            visibility,
            name,
            generic_params,
            location,
        })
    }

    fn parse_enum_variant(&mut self) -> ParseResult<EnumVariant> {
        let location = self.peek().location;
        let name = self
            .consume(TokenKind::Identifier, "expected variant name")?
            .lexeme;

        let mut payload = Vec::new();
        if self.matches(TokenKind::LeftParen) {
            if !self.check(TokenKind::RightParen) {
                loop {
                    payload.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "expected ')' after variant payload")?;
        }

        Ok(EnumVariant {
            name,
            payload,
            location,
        })
    }

    fn parse_trait(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let name = self
            .consume(TokenKind::Identifier, "expected trait name")?
            .lexeme;

        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Item {
            kind: ItemKind::Trait { items },
            visibility,
            name,
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_impl(&mut self) -> ParseResult<Item> {
        let location = self.previous().location;
        let first = self.parse_type()?;

        // `impl Trait for Type { … }` or plain `impl Type { … }`.
        let (target, trait_path) = if self.matches(TokenKind::For) {
            let trait_path = match first.kind {
                TypeKind::Named { path, .. } => Some(path),
                _ => return Err(self.error_here("expected trait name before 'for'")),
            };
            (self.parse_type()?, trait_path)
        } else {
            (first, None)
        };

        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        let name = match &target.kind {
            TypeKind::Named { path, .. } => path.join("::"),
            TypeKind::Primitive(name) => name.clone(),
            _ => String::new(),
        };

        Ok(Item {
            kind: ItemKind::Impl {
                target,
                trait_path,
                items,
            },
            visibility: Visibility::Private,
            name,
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_type_alias(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let name = self
            .consume(TokenKind::Identifier, "expected type alias name")?
            .lexeme;
        self.consume(TokenKind::Equal, "expected '=' in type alias")?;
        let aliased = self.parse_type()?;
        self.consume(TokenKind::Semicolon, "expected ';' after type alias")?;

        Ok(Item {
            kind: ItemKind::TypeAlias { aliased },
            visibility,
            name,
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_mod(&mut self, visibility: Visibility) -> ParseResult<Item> {
        let location = self.previous().location;
        let name = self
            .consume(TokenKind::Identifier, "expected module name")?
            .lexeme;

        if self.matches(TokenKind::Semicolon) {
            return Ok(Item {
                kind: ItemKind::Module {
                    items: Vec::new(),
                    external: true,
                },
                visibility,
                name,
                generic_params: Vec::new(),
                location,
            });
        }

        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Item {
            kind: ItemKind::Module {
                items,
                external: false,
            },
            visibility,
            name,
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_import(&mut self) -> ParseResult<Item> {
        let location = self.previous().location;
        let path = self.parse_path()?;
        let alias = if self.matches(TokenKind::As) {
            Some(
                self.consume(TokenKind::Identifier, "expected alias name")?
                    .lexeme,
            )
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after import")?;

        let name = path.last().cloned().unwrap_or_default();
        Ok(Item {
            kind: ItemKind::Import { path, alias },
            visibility: Visibility::Private,
            name,
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_extern(&mut self) -> ParseResult<Item> {
        let location = self.previous().location;
        self.consume(TokenKind::LeftBrace, "expected '{'")?;

        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let mut item = self.parse_item()?;
            if let ItemKind::Function(function) = &mut item.kind {
                function.is_extern = true;
            }
            items.push(item);
        }
        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Item {
            kind: ItemKind::Extern { items },
            visibility: Visibility::Private,
            name: "extern".to_string(),
            generic_params: Vec::new(),
            location,
        })
    }

    fn parse_path(&mut self) -> ParseResult<Vec<String>> {
        let mut path = Vec::new();
        path.push(
            self.consume(TokenKind::Identifier, "expected identifier")?
                .lexeme,
        );
        while self.matches(TokenKind::ColonColon) {
            path.push(
                self.consume(TokenKind::Identifier, "expected identifier after '::'")?
                    .lexeme,
            );
        }
        Ok(path)
    }

    // ── Statements ──────────────────────────────────────────────────────

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(TokenKind::Let) {
            return self.parse_let_statement();
        }

        if self.check_item_start() {
            let item = self.parse_item()?;
            return Ok(Stmt::Item(Box::new(item)));
        }

        let expr = self.parse_expression()?;
        let has_semicolon = self.matches(TokenKind::Semicolon);
        Ok(Stmt::Expr {
            expr,
            has_semicolon,
        })
    }

    fn parse_let_statement(&mut self) -> ParseResult<Stmt> {
        let location = self.previous().location;
        let pattern = self.parse_pattern()?;

        let ty = if self.matches(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let initializer = if self.matches(TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "expected ';' after let statement")?;

        Ok(Stmt::Let {
            pattern,
            ty,
            initializer,
            location,
        })
    }

    pub(crate) fn check_item_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Trait
                | TokenKind::Impl
                | TokenKind::Type
                | TokenKind::Mod
                | TokenKind::Import
                | TokenKind::Extern
                | TokenKind::Pub
        )
    }

    // ── Types ───────────────────────────────────────────────────────────

    pub(crate) fn parse_type(&mut self) -> ParseResult<Type> {
        let location = self.peek().location;

        if self.matches(TokenKind::Star) {
            let mutable = self.matches(TokenKind::Mut);
            let pointee = Box::new(self.parse_type()?);
            return Ok(Type {
                kind: TypeKind::Pointer { mutable, pointee },
                location,
            });
        }

        if self.matches(TokenKind::Amp) {
            let mutable = self.matches(TokenKind::Mut);
            let pointee = Box::new(self.parse_type()?);
            return Ok(Type {
                kind: TypeKind::Reference { mutable, pointee },
                location,
            });
        }

        if self.matches(TokenKind::LeftBracket) {
            let element = Box::new(self.parse_type()?);
            let kind = if self.matches(TokenKind::Semicolon) {
                let size_token =
                    self.consume(TokenKind::IntegerLiteral, "expected array size")?;
                let size = match size_token.value {
                    Some(LiteralValue::Int(v)) if v >= 0 => v as u64,
                    Some(LiteralValue::UInt(v)) => v,
                    _ => return Err(self.error_at(&size_token, "invalid array size")),
                };
                TypeKind::Array { element, size }
            } else {
                TypeKind::Slice { element }
            };
            self.consume(TokenKind::RightBracket, "expected ']'")?;
            return Ok(Type { kind, location });
        }

        if self.matches(TokenKind::LeftParen) {
            let mut types = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    types.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "expected ')'")?;
            return Ok(Type {
                kind: TypeKind::Tuple(types),
                location,
            });
        }

        if self.matches(TokenKind::Fn) {
            self.consume(TokenKind::LeftParen, "expected '('")?;
            let mut params = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    params.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "expected ')'")?;
            let return_type = if self.matches(TokenKind::Arrow) {
                Some(Box::new(self.parse_type()?))
            } else {
                None
            };
            return Ok(Type {
                kind: TypeKind::Function {
                    params,
                    return_type,
                },
                location,
            });
        }

        if self.peek().kind.is_primitive_type() {
            let name = self.advance().lexeme.clone();
            return Ok(Type {
                kind: TypeKind::Primitive(name),
                location,
            });
        }

        if self.check(TokenKind::Identifier) {
            let path = self.parse_path()?;
            let generic_args = if self.check(TokenKind::Less) {
                self.parse_generic_args()?
            } else {
                Vec::new()
            };
            return Ok(Type {
                kind: TypeKind::Named { path, generic_args },
                location,
            });
        }

        Err(self.error_here("expected type"))
    }

    fn parse_generic_args(&mut self) -> ParseResult<Vec<Type>> {
        self.consume(TokenKind::Less, "expected '<'")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::Greater) && !self.check(TokenKind::Shr) {
            loop {
                args.push(self.parse_type()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume_generic_close()?;
        Ok(args)
    }

    /// Close a generic argument list, splitting `>>` into two `>` so that
    /// nested arguments such as `Map<K, List<V>>` terminate correctly.
    fn consume_generic_close(&mut self) -> ParseResult<()> {
        if self.matches(TokenKind::Greater) {
            return Ok(());
        }
        if self.check(TokenKind::Shr) {
            self.tokens[self.current].kind = TokenKind::Greater;
            return Ok(());
        }
        Err(self.error_here("expected '>'"))
    }

    // ── Patterns ────────────────────────────────────────────────────────

    pub(crate) fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        let location = self.peek().location;
        let first = self.parse_pattern_range()?;

        if !self.check(TokenKind::Pipe) {
            return Ok(first);
        }

        let mut alternatives = vec![first];
        while self.matches(TokenKind::Pipe) {
            alternatives.push(self.parse_pattern_range()?);
        }
        Ok(Pattern {
            kind: PatternKind::Or(alternatives),
            location,
        })
    }

    fn parse_pattern_range(&mut self) -> ParseResult<Pattern> {
        let location = self.peek().location;
        let start = self.parse_pattern_primary()?;

        let inclusive = if self.matches(TokenKind::DotDotEqual) {
            true
        } else if self.matches(TokenKind::DotDot) {
            false
        } else {
            return Ok(start);
        };

        let end = self.parse_pattern_primary()?;
        Ok(Pattern {
            kind: PatternKind::Range {
                start: Box::new(start),
                end: Box::new(end),
                inclusive,
            },
            location,
        })
    }

    fn parse_pattern_primary(&mut self) -> ParseResult<Pattern> {
        let location = self.peek().location;

        if self.matches(TokenKind::Mut) {
            let name = self
                .consume(TokenKind::Identifier, "expected identifier after 'mut'")?
                .lexeme;
            return Ok(Pattern {
                kind: PatternKind::Identifier {
                    name,
                    mutable: true,
                },
                location,
            });
        }

        if self.check(TokenKind::Identifier) {
            if self.peek().lexeme == "_" {
                self.advance();
                return Ok(Pattern {
                    kind: PatternKind::Wildcard,
                    location,
                });
            }

            let path = self.parse_path()?;

            if self.check(TokenKind::LeftBrace) {
                return self.parse_struct_pattern(path, location);
            }

            if self.matches(TokenKind::LeftParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.parse_pattern()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "expected ')' after enum pattern")?;
                return Ok(Pattern {
                    kind: PatternKind::Enum { path, args },
                    location,
                });
            }

            if path.len() == 1 {
                let name = path.into_iter().next().unwrap_or_default();
                return Ok(Pattern {
                    kind: PatternKind::Identifier {
                        name,
                        mutable: false,
                    },
                    location,
                });
            }

            // A multi-segment path with no payload is a unit enum pattern.
            return Ok(Pattern {
                kind: PatternKind::Enum {
                    path,
                    args: Vec::new(),
                },
                location,
            });
        }

        if let Some(literal) = self.match_literal()? {
            return Ok(Pattern {
                kind: PatternKind::Literal(literal),
                location,
            });
        }

        if self.matches(TokenKind::LeftParen) {
            let mut patterns = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    patterns.push(self.parse_pattern()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "expected ')'")?;
            return Ok(Pattern {
                kind: PatternKind::Tuple(patterns),
                location,
            });
        }

        Err(self.error_here("expected pattern"))
    }

    fn parse_struct_pattern(
        &mut self,
        path: Vec<String>,
        location: SourceLocation,
    ) -> ParseResult<Pattern> {
        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut fields = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                let field_location = self.peek().location;
                let name = self
                    .consume(TokenKind::Identifier, "expected field name in pattern")?
                    .lexeme;
                let pattern = if self.matches(TokenKind::Colon) {
                    self.parse_pattern()?
                } else {
                    // Shorthand `Point { x }` binds the field to `x`.
                    Pattern {
                        kind: PatternKind::Identifier {
                            name: name.clone(),
                            mutable: false,
                        },
                        location: field_location,
                    }
                };
                fields.push((name, pattern));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after struct pattern")?;
        Ok(Pattern {
            kind: PatternKind::Struct { path, fields },
            location,
        })
    }

    /// Consume a literal token (with optional leading minus on numbers)
    /// and return its decoded value.
    fn match_literal(&mut self) -> ParseResult<Option<Literal>> {
        if self.check(TokenKind::Minus)
            && matches!(
                self.peek_next().kind,
                TokenKind::IntegerLiteral | TokenKind::FloatLiteral
            )
        {
            self.advance();
            let token = self.advance().clone();
            let literal = match token.value {
                Some(LiteralValue::Int(v)) => Literal::Int(-v),
                Some(LiteralValue::UInt(v)) => Literal::Int(-(v as i64)),
                Some(LiteralValue::Float(v)) => Literal::Float(-v),
                _ => return Err(self.error_at(&token, "invalid numeric literal")),
            };
            return Ok(Some(literal));
        }

        let literal = match self.peek().kind {
            TokenKind::IntegerLiteral => match &self.peek().value {
                Some(LiteralValue::Int(v)) => Literal::Int(*v),
                Some(LiteralValue::UInt(v)) => Literal::UInt(*v),
                _ => Literal::Int(0),
            },
            TokenKind::FloatLiteral => match &self.peek().value {
                Some(LiteralValue::Float(v)) => Literal::Float(*v),
                _ => Literal::Float(0.0),
            },
            TokenKind::StringLiteral => match &self.peek().value {
                Some(LiteralValue::Str(v)) => Literal::Str(v.clone()),
                _ => Literal::Str(String::new()),
            },
            TokenKind::CharLiteral => match &self.peek().value {
                Some(LiteralValue::Char(v)) => Literal::Char(*v),
                _ => Literal::Char('\0'),
            },
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::Null => Literal::Null,
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(literal))
    }

    // ── Token management ────────────────────────────────────────────────

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.current + 1)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with EOF"))
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return kind == TokenKind::Eof;
        }
        self.peek().kind == kind
    }

    pub(crate) fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn matches_any(&mut self, kinds: &[TokenKind]) -> Option<TokenKind> {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return Some(kind);
            }
        }
        None
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_here(message))
    }

    pub(crate) fn error_here(&self, message: &str) -> ParseError {
        self.error_at(self.peek(), message)
    }

    pub(crate) fn error_at(&self, token: &Token, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            location: token.location,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.current
    }

    pub(crate) fn rewind(&mut self, position: usize) {
        self.current = position;
    }

    /// Skip forward to a statement boundary: just past a `;`, or to the
    /// next item-introducing keyword.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Impl
                | TokenKind::Trait
                | TokenKind::Let
                | TokenKind::Return => return,
                _ => {}
            }

            self.advance();
        }
    }
}
