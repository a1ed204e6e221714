use crate::lexer::token::{SourceLocation, TokenKind};

use super::ast::{BinaryOp, Expr, ExprKind, FieldInit, MatchArm, UnaryOp};
use super::{ParseResult, Parser};

const ASSIGNMENT_OPS: [TokenKind; 11] = [
    TokenKind::Equal,
    TokenKind::PlusEqual,
    TokenKind::MinusEqual,
    TokenKind::StarEqual,
    TokenKind::SlashEqual,
    TokenKind::PercentEqual,
    TokenKind::AmpEqual,
    TokenKind::PipeEqual,
    TokenKind::CaretEqual,
    TokenKind::ShlEqual,
    TokenKind::ShrEqual,
];

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_range()?;

        if let Some(kind) = self.matches_any(&ASSIGNMENT_OPS) {
            let location = self.previous().location;
            let op = match kind {
                TokenKind::Equal => BinaryOp::Assign,
                TokenKind::PlusEqual => BinaryOp::AddAssign,
                TokenKind::MinusEqual => BinaryOp::SubAssign,
                TokenKind::StarEqual => BinaryOp::MulAssign,
                TokenKind::SlashEqual => BinaryOp::DivAssign,
                TokenKind::PercentEqual => BinaryOp::ModAssign,
                TokenKind::AmpEqual => BinaryOp::AndAssign,
                TokenKind::PipeEqual => BinaryOp::OrAssign,
                TokenKind::CaretEqual => BinaryOp::XorAssign,
                TokenKind::ShlEqual => BinaryOp::ShlAssign,
                _ => BinaryOp::ShrAssign,
            };
            let right = self.parse_assignment()?;
            return Ok(Expr {
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                location,
            });
        }

        Ok(expr)
    }

    /// `..`/`..=` sit below comparison and above assignment; both operands
    /// may be omitted.
    fn parse_range(&mut self) -> ParseResult<Expr> {
        let location = self.peek().location;

        if self.check(TokenKind::DotDot) || self.check(TokenKind::DotDotEqual) {
            let inclusive = self.advance().kind == TokenKind::DotDotEqual;
            let end = if can_begin_expression(self.peek().kind) {
                Some(Box::new(self.parse_logical_or()?))
            } else {
                None
            };
            return Ok(Expr {
                kind: ExprKind::Range {
                    start: None,
                    end,
                    inclusive,
                },
                location,
            });
        }

        let start = self.parse_logical_or()?;

        if self.check(TokenKind::DotDot) || self.check(TokenKind::DotDotEqual) {
            let inclusive = self.advance().kind == TokenKind::DotDotEqual;
            let end = if can_begin_expression(self.peek().kind) {
                Some(Box::new(self.parse_logical_or()?))
            } else {
                None
            };
            return Ok(Expr {
                kind: ExprKind::Range {
                    start: Some(Box::new(start)),
                    end,
                    inclusive,
                },
                location,
            });
        }

        Ok(start)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_logical_and()?;
        while self.matches(TokenKind::PipePipe) {
            let location = self.previous().location;
            let right = self.parse_logical_and()?;
            expr = binary(BinaryOp::Or, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_bitwise_or()?;
        while self.matches(TokenKind::AmpAmp) {
            let location = self.previous().location;
            let right = self.parse_bitwise_or()?;
            expr = binary(BinaryOp::And, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_bitwise_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_bitwise_xor()?;
        while self.matches(TokenKind::Pipe) {
            let location = self.previous().location;
            let right = self.parse_bitwise_xor()?;
            expr = binary(BinaryOp::BitOr, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_bitwise_xor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_bitwise_and()?;
        while self.matches(TokenKind::Caret) {
            let location = self.previous().location;
            let right = self.parse_bitwise_and()?;
            expr = binary(BinaryOp::BitXor, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_bitwise_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::Amp) {
            let location = self.previous().location;
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::BitAnd, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = if self.matches(TokenKind::EqualEqual) {
                BinaryOp::Eq
            } else if self.matches(TokenKind::BangEqual) {
                BinaryOp::Ne
            } else {
                break;
            };
            let location = self.previous().location;
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_shift()?;
        loop {
            let op = if self.matches(TokenKind::Less) {
                BinaryOp::Lt
            } else if self.matches(TokenKind::LessEqual) {
                BinaryOp::Le
            } else if self.matches(TokenKind::Greater) {
                BinaryOp::Gt
            } else if self.matches(TokenKind::GreaterEqual) {
                BinaryOp::Ge
            } else {
                break;
            };
            let location = self.previous().location;
            let right = self.parse_shift()?;
            expr = binary(op, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let op = if self.matches(TokenKind::Shl) {
                BinaryOp::Shl
            } else if self.matches(TokenKind::Shr) {
                BinaryOp::Shr
            } else {
                break;
            };
            let location = self.previous().location;
            let right = self.parse_term()?;
            expr = binary(op, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let location = self.previous().location;
            let right = self.parse_factor()?;
            expr = binary(op, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.matches(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            let location = self.previous().location;
            let right = self.parse_unary()?;
            expr = binary(op, expr, right, location);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else if self.matches(TokenKind::Tilde) {
            UnaryOp::BitNot
        } else if self.matches(TokenKind::Star) {
            UnaryOp::Deref
        } else if self.matches(TokenKind::Amp) {
            if self.matches(TokenKind::Mut) {
                UnaryOp::AddrOfMut
            } else {
                UnaryOp::AddrOf
            }
        } else {
            return self.parse_postfix();
        };

        let location = self.previous().location;
        let operand = self.parse_unary()?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            location,
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.matches(TokenKind::LeftParen) {
                let location = self.previous().location;
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "expected ')' after arguments")?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    location,
                };
            } else if self.matches(TokenKind::LeftBracket) {
                let location = self.previous().location;
                let index = self.parse_expression()?;
                self.consume(TokenKind::RightBracket, "expected ']' after index")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    location,
                };
            } else if self.matches(TokenKind::Dot) {
                let location = self.previous().location;
                let field = self
                    .consume(TokenKind::Identifier, "expected field name")?
                    .lexeme;
                expr = Expr {
                    kind: ExprKind::FieldAccess {
                        object: Box::new(expr),
                        field,
                    },
                    location,
                };
            } else if self.matches(TokenKind::As) {
                let location = self.previous().location;
                let target = self.parse_type()?;
                expr = Expr {
                    kind: ExprKind::Cast {
                        value: Box::new(expr),
                        target: Box::new(target),
                    },
                    location,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let location = self.peek().location;

        if let Some(literal) = self.match_literal()? {
            return Ok(Expr {
                kind: ExprKind::Literal(literal),
                location,
            });
        }

        if self.check(TokenKind::Identifier) {
            let path = self.parse_path()?;

            // `Name { … }` is a struct literal only for capitalized names;
            // this keeps `if x < y { … }` parsing as a comparison.
            let is_struct_literal = self.check(TokenKind::LeftBrace)
                && path
                    .last()
                    .and_then(|s| s.chars().next())
                    .is_some_and(|c| c.is_ascii_uppercase());
            if is_struct_literal {
                return self.parse_struct_literal(path, location);
            }

            let name = path.into_iter().next().unwrap_or_default();
            return Ok(Expr {
                kind: ExprKind::Identifier(name),
                location,
            });
        }

        if self.matches(TokenKind::LeftParen) {
            if self.matches(TokenKind::RightParen) {
                return Ok(Expr {
                    kind: ExprKind::Tuple(Vec::new()),
                    location,
                });
            }

            let first = self.parse_expression()?;

            if self.matches(TokenKind::Comma) {
                let mut elements = vec![first];
                if !self.check(TokenKind::RightParen) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "expected ')' after tuple")?;
                return Ok(Expr {
                    kind: ExprKind::Tuple(elements),
                    location,
                });
            }

            self.consume(TokenKind::RightParen, "expected ')' after expression")?;
            return Ok(first);
        }

        if self.matches(TokenKind::LeftBracket) {
            return self.parse_array_literal(location);
        }

        if self.check(TokenKind::LeftBrace) {
            return self.parse_block_expr();
        }

        if self.matches(TokenKind::If) {
            return self.parse_if_expr();
        }

        if self.matches(TokenKind::Match) {
            return self.parse_match_expr();
        }

        if self.matches(TokenKind::While) {
            return self.parse_while_expr();
        }

        if self.matches(TokenKind::For) {
            return self.parse_for_expr();
        }

        if self.matches(TokenKind::Return) {
            let value = if can_begin_expression(self.peek().kind) {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            return Ok(Expr {
                kind: ExprKind::Return(value),
                location,
            });
        }

        if self.matches(TokenKind::Break) {
            return Ok(Expr {
                kind: ExprKind::Break(None),
                location,
            });
        }

        if self.matches(TokenKind::Continue) {
            return Ok(Expr {
                kind: ExprKind::Continue(None),
                location,
            });
        }

        Err(self.error_here("expected expression"))
    }

    /// `{ stmt* tail? }` — a trailing expression without a semicolon is the
    /// block's value. The probe parses an expression, keeps it as the tail
    /// if `}` follows, and otherwise rewinds and re-parses it as a
    /// statement.
    pub(crate) fn parse_block_expr(&mut self) -> ParseResult<Expr> {
        let location = self.peek().location;
        self.consume(TokenKind::LeftBrace, "expected '{'")?;

        let mut stmts = Vec::new();
        let mut tail = None;

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.matches(TokenKind::Semicolon) {
                continue;
            }

            if !self.check(TokenKind::Let) && !self.check_item_start() {
                let saved = self.position();
                let expr = self.parse_expression()?;
                if self.check(TokenKind::RightBrace) {
                    tail = Some(Box::new(expr));
                    break;
                }
                self.rewind(saved);
            }

            stmts.push(self.parse_statement()?);
        }

        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Expr {
            kind: ExprKind::Block { stmts, tail },
            location,
        })
    }

    fn parse_if_expr(&mut self) -> ParseResult<Expr> {
        let location = self.previous().location;
        let condition = self.parse_expression()?;

        if !self.check(TokenKind::LeftBrace) {
            return Err(self.error_here("expected '{' after if condition"));
        }
        let then_branch = self.parse_block_expr()?;

        let else_branch = if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                Some(Box::new(self.parse_if_expr()?))
            } else {
                if !self.check(TokenKind::LeftBrace) {
                    return Err(self.error_here("expected '{' after else"));
                }
                Some(Box::new(self.parse_block_expr()?))
            }
        } else {
            None
        };

        Ok(Expr {
            kind: ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            location,
        })
    }

    fn parse_while_expr(&mut self) -> ParseResult<Expr> {
        let location = self.previous().location;
        let condition = self.parse_expression()?;

        if !self.check(TokenKind::LeftBrace) {
            return Err(self.error_here("expected '{' after while condition"));
        }
        let body = self.parse_block_expr()?;

        Ok(Expr {
            kind: ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            location,
        })
    }

    fn parse_for_expr(&mut self) -> ParseResult<Expr> {
        let location = self.previous().location;
        let pattern = self.parse_pattern()?;
        self.consume(TokenKind::In, "expected 'in' after for pattern")?;
        let iterator = self.parse_expression()?;

        if !self.check(TokenKind::LeftBrace) {
            return Err(self.error_here("expected '{' after for iterator"));
        }
        let body = self.parse_block_expr()?;

        Ok(Expr {
            kind: ExprKind::For {
                pattern: Box::new(pattern),
                iterator: Box::new(iterator),
                body: Box::new(body),
            },
            location,
        })
    }

    fn parse_match_expr(&mut self) -> ParseResult<Expr> {
        let location = self.previous().location;
        let scrutinee = self.parse_expression()?;

        self.consume(TokenKind::LeftBrace, "expected '{' after match expression")?;

        let mut arms = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let arm_location = self.peek().location;
            let pattern = self.parse_pattern()?;

            let guard = if self.matches(TokenKind::If) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            self.consume(TokenKind::FatArrow, "expected '=>' after pattern")?;
            let body = self.parse_expression()?;

            arms.push(MatchArm {
                pattern,
                guard,
                body,
                location: arm_location,
            });

            if !self.matches(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Expr {
            kind: ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            location,
        })
    }

    fn parse_struct_literal(
        &mut self,
        path: Vec<String>,
        location: SourceLocation,
    ) -> ParseResult<Expr> {
        self.consume(TokenKind::LeftBrace, "expected '{'")?;

        let mut fields = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                let field_location = self.peek().location;
                let name = self
                    .consume(TokenKind::Identifier, "expected field name")?
                    .lexeme;
                self.consume(TokenKind::Colon, "expected ':' after field name")?;
                let value = self.parse_expression()?;
                fields.push(FieldInit {
                    name,
                    value,
                    location: field_location,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightBrace, "expected '}'")?;

        Ok(Expr {
            kind: ExprKind::StructLiteral { path, fields },
            location,
        })
    }

    fn parse_array_literal(&mut self, location: SourceLocation) -> ParseResult<Expr> {
        if self.matches(TokenKind::RightBracket) {
            return Ok(Expr {
                kind: ExprKind::ArrayLiteral(Vec::new()),
                location,
            });
        }

        let first = self.parse_expression()?;

        if self.matches(TokenKind::Semicolon) {
            let count = self.parse_expression()?;
            self.consume(TokenKind::RightBracket, "expected ']'")?;
            return Ok(Expr {
                kind: ExprKind::ArrayRepeat {
                    value: Box::new(first),
                    count: Box::new(count),
                },
                location,
            });
        }

        let mut elements = vec![first];
        while self.matches(TokenKind::Comma) {
            if self.check(TokenKind::RightBracket) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        self.consume(TokenKind::RightBracket, "expected ']'")?;

        Ok(Expr {
            kind: ExprKind::ArrayLiteral(elements),
            location,
        })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, location: SourceLocation) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        location,
    }
}

fn can_begin_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::CharLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::Identifier
            | TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::LeftBrace
            | TokenKind::If
            | TokenKind::Match
            | TokenKind::While
            | TokenKind::For
            | TokenKind::Return
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Star
            | TokenKind::Amp
    )
}
