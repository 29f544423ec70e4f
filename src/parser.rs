use crate::{
    ast::{BinaryOp, Expr, ForHeader, UnaryOp},
    error::{ParseError, ParseErrorKind},
    interface::Value,
    lexer::{Token, TokenKind, tokenize},
};

type ParseResult<T> = Result<T, ParseError>;

static EOF: Token = Token {
    kind: TokenKind::Eof,
    position: 0,
};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> ParseResult<Self> {
        Ok(Parser {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    #[inline]
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and advance() never moves past it.
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    #[inline]
    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn eof(&self) -> bool {
        *self.peek_kind() == TokenKind::Eof
    }

    /// Consume the next token if it matches `kind`.
    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.peek().position, kind)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.eof() {
            self.make_error(ParseErrorKind::unexpected_eof(Some(expected)))
        } else {
            self.make_error(ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: self.peek_kind().to_string(),
            })
        }
    }

    fn expect(&mut self, kind: &TokenKind, description: &str) -> ParseResult<()> {
        if self.consume(kind) {
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    fn expect_identifier(&mut self, description: &str) -> ParseResult<String> {
        if let TokenKind::Ident(name) = self.peek_kind() {
            if !is_reserved_literal(name) {
                let name = name.clone();
                self.advance();
                return Ok(name);
            }
        }
        Err(self.unexpected(description))
    }

    // --- Expression Parsing (precedence climbing, lowest first) ---
    // OR -> AND -> equality -> comparison -> additive -> multiplicative
    //    -> unary -> postfix -> primary

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_or_expression()
    }

    fn parse_binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        'operators: loop {
            for (token, op) in operators {
                if self.consume(token) {
                    let right = next(self)?;
                    left = Expr::BinaryOp {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'operators;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_or_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[(TokenKind::Or, BinaryOp::Or)], Self::parse_and_expression)
    }

    fn parse_and_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[(TokenKind::And, BinaryOp::And)],
            Self::parse_equality_expression,
        )
    }

    fn parse_equality_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Eq, BinaryOp::Eq),
                (TokenKind::Assign, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::NotEq),
            ],
            Self::parse_comparison_expression,
        )
    }

    fn parse_comparison_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::LtEq, BinaryOp::LtEq),
                (TokenKind::GtEq, BinaryOp::GtEq),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Gt, BinaryOp::Gt),
            ],
            Self::parse_additive_expression,
        )
    }

    fn parse_additive_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::parse_multiplicative_expression,
        )
    }

    fn parse_multiplicative_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary_expression,
        )
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expr> {
        let operators = [
            (TokenKind::Bang, UnaryOp::Not),
            (TokenKind::Minus, UnaryOp::Neg),
            (TokenKind::Plus, UnaryOp::Plus),
        ];
        let Some(op) = operators
            .iter()
            .find(|(token, _)| token == self.peek_kind())
            .map(|(_, op)| *op)
        else {
            return self.parse_postfix_expression();
        };
        self.advance();
        let operand = self.parse_unary_expression()?;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_expression()?;
        loop {
            if self.consume(&TokenKind::Dot) {
                expr = if let TokenKind::Ident(field) = self.peek_kind() {
                    Expr::FieldAccess {
                        object: Box::new(expr),
                        field: field.clone(),
                    }
                } else if let TokenKind::Int(index) = self.peek_kind() {
                    // `items.0` reads as `items[0]`.
                    Expr::IndexAccess {
                        object: Box::new(expr),
                        index: Box::new(Expr::literal(*index)),
                    }
                } else {
                    return Err(self.unexpected("field name after '.'"));
                };
                self.advance();
            } else if self.consume(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::IndexAccess {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> ParseResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expr::literal(i))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr::literal(x))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::literal(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => return Ok(Expr::literal(true)),
                    "false" => return Ok(Expr::literal(false)),
                    "null" | "nil" => return Ok(Expr::Literal { value: Value::Null }),
                    _ => {}
                }
                if self.consume(&TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expr::FunctionCall { name, args })
                } else {
                    Ok(Expr::Variable { name })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Bang
            | TokenKind::Assign
            | TokenKind::RParen
            | TokenKind::LBracket
            | TokenKind::RBracket
            | TokenKind::Comma
            | TokenKind::Dot
            | TokenKind::Eof => Err(self.unexpected("expression")),
        }
    }

    /// Arguments after the opening parenthesis, up to and including `)`.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.consume(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.consume(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn expect_eof(&self) -> ParseResult<()> {
        if self.eof() {
            Ok(())
        } else {
            Err(self.make_error(ParseErrorKind::TrailingToken {
                found: self.peek_kind().to_string(),
            }))
        }
    }

    // --- For Loop Header ---

    fn parse_for_header(&mut self) -> ParseResult<ForHeader> {
        let invalid = |parser: &Self, reason: &str| {
            parser.make_error(ParseErrorKind::InvalidForLoop {
                reason: reason.to_string(),
            })
        };

        if *self.peek_kind() == TokenKind::Comma {
            return Err(invalid(self, "index variable is empty"));
        }
        let first = self
            .expect_identifier("loop variable")
            .map_err(|_| invalid(self, "expected a loop variable name"))?;

        let (index_variable, variable) = if self.consume(&TokenKind::Comma) {
            let second = self
                .expect_identifier("loop variable")
                .map_err(|_| invalid(self, "expected a loop variable name after ','"))?;
            (Some(first), second)
        } else {
            (None, first)
        };

        if !matches!(self.peek_kind(), TokenKind::Ident(word) if word == "in") {
            return Err(invalid(self, "expected 'in' after the loop variable"));
        }
        self.advance();

        if self.eof() {
            return Err(invalid(self, "missing collection expression"));
        }
        let collection = self.parse_expression()?;
        self.expect_eof()?;

        Ok(ForHeader {
            index_variable,
            variable,
            collection,
        })
    }
}

fn is_reserved_literal(name: &str) -> bool {
    matches!(name, "true" | "false" | "null" | "nil" | "in")
}

/// Parses the longest expression at the start of `input`, ignoring anything
/// after it.
///
/// # Errors
/// - If the input cannot be tokenized or does not start with an expression.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_expression()
}

/// Parses `input` as exactly one expression.
///
/// # Errors
/// - As [`parse_expression`], and [`ParseErrorKind::TrailingToken`] if tokens
///   remain after a complete expression.
pub fn parse_expression_strict(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses the text after the `for` keyword.
///
/// # Errors
/// - [`ParseErrorKind::InvalidForLoop`] if the variables or `in` are missing or
///   malformed, or any strict expression error in the collection.
pub fn parse_for_header(input: &str) -> Result<ForHeader, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_for_header()
}
