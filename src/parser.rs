use std::mem;

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Token, UnaryOp},
    lexer::{LexError, Lexer},
};

/// Errors raised while parsing an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, got {found:?}")]
    UnexpectedToken { expected: &'static str, found: Token },

    #[error("function call on '{0}' is not supported; only built-in methods can be called")]
    UnsupportedCall(String),
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn expect(&mut self, expected: Token, name: &'static str) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(name));
        }
        self.advance()
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: self.current_token.clone(),
        }
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Parse primary expressions: literals, identifiers, `(...)`, `[...]`
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Float(n) => Expr::Float(n),
            Token::Integer(n) => Expr::Integer(n),
            Token::String(s) => Expr::String(s),
            Token::Boolean(b) => Expr::Boolean(b),
            Token::Null => Expr::Null,
            Token::Identifier(name) => {
                self.advance()?;
                if self.check(&Token::LParen) {
                    return Err(ParseError::UnsupportedCall(name));
                }
                return Ok(Expr::Identifier(name));
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(expr);
            }
            Token::LBracket => {
                self.advance()?;
                return self.parse_array_literal();
            }
            token => {
                self.current_token = token;
                return Err(self.unexpected("an expression"));
            }
        };
        self.advance()?;
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = vec![];

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma, "',' or ']'")?;
            }
        }

        self.expect(Token::RBracket, "']'")?;
        Ok(Expr::Array(elements))
    }

    fn parse_property_name(&mut self) -> Result<String, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                Ok(name)
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("a property name"))
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let mut args = vec![];
        while !self.check(&Token::RParen) {
            args.push(self.parse_expression()?);
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma, "',' or ')'")?;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }

    /// Parse member access, indexing and method calls
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut has_optional = false;

        loop {
            let optional = match self.current_token {
                Token::Dot => false,
                Token::QuestionDot => true,
                Token::LBracket => {
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                    continue;
                }
                _ => break,
            };
            self.advance()?;
            has_optional |= optional;

            // a?.[0]
            if optional && self.check(&Token::LBracket) {
                self.advance()?;
                let index = self.parse_expression()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: true,
                };
                continue;
            }

            let property = self.parse_property_name()?;
            expr = if self.check(&Token::LParen) {
                Expr::MethodCall {
                    object: Box::new(expr),
                    method: property,
                    args: self.parse_arguments()?,
                    optional,
                }
            } else {
                Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional,
                }
            };
        }

        if has_optional {
            expr = Expr::OptionalChain(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            Token::Plus => {
                self.advance()?;
                return self.parse_unary();
            }
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let operand = self.parse_unary()?; // right-associative
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token {
                Token::Lt => BinOp::LessThan,
                Token::Gt => BinOp::GreaterThan,
                Token::LtEq => BinOp::LessEqual,
                Token::GtEq => BinOp::GreaterEqual,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match &self.current_token {
                Token::EqEq => BinOp::Equal,
                Token::NotEq => BinOp::NotEqual,
                Token::EqEqEq => BinOp::StrictEqual,
                Token::NotEqEq => BinOp::StrictNotEqual,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_relational()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;

        while self.check(&Token::AndAnd) {
            self.advance()?;
            let right = self.parse_equality()?;
            left = Self::binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::OrOr) {
            self.advance()?;
            let right = self.parse_and()?;
            left = Self::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_nullish(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_or()?;

        while self.check(&Token::QuestionQuestion) {
            self.advance()?;
            let right = self.parse_or()?;
            left = Self::binary(BinOp::NullCoalesce, left, right);
        }
        Ok(left)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_nullish()?;

        if !self.check(&Token::Question) {
            return Ok(condition);
        }
        self.advance()?;
        let consequent = self.parse_conditional()?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.parse_conditional()?;

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional()
    }

    /// Parse a complete expression, rejecting trailing input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        if !self.check(&Token::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }
}

/// Parse an expression string in one go.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(source))?.parse()
}
