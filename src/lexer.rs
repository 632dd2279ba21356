use thiserror::Error;

use crate::ast::Token;

/// Character offset into the expression source.
pub type Position = usize;

/// Errors raised while tokenizing an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("invalid escape sequence \\{ch} at position {position}")]
    InvalidEscape { ch: char, position: Position },

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(Position),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn advance_by(&mut self, n: usize) {
        self.position += n;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_' || ch == '$'
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(LexError::InvalidEscape {
                                ch,
                                position: self.position,
                            });
                        }
                        None => return Err(LexError::UnterminatedString(start)),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString(start))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber(number))
        } else {
            match number.parse::<i64>() {
                Ok(n) => Ok(Token::Integer(n)),
                // Too large for i64, keep it as a float like JSON numbers do
                Err(_) => number
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|_| LexError::InvalidNumber(number)),
            }
        }
    }

    /// Emit `long` when the next chars spell it out, else `short`.
    fn one_of(&mut self, long: &str, long_tok: Token, short_len: usize, short_tok: Token) -> Token {
        let matches = long
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_char(i) == Some(c));
        if matches {
            self.advance_by(long.chars().count());
            long_tok
        } else {
            self.advance_by(short_len);
            short_tok
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let token = match self.current_char() {
            None => Token::Eof,
            Some('.') => {
                self.advance();
                Token::Dot
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(':') => {
                self.advance();
                Token::Colon
            }
            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('/') => {
                self.advance();
                Token::Slash
            }
            Some('%') => {
                self.advance();
                Token::Percent
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('?') => match self.peek_char(1) {
                Some('?') => {
                    self.advance_by(2);
                    Token::QuestionQuestion
                }
                // `a?.5:1` is a ternary, not optional chaining
                Some('.') if !self.peek_char(2).is_some_and(|c| c.is_ascii_digit()) => {
                    self.advance_by(2);
                    Token::QuestionDot
                }
                _ => {
                    self.advance();
                    Token::Question
                }
            },
            Some('=') => match self.peek_char(1) {
                Some('=') => self.one_of("===", Token::EqEqEq, 2, Token::EqEq),
                _ => {
                    return Err(LexError::UnexpectedChar {
                        ch: '=',
                        position: self.position,
                    });
                }
            },
            Some('!') => match self.peek_char(1) {
                Some('=') => self.one_of("!==", Token::NotEqEq, 2, Token::NotEq),
                _ => {
                    self.advance();
                    Token::Bang
                }
            },
            Some('<') => self.one_of("<=", Token::LtEq, 1, Token::Lt),
            Some('>') => self.one_of(">=", Token::GtEq, 1, Token::Gt),
            Some('&') if self.peek_char(1) == Some('&') => {
                self.advance_by(2);
                Token::AndAnd
            }
            Some('|') if self.peek_char(1) == Some('|') => {
                self.advance_by(2);
                Token::OrOr
            }
            Some('"') => Token::String(self.read_string('"')?),
            Some('\'') => Token::String(self.read_string('\'')?),
            Some(ch) if Self::is_identifier_start(ch) => {
                let ident = self.read_identifier();

                match ident.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" | "undefined" => Token::Null,
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    position: self.position,
                });
            }
        };

        Ok(token)
    }
}
