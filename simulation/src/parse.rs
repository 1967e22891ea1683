//! Text to [`Expr`] parser for metric components.
//!
//! Accepts the usual infix arithmetic, `^` or `**` for powers (right
//! associative, binding tighter than unary minus so `-r^2` is `-(r^2)`),
//! function calls such as `sin(phi)` or `sqrt(1 - 2/r)`, and the constants
//! `pi` and `E`. Any other identifier becomes a symbol.

use std::f64::consts;

use crate::error::ParseError;
use crate::expr::{Expr, Function};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => value.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Caret => "^".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::Caret
            }
            '*' => Token::Star,
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent part only when digits follow, so `2*E` stays a product.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                    literal: literal.clone(),
                    position: start,
                })?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((Token::Ident(chars[start..i].iter().collect()), start));
                continue;
            }
            other => {
                return Err(ParseError::UnexpectedChar {
                    found: other,
                    position: start,
                })
            }
        };
        tokens.push((token, start));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn next(&mut self) -> Result<(Token, usize), ParseError> {
        let item = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(item)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        let (token, position) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: token.describe(),
                position,
            })
        }
    }

    fn sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.cursor += 1;
                    lhs = lhs + self.product()?;
                }
                Some(Token::Minus) => {
                    self.cursor += 1;
                    lhs = lhs - self.product()?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.cursor += 1;
                    lhs = lhs * self.unary()?;
                }
                Some(Token::Slash) => {
                    self.cursor += 1;
                    lhs = lhs / self.unary()?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.cursor += 1;
            let exponent = self.unary()?;
            return Ok(base.pow(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let (token, position) = self.next()?;
        match token {
            Token::Number(value) => Ok(Expr::Num(value)),
            Token::LParen => {
                let inner = self.sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => {
                self.cursor += 1;
                let argument = self.sum()?;
                self.expect(Token::RParen)?;
                if name == "sqrt" {
                    return Ok(argument.powf(0.5));
                }
                let function = Function::from_name(&name)
                    .ok_or(ParseError::UnknownFunction { name, position })?;
                Ok(Expr::call(function, argument))
            }
            Token::Ident(name) => Ok(match name.as_str() {
                "pi" => Expr::Num(consts::PI),
                "E" => Expr::Num(consts::E),
                _ => Expr::Sym(name),
            }),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                position,
            }),
        }
    }
}

/// Parses one scalar expression.
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        cursor: 0,
    };
    let expr = parser.sum()?;
    match parser.tokens.get(parser.cursor) {
        None => Ok(expr),
        Some((token, position)) => Err(ParseError::UnexpectedToken {
            found: token.describe(),
            position: *position,
        }),
    }
}
