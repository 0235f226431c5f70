//! Recursive-descent parser.
//!
//! Grammar (lowest precedence first):
//! ```text
//! formula    := "="? comparison EOF
//! comparison := additive (("=" | "<>" | "<" | "<=" | ">" | ">=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := "-" unary | primary
//! primary    := NUMBER | STRING | TRUE | FALSE | variable
//!             | FUNC "(" (comparison ("," comparison)*)? ")" | "(" comparison ")"
//! ```

use super::FormulaError;
use super::lexer::{Spanned, Token, tokenize};

/// Names a formula can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Confirm,
    Accept,
    Decline,
    Neutral,
    Total,
    /// Sum of the four option counts.
    Votes,
    TimePassed,
}

impl Variable {
    fn lookup(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let name = name.strip_prefix("vote.").unwrap_or(&name);
        Some(match name {
            "confirm" => Variable::Confirm,
            "accept" => Variable::Accept,
            "decline" => Variable::Decline,
            "neutral" => Variable::Neutral,
            "total" => Variable::Total,
            "votes" => Variable::Votes,
            "timepassed" => Variable::TimePassed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    If,
    And,
    Or,
    Not,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "IF" => Func::If,
            "AND" => Func::And,
            "OR" => Func::Or,
            "NOT" => Func::Not,
            "MIN" => Func::Min,
            "MAX" => Func::Max,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::If => "IF",
            Func::And => "AND",
            Func::Or => "OR",
            Func::Not => "NOT",
            Func::Min => "MIN",
            Func::Max => "MAX",
        }
    }

    fn check_arity(self, got: usize) -> Result<(), FormulaError> {
        let (ok, expected) = match self {
            Func::If => ((2..=3).contains(&got), "2 or 3"),
            Func::Not => (got == 1, "1"),
            Func::And | Func::Or | Func::Min | Func::Max => (got >= 1, "at least 1"),
        };
        if ok {
            Ok(())
        } else {
            Err(FormulaError::Arity {
                func: self.name(),
                expected,
                got,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Var(Variable),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

pub fn parse(src: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        end: src.len(),
    };
    if matches!(parser.peek(), Some(Token::Eq)) {
        parser.index += 1;
    }
    if parser.peek().is_none() {
        return Err(FormulaError::Empty);
    }
    let expr = parser.comparison()?;
    match parser.tokens.get(parser.index) {
        None => Ok(expr),
        Some(extra) => Err(FormulaError::UnexpectedToken {
            found: extra.token.describe(),
            pos: extra.pos,
            expected: "end of formula",
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let item = self.tokens.get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    fn unexpected(&self, expected: &'static str) -> FormulaError {
        match self.tokens.get(self.index) {
            Some(s) => FormulaError::UnexpectedToken {
                found: s.token.describe(),
                pos: s.pos,
                expected,
            },
            None => FormulaError::UnexpectedToken {
                found: "end of formula".into(),
                pos: self.end,
                expected,
            },
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), FormulaError> {
        if self.peek() == Some(&token) {
            self.index += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(left),
        };
        self.index += 1;
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.index += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.index += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.index += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(Spanned { token, pos }) = self.advance() else {
            return Err(self.unexpected("a value"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Text(s) => Ok(Expr::Text(s)),
            Token::LParen => {
                let inner = self.comparison()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.index += 1;
                    let func =
                        Func::lookup(&name).ok_or(FormulaError::UnknownFunction { name, pos })?;
                    let args = self.arguments()?;
                    func.check_arity(args.len())?;
                    return Ok(Expr::Call(func, args));
                }
                match name.to_ascii_uppercase().as_str() {
                    "TRUE" => Ok(Expr::Bool(true)),
                    "FALSE" => Ok(Expr::Bool(false)),
                    _ => Variable::lookup(&name)
                        .map(Expr::Var)
                        .ok_or(FormulaError::UnknownVariable { name, pos }),
                }
            }
            _ => {
                self.index -= 1;
                Err(self.unexpected("a value"))
            }
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.index += 1;
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            match self.peek() {
                Some(Token::Comma) => self.index += 1,
                Some(Token::RParen) => {
                    self.index += 1;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("`,` or `)`")),
            }
        }
    }
}
