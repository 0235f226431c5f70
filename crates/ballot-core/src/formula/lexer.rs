//! Tokenizer for decision formulas.

use super::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Text(s) => format!("string \"{s}\""),
            Token::Ident(s) => format!("`{s}`"),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::Comma => "`,`".into(),
            Token::Plus => "`+`".into(),
            Token::Minus => "`-`".into(),
            Token::Star => "`*`".into(),
            Token::Slash => "`/`".into(),
            Token::Eq => "`=`".into(),
            Token::Ne => "`<>`".into(),
            Token::Lt => "`<`".into(),
            Token::Le => "`<=`".into(),
            Token::Gt => "`>`".into(),
            Token::Ge => "`>=`".into(),
        }
    }
}

/// Token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = if ch.is_ascii_digit() || ch == '.' {
            let mut end = pos;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = &src[pos..end];
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber {
                    literal: literal.to_string(),
                    pos,
                })?;
            Token::Number(value)
        } else if ch.is_alphabetic() || ch == '_' {
            let mut end = pos;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || c == '.' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            Token::Ident(src[pos..end].to_string())
        } else if ch == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                if c == '"' {
                    // "" inside a string is an escaped quote
                    if chars.peek().is_some_and(|&(_, n)| n == '"') {
                        chars.next();
                        text.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    text.push(c);
                }
            }
            if !closed {
                return Err(FormulaError::UnterminatedString(pos));
            }
            Token::Text(text)
        } else {
            chars.next();
            let next = chars.peek().map(|&(_, c)| c);
            let (token, wide) = match (ch, next) {
                ('(', _) => (Token::LParen, false),
                (')', _) => (Token::RParen, false),
                (',', _) => (Token::Comma, false),
                ('+', _) => (Token::Plus, false),
                ('-', _) => (Token::Minus, false),
                ('*', _) => (Token::Star, false),
                ('/', _) => (Token::Slash, false),
                ('<', Some('>')) => (Token::Ne, true),
                ('<', Some('=')) => (Token::Le, true),
                ('<', _) => (Token::Lt, false),
                ('>', Some('=')) => (Token::Ge, true),
                ('>', _) => (Token::Gt, false),
                ('!', Some('=')) => (Token::Ne, true),
                ('=', Some('=')) => (Token::Eq, true),
                ('=', _) => (Token::Eq, false),
                _ => return Err(FormulaError::UnexpectedChar { ch, pos }),
            };
            if wide {
                chars.next();
            }
            token
        };
        tokens.push(Spanned { token, pos });
    }
    Ok(tokens)
}
