//! Decision formula.
//!
//! A small spreadsheet-style expression over the vote tally and the
//! `timepassed` flag, evaluated to one of the outcome codes. The formula is
//! parsed once at startup; evaluation is pure.

pub mod lexer;
pub mod parser;

use thiserror::Error;
use tracing::warn;

use crate::domain::{OutcomeCode, TallyField, VoteTally};
use crate::ports::OutcomeEvaluator;

pub use self::parser::{BinOp, Expr, Func, Variable, parse};

/// Built-in rule used when the config has no formula.
///
/// Two vouches and no declines accept immediately; otherwise, once the window
/// is over, more accepts than declines accept.
pub const DEFAULT_FORMULA: &str = r#"IF(AND(confirm >= 2, decline = 0), "FASTACCEPT", IF(AND(timepassed, accept + confirm > decline), "WAIT_ACCEPT", "WAIT_DECLINE"))"#;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("unexpected character `{ch}` at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("invalid number `{literal}` at {pos}")]
    InvalidNumber { literal: String, pos: usize },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },

    #[error("unknown variable `{name}` at {pos}")]
    UnknownVariable { name: String, pos: usize },

    #[error("unknown function `{name}` at {pos}")]
    UnknownFunction { name: String, pos: usize },

    #[error("{func} expects {expected} argument(s), got {got}")]
    Arity {
        func: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("expected {expected}, got {got}")]
    Type {
        expected: &'static str,
        got: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("empty formula")]
    Empty,
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "string",
        }
    }

    fn as_number(&self) -> Result<f64, FormulaError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) => Err(FormulaError::Type {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    fn as_bool(&self) -> Result<bool, FormulaError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Text(_) => Err(FormulaError::Type {
                expected: "boolean",
                got: self.type_name(),
            }),
        }
    }
}

/// Inputs a formula can see.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub tally: &'a VoteTally,
    pub time_passed: bool,
}

impl Bindings<'_> {
    fn get(&self, var: Variable) -> Value {
        let count = |field| Value::Number(f64::from(self.tally.get(field)));
        match var {
            Variable::Confirm => count(TallyField::Confirm),
            Variable::Accept => count(TallyField::Accept),
            Variable::Decline => count(TallyField::Decline),
            Variable::Neutral => count(TallyField::Neutral),
            Variable::Total => Value::Number(f64::from(self.tally.total)),
            Variable::Votes => Value::Number(f64::from(self.tally.votes())),
            Variable::TimePassed => Value::Bool(self.time_passed),
        }
    }
}

pub fn eval(expr: &Expr, env: &Bindings<'_>) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(var) => Ok(env.get(*var)),
        Expr::Neg(inner) => Ok(Value::Number(-eval(inner, env)?.as_number()?)),
        Expr::Binary(op, left, right) => {
            let left = eval(left, env)?;
            let right = eval(right, env)?;
            binary(*op, &left, &right)
        }
        Expr::Call(func, args) => call(*func, args, env),
    }
}

fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, FormulaError> {
    let arith = |f: fn(f64, f64) -> f64| -> Result<Value, FormulaError> {
        Ok(Value::Number(f(left.as_number()?, right.as_number()?)))
    };
    match op {
        BinOp::Add => arith(|a, b| a + b),
        BinOp::Sub => arith(|a, b| a - b),
        BinOp::Mul => arith(|a, b| a * b),
        BinOp::Div => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(Value::Number(left.as_number()? / divisor))
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (left, right) {
                (Value::Text(a), Value::Text(b)) => a.cmp(b),
                _ => left
                    .as_number()?
                    .partial_cmp(&right.as_number()?)
                    .ok_or(FormulaError::Type {
                        expected: "comparable number",
                        got: "NaN",
                    })?,
            };
            Ok(Value::Bool(match op {
                BinOp::Eq => ordering.is_eq(),
                BinOp::Ne => ordering.is_ne(),
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
    }
}

fn call(func: Func, args: &[Expr], env: &Bindings<'_>) -> Result<Value, FormulaError> {
    match func {
        Func::If => {
            let cond = match args.first() {
                Some(c) => eval(c, env)?.as_bool()?,
                None => return Err(arity(func, args.len())),
            };
            match (cond, args.get(1), args.get(2)) {
                (true, Some(then), _) => eval(then, env),
                (false, _, Some(otherwise)) => eval(otherwise, env),
                (false, _, None) => Ok(Value::Bool(false)),
                (true, None, _) => Err(arity(func, args.len())),
            }
        }
        Func::And => {
            for arg in args {
                if !eval(arg, env)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Func::Or => {
            for arg in args {
                if eval(arg, env)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Func::Not => match args {
            [only] => Ok(Value::Bool(!eval(only, env)?.as_bool()?)),
            _ => Err(arity(func, args.len())),
        },
        Func::Min | Func::Max => {
            let mut best: Option<f64> = None;
            for arg in args {
                let n = eval(arg, env)?.as_number()?;
                best = Some(match (best, func) {
                    (None, _) => n,
                    (Some(b), Func::Min) => b.min(n),
                    (Some(b), _) => b.max(n),
                });
            }
            best.map(Value::Number).ok_or(arity(func, 0))
        }
    }
}

fn arity(func: Func, got: usize) -> FormulaError {
    FormulaError::Arity {
        func: func.name(),
        expected: "more",
        got,
    }
}

/// The configured decision rule.
#[derive(Debug, Clone)]
pub struct FormulaEvaluator {
    source: String,
    expr: Expr,
}

impl FormulaEvaluator {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        Ok(Self {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate without normalizing.
    pub fn eval_raw(&self, tally: &VoteTally, time_passed: bool) -> Result<Value, FormulaError> {
        eval(&self.expr, &Bindings { tally, time_passed })
    }
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self {
            source: DEFAULT_FORMULA.to_string(),
            expr: default_expr(),
        }
    }
}

fn default_expr() -> Expr {
    use self::parser::{BinOp as B, Expr as E, Func as F, Variable as V};
    let var = |v| Box::new(E::Var(v));
    let num = |n| Box::new(E::Number(n));
    let text = |s: &str| E::Text(s.to_string());
    E::Call(
        F::If,
        vec![
            E::Call(
                F::And,
                vec![
                    E::Binary(B::Ge, var(V::Confirm), num(2.0)),
                    E::Binary(B::Eq, var(V::Decline), num(0.0)),
                ],
            ),
            text("FASTACCEPT"),
            E::Call(
                F::If,
                vec![
                    E::Call(
                        F::And,
                        vec![
                            E::Var(V::TimePassed),
                            E::Binary(
                                B::Gt,
                                Box::new(E::Binary(B::Add, var(V::Accept), var(V::Confirm))),
                                var(V::Decline),
                            ),
                        ],
                    ),
                    text("WAIT_ACCEPT"),
                    text("WAIT_DECLINE"),
                ],
            ),
        ],
    )
}

impl OutcomeEvaluator for FormulaEvaluator {
    fn evaluate(&self, tally: &VoteTally, time_passed: bool) -> OutcomeCode {
        match self.eval_raw(tally, time_passed) {
            Ok(Value::Text(raw)) => {
                let (code, recognized) = OutcomeCode::normalize(&raw);
                if !recognized {
                    warn!(result = %raw, fallback = %code, "formula returned an unknown outcome");
                }
                code
            }
            Ok(other) => {
                warn!(result = ?other, fallback = %OutcomeCode::WaitDecline, "formula did not return an outcome string");
                OutcomeCode::WaitDecline
            }
            Err(err) => {
                warn!(error = %err, fallback = %OutcomeCode::WaitDecline, "formula evaluation failed");
                OutcomeCode::WaitDecline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tally(confirm: u32, accept: u32, decline: u32, neutral: u32) -> VoteTally {
        VoteTally::new()
            .with(TallyField::Confirm, confirm)
            .with(TallyField::Accept, accept)
            .with(TallyField::Decline, decline)
            .with(TallyField::Neutral, neutral)
            .with_total(10)
    }

    #[test]
    fn default_formula_text_matches_builtin_tree() {
        assert_eq!(parse(DEFAULT_FORMULA).unwrap(), default_expr());
    }

    #[rstest]
    #[case::fast_accept(tally(2, 0, 0, 0), false, OutcomeCode::FastAccept)]
    #[case::fast_accept_after_window(tally(3, 1, 0, 0), true, OutcomeCode::FastAccept)]
    #[case::still_open(tally(0, 3, 0, 0), false, OutcomeCode::WaitDecline)]
    #[case::accepted(tally(0, 3, 0, 0), true, OutcomeCode::WaitAccept)]
    #[case::vouch_blocked_by_decline(tally(2, 0, 1, 0), true, OutcomeCode::WaitAccept)]
    #[case::rejected(tally(0, 1, 2, 5), true, OutcomeCode::WaitDecline)]
    #[case::no_votes(tally(0, 0, 0, 0), true, OutcomeCode::WaitDecline)]
    fn default_rule(#[case] t: VoteTally, #[case] time_passed: bool, #[case] expected: OutcomeCode) {
        assert_eq!(FormulaEvaluator::default().evaluate(&t, time_passed), expected);
    }

    #[rstest]
    #[case::precedence("1 + 2 * 3", Value::Number(7.0))]
    #[case::parens("(1 + 2) * 3", Value::Number(9.0))]
    #[case::unary("-accept + 5", Value::Number(2.0))]
    #[case::votes_sum("votes", Value::Number(6.0))]
    #[case::total("TOTAL", Value::Number(10.0))]
    #[case::ratio("accept / votes > 0.4", Value::Bool(true))]
    #[case::text_eq(r#""a" = "a""#, Value::Bool(true))]
    #[case::bool_arith("timepassed + 1", Value::Number(1.0))]
    #[case::min_max("MAX(accept, MIN(decline, 9))", Value::Number(3.0))]
    #[case::or_not("OR(NOT(timepassed), FALSE)", Value::Bool(true))]
    #[case::if_two_args("IF(decline > 5, \"x\")", Value::Bool(false))]
    fn evaluates_expressions(#[case] src: &str, #[case] expected: Value) {
        let f = FormulaEvaluator::parse(src).unwrap();
        assert_eq!(f.eval_raw(&tally(1, 3, 2, 0), false).unwrap(), expected);
    }

    #[test]
    fn if_is_lazy() {
        let f = FormulaEvaluator::parse(r#"IF(TRUE, "WAIT_ACCEPT", 1 / 0)"#).unwrap();
        assert_eq!(f.evaluate(&VoteTally::new(), false), OutcomeCode::WaitAccept);
    }

    #[rstest]
    #[case::division_by_zero(r#"IF(accept / decline > 1, "FASTACCEPT", "WAIT_ACCEPT")"#)]
    #[case::type_mismatch(r#""FASTACCEPT" + 1"#)]
    #[case::unknown_code(r#""MAYBE""#)]
    #[case::empty_string(r#""""#)]
    #[case::not_a_string("accept > 0")]
    fn unusable_results_fall_back_to_decline(#[case] src: &str) {
        let f = FormulaEvaluator::parse(src).unwrap();
        assert_eq!(f.evaluate(&tally(0, 1, 0, 0), true), OutcomeCode::WaitDecline);
    }

    #[test]
    fn result_strings_are_trimmed() {
        let f = FormulaEvaluator::parse(r#""  FASTACCEPT ""#).unwrap();
        assert_eq!(f.evaluate(&VoteTally::new(), false), OutcomeCode::FastAccept);
    }

    #[test]
    fn parse_errors_carry_a_message() {
        let err = FormulaEvaluator::parse("IF(accept > 1, \"x\", nope)").unwrap_err();
        assert_eq!(err.to_string(), "unknown variable `nope` at 20");
    }
}
