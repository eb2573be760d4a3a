//! Deterministic solver for arithmetic challenges such as `6-9=?` or `8×3=？`.
//!
//! Accepted grammar: `operand operator operand "=" terminator`, optional whitespace
//! around every token. Operands are (optionally signed) integers, operators are
//! `+ - * / × ÷` plus their full-width forms, `=` may be full-width and the
//! terminator is `?` or `？`. Anything else yields `None`.
//!
//! Division only succeeds when the quotient is an exact integer; a remainder, a
//! zero divisor or an `i64` overflow all produce `None`.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

const EXPRESSION_PATTERN: &str =
    r"([+-]?[0-9]+)\s*([+\-*/×÷＋－＊／])\s*([+-]?[0-9]+)\s*[=＝]\s*[?？]";

static FULL_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*{EXPRESSION_PATTERN}\s*$")).expect("expression pattern is valid")
});

static EMBEDDED_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EXPRESSION_PATTERN).expect("expression pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" | "＋" => Some(Operator::Add),
            "-" | "－" => Some(Operator::Subtract),
            "*" | "×" | "＊" => Some(Operator::Multiply),
            "/" | "÷" | "／" => Some(Operator::Divide),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }
}

/// A parsed `lhs op rhs` challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expression {
    pub lhs: i64,
    pub operator: Operator,
    pub rhs: i64,
}

impl Expression {
    /// Parse a whole string; surrounding prose is rejected
    pub fn parse(text: &str) -> Option<Self> {
        let captures = FULL_EXPRESSION.captures(text)?;
        Self::from_parts(&captures[1], &captures[2], &captures[3])
    }

    /// Locate the first expression embedded anywhere in `text`
    pub fn find(text: &str) -> Option<Self> {
        EMBEDDED_EXPRESSION
            .captures_iter(text)
            .find_map(|captures| Self::from_parts(&captures[1], &captures[2], &captures[3]))
    }

    fn from_parts(lhs: &str, operator: &str, rhs: &str) -> Option<Self> {
        Some(Self {
            lhs: lhs.parse().ok()?,
            operator: Operator::from_symbol(operator)?,
            rhs: rhs.parse().ok()?,
        })
    }

    pub fn evaluate(&self) -> Option<i64> {
        match self.operator {
            Operator::Add => self.lhs.checked_add(self.rhs),
            Operator::Subtract => self.lhs.checked_sub(self.rhs),
            Operator::Multiply => self.lhs.checked_mul(self.rhs),
            Operator::Divide => {
                if self.rhs == 0 || self.lhs.checked_rem(self.rhs)? != 0 {
                    return None;
                }
                self.lhs.checked_div(self.rhs)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}=?", self.lhs, self.operator.symbol(), self.rhs)
    }
}

/// True when `text` is exactly one arithmetic challenge with a computable answer
pub fn is_expression_challenge(text: &str) -> bool {
    solve(text).is_some()
}

/// Evaluate `text`, returning the answer and the expression in normalized ASCII form
pub fn solve(text: &str) -> Option<(String, String)> {
    let Some(expression) = Expression::parse(text) else {
        debug!("Not an arithmetic challenge: {:?}", text);
        return None;
    };

    match expression.evaluate() {
        Some(value) => {
            debug!("Solved arithmetic challenge {} -> {}", expression, value);
            Some((value.to_string(), expression.to_string()))
        }
        None => {
            debug!("Arithmetic challenge {} has no exact integer answer", expression);
            None
        }
    }
}

/// Solve `text` directly, or the first expression embedded in it
pub fn extract_and_solve(text: &str) -> Option<String> {
    if let Some((value, _)) = solve(text) {
        return Some(value);
    }

    let expression = Expression::find(text)?;
    let value = expression.evaluate()?;
    debug!("Extracted {} from {:?} -> {}", expression, text, value);
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operators() {
        assert_eq!(extract_and_solve("3+5=?"), Some("8".to_string()));
        assert_eq!(extract_and_solve("6-9=?"), Some("-3".to_string()));
        assert_eq!(extract_and_solve("2*4=?"), Some("8".to_string()));
        assert_eq!(extract_and_solve("10/2=?"), Some("5".to_string()));
    }

    #[test]
    fn test_full_width_forms() {
        assert_eq!(extract_and_solve("8×3=？"), Some("24".to_string()));
        assert_eq!(extract_and_solve("12÷4=?"), Some("3".to_string()));
        assert_eq!(extract_and_solve("7＋2＝？"), Some("9".to_string()));
        assert_eq!(extract_and_solve("7－2=?"), Some("5".to_string()));
    }

    #[test]
    fn test_whitespace_and_signs() {
        assert_eq!(extract_and_solve(" 6 - 9 = ? "), Some("-3".to_string()));
        assert_eq!(extract_and_solve("-4+10=?"), Some("6".to_string()));
        assert_eq!(extract_and_solve("6--3=?"), Some("9".to_string()));
        assert_eq!(extract_and_solve("+2*-3=?"), Some("-6".to_string()));
    }

    #[test]
    fn test_normalized_expression() {
        let (value, normalized) = solve("8 × 3 = ？").unwrap();
        assert_eq!(value, "24");
        assert_eq!(normalized, "8*3=?");
    }

    #[test]
    fn test_non_exact_division_has_no_answer() {
        assert_eq!(solve("7/2=?"), None);
        assert_eq!(extract_and_solve("7/2=?"), None);
        assert!(!is_expression_challenge("7/2=?"));
        assert_eq!(extract_and_solve("-9/3=?"), Some("-3".to_string()));
    }

    #[test]
    fn test_division_by_zero_and_overflow() {
        assert_eq!(solve("5/0=?"), None);
        assert_eq!(solve("9223372036854775807+1=?"), None);
        assert_eq!(solve("-9223372036854775808/-1=?"), None);
        assert_eq!(solve("99999999999999999999+1=?"), None);
    }

    #[test]
    fn test_rejects_non_expressions() {
        assert!(!is_expression_challenge("ABC123"));
        assert!(!is_expression_challenge(""));
        assert!(!is_expression_challenge("6-9"));
        assert!(!is_expression_challenge("6-9="));
        assert!(!is_expression_challenge("a+b=?"));
        assert!(!is_expression_challenge("请输入验证码"));
        assert_eq!(solve("6-9"), None);
        assert_eq!(extract_and_solve("ABC123"), None);
        assert_eq!(extract_and_solve("3+5"), None);
    }

    #[test]
    fn test_prose_is_not_a_challenge_but_can_be_extracted() {
        let text = "请计算 3+5=? 并输入结果";
        assert!(!is_expression_challenge(text));
        assert_eq!(solve(text), None);
        assert_eq!(extract_and_solve(text), Some("8".to_string()));
    }
}
