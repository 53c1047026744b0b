//! Calculator tool.
//!
//! Evaluates arithmetic expressions with `+`, `-`, `*`, `/`, `^`,
//! parentheses, and unary negation via a small recursive-descent
//! parser. Answers are phrased as `The result is: N` so they read
//! naturally when relayed into a chat.

use async_trait::async_trait;
use gramclaw_core::error::ToolError;
use gramclaw_core::tool::{Tool, ToolResult};
use std::iter::Peekable;
use std::str::Chars;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, ^ (power), parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        match evaluate(expr) {
            Ok(value) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: format!("The result is: {}", format_number(value)),
            }),
            Err(e) => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("Error: {e}"),
            }),
        }
    }
}

/// Render without a trailing `.0` when the value is integral.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: expr.chars().peekable(),
    };
    let value = parser.additive()?;
    parser.skip_whitespace();
    if let Some(c) = parser.chars.peek() {
        return Err(format!("Unexpected character: '{c}'"));
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    /// Consume `op` if it is the next non-whitespace character.
    fn eat(&mut self, op: char) -> bool {
        self.skip_whitespace();
        if self.chars.peek() == Some(&op) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    // additive = multiplicative (('+' | '-') multiplicative)*
    fn additive(&mut self) -> Result<f64, String> {
        let mut value = self.multiplicative()?;
        loop {
            if self.eat('+') {
                value += self.multiplicative()?;
            } else if self.eat('-') {
                value -= self.multiplicative()?;
            } else {
                return Ok(value);
            }
        }
    }

    // multiplicative = power (('*' | '/') power)*
    fn multiplicative(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        loop {
            if self.eat('*') {
                value *= self.power()?;
            } else if self.eat('/') {
                let divisor = self.power()?;
                if divisor == 0.0 {
                    return Err("Division by zero".into());
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    // power = unary ('^' power)?  — right-associative
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.eat('^') {
            let exponent = self.power()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    // unary = '-' unary | primary
    fn unary(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            Ok(-self.unary()?)
        } else {
            self.primary()
        }
    }

    // primary = NUMBER | '(' additive ')'
    fn primary(&mut self) -> Result<f64, String> {
        if self.eat('(') {
            let value = self.additive()?;
            if !self.eat(')') {
                return Err("Expected closing parenthesis".into());
            }
            return Ok(value);
        }

        self.skip_whitespace();
        let mut literal = String::new();
        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            literal.push(self.chars.next().unwrap());
        }

        if literal.is_empty() {
            return match self.chars.peek() {
                Some(c) => Err(format!("Unexpected character: '{c}'")),
                None => Err("Unexpected end of expression".into()),
            };
        }

        literal
            .parse()
            .map_err(|_| format!("Invalid number: {literal}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition() {
        assert_eq!(evaluate("2 + 2").unwrap(), 4.0);
    }

    #[test]
    fn precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
    }

    #[test]
    fn unary_negation() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
        assert_eq!(evaluate("--4").unwrap(), 4.0);
    }

    #[test]
    fn decimals() {
        assert_eq!(evaluate("1.5 * 4").unwrap(), 6.0);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), "Division by zero");
    }

    #[test]
    fn dangling_operator() {
        assert!(evaluate("2 +").is_err());
    }

    #[test]
    fn unbalanced_parens() {
        assert!(evaluate("(1 + 2").is_err());
    }

    #[test]
    fn trailing_garbage() {
        assert!(evaluate("1 + 2 x").is_err());
    }

    #[test]
    fn empty_input() {
        assert!(evaluate("").is_err());
    }

    #[tokio::test]
    async fn execute_formats_result() {
        let tool = CalculatorTool;
        let result = tool
            .execute(serde_json::json!({"expression": "2 + 2"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "The result is: 4");
    }

    #[tokio::test]
    async fn execute_keeps_decimals() {
        let tool = CalculatorTool;
        let result = tool
            .execute(serde_json::json!({"expression": "10 / 4"}))
            .await
            .unwrap();

        assert_eq!(result.output, "The result is: 2.5");
    }

    #[tokio::test]
    async fn execute_reports_evaluation_errors() {
        let tool = CalculatorTool;
        let result = tool
            .execute(serde_json::json!({"expression": "1 / 0"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.output, "Error: Division by zero");
    }

    #[tokio::test]
    async fn execute_rejects_missing_expression() {
        let tool = CalculatorTool;
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn definition_schema_names_expression() {
        let def = CalculatorTool.to_definition();
        assert_eq!(def.name, "calculator");
        assert!(def.parameters["properties"]["expression"].is_object());
    }
}
