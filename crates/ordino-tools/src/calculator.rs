//! Safe arithmetic evaluation.

use ordino_core::{FieldType, InputSchema, JsonMap, Tool, ToolResult};

/// Evaluates arithmetic expressions with a hand-rolled parser.
///
/// Supports `+`, `-`, `*`, `/`, `**` (power), unary sign, and
/// parentheses over f64 arithmetic. No names, no calls, no side effects,
/// so every invocation is trivially safe to replay.
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

impl Tool for Calculator {
    fn name(&self) -> &str {
        "Calculator"
    }

    fn description(&self) -> &str {
        "Safely evaluates arithmetic expressions like '(41*7)+13'. Supports +, -, *, /, ** (power), and parentheses."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().required_field(
            "expression",
            FieldType::String,
            "Arithmetic expression to evaluate",
        )
    }

    fn execute(&self, input: &JsonMap) -> ToolResult {
        let expression = match input.get("expression").and_then(|v| v.as_str()) {
            Some(raw) => raw.trim(),
            None => {
                return ToolResult::failure(
                    "Invalid input: 'expression' field is required and must be a string",
                )
            }
        };

        if expression.is_empty() {
            return ToolResult::failure("Expression cannot be empty");
        }

        if let Some(bad) = expression
            .chars()
            .find(|c| !c.is_ascii_digit() && !c.is_whitespace() && !"+-*/().".contains(*c))
        {
            return ToolResult::failure(format!(
                "Expression contains invalid characters. Only numbers, +, -, *, /, **, (, ) are allowed (found '{bad}')"
            ));
        }

        match evaluate(expression) {
            Ok(value) => ToolResult::success(serde_json::json!(value)),
            Err(err) => ToolResult::failure(err.to_string()),
        }
    }
}

#[derive(Debug, PartialEq)]
enum EvalError {
    DivisionByZero,
    Syntax(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::DivisionByZero => write!(f, "Division by zero"),
            EvalError::Syntax(detail) => write!(f, "Invalid expression syntax: {detail}"),
        }
    }
}

fn evaluate(expression: &str) -> Result<f64, EvalError> {
    let mut parser = Parser {
        chars: expression.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(value),
        Some(c) => Err(EvalError::Syntax(format!("unexpected '{c}'"))),
    }
}

/// Recursive-descent parser with Python-style precedence: `**` binds
/// tighter than unary sign on its left, and the exponent may itself be
/// signed (`-2**2` is -4, `2**-1` is 0.5).
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Whitespace separates tokens but never joins them: `1 2` is two
    /// tokens and a syntax error, not twelve.
    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := unary (('*' | '/') unary)*, where '**' is not '*'
    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            self.skip_ws();
            if self.peek() == Some('*') && self.chars.get(self.pos + 1) != Some(&'*') {
                self.pos += 1;
                value *= self.unary()?;
            } else if self.eat('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.eat('-') {
            Ok(-self.unary()?)
        } else if self.eat('+') {
            self.unary()
        } else {
            self.power()
        }
    }

    // power := primary ('**' unary)?   (right-associative)
    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.primary()?;
        self.skip_ws();
        if self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&'*') {
            self.pos += 2;
            let exponent = self.unary()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<f64, EvalError> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                return Err(EvalError::Syntax("missing closing parenthesis".into()));
            }
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> Result<f64, EvalError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(EvalError::Syntax(format!("unexpected '{c}'"))),
                None => Err(EvalError::Syntax("unexpected end of expression".into())),
            };
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| EvalError::Syntax(format!("invalid number '{literal}'")))
    }
}
