//! Arithmetic tool
//!
//! Accepts only digits, `+ - * / ( ) .` and spaces, then evaluates the
//! expression with a small recursive-descent parser:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! ```
//!
//! Signs and parentheses nest at most [`MAX_DEPTH`] levels deep.

use async_trait::async_trait;
use serde_json::Value;
use waypoint_core::{Tool, ToolArgs, ToolError};

const ALLOWED: &str = "0123456789+-*/(). ";

/// Nesting limit for unary signs and parentheses
pub const MAX_DEPTH: usize = 64;

/// `calculator(expression)`
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a math expression, e.g. {\"expression\": \"2+2*3\"}"
    }

    fn arg_names(&self) -> &[&'static str] {
        &["expression"]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let expression = match args.get("expression") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ToolError::InvalidArguments {
                    tool: "calculator".to_string(),
                    reason: "expression must be a string".to_string(),
                })
            }
        };
        let value = evaluate(&expression)?;
        Ok(format!("Result: {}", format_number(value)))
    }
}

/// Evaluate a restricted arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::Expression(
            "Invalid characters in expression".to_string(),
        ));
    }

    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(ToolError::Expression(format!("unexpected '{}'", token))),
    }
}

/// Integral values print without a fraction (`1200`, not `1200.0`)
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", format_number(*n)),
            Token::Op(c) => write!(f, "{}", c),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == ' ' {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let number = literal
                .parse::<f64>()
                .map_err(|_| ToolError::Expression(format!("invalid number '{}'", literal)))?;
            tokens.push(Token::Number(number));
        } else {
            tokens.push(Token::Op(c));
            chars.next();
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.next();
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.next();
            let rhs = self.factor()?;
            if op == '*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(ToolError::Expression("division by zero".to_string()));
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ToolError> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolError::Expression(
                "expression nested too deeply".to_string(),
            ));
        }
        self.depth += 1;
        let value = self.operand();
        self.depth -= 1;
        value
    }

    fn operand(&mut self) -> Result<f64, ToolError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Op('-')) => Ok(-self.factor()?),
            Some(Token::Op('+')) => self.factor(),
            Some(Token::Op('(')) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Op(')')) => Ok(value),
                    _ => Err(ToolError::Expression("missing ')'".to_string())),
                }
            }
            Some(token) => Err(ToolError::Expression(format!("unexpected '{}'", token))),
            None => Err(ToolError::Expression(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}
