//! Safe arithmetic expression evaluator.
//!
//! A recursive-descent parser over a closed grammar: numbers, `+ - * / % ^`,
//! parentheses, unary minus, the functions `sqrt`, `abs`, `round`, `min`,
//! `max`, and the constants `pi` and `e`. Anything else is a parse error.
//! Nothing here can panic on user input.

use futures::future::BoxFuture;

use tandem_core::error::{Result, TandemError};
use tandem_core::traits::Capability;

pub struct CalculatorCapability;

impl Capability for CalculatorCapability {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates arithmetic expressions"
    }

    fn usage(&self) -> String {
        "TOOL AVAILABLE: calculator\n\
         HOW TO USE: to perform a calculation, output a line of the form \
         'ACTION: calculator <expression>'.\n\
         EXAMPLE: ACTION: calculator 125 * 45 + sqrt(16)\n\
         The system will compute the result and hand it back as an observation."
            .to_string()
    }

    fn invoke(&self, argument: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            evaluate(&argument).map_err(|message| TandemError::CapabilityExecution {
                name: "calculator".to_string(),
                message,
            })
        })
    }

    fn timeout_secs(&self) -> u64 {
        5
    }
}

/// Evaluate an expression to a formatted number, or a parse/domain error.
pub fn evaluate(expression: &str) -> std::result::Result<String, String> {
    let mut parser = Parser::new(expression);
    parser.skip_ws();
    if parser.at_end() {
        return Err("empty expression".to_string());
    }

    let value = parser.parse_expr()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(format!(
            "unexpected character '{}' at position {}",
            parser.current_char(),
            parser.pos
        ));
    }

    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(format_number(value))
}

/// Integers print without a decimal point, so `2+2` observes as `4`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn current_char(&self) -> char {
        self.peek().map(char::from).unwrap_or(' ')
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            if self.eat(b'+') {
                value += self.parse_term()?;
            } else if self.eat(b'-') {
                value -= self.parse_term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := power (('*' | '/' | '%') power)*
    fn parse_term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.parse_power()?;
        loop {
            if self.eat(b'*') {
                value *= self.parse_power()?;
            } else if self.eat(b'/') {
                let rhs = self.parse_power()?;
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= rhs;
            } else if self.eat(b'%') {
                let rhs = self.parse_power()?;
                if rhs == 0.0 {
                    return Err("modulo by zero".to_string());
                }
                value %= rhs;
            } else {
                return Ok(value);
            }
        }
    }

    // power := unary ('^' power)?   (right-associative)
    fn parse_power(&mut self) -> std::result::Result<f64, String> {
        let base = self.parse_unary()?;
        if self.eat(b'^') {
            let exponent = self.parse_power()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    // unary := '-' unary | primary
    fn parse_unary(&mut self) -> std::result::Result<f64, String> {
        if self.eat(b'-') {
            Ok(-self.parse_unary()?)
        } else {
            self.parse_primary()
        }
    }

    // primary := number | ident ('(' expr (',' expr)* ')')? | '(' expr ')'
    fn parse_primary(&mut self) -> std::result::Result<f64, String> {
        self.skip_ws();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                if !self.eat(b')') {
                    return Err("expected ')'".to_string());
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_ident(),
            Some(c) => Err(format!(
                "unexpected character '{}' at position {}",
                char::from(c),
                self.pos
            )),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_number(&mut self) -> std::result::Result<f64, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| "invalid number".to_string())?;
        text.parse::<f64>()
            .map_err(|_| format!("invalid number '{text}'"))
    }

    fn parse_ident(&mut self) -> std::result::Result<f64, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| "invalid identifier".to_string())?
            .to_ascii_lowercase();

        match name.as_str() {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        if !self.eat(b'(') {
            return Err(format!("unknown constant '{name}'"));
        }

        let mut args = vec![self.parse_expr()?];
        while self.eat(b',') {
            args.push(self.parse_expr()?);
        }
        if !self.eat(b')') {
            return Err("expected ')'".to_string());
        }

        match (name.as_str(), args.as_slice()) {
            ("sqrt", [x]) => {
                if *x < 0.0 {
                    Err("sqrt of a negative number".to_string())
                } else {
                    Ok(x.sqrt())
                }
            }
            ("abs", [x]) => Ok(x.abs()),
            ("round", [x]) => Ok(x.round()),
            ("min", args) if args.len() >= 2 => {
                Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
            }
            ("max", args) if args.len() >= 2 => {
                Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
            ("sqrt" | "abs" | "round", _) => Err(format!("{name}() takes exactly one argument")),
            ("min" | "max", _) => Err(format!("{name}() takes at least two arguments")),
            _ => Err(format!("unknown function '{name}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate("2+2").unwrap(), "4");
        assert_eq!(evaluate("125 * 45").unwrap(), "5625");
        assert_eq!(evaluate("10 - 3 - 2").unwrap(), "5");
        assert_eq!(evaluate("7 % 4").unwrap(), "3");
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), "14");
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), "20");
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), "512"); // right-assoc
        assert_eq!(evaluate("-3 + 5").unwrap(), "2");
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(evaluate("sqrt(16)").unwrap(), "4");
        assert_eq!(evaluate("abs(-7)").unwrap(), "7");
        assert_eq!(evaluate("round(2.6)").unwrap(), "3");
        assert_eq!(evaluate("min(3, 1, 2)").unwrap(), "1");
        assert_eq!(evaluate("max(3, 9)").unwrap(), "9");
        assert!(evaluate("pi").unwrap().starts_with("3.14"));
    }

    #[test]
    fn test_fractional_formatting() {
        assert_eq!(evaluate("1 / 2").unwrap(), "0.5");
        assert_eq!(evaluate("3.0 * 2").unwrap(), "6");
    }

    #[test]
    fn test_errors_do_not_panic() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("7 % 0").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
        assert!(evaluate("import os").is_err());
        assert!(evaluate("foo(1)").is_err());
        assert!(evaluate("2 $ 2").is_err());
        assert!(evaluate("(1 + 2").is_err());
    }

    #[tokio::test]
    async fn test_capability_invoke() {
        let cap = CalculatorCapability;
        assert_eq!(cap.invoke("2+2".into()).await.unwrap(), "4");

        let err = cap.invoke("nope!".into()).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
