//! Recursive-descent parser for rational formulas such as `Ra*Rb/(Ra + Rb)`.
//!
//! Grammar: `expr := term (('+'|'-') term)*`, `term := unary (('*'|'/') unary)*`,
//! `unary := ('+'|'-') unary | power`, `power := atom (('^'|'**') int)?`.
//! `j` is the imaginary unit; every other identifier is a real symbol.

use crate::errors::{CircuitError, Result};

use super::number::{coeff_real, parse_decimal};
use super::ratfunc::RatFunc;

/// Parses `input` into a canonical rational function.
pub fn parse_formula(input: &str) -> Result<RatFunc> {
    let mut parser = Parser {
        input,
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error(format!("unexpected '{}'", parser.chars[parser.pos])));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> CircuitError {
        CircuitError::Parse {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<RatFunc> {
        let mut acc = self.term()?;
        loop {
            if self.eat('+') {
                acc = acc + self.term()?;
            } else if self.eat('-') {
                acc = acc - self.term()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<RatFunc> {
        let mut acc = self.unary()?;
        loop {
            if self.peek() == Some('*') && self.chars.get(self.pos + 1) != Some(&'*') {
                self.pos += 1;
                acc = acc * self.unary()?;
            } else if self.eat('/') {
                let rhs = self.unary()?;
                acc = acc
                    .checked_div(&rhs)
                    .ok_or_else(|| self.error("division by zero"))?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<RatFunc> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<RatFunc> {
        let base = self.atom()?;
        let is_pow = if self.eat('^') {
            true
        } else if self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&'*') {
            self.pos += 2;
            true
        } else {
            false
        };
        if !is_pow {
            return Ok(base);
        }
        let exp = self.exponent()?;
        base.pow(exp)
            .ok_or_else(|| self.error("negative power of zero"))
    }

    fn exponent(&mut self) -> Result<i32> {
        let parenthesized = self.eat('(');
        let negative = self.eat('-');
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let mut value: i32 = digits
            .parse()
            .map_err(|_| self.error("exponent must be an integer"))?;
        if negative {
            value = -value;
        }
        if parenthesized && !self.eat(')') {
            return Err(self.error("missing ')' after exponent"));
        }
        Ok(value)
    }

    fn atom(&mut self) -> Result<RatFunc> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(')') {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.number(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => Ok(self.identifier()),
            Some(ch) => Err(self.error(format!("unexpected '{ch}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn number(&mut self) -> Result<RatFunc> {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            let exponent_sign = (ch == '+' || ch == '-')
                && self.pos > start
                && matches!(self.chars[self.pos - 1], 'e' | 'E');
            if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        parse_decimal(&text)
            .map(|r| RatFunc::constant(coeff_real(r)))
            .ok_or_else(|| self.error(format!("invalid number '{text}'")))
    }

    fn identifier(&mut self) -> RatFunc {
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_alphanumeric() || self.chars[self.pos] == '_')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if name == "j" {
            RatFunc::j()
        } else {
            RatFunc::symbol(&name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_powers() {
        let a = parse_formula("1 + 2*x^2").unwrap();
        let b = parse_formula("x**2*2 + 1").unwrap();
        assert_eq!(a, b);
        let c = parse_formula("x^(-1)").unwrap();
        assert_eq!(c, parse_formula("1/x").unwrap());
        assert_eq!(parse_formula("-2^2").unwrap(), RatFunc::integer(-4));
    }

    #[test]
    fn scientific_literals() {
        let v = parse_formula("1.5e3 * R").unwrap();
        assert_eq!(v, parse_formula("1500*R").unwrap());
    }

    #[test]
    fn malformed_input_is_reported() {
        assert!(matches!(parse_formula("1/(x - x)"), Err(CircuitError::Parse { .. })));
        assert!(matches!(parse_formula("(a + b"), Err(CircuitError::Parse { .. })));
        assert!(matches!(parse_formula("a $ b"), Err(CircuitError::Parse { .. })));
    }
}
