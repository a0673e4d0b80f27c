use super::{is_digit, Parser, ReaderError, ReaderErrorKind};
use crate::vm::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Real {
    Integer(i64),
    Float(f64),
}

impl Real {
    fn as_f64(self) -> f64 {
        match self {
            Real::Integer(n) => n as f64,
            Real::Float(x) => x,
        }
    }
}

impl Parser {
    /// `123`, `1.5`, `1/2`, `1+2i`, `1-i`, optionally signed. The sign
    /// applies to the whole literal, so `-1+2i` reads as `-1-2i`.
    pub(super) fn parse_number(&mut self) -> Result<Value, ReaderError> {
        let negative = self.eat('-');
        if !negative {
            self.eat('+');
        }

        let mut real = match self.parse_unsigned() {
            Some(real) => real,
            None => {
                let c = self.peek(0).unwrap_or(' ');
                return Err(self.error(ReaderErrorKind::UnexpectedCharacter(c)));
            }
        };

        // Ratios are never kept exact
        if self.eat('/') {
            let denominator = self
                .parse_unsigned()
                .ok_or_else(|| self.error(ReaderErrorKind::MissingDenominator))?;
            real = Real::Float(real.as_f64() / denominator.as_f64());
        }

        let value = match self.peek(0) {
            Some(sign @ '+') | Some(sign @ '-') => {
                self.pop(1);
                let magnitude = self.parse_unsigned().map_or(1.0, Real::as_f64);
                if !self.eat('i') {
                    return Err(self.error(ReaderErrorKind::MissingImaginaryUnit));
                }
                let imaginary = if sign == '-' { -magnitude } else { magnitude };
                Value::Complex(real.as_f64(), imaginary)
            }
            _ => match real {
                Real::Integer(n) => Value::Integer(n),
                Real::Float(x) => Value::Float(x),
            },
        };

        Ok(if negative { negate(value) } else { value })
    }

    // Digits with at most one `.`; `None` if nothing was consumed or the
    // text is not a number (a lone `.`)
    fn parse_unsigned(&mut self) -> Option<Real> {
        let start = self.pos;
        while is_digit(self.peek(0)) {
            self.pop(1);
        }
        let is_float = self.eat('.');
        while is_digit(self.peek(0)) {
            self.pop(1);
        }

        if start == self.pos {
            return None;
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            return text.parse().ok().map(Real::Float);
        }
        // Integers too large for an i64 are read inexactly
        match text.parse() {
            Ok(n) => Some(Real::Integer(n)),
            Err(_) => text.parse().ok().map(Real::Float),
        }
    }
}

fn negate(value: Value) -> Value {
    match value {
        Value::Integer(n) => Value::Integer(-n),
        Value::Float(x) => Value::Float(-x),
        Value::Complex(re, im) => Value::Complex(-re, -im),
        other => other,
    }
}
