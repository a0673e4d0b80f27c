use std::error::Error;
use std::fmt::{self, Display};
use std::io::{stdout, Write};

use super::{Arity, Primitive, PrimitiveFn, Value};

/// Failure of a primitive itself. The VM wraps it with the name of the
/// primitive that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    WrongType { expected: &'static str, got: String },
    DivisionByZero,
    Overflow,
}

impl Display for PrimitiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PrimitiveError::WrongType { expected, ref got } => {
                write!(f, "expected {}, got {}", expected, got)
            }
            PrimitiveError::DivisionByZero => f.write_str("division by zero"),
            PrimitiveError::Overflow => f.write_str("integer overflow"),
        }
    }
}

impl Error for PrimitiveError {}

type PrimitiveResult = Result<Value, PrimitiveError>;

fn primitive(name: &'static str, fun: PrimitiveFn, arity: Arity) -> Primitive {
    Primitive { name, fun, arity }
}

/// Every primitive bound in the default root environment
pub(super) fn primitives() -> Vec<Primitive> {
    vec![
        primitive("+", add, Arity::at_least(0)),
        primitive("-", sub, Arity::at_least(1)),
        primitive("*", mul, Arity::at_least(0)),
        primitive("/", div, Arity::at_least(1)),
        primitive("remainder", remainder, Arity::exactly(2)),
        primitive("quotient", quotient, Arity::exactly(2)),
        primitive("modulo", modulo, Arity::exactly(2)),
        primitive("abs", abs, Arity::exactly(1)),
        primitive("=", num_eq, Arity::at_least(1)),
        primitive("<", lt, Arity::at_least(1)),
        primitive(">", gt, Arity::at_least(1)),
        primitive("<=", le, Arity::at_least(1)),
        primitive(">=", ge, Arity::at_least(1)),
        primitive("cons", cons, Arity::exactly(2)),
        primitive("pair", cons, Arity::exactly(2)),
        primitive("car", car, Arity::exactly(1)),
        primitive("first", car, Arity::exactly(1)),
        primitive("cdr", cdr, Arity::exactly(1)),
        primitive("rest", cdr, Arity::exactly(1)),
        primitive("list", list, Arity::at_least(0)),
        primitive("length", length, Arity::exactly(1)),
        primitive("null?", is_null, Arity::exactly(1)),
        primitive("pair?", is_pair, Arity::exactly(1)),
        primitive("list?", is_list, Arity::exactly(1)),
        primitive("number?", is_number, Arity::exactly(1)),
        primitive("integer?", is_integer, Arity::exactly(1)),
        primitive("symbol?", is_symbol, Arity::exactly(1)),
        primitive("string?", is_string, Arity::exactly(1)),
        primitive("boolean?", is_boolean, Arity::exactly(1)),
        primitive("procedure?", is_procedure, Arity::exactly(1)),
        primitive("not", not, Arity::exactly(1)),
        primitive("eq?", eqv, Arity::exactly(2)),
        primitive("eqv?", eqv, Arity::exactly(2)),
        primitive("equal?", equal, Arity::exactly(2)),
        primitive("display", display, Arity::exactly(1)),
        primitive("newline", newline, Arity::exactly(0)),
    ]
}

//
// Numbers
//
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i64),
    Real(f64),
    Complex(f64, f64),
}

impl Number {
    fn from_value(value: &Value) -> Result<Number, PrimitiveError> {
        match *value {
            Value::Integer(n) => Ok(Number::Integer(n)),
            Value::Float(x) => Ok(Number::Real(x)),
            Value::Complex(re, im) => Ok(Number::Complex(re, im)),
            ref other => Err(wrong_type("number", other)),
        }
    }

    fn real(value: &Value) -> Result<Number, PrimitiveError> {
        match Number::from_value(value) {
            Ok(Number::Complex(..)) | Err(_) => Err(wrong_type("real number", value)),
            real => real,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Integer(n) => Value::Integer(n),
            Number::Real(x) => Value::Float(x),
            Number::Complex(re, im) => Value::Complex(re, im),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Real(x) => x,
            Number::Complex(re, _) => re,
        }
    }

    fn as_complex(self) -> (f64, f64) {
        match self {
            Number::Complex(re, im) => (re, im),
            other => (other.as_f64(), 0.0),
        }
    }

    fn is_complex(self) -> bool {
        match self {
            Number::Complex(..) => true,
            _ => false,
        }
    }
}

fn wrong_type(expected: &'static str, got: &Value) -> PrimitiveError {
    PrimitiveError::WrongType {
        expected,
        got: got.to_string(),
    }
}

fn integer(value: &Value) -> Result<i64, PrimitiveError> {
    match *value {
        Value::Integer(n) => Ok(n),
        ref other => Err(wrong_type("integer", other)),
    }
}

// Integer, real or complex arithmetic, after promoting both operands to
// the wider representation
macro_rules! promote {
    ($a:expr, $b:expr, $int:expr, $real:expr, $complex:expr) => {
        match ($a, $b) {
            (Number::Integer(x), Number::Integer(y)) => $int(x, y),
            (a, b) if a.is_complex() || b.is_complex() => {
                let (re, im) = $complex(a.as_complex(), b.as_complex());
                Ok(Number::Complex(re, im))
            }
            (a, b) => Ok(Number::Real($real(a.as_f64(), b.as_f64()))),
        }
    };
}

fn checked(n: Option<i64>) -> Result<Number, PrimitiveError> {
    n.map(Number::Integer).ok_or(PrimitiveError::Overflow)
}

fn plus(a: Number, b: Number) -> Result<Number, PrimitiveError> {
    promote!(
        a,
        b,
        |x: i64, y| checked(x.checked_add(y)),
        |x: f64, y: f64| x + y,
        |(a, b): (f64, f64), (c, d): (f64, f64)| (a + c, b + d)
    )
}

fn minus(a: Number, b: Number) -> Result<Number, PrimitiveError> {
    promote!(
        a,
        b,
        |x: i64, y| checked(x.checked_sub(y)),
        |x: f64, y: f64| x - y,
        |(a, b): (f64, f64), (c, d): (f64, f64)| (a - c, b - d)
    )
}

fn times(a: Number, b: Number) -> Result<Number, PrimitiveError> {
    promote!(
        a,
        b,
        |x: i64, y| checked(x.checked_mul(y)),
        |x: f64, y: f64| x * y,
        |(a, b): (f64, f64), (c, d): (f64, f64)| (a * c - b * d, a * d + b * c)
    )
}

// Integer division stays exact only when there is no remainder
fn divide(a: Number, b: Number) -> Result<Number, PrimitiveError> {
    promote!(
        a,
        b,
        |x: i64, y: i64| {
            check![y != 0, PrimitiveError::DivisionByZero];
            match x.checked_rem(y) {
                Some(0) => checked(x.checked_div(y)),
                Some(_) => Ok(Number::Real(x as f64 / y as f64)),
                None => Err(PrimitiveError::Overflow),
            }
        },
        |x: f64, y: f64| x / y,
        |(a, b): (f64, f64), (c, d): (f64, f64)| {
            let denominator = c * c + d * d;
            ((a * c + b * d) / denominator, (b * c - a * d) / denominator)
        }
    )
}

fn fold(
    args: &[Value],
    identity: Number,
    op: fn(Number, Number) -> Result<Number, PrimitiveError>,
) -> PrimitiveResult {
    let (first, rest) = match args.split_first() {
        None => return Ok(identity.into_value()),
        Some((first, rest)) if args.len() > 1 => (Number::from_value(first)?, rest),
        // A single operand is combined with the identity: (- x) is (- 0 x)
        Some(_) => (identity, args),
    };

    rest.iter()
        .try_fold(first, |acc, arg| op(acc, Number::from_value(arg)?))
        .map(Number::into_value)
}

fn add(args: &[Value]) -> PrimitiveResult {
    fold(args, Number::Integer(0), plus)
}

fn sub(args: &[Value]) -> PrimitiveResult {
    fold(args, Number::Integer(0), minus)
}

fn mul(args: &[Value]) -> PrimitiveResult {
    fold(args, Number::Integer(1), times)
}

fn div(args: &[Value]) -> PrimitiveResult {
    fold(args, Number::Integer(1), divide)
}

fn integer_operands(args: &[Value]) -> Result<(i64, i64), PrimitiveError> {
    let (x, y) = (integer(&args[0])?, integer(&args[1])?);
    check![y != 0, PrimitiveError::DivisionByZero];
    Ok((x, y))
}

fn remainder(args: &[Value]) -> PrimitiveResult {
    let (x, y) = integer_operands(args)?;
    x.checked_rem(y).map(Value::Integer).ok_or(PrimitiveError::Overflow)
}

fn quotient(args: &[Value]) -> PrimitiveResult {
    let (x, y) = integer_operands(args)?;
    x.checked_div(y).map(Value::Integer).ok_or(PrimitiveError::Overflow)
}

// Same sign as the divisor
fn modulo(args: &[Value]) -> PrimitiveResult {
    let (x, y) = integer_operands(args)?;
    let r = x.checked_rem(y).ok_or(PrimitiveError::Overflow)?;
    if r != 0 && (r < 0) != (y < 0) {
        Ok(Value::Integer(r + y))
    } else {
        Ok(Value::Integer(r))
    }
}

fn abs(args: &[Value]) -> PrimitiveResult {
    match Number::from_value(&args[0])? {
        Number::Integer(n) => n.checked_abs().map(Value::Integer).ok_or(PrimitiveError::Overflow),
        Number::Real(x) => Ok(Value::Float(x.abs())),
        Number::Complex(re, im) => Ok(Value::Float(re.hypot(im))),
    }
}

fn compare(
    args: &[Value],
    parse: fn(&Value) -> Result<Number, PrimitiveError>,
    holds: fn(Number, Number) -> bool,
) -> PrimitiveResult {
    let numbers = args.iter().map(parse).collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Boolean(
        numbers.windows(2).all(|pair| holds(pair[0], pair[1])),
    ))
}

fn num_eq(args: &[Value]) -> PrimitiveResult {
    compare(args, Number::from_value, |a, b| match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => x == y,
        (a, b) => a.as_complex() == b.as_complex(),
    })
}

macro_rules! ordering {
    ($name:ident, $op:tt) => {
        fn $name(args: &[Value]) -> PrimitiveResult {
            compare(args, Number::real, |a, b| match (a, b) {
                (Number::Integer(x), Number::Integer(y)) => x $op y,
                (a, b) => a.as_f64() $op b.as_f64(),
            })
        }
    };
}

ordering!(lt, <);
ordering!(gt, >);
ordering!(le, <=);
ordering!(ge, >=);

//
// Pairs and lists
//
fn cons(args: &[Value]) -> PrimitiveResult {
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn car(args: &[Value]) -> PrimitiveResult {
    let pair = args[0].pair().ok_or_else(|| wrong_type("pair", &args[0]))?;
    Ok(pair.0.clone())
}

fn cdr(args: &[Value]) -> PrimitiveResult {
    let pair = args[0].pair().ok_or_else(|| wrong_type("pair", &args[0]))?;
    Ok(pair.1.clone())
}

fn list(args: &[Value]) -> PrimitiveResult {
    Ok(Value::list(args.to_vec()))
}

fn length(args: &[Value]) -> PrimitiveResult {
    args[0]
        .list_len()
        .map(|len| Value::Integer(len as i64))
        .ok_or_else(|| wrong_type("list", &args[0]))
}

//
// Predicates
//
macro_rules! predicate {
    ($name:ident, $test:expr) => {
        fn $name(args: &[Value]) -> PrimitiveResult {
            let test: fn(&Value) -> bool = $test;
            Ok(Value::Boolean(test(&args[0])))
        }
    };
}

predicate!(is_null, Value::is_nil);
predicate!(is_pair, Value::is_pair);
predicate!(is_list, Value::is_list);
predicate!(is_number, Value::is_number);
predicate!(is_symbol, Value::is_symbol);
predicate!(is_string, Value::is_string);
predicate!(is_boolean, Value::is_boolean);
predicate!(is_procedure, Value::is_procedure);
predicate!(not, |v| !v.is_true());
predicate!(is_integer, |v| match *v {
    Value::Integer(_) => true,
    Value::Float(x) => x.is_finite() && x.fract() == 0.0,
    _ => false,
});

fn eqv(args: &[Value]) -> PrimitiveResult {
    Ok(Value::Boolean(args[0].eqv(&args[1])))
}

fn equal(args: &[Value]) -> PrimitiveResult {
    Ok(Value::Boolean(args[0] == args[1]))
}

//
// Output
//
fn display(args: &[Value]) -> PrimitiveResult {
    match args[0] {
        Value::String(ref s) => print!("{}", s),
        ref other => print!("{}", other),
    }
    let _ = stdout().flush();
    Ok(Value::Nil)
}

fn newline(_: &[Value]) -> PrimitiveResult {
    println!();
    Ok(Value::Nil)
}
