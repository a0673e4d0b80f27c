use gc::{Finalize, Gc, Trace};
use std::fmt::{self, Debug, Display, Formatter, Result as FmtResult};
use std::rc::Rc;

use super::environment::Environment as GenericEnvironment;
use super::gc::GcShared;
use super::stdlib::PrimitiveError;
use crate::compiler::Lambda;
use crate::symbol::Symbol;

pub type Environment = GenericEnvironment<Value>;

/// Scheme values. The reader produces them too: source code is just a
/// `Value` tree made of pairs, symbols and atoms.
#[derive(Debug, Clone)]
pub enum Value {
    /// The empty list `()`, also returned by forms with nothing better to
    /// return (e.g. a one-armed `if` whose test fails)
    Nil,
    /// A boolean
    Boolean(bool),
    /// A 64-bit integer
    Integer(i64),
    /// A 64-bit float
    Float(f64),
    /// A complex number, `(real, imaginary)`
    Complex(f64, f64),
    /// An immutable string
    String(Rc<str>),
    /// A symbol (`'a`)
    Symbol(Symbol),
    /// A pair (`'(1 . 2)`)
    Pair(Gc<Pair>),
    /// A primitive or compound procedure
    Procedure(Procedure),
}

/// An immutable cons cell
#[derive(Debug)]
pub struct Pair(pub Value, pub Value);

impl Finalize for Pair {}

unsafe impl Trace for Pair {
    custom_trace!(this, {
        mark(&this.0);
        mark(&this.1);
    });
}

impl Finalize for Value {}
unsafe impl Trace for Value {
    custom_trace!(this, {
        match *this {
            Value::Pair(ref pair) => mark(pair),
            Value::Procedure(Procedure::Compound(ref compound)) => mark(compound),
            Value::Nil
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Complex(..)
            | Value::String(_)
            | Value::Symbol(_)
            | Value::Procedure(Procedure::Primitive(_)) => {}
        }
    });
}

/// How many arguments a procedure takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub rest: bool,
}

impl Arity {
    pub fn exactly(required: usize) -> Arity {
        Arity {
            required,
            rest: false,
        }
    }

    pub fn at_least(required: usize) -> Arity {
        Arity {
            required,
            rest: true,
        }
    }

    pub fn accepts(&self, n_of_args: usize) -> bool {
        if self.rest {
            n_of_args >= self.required
        } else {
            n_of_args == self.required
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if self.rest {
            write!(f, "at least {}", self.required)
        } else {
            write!(f, "{}", self.required)
        }
    }
}

pub type PrimitiveFn = fn(&[Value]) -> Result<Value, PrimitiveError>;

/// A natively implemented procedure
#[derive(Clone, Copy)]
pub struct Primitive {
    pub(crate) name: &'static str,
    pub(crate) fun: PrimitiveFn,
    pub(crate) arity: Arity,
}

impl Debug for Primitive {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "Primitive({}, {:?})", self.name, self.arity)
    }
}

/// A `lambda` closed over the frame that was current when it was evaluated
pub struct Compound {
    pub(crate) lambda: Rc<Lambda>,
    pub(crate) env: GcShared<Environment>,
}

impl Finalize for Compound {}
unsafe impl Trace for Compound {
    custom_trace!(this, {
        mark(&this.env);
    });
}

impl Debug for Compound {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "Compound({:?}, {:?})", self.lambda.name, self.lambda.formals)
    }
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Primitive(Primitive),
    Compound(Gc<Compound>),
}

impl Procedure {
    pub fn arity(&self) -> Arity {
        match *self {
            Procedure::Primitive(ref primitive) => primitive.arity,
            Procedure::Compound(ref compound) => compound.lambda.formals.arity(),
        }
    }

    pub fn name(&self) -> Option<String> {
        match *self {
            Procedure::Primitive(ref primitive) => Some(primitive.name.to_owned()),
            Procedure::Compound(ref compound) => {
                compound.lambda.name.as_ref().map(|name| name.to_string())
            }
        }
    }

    /// Identity, not behaviour: two procedures are the same only if they are
    /// the same primitive or the same closure object
    pub fn same(&self, other: &Procedure) -> bool {
        match (self, other) {
            (&Procedure::Primitive(ref p), &Procedure::Primitive(ref q)) => {
                p.name == q.name && p.fun as usize == q.fun as usize
            }
            (&Procedure::Compound(ref p), &Procedure::Compound(ref q)) => {
                &**p as *const Compound == &**q as *const Compound
            }
            _ => false,
        }
    }
}

// Structural equality, i.e. `equal?`. Pairs are compared by contents and
// procedures by identity; numbers only match within the same representation.
impl PartialEq<Value> for Value {
    fn eq(&self, other: &Value) -> bool {
        let (mut left, mut right) = (self.clone(), other.clone());

        loop {
            let (next_left, next_right) = match (&left, &right) {
                (&Value::Pair(ref p), &Value::Pair(ref q)) => {
                    if same_pair(p, q) {
                        return true;
                    }
                    if p.0 != q.0 {
                        return false;
                    }
                    (p.1.clone(), q.1.clone())
                }
                (a, b) => return a.eqv(b) || a.same_contents(b),
            };
            left = next_left;
            right = next_right;
        }
    }
}

fn same_pair(p: &Gc<Pair>, q: &Gc<Pair>) -> bool {
    &**p as *const Pair == &**q as *const Pair
}

impl<'a> From<&'a Value> for bool {
    fn from(v: &Value) -> bool {
        match *v {
            Value::Boolean(false) => false,
            _ => true,
        }
    }
}

macro_rules! simple_type {
    ($name:ident, $var:pat) => (
        pub fn $name(&self) -> bool {
            match *self {
                $var => true,
                _ => false
            }
        }
    )
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Gc::new(Pair(car, cdr)))
    }

    /// A proper list holding `values` in order
    pub fn list(values: Vec<Value>) -> Value {
        Value::improper_list(values, Value::Nil)
    }

    pub fn improper_list(values: Vec<Value>, tail: Value) -> Value {
        values
            .into_iter()
            .rev()
            .fold(tail, |cdr, car| Value::cons(car, cdr))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::from(name))
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn is_true(&self) -> bool {
        self.into()
    }

    /// The elements of a proper list, or `None` if `self` is not one
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut values = vec![];
        let mut current = self.clone();
        loop {
            current = match current {
                Value::Nil => return Some(values),
                Value::Pair(ref pair) => {
                    values.push(pair.0.clone());
                    pair.1.clone()
                }
                _ => return None,
            };
        }
    }

    pub fn list_len(&self) -> Option<usize> {
        let mut len = 0;
        let mut current = self.clone();
        loop {
            current = match current {
                Value::Nil => return Some(len),
                Value::Pair(ref pair) => {
                    len += 1;
                    pair.1.clone()
                }
                _ => return None,
            };
        }
    }

    pub fn is_list(&self) -> bool {
        self.list_len().is_some()
    }

    pub fn pair(&self) -> Option<Gc<Pair>> {
        match *self {
            Value::Pair(ref pair) => Some(pair.clone()),
            _ => None,
        }
    }

    simple_type!(is_nil, Value::Nil);
    simple_type!(is_symbol, Value::Symbol(..));
    simple_type!(is_procedure, Value::Procedure(..));
    simple_type!(is_string, Value::String(..));
    simple_type!(is_boolean, Value::Boolean(..));
    simple_type!(is_pair, Value::Pair(..));
    simple_type!(is_integer, Value::Integer(_));

    pub fn is_number(&self) -> bool {
        match *self {
            Value::Integer(_) | Value::Float(_) | Value::Complex(..) => true,
            _ => false,
        }
    }

    /// `eqv?`: atoms by value, pairs and procedures by identity
    pub fn eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::Nil, &Value::Nil) => true,
            (&Value::Boolean(x), &Value::Boolean(y)) => x == y,
            (&Value::Integer(n), &Value::Integer(m)) => n == m,
            (&Value::Float(f), &Value::Float(g)) => f == g,
            (&Value::Complex(a, b), &Value::Complex(c, d)) => a == c && b == d,
            (&Value::Symbol(ref x), &Value::Symbol(ref y)) => x == y,
            (&Value::String(ref x), &Value::String(ref y)) => Rc::ptr_eq(x, y),
            (&Value::Pair(ref p), &Value::Pair(ref q)) => same_pair(p, q),
            (&Value::Procedure(ref p), &Value::Procedure(ref q)) => p.same(q),
            _ => false,
        }
    }

    fn same_contents(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::String(ref x), &Value::String(ref y)) => x == y,
            _ => false,
        }
    }

}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Value::Nil => f.write_str("()"),
            Value::Boolean(b) => f.write_str(if b { "#t" } else { "#f" }),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Complex(re, im) => {
                let sign = if im < 0.0 { "-" } else { "+" };
                write!(f, "{:?}{}{:?}i", re, sign, im.abs())
            }
            Value::String(ref s) => write!(f, "\"{}\"", escape(s)),
            Value::Symbol(ref s) => write!(f, "{}", s),
            Value::Procedure(Procedure::Primitive(ref p)) => write!(f, "#<primitive {}>", p.name),
            Value::Procedure(ref p @ Procedure::Compound(_)) => match p.name() {
                Some(name) => write!(f, "#<procedure {}>", name),
                None => f.write_str("#<procedure>"),
            },
            Value::Pair(ref pair) => fmt_pair(pair, f),
        }
    }
}

fn fmt_pair(pair: &Gc<Pair>, f: &mut Formatter) -> FmtResult {
    write!(f, "({}", pair.0)?;
    let mut rest = pair.1.clone();
    loop {
        rest = match rest {
            Value::Nil => break,
            Value::Pair(ref next) => {
                write!(f, " {}", next.0)?;
                next.1.clone()
            }
            ref atom => {
                write!(f, " . {}", atom)?;
                break;
            }
        };
    }
    f.write_str(")")
}

fn escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\t' => vec!['\\', 't'],
            c => vec![c],
        })
        .collect()
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&Value::Procedure(self.clone()), f)
    }
}
