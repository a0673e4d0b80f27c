//! Convert S-expressions into executable node trees

use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use self::keywords::{is_syntactic_keyword, SpecialForms};
use crate::symbol::Symbol;
use crate::vm::{Arity, Environment, GcShared, Value};

macro_rules! malformed {
    ($form:expr, $reason:expr) => {
        CompilerError::Malformed {
            form: $form,
            reason: $reason,
        }
    };
}

mod bindings;
mod body;
mod conditionals;
mod keywords;


/// Shared handle to a compiled node. Any node that can be reached in tail
/// position is stored behind one, so the VM can jump to it without holding
/// a borrow of its parent.
pub type Code = Rc<Node>;

/// The executable form of one expression
#[derive(Debug)]
pub enum Node {
    // Self-evaluating datum
    Literal(Value),
    // Load variable from environment
    LoadVar(Symbol),
    // Datum returned unevaluated
    Quote(Value),
    If {
        test: Code,
        consequent: Code,
        alternate: Option<Code>,
    },
    // Last node is evaluated in the position of the whole sequence
    Begin(Vec<Code>),
    // Push a closure over the current frame
    Lambda(Rc<Lambda>),
    // Define variable in the current frame
    Define(Symbol, Code),
    // Set variable in environment (up to root)
    SetVar(Symbol, Code),
    // Call(operator, operands), bounce into the callee if `tail`
    Call {
        operator: Code,
        operands: Vec<Code>,
        tail: bool,
    },
    // Inits evaluated in the outer frame, body in a new one
    Let {
        bindings: Vec<(Symbol, Code)>,
        body: Code,
    },
    // Inits evaluated in the new frame
    Letrec {
        bindings: Vec<(Symbol, Code)>,
        body: Code,
    },
    Do(Box<DoLoop>),
    Cond(Vec<CondClause>),
    And(Vec<Code>),
    Or(Vec<Code>),
}

/// A compiled `lambda` expression, shared by all closures created from it
#[derive(Debug)]
pub struct Lambda {
    pub name: Option<Symbol>,
    pub formals: Formals,
    pub body: Code,
}

/// Parameter list: `(a b)`, `(a . rest)` or `args`
#[derive(Debug, Clone, PartialEq)]
pub struct Formals {
    pub required: Vec<Symbol>,
    pub rest: Option<Symbol>,
}

impl Formals {
    pub fn arity(&self) -> Arity {
        Arity {
            required: self.required.len(),
            rest: self.rest.is_some(),
        }
    }
}

#[derive(Debug)]
pub struct DoLoop {
    pub variables: Vec<DoVariable>,
    pub test: Code,
    // `None` when the test clause has no result expressions
    pub result: Option<Code>,
    pub commands: Vec<Code>,
}

#[derive(Debug)]
pub struct DoVariable {
    pub name: Symbol,
    pub init: Code,
    // Variables without a step keep their value across iterations
    pub step: Option<Code>,
}

#[derive(Debug)]
pub struct CondClause {
    // `None` for an `else` clause
    pub test: Option<Code>,
    pub body: ClauseBody,
}

#[derive(Debug)]
pub enum ClauseBody {
    // `(test)`: the clause yields the test value
    TestValue,
    // `(test => receiver)`
    Arrow { receiver: Code, tail: bool },
    Sequence(Code),
}

#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct NodeRef(&'static str);

impl<'a> From<&'a Node> for NodeRef {
    fn from(node: &Node) -> NodeRef {
        NodeRef(node.variant_name())
    }
}

impl Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Node {
    fn variant_name(&self) -> &'static str {
        use self::Node::*;

        match *self {
            Literal(..) => "Literal",
            LoadVar(..) => "LoadVar",
            Quote(..) => "Quote",
            If { .. } => "If",
            Begin(..) => "Begin",
            Lambda(..) => "Lambda",
            Define(..) => "Define",
            SetVar(..) => "SetVar",
            Call { .. } => "Call",
            Let { .. } => "Let",
            Letrec { .. } => "Letrec",
            Do(..) => "Do",
            Cond(..) => "Cond",
            And(..) => "And",
            Or(..) => "Or",
        }
    }
}

/// A top-level expression compiled as the body of a procedure with no
/// parameters, closed over the environment it was compiled for
#[derive(Debug)]
pub struct CompiledProcedure {
    pub(crate) body: Code,
    pub(crate) env: GcShared<Environment>,
}

impl CompiledProcedure {
    pub fn body(&self) -> &Node {
        &self.body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// A special form with the wrong shape, e.g. `(if)`
    Malformed {
        form: &'static str,
        reason: &'static str,
    },
    /// A syntactic keyword used as a variable
    KeywordAsVariable(Symbol),
    /// Something other than a symbol where a variable name is expected
    NotAVariable(String),
    /// The same name twice in one parameter or binding list
    DuplicateBinding(Symbol),
    /// A call whose operands do not form a proper list, `(f . x)`
    ImproperApplication,
}

impl Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CompilerError::Malformed { form, reason } => {
                write!(f, "bad syntax in ({} ...): {}", form, reason)
            }
            CompilerError::KeywordAsVariable(ref s) => {
                write!(f, "bad syntax: keyword `{}` used as a variable", s)
            }
            CompilerError::NotAVariable(ref datum) => {
                write!(f, "bad syntax: `{}` is not a variable name", datum)
            }
            CompilerError::DuplicateBinding(ref s) => {
                write!(f, "bad syntax: `{}` bound twice", s)
            }
            CompilerError::ImproperApplication => {
                f.write_str("bad syntax: procedure call with a dotted argument list")
            }
        }
    }
}

impl Error for CompilerError {}

pub struct Compiler {
    forms: SpecialForms,
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            forms: SpecialForms::new(),
        }
    }

    /// Compile one top-level datum for execution in `env`. The datum is
    /// compiled completely, or not at all.
    pub fn compile(
        &self,
        datum: &Value,
        env: &GcShared<Environment>,
    ) -> Result<CompiledProcedure, CompilerError> {
        let body = self.compile_code(datum, true)?;
        debug!("Compiled {} into {:?}", datum, body);
        Ok(CompiledProcedure {
            body,
            env: env.clone(),
        })
    }

    pub(crate) fn compile_code(&self, datum: &Value, tail: bool) -> Result<Code, CompilerError> {
        self.compile_expression(datum, tail).map(Rc::new)
    }

    fn compile_expression(&self, datum: &Value, tail: bool) -> Result<Node, CompilerError> {
        let pair = match *datum {
            Value::Symbol(_) => return parse_variable(datum).map(Node::LoadVar),
            Value::Pair(ref pair) => pair.clone(),
            _ => return Ok(Node::Literal(datum.clone())),
        };

        if let Value::Symbol(ref keyword) = pair.0 {
            if let Some((name, form)) = self.forms.get(keyword) {
                let operands = pair.1.list_to_vec().ok_or(CompilerError::Malformed {
                    form: name,
                    reason: "operands must form a proper list",
                })?;
                return form(self, operands.into_iter().collect(), tail);
            }
        }

        self.compile_call(&pair.0, &pair.1, tail)
    }

    // Operator first, then operands left to right
    fn compile_call(
        &self,
        operator: &Value,
        operands: &Value,
        tail: bool,
    ) -> Result<Node, CompilerError> {
        let operands = operands
            .list_to_vec()
            .ok_or(CompilerError::ImproperApplication)?;

        Ok(Node::Call {
            operator: self.compile_code(operator, false)?,
            operands: self.compile_all(operands)?,
            tail,
        })
    }

    /// Compile every datum in non-tail position
    fn compile_all<I: IntoIterator<Item = Value>>(
        &self,
        datums: I,
    ) -> Result<Vec<Code>, CompilerError> {
        datums
            .into_iter()
            .map(|d| self.compile_code(&d, false))
            .collect()
    }

    /// A body: zero or more expressions evaluated in order, the last one
    /// in the position of the whole body
    fn compile_sequence(
        &self,
        mut datums: VecDeque<Value>,
        tail: bool,
    ) -> Result<Node, CompilerError> {
        let last = match datums.pop_back() {
            Some(last) => last,
            None => return Ok(Node::Literal(Value::Nil)),
        };

        if datums.is_empty() {
            return self.compile_expression(&last, tail);
        }

        let mut sequence = self.compile_all(datums)?;
        sequence.push(self.compile_code(&last, tail)?);
        Ok(Node::Begin(sequence))
    }
}

//
// Helpers
//
fn parse_variable(datum: &Value) -> Result<Symbol, CompilerError> {
    match *datum {
        Value::Symbol(ref s) if is_syntactic_keyword(s) => {
            Err(CompilerError::KeywordAsVariable(s.clone()))
        }
        Value::Symbol(ref s) => Ok(s.clone()),
        ref other => Err(CompilerError::NotAVariable(other.to_string())),
    }
}

fn check_distinct<'a, I: IntoIterator<Item = &'a Symbol>>(names: I) -> Result<(), CompilerError> {
    let mut seen = HashSet::new();
    for name in names {
        check![seen.insert(name), CompilerError::DuplicateBinding(name.clone())];
    }
    Ok(())
}

fn is_keyword(datum: &Value, keyword: &str) -> bool {
    match *datum {
        Value::Symbol(ref s) => &s[..] == keyword,
        _ => false,
    }
}
