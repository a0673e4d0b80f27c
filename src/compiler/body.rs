use std::collections::VecDeque;
use std::rc::Rc;

use super::keywords::{DEFINE, LAMBDA, QUOTE, SET_BANG};
use super::{check_distinct, parse_variable, Compiler, CompilerError, Formals, Lambda, Node};
use crate::symbol::Symbol;
use crate::vm::Value;

pub(super) fn compile_quote(
    _: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    check![operands.len() == 1, malformed!(QUOTE, "expected exactly one datum")];
    Ok(Node::Quote(operands.pop_front().unwrap()))
}

pub(super) fn compile_begin(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    if operands.is_empty() {
        return Ok(Node::Begin(vec![]));
    }

    compiler.compile_sequence(operands, tail)
}

pub(super) fn compile_lambda(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    let formals = operands
        .pop_front()
        .ok_or(malformed!(LAMBDA, "expected a parameter list"))?;
    let formals = parse_lambda_formals(&formals)?;
    compile_lambda_exp(compiler, None, formals, operands)
}

// The body of every procedure is in tail position
fn compile_lambda_exp(
    compiler: &Compiler,
    name: Option<Symbol>,
    formals: Formals,
    body: VecDeque<Value>,
) -> Result<Node, CompilerError> {
    let body = Rc::new(compiler.compile_sequence(body, true)?);
    Ok(Node::Lambda(Rc::new(Lambda {
        name,
        formals,
        body,
    })))
}

pub(super) fn compile_define(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    let target = operands
        .pop_front()
        .ok_or(malformed!(DEFINE, "expected a variable and a value"))?;

    match target {
        // (define (name . formals) body...)
        Value::Pair(signature) => {
            let variable = parse_variable(&signature.0)?;
            let formals = parse_lambda_formals(&signature.1)?;
            let lambda = compile_lambda_exp(compiler, Some(variable.clone()), formals, operands)?;
            Ok(Node::Define(variable, Rc::new(lambda)))
        }
        // (define name expression)
        target => {
            let variable = parse_variable(&target)?;
            check![
                operands.len() == 1,
                malformed!(DEFINE, "expected exactly one value expression")
            ];
            let value = compiler.compile_expression(&operands[0], false)?;
            Ok(Node::Define(variable.clone(), Rc::new(named(value, variable))))
        }
    }
}

// `(define f (lambda ...))` names the procedure after its variable
fn named(node: Node, name: Symbol) -> Node {
    match node {
        Node::Lambda(lambda) => match Rc::try_unwrap(lambda) {
            Ok(mut lambda) => {
                lambda.name.get_or_insert(name);
                Node::Lambda(Rc::new(lambda))
            }
            Err(shared) => Node::Lambda(shared),
        },
        other => other,
    }
}

pub(super) fn compile_set(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    check![operands.len() == 2, malformed!(SET_BANG, "expected a variable and a value")];
    let variable = parse_variable(&operands[0])?;
    let value = compiler.compile_code(&operands[1], false)?;
    Ok(Node::SetVar(variable, value))
}

/// `(a b c)`, `(a b . rest)` or `rest`
pub(super) fn parse_lambda_formals(datum: &Value) -> Result<Formals, CompilerError> {
    let mut required = vec![];
    let mut current = datum.clone();

    let rest = loop {
        current = match current {
            Value::Nil => break None,
            Value::Pair(ref pair) => {
                required.push(parse_variable(&pair.0)?);
                pair.1.clone()
            }
            ref rest => break Some(parse_variable(rest)?),
        };
    };

    check_distinct(required.iter().chain(rest.iter()))?;

    Ok(Formals { required, rest })
}
