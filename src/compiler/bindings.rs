use std::collections::VecDeque;
use std::rc::Rc;

use super::keywords::{DO, LAMBDA, LET, LETREC, LET_STAR};
use super::{
    check_distinct, parse_variable, Code, Compiler, CompilerError, DoLoop, DoVariable, Node,
};
use crate::symbol::Symbol;
use crate::vm::Value;

type Bindings = Vec<(Symbol, Code)>;

pub(super) fn compile_let(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    let first = operands
        .pop_front()
        .ok_or(malformed!(LET, "expected a binding list"))?;

    if let Value::Symbol(_) = first {
        return compile_named_let(compiler, first, operands, tail);
    }

    let bindings = compile_bindings(compiler, LET, &first)?;
    check_distinct(bindings.iter().map(|&(ref name, _)| name))?;
    let body = Rc::new(compiler.compile_sequence(operands, true)?);

    Ok(Node::Let { bindings, body })
}

// (let name ((var init) ...) body ...)
//   => ((letrec ((name (lambda (var ...) body ...))) name) init ...)
fn compile_named_let(
    compiler: &Compiler,
    name: Value,
    mut operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    parse_variable(&name)?;
    let bindings = operands
        .pop_front()
        .ok_or(malformed!(LET, "expected a binding list after the loop name"))?;
    let (variables, inits): (Vec<Value>, Vec<Value>) = split_bindings(LET, &bindings)?
        .into_iter()
        .unzip();

    let lambda = Value::cons(
        Value::symbol(LAMBDA),
        Value::cons(Value::list(variables), Value::list(operands.into_iter().collect())),
    );
    let letrec = Value::list(vec![
        Value::symbol(LETREC),
        Value::list(vec![Value::list(vec![name.clone(), lambda])]),
        name,
    ]);

    let operator = compiler.compile_code(&letrec, false)?;
    Ok(Node::Call {
        operator,
        operands: compiler.compile_all(inits)?,
        tail,
    })
}

// Every binding is a separate frame, so names may repeat
pub(super) fn compile_let_star(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    let bindings = operands
        .pop_front()
        .ok_or(malformed!(LET_STAR, "expected a binding list"))?;
    let mut bindings = compile_bindings(compiler, LET_STAR, &bindings)?;
    let body = Rc::new(compiler.compile_sequence(operands, true)?);

    let innermost = match bindings.pop() {
        Some(binding) => binding,
        None => return Ok(Node::Let { bindings, body }),
    };

    let mut node = Node::Let {
        bindings: vec![innermost],
        body,
    };
    while let Some(binding) = bindings.pop() {
        node = Node::Let {
            bindings: vec![binding],
            body: Rc::new(node),
        };
    }
    Ok(node)
}

pub(super) fn compile_letrec(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    let bindings = operands
        .pop_front()
        .ok_or(malformed!(LETREC, "expected a binding list"))?;
    let bindings = compile_bindings(compiler, LETREC, &bindings)?;
    check_distinct(bindings.iter().map(|&(ref name, _)| name))?;
    let body = Rc::new(compiler.compile_sequence(operands, true)?);

    Ok(Node::Letrec { bindings, body })
}

// (do ((var init step) ...) (test result ...) command ...)
pub(super) fn compile_do(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    _tail: bool,
) -> Result<Node, CompilerError> {
    check![
        operands.len() >= 2,
        malformed!(DO, "expected a variable list and a test clause")
    ];

    let specs = operands
        .pop_front()
        .unwrap()
        .list_to_vec()
        .ok_or(malformed!(DO, "variables must form a proper list"))?;

    let mut variables = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = spec
            .list_to_vec()
            .filter(|spec| spec.len() == 2 || spec.len() == 3)
            .ok_or(malformed!(DO, "each variable must be (var init) or (var init step)"))?;
        variables.push(DoVariable {
            name: parse_variable(&spec[0])?,
            init: compiler.compile_code(&spec[1], false)?,
            step: match spec.get(2) {
                Some(step) => Some(compiler.compile_code(step, false)?),
                None => None,
            },
        });
    }
    check_distinct(variables.iter().map(|v| &v.name))?;

    let mut clause: VecDeque<Value> = operands
        .pop_front()
        .unwrap()
        .list_to_vec()
        .filter(|clause| !clause.is_empty())
        .ok_or(malformed!(DO, "the test clause must be a non-empty list"))?
        .into_iter()
        .collect();
    let test = compiler.compile_code(&clause.pop_front().unwrap(), false)?;
    let result = if clause.is_empty() {
        None
    } else {
        Some(Rc::new(compiler.compile_sequence(clause, true)?))
    };

    let commands = compiler.compile_all(operands)?;

    Ok(Node::Do(Box::new(DoLoop {
        variables,
        test,
        result,
        commands,
    })))
}

//
// Helpers
//
fn compile_bindings(
    compiler: &Compiler,
    form: &'static str,
    bindings: &Value,
) -> Result<Bindings, CompilerError> {
    split_bindings(form, bindings)?
        .into_iter()
        .map(|(name, init)| {
            let name = parse_variable(&name)?;
            Ok((name, compiler.compile_code(&init, false)?))
        })
        .collect()
}

// `((name init) ...)` into its names and inits, unchecked
fn split_bindings(
    form: &'static str,
    bindings: &Value,
) -> Result<Vec<(Value, Value)>, CompilerError> {
    let bindings = bindings
        .list_to_vec()
        .ok_or(malformed!(form, "bindings must form a proper list"))?;

    bindings
        .into_iter()
        .map(|binding| match binding.list_to_vec() {
            Some(ref pair) if pair.len() == 2 => Ok((pair[0].clone(), pair[1].clone())),
            _ => Err(malformed!(form, "each binding must be (name init)")),
        })
        .collect()
}
