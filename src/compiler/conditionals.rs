use std::collections::VecDeque;
use std::rc::Rc;

use super::keywords::{ARROW, COND, ELSE, IF};
use super::{is_keyword, ClauseBody, Code, Compiler, CompilerError, CondClause, Node};
use crate::vm::Value;

pub(super) fn compile_if(
    compiler: &Compiler,
    mut operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    check![
        operands.len() == 2 || operands.len() == 3,
        malformed!(IF, "expected a test, a consequent and an optional alternate")
    ];

    let test = compiler.compile_code(&operands.pop_front().unwrap(), false)?;
    let consequent = compiler.compile_code(&operands.pop_front().unwrap(), tail)?;
    let alternate = match operands.pop_front() {
        Some(d) => Some(compiler.compile_code(&d, tail)?),
        None => None,
    };

    Ok(Node::If {
        test,
        consequent,
        alternate,
    })
}

// Normal clause: (test expr...)
// Test-only clause: (test)
// Arrow clause: (test => receiver)
// Else clause, last only: (else expr...)
pub(super) fn compile_cond(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    check![!operands.is_empty(), malformed!(COND, "expected at least one clause")];

    let n_of_clauses = operands.len();
    let mut clauses = Vec::with_capacity(n_of_clauses);

    for (i, clause) in operands.into_iter().enumerate() {
        let mut datums: VecDeque<Value> = clause
            .list_to_vec()
            .filter(|datums| !datums.is_empty())
            .ok_or(malformed!(COND, "each clause must be a non-empty list"))?
            .into_iter()
            .collect();

        let head = datums.pop_front().unwrap();

        if is_keyword(&head, ELSE) {
            check![
                i == n_of_clauses - 1,
                malformed!(COND, "`else` clause must be the last one")
            ];
            clauses.push(CondClause {
                test: None,
                body: ClauseBody::Sequence(Rc::new(compiler.compile_sequence(datums, tail)?)),
            });
            continue;
        }

        // `test` is never in tail position, even in a test-only clause
        let test = compiler.compile_code(&head, false)?;

        let body = match datums.front() {
            None => ClauseBody::TestValue,
            Some(d) if is_keyword(d, ARROW) => {
                check![
                    datums.len() == 2,
                    malformed!(COND, "`=>` must be followed by exactly one expression")
                ];
                ClauseBody::Arrow {
                    receiver: compiler.compile_code(&datums[1], false)?,
                    tail,
                }
            }
            Some(_) => ClauseBody::Sequence(Rc::new(compiler.compile_sequence(datums, tail)?)),
        };

        clauses.push(CondClause {
            test: Some(test),
            body,
        });
    }

    Ok(Node::Cond(clauses))
}

pub(super) fn compile_and(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    compile_tests(compiler, operands, tail).map(Node::And)
}

pub(super) fn compile_or(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    tail: bool,
) -> Result<Node, CompilerError> {
    compile_tests(compiler, operands, tail).map(Node::Or)
}

// Only the last test can be in tail position
fn compile_tests(
    compiler: &Compiler,
    operands: VecDeque<Value>,
    tail: bool,
) -> Result<Vec<Code>, CompilerError> {
    let n_of_tests = operands.len();
    operands
        .into_iter()
        .enumerate()
        .map(|(i, d)| compiler.compile_code(&d, tail && i == n_of_tests - 1))
        .collect()
}
