use std::collections::{HashMap, VecDeque};

use super::{bindings, body, conditionals, Compiler, CompilerError, Node};
use crate::symbol::Symbol;
use crate::vm::Value;

pub const IF: &str = "if";
pub const OR: &str = "or";
pub const ARROW: &str = "=>";
pub const DO: &str = "do";
pub const AND: &str = "and";
pub const LET: &str = "let";
pub const ELSE: &str = "else";
pub const SET_BANG: &str = "set!";
pub const COND: &str = "cond";
pub const LET_STAR: &str = "let*";
pub const QUOTE: &str = "quote";
pub const BEGIN: &str = "begin";
pub const DEFINE: &str = "define";
pub const LAMBDA: &str = "lambda";
pub const LETREC: &str = "letrec";

macro_rules! one_of {
    ($x:expr, [$c:expr]) => ($x == $c);
    ($x:expr, [ $c:expr, $( $d:expr ),* ]) => (
        $x == $c || one_of!($x, [$( $d ),* ])
    )
}

pub fn is_syntactic_keyword(name: &str) -> bool {
    match name.len() {
        2 => one_of!(name, [IF, OR, ARROW, DO]),
        3 => one_of!(name, [AND, LET]),
        4 => one_of!(name, [ELSE, SET_BANG, COND, LET_STAR]),
        5 => one_of!(name, [QUOTE, BEGIN]),
        6 => one_of!(name, [DEFINE, LAMBDA, LETREC]),
        _ => false,
    }
}

/// Compiles the operands of one special form. The flag tells whether the
/// form itself is in tail position.
pub(super) type FormCompiler =
    fn(&Compiler, VecDeque<Value>, bool) -> Result<Node, CompilerError>;

/// Maps the leading symbol of a special form to its compiler
pub(super) struct SpecialForms(HashMap<Symbol, (&'static str, FormCompiler)>);

impl SpecialForms {
    pub fn new() -> SpecialForms {
        let forms: [(&'static str, FormCompiler); 13] = [
            (QUOTE, body::compile_quote as FormCompiler),
            (IF, conditionals::compile_if as FormCompiler),
            (BEGIN, body::compile_begin as FormCompiler),
            (LAMBDA, body::compile_lambda as FormCompiler),
            (DEFINE, body::compile_define as FormCompiler),
            (SET_BANG, body::compile_set as FormCompiler),
            (LET, bindings::compile_let as FormCompiler),
            (LET_STAR, bindings::compile_let_star as FormCompiler),
            (LETREC, bindings::compile_letrec as FormCompiler),
            (DO, bindings::compile_do as FormCompiler),
            (COND, conditionals::compile_cond as FormCompiler),
            (AND, conditionals::compile_and as FormCompiler),
            (OR, conditionals::compile_or as FormCompiler),
        ];

        SpecialForms(
            forms
                .iter()
                .map(|&(name, form)| (Symbol::from(name), (name, form)))
                .collect(),
        )
    }

    pub fn get(&self, keyword: &Symbol) -> Option<(&'static str, FormCompiler)> {
        self.0.get(keyword).cloned()
    }
}
