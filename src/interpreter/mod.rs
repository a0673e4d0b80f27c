//! Reader, compiler and VM put together
use std::error::Error as StdError;
use std::fmt;

use crate::compiler::{Compiler, CompilerError};
use crate::reader::{Parser, ReaderError};
use crate::vm::{
    default_env, Environment, ExecutionError, GcShared, NoopProfiler, Profiler, Value, Vm,
};

/// Any failure while interpreting source text. Each variant is the error of
/// the layer that detected it, unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Parse(ReaderError),
    Syntax(CompilerError),
    Exec(ExecutionError),
}

/// Flat classification of an `Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Syntax,
    UnboundVariable,
    Arity,
    NonCallable,
    Primitive,
    StackOverflow,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::Exec(ref e) => match *e {
                ExecutionError::UnboundVariable(_) => ErrorKind::UnboundVariable,
                ExecutionError::Arity { .. } => ErrorKind::Arity,
                ExecutionError::NonCallable(_) => ErrorKind::NonCallable,
                ExecutionError::Primitive { .. } => ErrorKind::Primitive,
                ExecutionError::StackOverflow => ErrorKind::StackOverflow,
            },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Parse(ref e) => write!(f, "parse error: {}", e),
            Error::Syntax(ref e) => write!(f, "syntax error: {}", e),
            Error::Exec(ref e) => write!(f, "error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Parse(ref e) => Some(e),
            Error::Syntax(ref e) => Some(e),
            Error::Exec(ref e) => Some(e),
        }
    }
}

impl From<ReaderError> for Error {
    fn from(e: ReaderError) -> Error {
        Error::Parse(e)
    }
}

impl From<CompilerError> for Error {
    fn from(e: CompilerError) -> Error {
        Error::Syntax(e)
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Error {
        Error::Exec(e)
    }
}

/// A session: one root environment shared by everything evaluated through it
pub struct Interpreter<P: Profiler = NoopProfiler> {
    compiler: Compiler,
    vm: Vm<P>,
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_env(default_env())
    }

    pub fn with_env(env: GcShared<Environment>) -> Interpreter {
        Interpreter::with_vm(Vm::with_env(env))
    }
}

impl<P: Profiler> Interpreter<P> {
    pub fn with_vm(vm: Vm<P>) -> Interpreter<P> {
        Interpreter {
            compiler: Compiler::new(),
            vm,
        }
    }

    pub fn vm(&self) -> &Vm<P> {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm<P> {
        &mut self.vm
    }

    /// Compiles and runs one datum
    pub fn eval_datum(&mut self, datum: &Value) -> Result<Value, Error> {
        let procedure = self.compiler.compile(datum, self.vm.env())?;
        Ok(self.vm.run(&procedure)?)
    }

    /// Evaluates every datum of `code` in order and returns the value of the
    /// last one, `Nil` if there is none. Stops at the first error.
    pub fn eval(&mut self, code: &str) -> Result<Value, Error> {
        self.eval_all(Parser::new(code))
    }

    pub fn eval_all(&mut self, parser: Parser) -> Result<Value, Error> {
        let mut value = Value::Nil;
        for datum in parser {
            value = self.eval_datum(&datum?)?;
        }
        Ok(value)
    }
}

/// Evaluates `code` against `env` in a fresh session
pub fn interpret(code: &str, env: GcShared<Environment>) -> Result<Value, Error> {
    Interpreter::with_env(env).eval(code)
}

#[cfg(test)]
mod test;
