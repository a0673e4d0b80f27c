//! Tree-walking virtual machine with proper tail calls.
//!
//! Every node is executed by a trampoline: a loop holding the current
//! `(node, frame)` pair. Sub-evaluations that are not in tail position recurse
//! into a new trampoline, while tail positions replace the pair and continue
//! the loop, so `do` loops and tail-recursive procedures run in bounded stack.
use std::error::Error;
use std::fmt::{self, Display};
use std::rc::Rc;

use ::gc::Gc;

use crate::compiler::{ClauseBody, Code, CompiledProcedure, DoLoop, Lambda, Node, NodeRef};
use crate::symbol::Symbol;

pub use self::gc::{shared, GcShared};
pub use self::profiler::{CountingProfiler, NoopProfiler, Profiler};
pub use self::stdlib::PrimitiveError;
pub use self::value::{Arity, Compound, Environment, Pair, Primitive, PrimitiveFn, Procedure, Value};

mod environment;
mod gc;
mod profiler;
mod stdlib;
mod value;

/// Default limit of nested (non-tail) evaluations. A non-tail procedure call
/// takes two levels: one for the call expression and one for the body.
pub const MAX_CALL_STACK_DEPTH: usize = 10_000;

// Host stack that must be left before entering another level, and the size
// of each segment allocated once less than that remains
const RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT_SIZE: usize = 2 * 1024 * 1024;

pub fn null_env() -> GcShared<Environment> {
    shared(Environment::default())
}

pub fn default_env() -> GcShared<Environment> {
    let env = null_env();
    {
        let mut bindings = env.borrow_mut();
        for primitive in stdlib::primitives() {
            bindings.define(
                Symbol::from(primitive.name),
                Value::Procedure(Procedure::Primitive(primitive)),
            );
        }
    }
    env
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionError {
    UnboundVariable(Symbol),
    Arity {
        procedure: String,
        expected: Arity,
        given: usize,
    },
    NonCallable(String),
    Primitive {
        name: &'static str,
        error: PrimitiveError,
    },
    StackOverflow,
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ExecutionError::UnboundVariable(ref name) => write!(f, "unbound variable: {}", name),
            ExecutionError::Arity {
                ref procedure,
                expected,
                given,
            } => write!(
                f,
                "{}: expected {} argument(s), given {}",
                procedure, expected, given
            ),
            ExecutionError::NonCallable(ref value) => write!(f, "not a procedure: {}", value),
            ExecutionError::Primitive { name, ref error } => write!(f, "{}: {}", name, error),
            ExecutionError::StackOverflow => f.write_str("maximum recursion depth exceeded"),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            ExecutionError::Primitive { ref error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What is left to do after one step of the trampoline
enum Step {
    Done(Value),
    Bounce(Code, GcShared<Environment>),
}

fn done(value: Value) -> Result<Step, ExecutionError> {
    Ok(Step::Done(value))
}

fn bounce(code: &Code, env: &GcShared<Environment>) -> Result<Step, ExecutionError> {
    Ok(Step::Bounce(code.clone(), env.clone()))
}

pub struct Vm<P: Profiler = NoopProfiler> {
    env: GcShared<Environment>,
    depth: usize,
    max_depth: usize,
    profiler: P,
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

impl Vm {
    /// A VM over a fresh root environment holding every primitive
    pub fn new() -> Vm {
        Vm::with_env(default_env())
    }

    pub fn with_env(env: GcShared<Environment>) -> Vm {
        Vm::with_profiler(env, NoopProfiler)
    }
}

impl<P: Profiler> Vm<P> {
    pub fn with_profiler(env: GcShared<Environment>, profiler: P) -> Vm<P> {
        Vm {
            env,
            depth: 0,
            max_depth: MAX_CALL_STACK_DEPTH,
            profiler,
        }
    }

    /// The root environment
    pub fn env(&self) -> &GcShared<Environment> {
        &self.env
    }

    pub fn profiler(&self) -> &P {
        &self.profiler
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn run(&mut self, procedure: &CompiledProcedure) -> Result<Value, ExecutionError> {
        self.depth = 0;
        let result = self.eval(&procedure.body, &procedure.env);
        debug!("Run finished with {:?}", result);
        result
    }

    /// Evaluates `code` in a trampoline of its own, one level deeper. The
    /// host stack grows on the heap as needed, so only `max_depth` bounds
    /// the nesting.
    fn eval(&mut self, code: &Code, env: &GcShared<Environment>) -> Result<Value, ExecutionError> {
        check![self.depth < self.max_depth, ExecutionError::StackOverflow];

        self.depth += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.trampoline(code.clone(), env.clone())
        });
        self.depth -= 1;
        result
    }

    fn trampoline(
        &mut self,
        mut code: Code,
        mut env: GcShared<Environment>,
    ) -> Result<Value, ExecutionError> {
        loop {
            let node = NodeRef::from(&*code);
            self.profiler.on_node(node);
            trace!("depth {}\tnode {:?}", self.depth, node);

            match self.step(&code, &env)? {
                Step::Done(value) => return Ok(value),
                Step::Bounce(next, next_env) => {
                    code = next;
                    env = next_env;
                }
            }
        }
    }

    fn step(&mut self, node: &Node, env: &GcShared<Environment>) -> Result<Step, ExecutionError> {
        match *node {
            Node::Literal(ref value) | Node::Quote(ref value) => done(value.clone()),
            Node::LoadVar(ref name) => match env.borrow().get(name) {
                Some(value) => done(value),
                None => Err(ExecutionError::UnboundVariable(name.clone())),
            },
            Node::If {
                ref test,
                ref consequent,
                ref alternate,
            } => {
                if self.eval(test, env)?.is_true() {
                    bounce(consequent, env)
                } else {
                    match *alternate {
                        Some(ref alternate) => bounce(alternate, env),
                        None => done(Value::Nil),
                    }
                }
            }
            Node::Begin(ref body) => match body.split_last() {
                None => done(Value::Nil),
                Some((last, init)) => {
                    for code in init {
                        self.eval(code, env)?;
                    }
                    bounce(last, env)
                }
            },
            Node::Lambda(ref lambda) => done(closure(lambda, env)),
            Node::Define(ref name, ref value) => {
                let value = self.eval(value, env)?;
                env.borrow_mut().define(name.clone(), value);
                done(Value::Nil)
            }
            Node::SetVar(ref name, ref value) => {
                let value = self.eval(value, env)?;
                check![
                    env.borrow_mut().set(name, value.clone()),
                    ExecutionError::UnboundVariable(name.clone())
                ];
                done(value)
            }
            Node::Call {
                ref operator,
                ref operands,
                tail,
            } => {
                let procedure = self.eval(operator, env)?;
                let args = operands
                    .iter()
                    .map(|operand| self.eval(operand, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(procedure, args, tail)
            }
            Node::Let {
                ref bindings,
                ref body,
            } => {
                let frame = Environment::child(env);
                for &(ref name, ref init) in bindings {
                    let value = self.eval(init, env)?;
                    frame.borrow_mut().define(name.clone(), value);
                }
                bounce(body, &frame)
            }
            Node::Letrec {
                ref bindings,
                ref body,
            } => {
                let frame = Environment::child(env);
                for &(ref name, _) in bindings {
                    frame.borrow_mut().define(name.clone(), Value::Nil);
                }
                for &(ref name, ref init) in bindings {
                    let value = self.eval(init, &frame)?;
                    frame.borrow_mut().define(name.clone(), value);
                }
                bounce(body, &frame)
            }
            Node::Do(ref do_loop) => self.run_do(do_loop, env),
            Node::Cond(ref clauses) => {
                for clause in clauses {
                    let value = match clause.test {
                        Some(ref test) => self.eval(test, env)?,
                        None => Value::Boolean(true),
                    };
                    if !value.is_true() {
                        continue;
                    }

                    return match clause.body {
                        ClauseBody::TestValue => done(value),
                        ClauseBody::Arrow { ref receiver, tail } => {
                            let receiver = self.eval(receiver, env)?;
                            self.call(receiver, vec![value], tail)
                        }
                        ClauseBody::Sequence(ref body) => bounce(body, env),
                    };
                }
                done(Value::Nil)
            }
            Node::And(ref tests) => match tests.split_last() {
                None => done(Value::Boolean(true)),
                Some((last, init)) => {
                    for test in init {
                        let value = self.eval(test, env)?;
                        if !value.is_true() {
                            return done(value);
                        }
                    }
                    bounce(last, env)
                }
            },
            Node::Or(ref tests) => match tests.split_last() {
                None => done(Value::Boolean(false)),
                Some((last, init)) => {
                    for test in init {
                        let value = self.eval(test, env)?;
                        if value.is_true() {
                            return done(value);
                        }
                    }
                    bounce(last, env)
                }
            },
        }
    }

    // Each round gets a fresh frame, so closures created by the commands
    // keep the bindings of their own round
    fn run_do(
        &mut self,
        do_loop: &DoLoop,
        env: &GcShared<Environment>,
    ) -> Result<Step, ExecutionError> {
        let mut frame = Environment::child(env);
        for variable in &do_loop.variables {
            let value = self.eval(&variable.init, env)?;
            frame.borrow_mut().define(variable.name.clone(), value);
        }

        loop {
            if self.eval(&do_loop.test, &frame)?.is_true() {
                return match do_loop.result {
                    Some(ref result) => bounce(result, &frame),
                    None => done(Value::Nil),
                };
            }

            for command in &do_loop.commands {
                self.eval(command, &frame)?;
            }

            let next = Environment::child(env);
            for variable in &do_loop.variables {
                let value = match variable.step {
                    Some(ref step) => self.eval(step, &frame)?,
                    None => frame
                        .borrow()
                        .get(&variable.name)
                        .ok_or_else(|| ExecutionError::UnboundVariable(variable.name.clone()))?,
                };
                next.borrow_mut().define(variable.name.clone(), value);
            }
            trace!("do: next round");
            frame = next;
        }
    }

    /// Applies `procedure` to already evaluated arguments. A compound
    /// procedure called from tail position is bounced into instead of
    /// evaluated here.
    fn call(
        &mut self,
        procedure: Value,
        args: Vec<Value>,
        tail: bool,
    ) -> Result<Step, ExecutionError> {
        let procedure = match procedure {
            Value::Procedure(procedure) => procedure,
            other => return Err(ExecutionError::NonCallable(other.to_string())),
        };

        let arity = procedure.arity();
        check![
            arity.accepts(args.len()),
            ExecutionError::Arity {
                procedure: procedure.to_string(),
                expected: arity,
                given: args.len(),
            }
        ];

        match procedure {
            Procedure::Primitive(primitive) => (primitive.fun)(&args)
                .map(Step::Done)
                .map_err(|error| ExecutionError::Primitive {
                    name: primitive.name,
                    error,
                }),
            Procedure::Compound(compound) => {
                let frame = bind_arguments(&compound, args);
                if tail {
                    trace!("tail call into {}", Procedure::Compound(compound.clone()));
                    bounce(&compound.lambda.body, &frame)
                } else {
                    self.eval(&compound.lambda.body, &frame).map(Step::Done)
                }
            }
        }
    }
}

fn closure(lambda: &Rc<Lambda>, env: &GcShared<Environment>) -> Value {
    Value::Procedure(Procedure::Compound(Gc::new(Compound {
        lambda: lambda.clone(),
        env: env.clone(),
    })))
}

// Arity has already been checked
fn bind_arguments(compound: &Compound, mut args: Vec<Value>) -> GcShared<Environment> {
    let formals = &compound.lambda.formals;
    let rest = args.split_off(formals.required.len());

    let frame = Environment::child(&compound.env);
    {
        let mut bindings = frame.borrow_mut();
        for (name, value) in formals.required.iter().zip(args) {
            bindings.define(name.clone(), value);
        }
        if let Some(ref name) = formals.rest {
            bindings.define(name.clone(), Value::list(rest));
        }
    }
    frame
}
