use std::thread;

use proptest::prelude::*;

use super::{interpret, Error, ErrorKind, Interpreter};
use crate::compiler::CompilerError;
use crate::vm::{default_env, null_env, ExecutionError, Value};

macro_rules! with_null {
    ($code:expr) => (interpret($code, null_env()))
}

macro_rules! with_std {
    ($code:expr) => (interpret($code, default_env()))
}

macro_rules! rt_err {
    ($err:expr) => (Err(Error::Exec($err)))
}

macro_rules! err_kind {
    ($code:expr) => (with_std![$code].map_err(|e| e.kind()))
}

fn sym(name: &str) -> Value {
    Value::symbol(name)
}

fn ints(ns: &[i64]) -> Value {
    Value::list(ns.iter().cloned().map(Value::Integer).collect())
}

#[test]
fn symbol() {
    assert_eq![with_null!["'a"], Ok(sym("a"))];
}

#[test]
fn two_expressions() {
    assert_eq![with_null!["'a\n'b"], Ok(sym("b"))];
}

#[test]
fn no_expressions() {
    assert_eq![with_null![""], Ok(Value::Nil)];
    assert_eq![with_null!["; only a comment"], Ok(Value::Nil)];
}

#[test]
fn atoms() {
    assert_eq![with_null!["1"], Ok(Value::Integer(1))];
    assert_eq![with_null!["\"foo\""], Ok(Value::string("foo"))];
    assert_eq![with_null!["#f"], Ok(Value::Boolean(false))];
    assert_eq![with_null!["()"], Ok(Value::Nil)];
    assert_eq![with_null!["1+2i"], Ok(Value::Complex(1.0, 2.0))];
}

#[test]
fn quote() {
    assert_eq![with_null!["'(1 2)"], Ok(ints(&[1, 2]))];
    assert_eq![with_null!["(quote (quote a))"].map(|v| v.to_string()), Ok("(quote a)".into())];
    assert_eq![with_null!["'if"], Ok(sym("if"))];
}

#[test]
fn begin() {
    assert_eq![with_null!["(begin 1 2 3)"], Ok(Value::Integer(3))];
    assert_eq![with_null!["(begin 1)"], Ok(Value::Integer(1))];
    assert_eq![with_null!["(begin)"], Ok(Value::Nil)];
}

#[test]
fn if_forms() {
    assert_eq![with_null!["(if #t 1 2)"], Ok(Value::Integer(1))];
    assert_eq![with_null!["(if #f 1 2)"], Ok(Value::Integer(2))];
    assert_eq![with_null!["(if #t 1)"], Ok(Value::Integer(1))];
    assert_eq![with_null!["(if #f 1)"], Ok(Value::Nil)];
    assert_eq![with_null!["(if '() 1 2)"], Ok(Value::Integer(1))];
    assert_eq![with_null!["(if 0 1 2)"], Ok(Value::Integer(1))];
}

#[test]
fn if_syntax() {
    assert_eq![err_kind!["(if #t)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(if)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(if #t 1 2 3)"], Err(ErrorKind::Syntax)];
}

#[test]
fn lambda() {
    assert_eq![with_std!["((lambda (x) x) 5)"], Ok(Value::Integer(5))];
    assert_eq![with_std!["((lambda (x) (+ x 1)) 5)"], Ok(Value::Integer(6))];
    assert_eq![with_std!["((lambda () 5))"], Ok(Value::Integer(5))];
    assert_eq![with_std!["((lambda x (first x)) 1 2)"], Ok(Value::Integer(1))];
    assert_eq![with_std!["((lambda x (first x)) 1 2 3 4 5)"], Ok(Value::Integer(1))];
    assert_eq![with_std!["((lambda x (first x)) 1)"], Ok(Value::Integer(1))];
    assert_eq![with_std!["((lambda x x) 1 2)"], Ok(ints(&[1, 2]))];
    assert_eq![with_std!["((lambda x x))"], Ok(Value::Nil)];
    assert_eq![with_std!["((lambda (x . y) x) 1)"], Ok(Value::Integer(1))];
    assert_eq![with_std!["((lambda (x . y) y) 1)"], Ok(Value::Nil)];
    assert_eq![with_std!["((lambda (x . y) y) 1 2 3)"], Ok(ints(&[2, 3]))];
    assert_eq![with_std!["((lambda (x . y) (first y)) 1 2 3)"], Ok(Value::Integer(2))];
}

#[test]
fn lambda_body_is_not_evaluated_at_definition() {
    assert![with_null!["(lambda () undefined)"].unwrap().is_procedure()];
}

#[test]
fn closures_capture_their_frame() {
    let code = "
        (define (make-counter)
          (let ((n 0))
            (lambda () (set! n (+ n 1)) n)))
        (define a (make-counter))
        (define b (make-counter))
        (a) (a) (b)
        (list (a) (b))";
    assert_eq![with_std![code], Ok(ints(&[3, 2]))];
}

#[test]
fn procedures_are_reentrant() {
    let code = "
        (define (fact n)
          (if (= n 0) 1 (* n (fact (- n 1)))))
        (list (fact 5) (fact 10))";
    assert_eq![with_std![code], Ok(ints(&[120, 3_628_800]))];
}

#[test]
fn call() {
    assert_eq![with_std!["(- 5 4)"], Ok(Value::Integer(1))];
    assert_eq![with_std!["((if #t + -) 5 4)"], Ok(Value::Integer(9))];
}

#[test]
fn arguments_are_evaluated_left_to_right() {
    let code = "
        (define trace '())
        (define (note x) (set! trace (cons x trace)) x)
        ((begin (note 'operator) list) (note 1) (note 2))
        trace";
    assert_eq![
        with_std![code],
        Ok(Value::list(vec![Value::Integer(2), Value::Integer(1), sym("operator")]))
    ];
}

#[test]
fn define() {
    assert_eq![with_null!["(begin (define foo 5) foo)"], Ok(Value::Integer(5))];
    assert_eq![with_null!["(define foo 5)"], Ok(Value::Nil)];
    assert_eq![err_kind!["(define)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(define foo)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(define foo 5 6)"], Err(ErrorKind::Syntax)];

    assert_eq![with_null!["(begin (define (foo x) x) (foo 5))"], Ok(Value::Integer(5))];
    assert_eq![with_null!["(begin (define (foo)) (foo))"], Ok(Value::Nil)];

    assert_eq![with_std!["(begin (define (foo . x) (first x)) (foo 1))"], Ok(Value::Integer(1))];
    assert_eq![with_std!["(begin (define (foo . x) (first x)) (foo 1 2))"], Ok(Value::Integer(1))];
}

#[test]
fn define_overwrites() {
    let env = default_env();
    assert_eq![interpret("(define a 1) (define a 2) a", env.clone()), Ok(Value::Integer(2))];
    assert_eq![interpret("(define (a) 3) (a)", env.clone()), Ok(Value::Integer(3))];
    assert_eq![env.borrow().get(&"a".into()).map(|v| v.is_procedure()), Some(true)];
}

#[test]
fn define_binds_in_the_current_frame() {
    let code = "
        (define x 1)
        (define (f) (define x 2) x)
        (list (f) x)";
    assert_eq![with_std![code], Ok(ints(&[2, 1]))];
}

#[test]
fn set() {
    let code = "
        (begin
          (define foo 5)
          (define bar foo)
          (set! foo 6)
          (pair foo bar))";
    assert_eq![with_std![code], Ok(Value::cons(Value::Integer(6), Value::Integer(5)))];
    assert_eq![with_std!["(set! pair 10)"], Ok(Value::Integer(10))];
}

#[test]
fn set_unbound() {
    assert_eq![
        with_std!["(set! var-not-exist 10)"],
        rt_err![ExecutionError::UnboundVariable("var-not-exist".into())]
    ];
    assert_eq![
        err_kind!["((lambda (x) (set! y x)) 1)"],
        Err(ErrorKind::UnboundVariable)
    ];
    // A failed set! creates nothing
    let env = default_env();
    assert![interpret("(set! z 1)", env.clone()).is_err()];
    assert![env.borrow().get(&"z".into()).is_none()];
}

#[test]
fn set_reaches_outer_frames() {
    let code = "
        (define x 1)
        (define (f) (let ((y 0)) (set! x 10)))
        (f)
        x";
    assert_eq![with_std![code], Ok(Value::Integer(10))];
}

#[test]
fn unbound_variable() {
    assert_eq![with_null!["foo"], rt_err![ExecutionError::UnboundVariable("foo".into())]];
    assert_eq![err_kind!["(undefined-procedure 1)"], Err(ErrorKind::UnboundVariable)];
}

#[test]
fn let_forms() {
    let code = "
        (let ((a 3) (b 2))
          (+ a b)
          (- a b))";
    assert_eq![with_std![code], Ok(Value::Integer(1))];

    let code = "
        (begin
          (define a 5)
          (let ((a 10) (b a))
            (- a b)))";
    assert_eq![with_std![code], Ok(Value::Integer(5))];

    assert_eq![with_null!["(let () #t)"], Ok(Value::Boolean(true))];
    assert_eq![with_null!["(let ())"], Ok(Value::Nil)];
}

#[test]
fn let_does_not_leak() {
    assert_eq![
        with_std!["(let ((inner 1)) inner) inner"],
        rt_err![ExecutionError::UnboundVariable("inner".into())]
    ];
}

#[test]
fn let_star() {
    assert_eq![with_std!["(let* ((a 1) (b (+ a 1))) (list a b))"], Ok(ints(&[1, 2]))];
    assert_eq![with_std!["(let* ((a 1) (a (+ a 1))) a)"], Ok(Value::Integer(2))];
    assert_eq![with_null!["(let* () 5)"], Ok(Value::Integer(5))];
}

#[test]
fn letrec() {
    let code = "
        (letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                 (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
          (list (even? 10) (odd? 7) (even? 7)))";
    assert_eq![
        with_std![code],
        Ok(Value::list(vec![
            Value::Boolean(true),
            Value::Boolean(true),
            Value::Boolean(false),
        ]))
    ];
}

#[test]
fn named_let() {
    let code = "
        (let loop ((i 0) (acc '()))
          (if (= i 3) acc (loop (+ i 1) (cons i acc))))";
    assert_eq![with_std![code], Ok(ints(&[2, 1, 0]))];
    // The loop name is not visible outside
    assert_eq![err_kind!["(let loop ((i 0)) i) loop"], Err(ErrorKind::UnboundVariable)];
}

#[test]
fn do_loop() {
    let code = "
        (do ((a 6 b) (b 9 (remainder a b)))
            ((= b 0) a))";
    assert_eq![with_std![code], Ok(Value::Integer(3))];
}

#[test]
fn do_without_result() {
    assert_eq![with_std!["(do ((i 0 (+ i 1))) ((= i 3)))"], Ok(Value::Nil)];
}

#[test]
fn do_commands() {
    let code = "
        (define total 0)
        (do ((i 0 (+ i 1))
             (untouched 'same))
            ((= i 5) (list total untouched))
          (set! total (+ total i)))";
    assert_eq![with_std![code], Ok(Value::list(vec![Value::Integer(10), sym("same")]))];
}

#[test]
fn do_rounds_have_their_own_frames() {
    let code = "
        (define procs '())
        (do ((i 0 (+ i 1)))
            ((= i 3) (map-call procs))
          (set! procs (cons (lambda () i) procs)))";
    let prelude = "
        (define (map-call procs)
          (if (null? procs) '() (cons ((car procs)) (map-call (cdr procs)))))";
    let env = default_env();
    interpret(prelude, env.clone()).unwrap();
    assert_eq![interpret(code, env), Ok(ints(&[2, 1, 0]))];
}

#[test]
fn do_variables_are_local() {
    assert_eq![
        err_kind!["(do ((i 0 (+ i 1))) ((= i 1))) i"],
        Err(ErrorKind::UnboundVariable)
    ];
}

#[test]
fn cond() {
    let code = "
        (cond (#f 5 6)
              ((> 7 8) (+ 3 4))
              ((< 7 8)))";
    assert_eq![with_std![code], Ok(Value::Boolean(true))];

    let code = "
        (cond (#f 5 6)
              ((> 7 8) (+ 3 4))
              ((< 7 8) (+ 5 6) (+ 6 7)))";
    assert_eq![with_std![code], Ok(Value::Integer(13))];

    let code = "
        (cond (#f 5 6)
              ((+ 2 3) => (lambda (x) (* x x)))
              (else 10))";
    assert_eq![with_std![code], Ok(Value::Integer(25))];

    let code = "
        (cond (#f 5 6)
              (else))";
    assert_eq![with_std![code], Ok(Value::Nil)];
}

#[test]
fn cond_syntax() {
    assert_eq![err_kind!["(cond)"], Err(ErrorKind::Syntax)];
    assert_eq![
        with_null!["(cond (else 5)\n (#t 6))"],
        Err(Error::Syntax(CompilerError::Malformed {
            form: "cond",
            reason: "`else` clause must be the last one",
        }))
    ];
}

#[test]
fn cond_basic() {
    assert_eq![with_null!["(cond (#t 'a))"], Ok(sym("a"))];
}

#[test]
fn cond_empty() {
    assert_eq![with_null!["(cond (#f 'a))"], Ok(Value::Nil)];
}

#[test]
fn cond_cascade() {
    assert_eq![with_null!["(cond (((lambda () #f)) 'a) (1 'b))"], Ok(sym("b"))];
}

#[test]
fn cond_test_only() {
    assert_eq![with_null!["(cond ('a))"], Ok(sym("a"))];
}

#[test]
fn cond_arrow() {
    assert_eq![with_std!["(cond ('(a b) => car))"], Ok(sym("a"))];
}

#[test]
fn cond_arrow_false() {
    assert_eq![with_null!["(cond (#f => car) (#t 'z))"], Ok(sym("z"))];
}

#[test]
fn cond_arrow_needs_a_procedure() {
    assert_eq![err_kind!["(cond (1 => 2))"], Err(ErrorKind::NonCallable)];
}

#[test]
fn and_or() {
    assert_eq![with_null!["(and)"], Ok(Value::Boolean(true))];
    assert_eq![with_null!["(or)"], Ok(Value::Boolean(false))];
    assert_eq![with_null!["(and 1 2)"], Ok(Value::Integer(2))];
    assert_eq![with_null!["(and 1 #f undefined)"], Ok(Value::Boolean(false))];
    assert_eq![with_null!["(or #f 2 undefined)"], Ok(Value::Integer(2))];
    assert_eq![with_null!["(or #f #f)"], Ok(Value::Boolean(false))];
}

#[test]
fn arity_errors() {
    assert_eq![err_kind!["((lambda (x) x))"], Err(ErrorKind::Arity)];
    assert_eq![err_kind!["((lambda (x) x) 1 2)"], Err(ErrorKind::Arity)];
    assert_eq![err_kind!["((lambda (x . y) x))"], Err(ErrorKind::Arity)];
    assert_eq![err_kind!["(cons 1)"], Err(ErrorKind::Arity)];
    assert_eq![err_kind!["(car)"], Err(ErrorKind::Arity)];
}

#[test]
fn arity_error_names_the_procedure() {
    let err = with_std!["(define (two a b) a) (two 1)"].unwrap_err();
    assert_eq![err.to_string(), "error: #<procedure two>: expected 2 argument(s), given 1"];
}

#[test]
fn non_callable() {
    assert_eq![with_null!["(1 2)"], rt_err![ExecutionError::NonCallable("1".into())]];
    assert_eq![err_kind!["('(a) 2)"], Err(ErrorKind::NonCallable)];
}

#[test]
fn primitive_errors() {
    assert_eq![err_kind!["(car 1)"], Err(ErrorKind::Primitive)];
    assert_eq![err_kind!["(quotient 1 0)"], Err(ErrorKind::Primitive)];
    assert_eq![err_kind!["(+ 1 'a)"], Err(ErrorKind::Primitive)];
}

#[test]
fn parse_errors() {
    assert_eq![err_kind!["(+ 1 2"], Err(ErrorKind::Parse)];
    assert_eq![err_kind!["1+2"], Err(ErrorKind::Parse)];
    assert_eq![
        with_null!["1/"].unwrap_err().to_string(),
        "parse error: <input>:1 invalid number format, expecting denominator"
    ];
}

#[test]
fn syntax_errors_happen_before_running() {
    let env = default_env();
    assert_eq![
        interpret("(begin (define x 1) (if))", env.clone()).map_err(|e| e.kind()),
        Err(ErrorKind::Syntax)
    ];
    assert![env.borrow().get(&"x".into()).is_none()];
}

#[test]
fn keywords_are_reserved() {
    assert_eq![err_kind!["(define if 1)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(let ((else 1)) else)"], Err(ErrorKind::Syntax)];
    assert_eq![err_kind!["(lambda (do) 1)"], Err(ErrorKind::Syntax)];
}

#[test]
fn stack_overflow() {
    let mut interpreter = Interpreter::new();
    interpreter.vm_mut().set_max_depth(100);
    interpreter.eval("(define (f n) (+ 1 (f n)))").unwrap();
    assert_eq![
        interpreter.eval("(f 1)"),
        rt_err![ExecutionError::StackOverflow]
    ];
    // The session survives
    assert_eq![interpreter.eval("(+ 1 1)"), Ok(Value::Integer(2))];
}

// Spawned threads get a 2 MiB stack unless told otherwise
fn on_spawned_thread(code: &'static str) -> Result<String, ErrorKind> {
    thread::spawn(move || {
        with_std![code]
            .map(|value| value.to_string())
            .map_err(|e| e.kind())
    })
    .join()
    .expect("interpreter thread panicked")
}

#[test]
fn deep_recursion_on_a_small_stack() {
    assert_eq![
        on_spawned_thread(
            "(define (build n) (if (= n 0) '() (cons n (build (- n 1)))))
             (length (build 150))"
        ),
        Ok("150".into())
    ];
    assert_eq![
        on_spawned_thread(
            "(define (sum n) (if (= n 0) 0 (+ n (sum (- n 1)))))
             (sum 4000)"
        ),
        Ok("8002000".into())
    ];
}

#[test]
fn default_depth_limit_on_a_small_stack() {
    assert_eq![
        on_spawned_thread(
            "(define (sum n) (if (= n 0) 0 (+ n (sum (- n 1)))))
             (sum 100000)"
        ),
        Err(ErrorKind::StackOverflow)
    ];
}

//
// Tail calls
//
const ITERATIONS: &str = "100000";

#[test]
fn long_do_loop() {
    let code = format!("(do ((i 0 (+ i 1))) ((= i {0}) i))", ITERATIONS);
    assert_eq![with_std![&code], Ok(Value::Integer(100_000))];
}

#[test]
fn long_self_tail_recursion() {
    let code = format!(
        "(define (count n acc) (if (= n 0) acc (count (- n 1) (+ acc 1))))
         (count {0} 0)",
        ITERATIONS
    );
    assert_eq![with_std![&code], Ok(Value::Integer(100_000))];
}

#[test]
fn long_lambda_tail_recursion() {
    let code = format!(
        "(define count (lambda (n) (if (= n 0) 'done (count (- n 1)))))
         (count {0})",
        ITERATIONS
    );
    assert_eq![with_std![&code], Ok(sym("done"))];
}

#[test]
fn long_mutual_recursion() {
    let code = format!(
        "(define (even? n) (if (= n 0) #t (odd? (- n 1))))
         (define (odd? n) (if (= n 0) #f (even? (- n 1))))
         (even? {0})",
        ITERATIONS
    );
    assert_eq![with_std![&code], Ok(Value::Boolean(true))];
}

#[test]
fn long_named_let() {
    let code = format!("(let loop ((i 0)) (if (= i {0}) i (loop (+ i 1))))", ITERATIONS);
    assert_eq![with_std![&code], Ok(Value::Integer(100_000))];
}

#[test]
fn tail_calls_through_special_forms() {
    let code = format!(
        "(define (f n)
           (cond ((= n 0) 'done)
                 (else (let ((m (- n 1)))
                         (begin (and #t (or #f (f m))))))))
         (f {0})",
        ITERATIONS
    );
    assert_eq![with_std![&code], Ok(sym("done"))];
}

#[test]
fn tail_calls_through_arrow() {
    let code = format!(
        "(define (f n)
           (cond ((= n 0) 'done)
                 ((- n 1) => f)))
         (f {0})",
        ITERATIONS
    );
    assert_eq![with_std![&code], Ok(sym("done"))];
}

//
// Properties
//
proptest! {
    #[test]
    fn evaluation_is_deterministic(factor in -1000i64..1000, n in 0i64..200) {
        let code = format!(
            "(define (f x) (* x {}))
             (do ((i 0 (+ i 1)) (acc 0 (+ acc (f i)))) ((= i {}) acc))",
            factor, n
        );
        let first = with_std![&code];
        let second = with_std![&code];
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, Ok(Value::Integer(factor * n * (n - 1) / 2)));
    }

    #[test]
    fn integer_literals(n in (i64::min_value() + 1)..i64::max_value()) {
        prop_assert_eq!(with_null![&n.to_string()], Ok(Value::Integer(n)));
    }

    #[test]
    fn arithmetic_agrees_with_host(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let eval = |op: &str| with_std![&format!("({} {} {})", op, a, b)];
        prop_assert_eq!(eval("+"), Ok(Value::Integer(a + b)));
        prop_assert_eq!(eval("-"), Ok(Value::Integer(a - b)));
        prop_assert_eq!(eval("*"), Ok(Value::Integer(a * b)));
        prop_assert_eq!(eval("<"), Ok(Value::Boolean(a < b)));
        if b != 0 {
            prop_assert_eq!(eval("quotient"), Ok(Value::Integer(a / b)));
            prop_assert_eq!(eval("remainder"), Ok(Value::Integer(a % b)));
        }
    }

    #[test]
    fn do_loop_counts(n in 0i64..2000) {
        let code = format!(
            "(do ((i 0 (+ i 1)) (evens 0 (if (= (remainder i 2) 0) (+ evens 1) evens)))
                 ((= i {}) (list i evens)))",
            n
        );
        prop_assert_eq!(with_std![&code], Ok(ints(&[n, (n + 1) / 2])));
    }
}
