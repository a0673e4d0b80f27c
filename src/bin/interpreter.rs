use std::env::{args, var};
use std::fs;
use std::process;

use log::debug;
use rustyline::error::ReadlineError;
use rustyline::Editor;

use skm::interpreter::{Error, Interpreter};
use skm::reader::Parser;
use skm::vm::{default_env, CountingProfiler, Profiler, Value, Vm};

fn main() {
    env_logger::init();

    let file = args().nth(1);
    let with_profiler = var("PROFILE").map(|s| !s.is_empty()).unwrap_or(false);
    let max_depth = var("MAX_DEPTH").ok().and_then(|s| s.parse().ok());

    match file {
        Some(file) => run_file(&file, with_profiler, max_depth),
        None => run_repl(max_depth),
    }
}

fn run_file(file_path: &str, with_profiler: bool, max_depth: Option<usize>) {
    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Unable to read {}: {}", file_path, e);
            process::exit(1);
        }
    };
    let parser = Parser::with_name(&source, file_path);
    debug!("Running {}", file_path);

    let result = if with_profiler {
        let vm = Vm::with_profiler(default_env(), CountingProfiler::new());
        let mut interpreter = Interpreter::with_vm(vm);
        let result = run(&mut interpreter, parser, max_depth);
        if let Some(report) = interpreter.vm().profiler().report() {
            eprintln!("{}", report);
        }
        result
    } else {
        run(&mut Interpreter::new(), parser, max_depth)
    };

    if let Err(e) = result {
        println!("!> {}", e);
        process::exit(1);
    }
}

fn run<P: Profiler>(
    interpreter: &mut Interpreter<P>,
    parser: Parser,
    max_depth: Option<usize>,
) -> Result<(), Error> {
    if let Some(max_depth) = max_depth {
        interpreter.vm_mut().set_max_depth(max_depth);
    }
    interpreter.eval_all(parser).map(|_| ())
}

fn run_repl(max_depth: Option<usize>) {
    let mut rl = match Editor::<()>::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Unable to start the line editor: {}", e);
            process::exit(1);
        }
    };
    let mut interpreter = Interpreter::new();
    if let Some(max_depth) = max_depth {
        interpreter.vm_mut().set_max_depth(max_depth);
    }

    loop {
        let line = match rl.readline("-> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        };

        rl.add_history_entry(line.as_str());

        for datum in Parser::new(&line) {
            let result = datum
                .map_err(Error::from)
                .and_then(|datum| interpreter.eval_datum(&datum));

            println!("{}", show(&result));
            if result.is_err() {
                break;
            }
        }
    }
}

// Every result is echoed, including `()`
fn show(result: &Result<Value, Error>) -> String {
    match *result {
        Ok(ref value) => format!("=> {}", value),
        Err(ref e) => format!("!> {}", e),
    }
}
