use std::io::{stdin, stdout, Write};

use skm::compiler::Compiler;
use skm::reader::Parser;
use skm::vm::null_env;

fn main() {
    env_logger::init();

    let compiler = Compiler::new();
    let environment = null_env();
    let mut buffer = String::new();

    loop {
        buffer.clear();

        let prompt = stdout().write_all("> ".as_bytes()).and(stdout().flush());
        if prompt.is_err() {
            break;
        }

        match stdin().read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        for datum in Parser::new(&buffer) {
            let datum = match datum {
                Ok(datum) => datum,
                Err(e) => {
                    println!("Invalid datum: {}", e);
                    break;
                }
            };

            match compiler.compile(&datum, &environment) {
                Ok(procedure) => println!("{:#?}", procedure.body()),
                Err(e) => println!("Invalid expression: {}", e),
            }
        }
    }
}
