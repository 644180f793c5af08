use std::io::{self, Write};

use crate::config::Config;
use crate::evaluator::{Evaluator, Flow};
use crate::lexer::Lexer;
use crate::parser::{ParseMode, Parser};

pub fn start(config: Config) {
  println!("kelp repl");
  println!("Type 'exit' or 'quit' to leave\n");

  let mut evaluator = Evaluator::with_defaults(config);

  loop {
    print!("kelp> ");
    if io::stdout().flush().is_err() {
      break;
    }

    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
      Ok(0) => break,
      Ok(_) => {}
      Err(err) => {
        eprintln!("Read error: {err}");
        break;
      }
    }
    let input = input.trim();

    if input.is_empty() {
      continue;
    }
    if input == "exit" || input == "quit" {
      break;
    }
    if input == "help" {
      print_help();
      continue;
    }

    let stream = Lexer::new(input, 0).tokenize();
    let (program, errors) = Parser::new(stream, ParseMode::Recover).parse();
    if let Some(err) = errors.first() {
      eprintln!("{}", err.kind);
      continue;
    }

    match evaluator.eval_program(&program) {
      Ok(Flow::Exit(code)) => std::process::exit(code as i32),
      Ok(Flow::Normal(value)) => {
        if value != crate::evaluator::value::Value::Null {
          println!("{value}");
        }
      }
      Ok(_) => {}
      Err(err) => eprintln!("{}", err.kind),
    }
  }
}

fn print_help() {
  println!("Enter a kelp statement to evaluate it.");
  println!("Commands: help, exit, quit");
}
