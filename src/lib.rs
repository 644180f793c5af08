pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runner;

pub use config::Config;
pub use error::{ErrorKind, HostError, LangError};
pub use evaluator::{Evaluator, Flow};
pub use evaluator::value::Value;
pub use lexer::Lexer;
pub use parser::{ParseMode, Parser};
pub use runner::Runner;
