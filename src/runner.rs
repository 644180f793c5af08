//! End-to-end pipeline: collect sources (stdlib preload + user script),
//! lex and parse every stream into one program, run it, and sink any
//! uncaught language error into the crash log.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::Config;
use crate::error::{HostError, LangError, LangResult};
use crate::evaluator::{Evaluator, Flow};
use crate::lexer::Lexer;
use crate::parser::ast::Program;
use crate::parser::{ParseMode, Parser};

/// A loaded source. Its position in the load order is its file id, which
/// is what token spans carry.
pub struct SourceFile {
  pub path: PathBuf,
  pub text: String,
}

pub struct Runner {
  config: Config,
}

impl Runner {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  /// Runs a script file. Returns the process exit code.
  pub fn run_file(&self, script: &Path) -> Result<i32, HostError> {
    self.check_extension(script)?;
    let sources = self.collect_sources(script)?;
    let (program, errors) = parse_all(&sources);

    if !errors.is_empty() {
      for err in &errors {
        self.report(&sources, err)?;
      }
      return Ok(1);
    }

    let mut evaluator = Evaluator::with_defaults(self.config.clone());
    match evaluator.eval_program(&program) {
      Ok(Flow::Exit(code)) => Ok(code as i32),
      Ok(_) => Ok(0),
      Err(err) => {
        self.report(&sources, &err)?;
        Ok(1)
      }
    }
  }

  /// Parses without running. Exit code 0 when every source is clean.
  pub fn check_file(&self, script: &Path) -> Result<i32, HostError> {
    self.check_extension(script)?;
    let sources = self.collect_sources(script)?;
    let (_, errors) = parse_all(&sources);
    if errors.is_empty() {
      return Ok(0);
    }
    for err in &errors {
      self.report(&sources, err)?;
    }
    Ok(1)
  }

  /// Lex, parse and run a bare source string with a fresh evaluator.
  pub fn run_source(&self, source: &str) -> LangResult<Flow> {
    let stream = Lexer::new(source, 0).tokenize();
    let (program, mut errors) = Parser::new(stream, ParseMode::Recover).parse();
    if let Some(err) = errors.drain(..).next() {
      return Err(err);
    }
    let mut evaluator = Evaluator::with_defaults(self.config.clone());
    evaluator.eval_program(&program)
  }

  fn check_extension(&self, script: &Path) -> Result<(), HostError> {
    let recognized = script
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| self.config.recognizes_extension(e))
      .unwrap_or(false);
    if recognized {
      Ok(())
    } else {
      Err(HostError::UnrecognizedExtension {
        path: script.display().to_string(),
      })
    }
  }

  /// Stdlib sources first (sorted, then reversed, so the lexically first
  /// path is parsed last and its declarations win), the script last.
  fn collect_sources(&self, script: &Path) -> Result<Vec<SourceFile>, HostError> {
    let mut paths = Vec::new();
    for entry in &self.config.stdlib_paths {
      if entry.is_dir() {
        let dir = fs::read_dir(entry).map_err(|source| HostError::ReadSource {
          path: entry.display().to_string(),
          source,
        })?;
        for child in dir {
          let child = child?.path();
          let recognized = child
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.config.recognizes_extension(e))
            .unwrap_or(false);
          if child.is_file() && recognized {
            paths.push(child);
          }
        }
      } else {
        paths.push(entry.clone());
      }
    }
    paths.sort();
    paths.reverse();
    paths.push(script.to_path_buf());

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
      let text = fs::read_to_string(&path).map_err(|source| HostError::ReadSource {
        path: path.display().to_string(),
        source,
      })?;
      sources.push(SourceFile { path, text });
    }
    Ok(sources)
  }

  /// One-line summary to stderr; full timestamped block appended to the
  /// crash log.
  fn report(&self, sources: &[SourceFile], err: &LangError) -> Result<(), HostError> {
    let span = err.token.span;
    let file = sources
      .get(span.file_id as usize)
      .map(|s| s.path.display().to_string())
      .unwrap_or_else(|| "<unknown>".to_string());

    eprintln!("{} at {}:{}:{}", err.kind, file, span.line, span.column);

    let block = format!(
      "---- {}\n{}: {}\n  token: '{}'\n  at {}:{}:{}\n",
      Utc::now().to_rfc3339(),
      err.kind.name(),
      err.kind.message(),
      err.token.text,
      file,
      span.line,
      span.column,
    );
    let mut log = fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.config.crash_log_path)
      .map_err(|source| HostError::CrashLog {
        path: self.config.crash_log_path.display().to_string(),
        source,
      })?;
    log
      .write_all(block.as_bytes())
      .map_err(|source| HostError::CrashLog {
        path: self.config.crash_log_path.display().to_string(),
        source,
      })?;
    Ok(())
  }
}

fn parse_all(sources: &[SourceFile]) -> (Program, Vec<LangError>) {
  let mut program = Program::default();
  let mut errors = Vec::new();
  for (file_id, source) in sources.iter().enumerate() {
    let stream = Lexer::new(&source.text, file_id as u32).tokenize();
    let (parsed, errs) = Parser::new(stream, ParseMode::Recover).parse();
    program.extend(parsed);
    errors.extend(errs);
  }
  (program, errors)
}
