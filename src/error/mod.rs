//! Two-tier error system: catchable language errors and fatal host errors.

use crate::lexer::token::Token;
use thiserror::Error;

/// Closed taxonomy of script-level errors. Every variant is catchable by
/// a script `catch` block; anything outside this enum is a host error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
  #[error("TypeError: {0}")]
  Type(String),

  #[error("IndexError: {0}")]
  Index(String),

  #[error("RangeError: {0}")]
  Range(String),

  #[error("ConversionError: {0}")]
  Conversion(String),

  #[error("FunctionUndefinedError: {0}")]
  FunctionUndefined(String),

  #[error("ParameterCountMismatchError: {0}")]
  ParameterCountMismatch(String),

  #[error("ParameterTypeMismatchError: {0}")]
  ParameterTypeMismatch(String),

  #[error("VariableUndefinedError: {0}")]
  VariableUndefined(String),

  #[error("StructUndefinedError: {0}")]
  StructUndefined(String),

  #[error("FileSystemError: {0}")]
  FileSystem(String),

  #[error("FileReadError: {0}")]
  FileRead(String),

  #[error("InvalidOperationError: {0}")]
  InvalidOperation(String),

  #[error("SyntaxError: {0}")]
  Syntax(String),

  #[error("DivideByZeroError: {0}")]
  DivideByZero(String),

  #[error("HashKeyError: {0}")]
  HashKey(String),

  #[error("IllegalNameError: {0}")]
  IllegalName(String),

  #[error("UnimplementedMethodError: {0}")]
  UnimplementedMethod(String),

  #[error("EventError: {0}")]
  Event(String),

  #[error("RegexError: {0}")]
  Regex(String),

  #[error("InvalidContextError: {0}")]
  InvalidContext(String),

  #[error("NullObjectError: {0}")]
  NullObject(String),

  #[error("StackExhaustedError: {0}")]
  StackExhausted(String),
}

impl ErrorKind {
  /// The error type name a script sees in a catch binding.
  pub fn name(&self) -> &'static str {
    match self {
      ErrorKind::Type(_) => "TypeError",
      ErrorKind::Index(_) => "IndexError",
      ErrorKind::Range(_) => "RangeError",
      ErrorKind::Conversion(_) => "ConversionError",
      ErrorKind::FunctionUndefined(_) => "FunctionUndefinedError",
      ErrorKind::ParameterCountMismatch(_) => "ParameterCountMismatchError",
      ErrorKind::ParameterTypeMismatch(_) => "ParameterTypeMismatchError",
      ErrorKind::VariableUndefined(_) => "VariableUndefinedError",
      ErrorKind::StructUndefined(_) => "StructUndefinedError",
      ErrorKind::FileSystem(_) => "FileSystemError",
      ErrorKind::FileRead(_) => "FileReadError",
      ErrorKind::InvalidOperation(_) => "InvalidOperationError",
      ErrorKind::Syntax(_) => "SyntaxError",
      ErrorKind::DivideByZero(_) => "DivideByZeroError",
      ErrorKind::HashKey(_) => "HashKeyError",
      ErrorKind::IllegalName(_) => "IllegalNameError",
      ErrorKind::UnimplementedMethod(_) => "UnimplementedMethodError",
      ErrorKind::Event(_) => "EventError",
      ErrorKind::Regex(_) => "RegexError",
      ErrorKind::InvalidContext(_) => "InvalidContextError",
      ErrorKind::NullObject(_) => "NullObjectError",
      ErrorKind::StackExhausted(_) => "StackExhaustedError",
    }
  }

  /// The message without the type-name prefix.
  pub fn message(&self) -> &str {
    match self {
      ErrorKind::Type(m)
      | ErrorKind::Index(m)
      | ErrorKind::Range(m)
      | ErrorKind::Conversion(m)
      | ErrorKind::FunctionUndefined(m)
      | ErrorKind::ParameterCountMismatch(m)
      | ErrorKind::ParameterTypeMismatch(m)
      | ErrorKind::VariableUndefined(m)
      | ErrorKind::StructUndefined(m)
      | ErrorKind::FileSystem(m)
      | ErrorKind::FileRead(m)
      | ErrorKind::InvalidOperation(m)
      | ErrorKind::Syntax(m)
      | ErrorKind::DivideByZero(m)
      | ErrorKind::HashKey(m)
      | ErrorKind::IllegalName(m)
      | ErrorKind::UnimplementedMethod(m)
      | ErrorKind::Event(m)
      | ErrorKind::Regex(m)
      | ErrorKind::InvalidContext(m)
      | ErrorKind::NullObject(m)
      | ErrorKind::StackExhausted(m) => m,
    }
  }
}

/// A language error with the token it was raised at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {}:{}", token.span.line, token.span.column)]
pub struct LangError {
  pub kind: ErrorKind,
  pub token: Token,
}

impl LangError {
  pub fn new(kind: ErrorKind, token: &Token) -> Self {
    Self {
      kind,
      token: token.clone(),
    }
  }

  pub fn type_error(token: &Token, message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Type(message.into()), token)
  }

  pub fn syntax(token: &Token, message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Syntax(message.into()), token)
  }

  pub fn conversion(token: &Token, message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Conversion(message.into()), token)
  }

  pub fn index(token: &Token, message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Index(message.into()), token)
  }

  pub fn invalid_operation(token: &Token, message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidOperation(message.into()), token)
  }
}

pub type LangResult<T> = Result<T, LangError>;

/// Unexpected host-side failures. Always fatal; never visible to scripts.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("failed to read {path}")]
  ReadSource {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to append to crash log {path}")]
  CrashLog {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("unrecognized script extension for {path}")]
  UnrecognizedExtension { path: String },

  #[error("io error")]
  Io(#[from] std::io::Error),
}
