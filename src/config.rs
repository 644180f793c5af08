use std::path::PathBuf;

/// Interpreter settings, threaded explicitly through constructors.
#[derive(Debug, Clone)]
pub struct Config {
  /// Maximum evaluator recursion depth before StackExhaustedError.
  pub recursion_limit: usize,
  /// Extensions (without the dot) recognized as kelp sources.
  pub script_extensions: Vec<String>,
  /// Files or directories preloaded ahead of the user script.
  pub stdlib_paths: Vec<PathBuf>,
  /// Where uncaught language errors are appended.
  pub crash_log_path: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      recursion_limit: 800,
      script_extensions: vec!["kelp".to_string()],
      stdlib_paths: Vec::new(),
      crash_log_path: PathBuf::from("kelp-crash.log"),
    }
  }
}

impl Config {
  pub fn recognizes_extension(&self, ext: &str) -> bool {
    self.script_extensions.iter().any(|e| e == ext)
  }
}
