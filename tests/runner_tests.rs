use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn kelp(args: &[&str]) -> Output {
  Command::new(env!("CARGO_BIN_EXE_kelp"))
    .args(args)
    .output()
    .expect("failed to launch kelp")
}

fn write_script(dir: &Path, name: &str, source: &str) -> String {
  let path = dir.join(name);
  fs::write(&path, source).expect("failed to write script");
  path.display().to_string()
}

fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn runs_a_script_and_prints() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(dir.path(), "inc.kelp", "x = 1\nx = x + 1\nprintln(x)\n");
  let output = kelp(&[&script]);
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert_eq!(stdout(&output).trim(), "2");
}

#[test]
fn containers_print_in_literal_form() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(dir.path(), "rev.kelp", "l = [1, 2, 3]\nprintln(l.reverse())\n");
  let output = kelp(&[&script]);
  assert!(output.status.success());
  assert_eq!(stdout(&output).trim(), "[3, 2, 1]");
}

#[test]
fn exit_code_propagates() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(dir.path(), "bye.kelp", "exit(3)\n");
  let output = kelp(&[&script]);
  assert_eq!(output.status.code(), Some(3));
}

#[test]
fn caught_errors_keep_the_script_alive() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    dir.path(),
    "safe.kelp",
    "try\n  x = 1 / 0\ncatch (e)\n  println(e[\"type\"])\nend\n",
  );
  let output = kelp(&[&script]);
  assert!(output.status.success());
  assert_eq!(stdout(&output).trim(), "DivideByZeroError");
}

#[test]
fn uncaught_errors_land_in_the_crash_log() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(dir.path(), "boom.kelp", "x = 1 / 0\n");
  let log = dir.path().join("crash.log");
  let output = kelp(&[&script, "--crash-log", &log.display().to_string()]);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("DivideByZeroError"));

  let logged = fs::read_to_string(&log).expect("crash log missing");
  assert!(logged.contains("DivideByZeroError"));
  assert!(logged.contains("boom.kelp"));
}

#[test]
fn parse_errors_report_and_skip_execution() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    dir.path(),
    "broken.kelp",
    "x = = 1\nprintln(\"never runs\")\n",
  );
  let log = dir.path().join("crash.log");
  let output = kelp(&[&script, "--crash-log", &log.display().to_string()]);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("SyntaxError"));
  assert_eq!(stdout(&output), "");
}

#[test]
fn check_parses_without_running() {
  let dir = tempfile::tempdir().unwrap();
  let good = write_script(dir.path(), "good.kelp", "println(\"side effect\")\n");
  let output = kelp(&["check", &good]);
  assert!(output.status.success());
  assert_eq!(stdout(&output), "");

  let bad = write_script(dir.path(), "bad.kelp", "while true\n");
  let log = dir.path().join("crash.log");
  let output = kelp(&["check", &bad, "--crash-log", &log.display().to_string()]);
  assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unrecognized_extension_is_a_host_error() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(dir.path(), "script.txt", "println(1)\n");
  let output = kelp(&[&script]);
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("unrecognized"));
}

#[test]
fn preload_order_is_sorted_then_reversed() {
  let dir = tempfile::tempdir().unwrap();
  let lib = dir.path().join("lib");
  fs::create_dir(&lib).unwrap();
  // Both libraries define greet; sorted-then-reversed parse order means
  // a.kelp is parsed last and its definition wins.
  write_script(&lib, "a.kelp", "fn greet()\n  return \"from a\"\nend\n");
  write_script(&lib, "b.kelp", "fn greet()\n  return \"from b\"\nend\n");
  let script = write_script(dir.path(), "main.kelp", "println(greet())\n");

  let output = kelp(&[&script, "--stdlib", &lib.display().to_string()]);
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert_eq!(stdout(&output).trim(), "from a");
}

#[test]
fn stdlib_helpers_are_callable_from_the_script() {
  let dir = tempfile::tempdir().unwrap();
  let lib = dir.path().join("lib");
  fs::create_dir(&lib).unwrap();
  write_script(&lib, "math.kelp", "fn double(n)\n  return n * 2\nend\n");
  let script = write_script(dir.path(), "main.kelp", "println(double(21))\n");

  let output = kelp(&[&script, "--stdlib", &lib.display().to_string()]);
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert_eq!(stdout(&output).trim(), "42");
}

#[test]
fn interpolation_end_to_end() {
  let dir = tempfile::tempdir().unwrap();
  let script = write_script(
    dir.path(),
    "interp.kelp",
    "name = \"kelp\"\nprintln(\"hello ${name} ${1 + 1}\")\n",
  );
  let output = kelp(&[&script]);
  assert!(output.status.success());
  assert_eq!(stdout(&output).trim(), "hello kelp 2");
}
