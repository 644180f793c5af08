//! Frame-based scoping. Frames do not chain at lookup time: a sub-frame
//! is seeded with a copy of its parent's bindings when pushed, and only
//! names the parent already owned are written back when it pops.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::{Instance, Value};

#[derive(Debug, Clone)]
pub struct StackFrame {
  pub name: String,
  pub variables: HashMap<String, Value>,
  /// Set while evaluating inside a struct method; `@field` and `this`
  /// resolve against it.
  pub object_context: Option<Rc<RefCell<Instance>>>,
  pub in_try: bool,
  pub in_loop: bool,
  pub in_lambda: bool,
  /// Sub-frames write parent-owned names back on pop.
  pub sub_frame: bool,
}

impl StackFrame {
  fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      variables: HashMap::new(),
      object_context: None,
      in_try: false,
      in_loop: false,
      in_lambda: false,
      sub_frame: false,
    }
  }
}

#[derive(Debug)]
pub struct CallStack {
  frames: Vec<StackFrame>,
}

impl CallStack {
  pub fn new() -> Self {
    Self {
      frames: vec![StackFrame::new("main")],
    }
  }

  pub fn depth(&self) -> usize {
    self.frames.len()
  }

  pub fn current(&self) -> &StackFrame {
    self.frames.last().expect("call stack is never empty")
  }

  pub fn current_mut(&mut self) -> &mut StackFrame {
    self.frames.last_mut().expect("call stack is never empty")
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.current().variables.get(name)
  }

  pub fn set(&mut self, name: impl Into<String>, value: Value) {
    self.current_mut().variables.insert(name.into(), value);
  }

  /// Pushes a block scope seeded with every parent binding. Mutations of
  /// parent-owned names survive the pop; new names do not leak out.
  pub fn push_sub_frame(&mut self, name: &str, in_loop: bool) {
    let parent = self.current();
    let mut frame = StackFrame::new(name);
    frame.variables = parent.variables.clone();
    frame.object_context = parent.object_context.clone();
    frame.in_try = parent.in_try;
    frame.in_lambda = parent.in_lambda;
    frame.in_loop = in_loop || parent.in_loop;
    frame.sub_frame = true;
    self.frames.push(frame);
  }

  /// Pushes an empty frame for a function or method call. Callee code
  /// sees none of the caller's locals.
  pub fn push_call_frame(&mut self, name: &str, object_context: Option<Rc<RefCell<Instance>>>) {
    let in_try = self.current().in_try;
    let mut frame = StackFrame::new(name);
    frame.object_context = object_context;
    frame.in_try = in_try;
    self.frames.push(frame);
  }

  /// Pops a sub-frame, copying back values for names the parent owned
  /// before the push.
  pub fn pop_write_back(&mut self) {
    let child = self.frames.pop().expect("pop on empty call stack");
    let parent = self.current_mut();
    for (name, value) in child.variables {
      if parent.variables.contains_key(&name) {
        parent.variables.insert(name, value);
      }
    }
  }

  pub fn pop(&mut self) {
    self.frames.pop();
    debug_assert!(!self.frames.is_empty(), "root frame must not be popped");
  }
}

impl Default for CallStack {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sub_frame_writes_back_parent_names_only() {
    let mut stack = CallStack::new();
    stack.set("x", Value::Int(1));
    stack.push_sub_frame("loop", true);
    stack.set("x", Value::Int(2));
    stack.set("fresh", Value::Int(9));
    stack.pop_write_back();
    assert_eq!(stack.get("x"), Some(&Value::Int(2)));
    assert_eq!(stack.get("fresh"), None);
  }

  #[test]
  fn call_frame_hides_caller_locals() {
    let mut stack = CallStack::new();
    stack.set("x", Value::Int(1));
    stack.push_call_frame("f", None);
    assert_eq!(stack.get("x"), None);
    stack.pop();
    assert_eq!(stack.get("x"), Some(&Value::Int(1)));
  }

  #[test]
  fn in_try_inherited_by_call_frames() {
    let mut stack = CallStack::new();
    stack.current_mut().in_try = true;
    stack.push_call_frame("f", None);
    assert!(stack.current().in_try);
  }
}
