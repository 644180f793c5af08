//! Tree-walking interpreter. Statement evaluation returns an explicit
//! [`Flow`] so break/next/return/exit travel as values, never as shared
//! mutable flags; script-visible failures travel as `Err(LangError)`.

pub mod builtins;
pub mod frame;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::{ErrorKind, LangError, LangResult};
use crate::lexer::token::Token;
use crate::parser::ast::{
  BinaryOp, Expr, ExprKind, FunctionDecl, Program, Stmt, StmtKind, UnaryOp,
};

use builtins::{BuiltinDispatch, CoreBuiltins};
use frame::CallStack;
use value::{Callable, Instance, StructDef, Value};

/// Ranges materialize eagerly; anything bigger than this raises
/// RangeError instead of exhausting memory.
const MAX_RANGE_SIZE: i64 = 10_000_000;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
  Normal(Value),
  Break,
  Next,
  Return(Value),
  Exit(i64),
}

/// Seam for `spawn`. This crate ships no task runtime; hosts that have
/// one implement this.
pub trait Scheduler {
  fn spawn(&mut self, token: &Token, target: Value, args: Vec<Value>) -> LangResult<Value>;
}

/// Accepts every spawn and does nothing.
pub struct NullScheduler;

impl Scheduler for NullScheduler {
  fn spawn(&mut self, _token: &Token, _target: Value, _args: Vec<Value>) -> LangResult<Value> {
    Ok(Value::Null)
  }
}

pub struct Evaluator {
  config: Config,
  stack: CallStack,
  functions: HashMap<String, Rc<FunctionDecl>>,
  structs: HashMap<String, Rc<StructDef>>,
  constants: HashMap<String, Value>,
  dispatch: Box<dyn BuiltinDispatch>,
  scheduler: Box<dyn Scheduler>,
  depth: usize,
}

impl Evaluator {
  pub fn new(
    config: Config,
    dispatch: Box<dyn BuiltinDispatch>,
    scheduler: Box<dyn Scheduler>,
  ) -> Self {
    Self {
      config,
      stack: CallStack::new(),
      functions: HashMap::new(),
      structs: HashMap::new(),
      constants: HashMap::new(),
      dispatch,
      scheduler,
      depth: 0,
    }
  }

  pub fn with_defaults(config: Config) -> Self {
    Self::new(config, Box::new(CoreBuiltins), Box::new(NullScheduler))
  }

  /// Runs a program: declarations are registered up front (so call sites
  /// may precede definitions), then statements execute in order. Later
  /// declarations of the same name override earlier ones.
  pub fn eval_program(&mut self, program: &Program) -> LangResult<Flow> {
    for stmt in &program.statements {
      match &stmt.kind {
        StmtKind::Function(decl) => self.register_function(decl),
        StmtKind::Struct { name, methods } => self.register_struct(name, methods),
        _ => {}
      }
    }

    let mut last = Value::Null;
    for stmt in &program.statements {
      if matches!(stmt.kind, StmtKind::Function(_) | StmtKind::Struct { .. }) {
        continue;
      }
      match self.eval_stmt(stmt)? {
        Flow::Normal(v) => last = v,
        Flow::Exit(code) => return Ok(Flow::Exit(code)),
        // Top-level `return` just ends the script.
        Flow::Return(v) => return Ok(Flow::Normal(v)),
        Flow::Break | Flow::Next => unreachable!("loop flow escaped its loop"),
      }
    }
    Ok(Flow::Normal(last))
  }

  fn register_function(&mut self, decl: &FunctionDecl) {
    self.functions.insert(decl.name.clone(), Rc::new(decl.clone()));
  }

  fn register_struct(&mut self, name: &str, methods: &[FunctionDecl]) {
    let methods = methods
      .iter()
      .map(|m| (m.name.clone(), Rc::new(m.clone())))
      .collect();
    self.structs.insert(
      name.to_string(),
      Rc::new(StructDef {
        name: name.to_string(),
        methods,
      }),
    );
  }

  /// Runs statements until a non-normal flow; yields the last value.
  fn run_block(&mut self, body: &[Stmt]) -> LangResult<Flow> {
    let mut last = Value::Null;
    for stmt in body {
      match self.eval_stmt(stmt)? {
        Flow::Normal(v) => last = v,
        other => return Ok(other),
      }
    }
    Ok(Flow::Normal(last))
  }

  // ---- statements ----

  fn eval_stmt(&mut self, stmt: &Stmt) -> LangResult<Flow> {
    match &stmt.kind {
      StmtKind::Expr(expr) => Ok(Flow::Normal(self.eval_expr(expr)?)),
      StmtKind::Function(decl) => {
        self.register_function(decl);
        Ok(Flow::Normal(Value::Null))
      }
      StmtKind::Struct { name, methods } => {
        self.register_struct(name, methods);
        Ok(Flow::Normal(Value::Null))
      }
      StmtKind::Const { name, value } => self.eval_const(&stmt.token, name, value),
      StmtKind::If { branches, else_body } => self.eval_if(branches, else_body.as_deref()),
      StmtKind::While { condition, body } => self.eval_while(condition, body),
      StmtKind::For {
        var,
        index_var,
        iterable,
        body,
      } => self.eval_for(var, index_var.as_deref(), iterable, body),
      StmtKind::Case {
        subject,
        whens,
        else_body,
      } => self.eval_case(subject, whens, else_body.as_deref()),
      StmtKind::Try {
        body,
        catch_var,
        catch_body,
      } => self.eval_try(body, catch_var.as_deref(), catch_body),
      StmtKind::Return(expr) => {
        let value = match expr {
          Some(e) => self.eval_expr(e)?,
          None => Value::Null,
        };
        Ok(Flow::Return(value))
      }
      StmtKind::Break => {
        if self.stack.current().in_loop {
          Ok(Flow::Break)
        } else {
          Err(LangError::new(
            ErrorKind::InvalidContext("break outside a loop".into()),
            &stmt.token,
          ))
        }
      }
      StmtKind::Next => {
        if self.stack.current().in_loop {
          Ok(Flow::Next)
        } else {
          Err(LangError::new(
            ErrorKind::InvalidContext("next outside a loop".into()),
            &stmt.token,
          ))
        }
      }
      StmtKind::Exit(expr) => {
        let code = match expr {
          Some(e) => self.eval_expr(e)?.expect_int(&stmt.token)?,
          None => 0,
        };
        Ok(Flow::Exit(code))
      }
      StmtKind::Spawn(call) => self.eval_spawn(&stmt.token, call),
    }
  }

  fn eval_const(&mut self, token: &Token, name: &str, value: &Expr) -> LangResult<Flow> {
    if name.chars().any(|c| c.is_ascii_lowercase()) {
      return Err(LangError::new(
        ErrorKind::IllegalName(format!("constant '{name}' must be uppercase")),
        token,
      ));
    }
    let value = self.eval_expr(value)?;
    self.constants.insert(name.to_string(), value);
    Ok(Flow::Normal(Value::Null))
  }

  /// `if`/`elsif`/`else` run in the current frame; only loops scope.
  fn eval_if(
    &mut self,
    branches: &[(Expr, Vec<Stmt>)],
    else_body: Option<&[Stmt]>,
  ) -> LangResult<Flow> {
    for (condition, body) in branches {
      if self.eval_expr(condition)?.is_truthy() {
        return self.run_block(body);
      }
    }
    match else_body {
      Some(body) => self.run_block(body),
      None => Ok(Flow::Normal(Value::Null)),
    }
  }

  fn eval_while(&mut self, condition: &Expr, body: &[Stmt]) -> LangResult<Flow> {
    loop {
      if !self.eval_expr(condition)?.is_truthy() {
        return Ok(Flow::Normal(Value::Null));
      }
      self.stack.push_sub_frame("while", true);
      let flow = self.run_block(body);
      self.stack.pop_write_back();
      match flow? {
        Flow::Normal(_) | Flow::Next => {}
        Flow::Break => return Ok(Flow::Normal(Value::Null)),
        other => return Ok(other),
      }
    }
  }

  fn eval_for(
    &mut self,
    var: &str,
    index_var: Option<&str>,
    iterable: &Expr,
    body: &[Stmt],
  ) -> LangResult<Flow> {
    let source = self.eval_expr(iterable)?;
    // Snapshot the elements so body mutations cannot invalidate the walk.
    let items: Vec<Value> = match &source {
      Value::List(list) => list.borrow().clone(),
      Value::Hashmap(map) => map.borrow().keys().cloned().collect(),
      Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
      other => {
        return Err(LangError::type_error(
          &iterable.token,
          format!("cannot iterate over {}", other.type_name()),
        ))
      }
    };

    for (i, item) in items.into_iter().enumerate() {
      self.stack.push_sub_frame("for", true);
      self.stack.set(var, item);
      if let Some(index_var) = index_var {
        self.stack.set(index_var, Value::Int(i as i64));
      }
      let flow = self.run_block(body);
      self.stack.pop_write_back();
      match flow? {
        Flow::Normal(_) | Flow::Next => {}
        Flow::Break => return Ok(Flow::Normal(Value::Null)),
        other => return Ok(other),
      }
    }
    Ok(Flow::Normal(Value::Null))
  }

  /// First matching `when` wins; no fallthrough.
  fn eval_case(
    &mut self,
    subject: &Expr,
    whens: &[(Vec<Expr>, Vec<Stmt>)],
    else_body: Option<&[Stmt]>,
  ) -> LangResult<Flow> {
    let subject = self.eval_expr(subject)?;
    for (candidates, body) in whens {
      for candidate in candidates {
        if self.eval_expr(candidate)? == subject {
          return self.run_block(body);
        }
      }
    }
    match else_body {
      Some(body) => self.run_block(body),
      None => Ok(Flow::Normal(Value::Null)),
    }
  }

  fn eval_try(
    &mut self,
    body: &[Stmt],
    catch_var: Option<&str>,
    catch_body: &[Stmt],
  ) -> LangResult<Flow> {
    let was_in_try = self.stack.current().in_try;
    self.stack.current_mut().in_try = true;
    let flow = self.run_block(body);
    self.stack.current_mut().in_try = was_in_try;

    match flow {
      Ok(flow) => Ok(flow),
      Err(err) => {
        if let Some(catch_var) = catch_var {
          let mut fields = IndexMap::new();
          fields.insert(
            Value::String("type".to_string()),
            Value::String(err.kind.name().to_string()),
          );
          fields.insert(
            Value::String("message".to_string()),
            Value::String(err.kind.message().to_string()),
          );
          self.stack.set(catch_var, Value::hashmap(fields));
        }
        self.run_block(catch_body)
      }
    }
  }

  fn eval_spawn(&mut self, token: &Token, call: &Expr) -> LangResult<Flow> {
    let ExprKind::Call { name, args } = &call.kind else {
      return Err(LangError::invalid_operation(
        token,
        "spawn requires a function call",
      ));
    };
    let target = self.lookup_callable(&call.token, name)?;
    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
      evaluated.push(self.eval_expr(arg)?);
    }
    let result = self.scheduler.spawn(token, target, evaluated)?;
    Ok(Flow::Normal(result))
  }

  // ---- expressions ----

  fn eval_expr(&mut self, expr: &Expr) -> LangResult<Value> {
    if self.depth >= self.config.recursion_limit {
      return Err(LangError::new(
        ErrorKind::StackExhausted(format!(
          "recursion limit {} exceeded",
          self.config.recursion_limit
        )),
        &expr.token,
      ));
    }
    self.depth += 1;
    let result = self.eval_expr_inner(expr);
    self.depth -= 1;
    result
  }

  fn eval_expr_inner(&mut self, expr: &Expr) -> LangResult<Value> {
    let token = &expr.token;
    match &expr.kind {
      ExprKind::Int(n) => Ok(Value::Int(*n)),
      ExprKind::Float(f) => Ok(Value::Float(*f)),
      ExprKind::Bool(b) => Ok(Value::Bool(*b)),
      ExprKind::Str(s) => Ok(Value::String(s.clone())),
      ExprKind::Null => Ok(Value::Null),

      ExprKind::Identifier(name) => Ok(self.resolve_identifier(name)),
      ExprKind::InstanceVar(name) => {
        let object = self.require_object_context(token)?;
        let value = object.borrow().fields.get(name).cloned();
        Ok(value.unwrap_or(Value::Null))
      }
      ExprKind::This => {
        let object = self.require_object_context(token)?;
        Ok(Value::Object(object))
      }

      ExprKind::List(items) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.push(self.eval_expr(item)?);
        }
        Ok(Value::list(out))
      }
      ExprKind::Hashmap(pairs) => {
        let mut map = IndexMap::with_capacity(pairs.len());
        for (key_expr, value_expr) in pairs {
          let key = self.eval_expr(key_expr)?;
          if !key.is_hashable_key() {
            return Err(LangError::new(
              ErrorKind::HashKey(format!("{} cannot be a hashmap key", key.type_name())),
              &key_expr.token,
            ));
          }
          let value = self.eval_expr(value_expr)?;
          map.insert(key, value);
        }
        Ok(Value::hashmap(map))
      }
      ExprKind::Range { start, end } => {
        let start = self.eval_expr(start)?.expect_int(token)?;
        let end = self.eval_expr(end)?.expect_int(token)?;
        if end.saturating_sub(start) > MAX_RANGE_SIZE {
          return Err(LangError::new(
            ErrorKind::Range(format!("range {start}..{end} is too large")),
            token,
          ));
        }
        let items: Vec<Value> = (start..=end).map(Value::Int).collect();
        Ok(Value::list(items))
      }

      ExprKind::Binary { op, left, right } => self.eval_binary(token, *op, left, right),
      ExprKind::Unary { op, operand } => {
        let value = self.eval_expr(operand)?;
        eval_unary(token, *op, value)
      }
      ExprKind::Ternary {
        condition,
        then_branch,
        else_branch,
      } => {
        if self.eval_expr(condition)?.is_truthy() {
          self.eval_expr(then_branch)
        } else {
          self.eval_expr(else_branch)
        }
      }

      ExprKind::Assign { target, value } => {
        let value = self.eval_expr(value)?;
        self.assign(target, value.clone())?;
        Ok(value)
      }
      ExprKind::CompoundAssign { target, op, value } => {
        let current = self.eval_expr(target)?;
        let rhs = self.eval_expr(value)?;
        let updated = binary_op(token, *op, current, rhs)?;
        self.assign(target, updated.clone())?;
        Ok(updated)
      }

      ExprKind::Index { target, index } => {
        let target = self.eval_expr(target)?;
        let index = self.eval_expr(index)?;
        read_index(token, &target, &index)
      }
      ExprKind::Slice { target, start, end } => {
        let target = self.eval_expr(target)?;
        let start = match start {
          Some(e) => Some(self.eval_expr(e)?.expect_int(token)?),
          None => None,
        };
        let end = match end {
          Some(e) => Some(self.eval_expr(e)?.expect_int(token)?),
          None => None,
        };
        read_slice(token, &target, start, end)
      }
      ExprKind::Member { target, name } => {
        let target = self.eval_expr(target)?;
        match &target {
          Value::Object(obj) => {
            Ok(obj.borrow().fields.get(name).cloned().unwrap_or(Value::Null))
          }
          Value::Null => Err(LangError::new(
            ErrorKind::NullObject(format!("member '{name}' on null")),
            token,
          )),
          other => Err(LangError::type_error(
            token,
            format!("{} has no member '{name}'", other.type_name()),
          )),
        }
      }

      ExprKind::Call { name, args } => {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
          evaluated.push(self.eval_expr(arg)?);
        }
        self.call_named(token, name, evaluated)
      }
      ExprKind::MethodCall {
        receiver,
        name,
        args,
      } => {
        let receiver = self.eval_expr(receiver)?;
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
          evaluated.push(self.eval_expr(arg)?);
        }
        self.call_method(token, receiver, name, evaluated)
      }
      ExprKind::BuiltinCall { id, receiver, args } => {
        let receiver = match receiver {
          Some(r) => Some(self.eval_expr(r)?),
          None => None,
        };
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
          evaluated.push(self.eval_expr(arg)?);
        }
        self.dispatch.call(token, *id, receiver, evaluated)
      }

      ExprKind::Lambda(decl) => {
        let captured = self.stack.current().variables.clone();
        Ok(Value::Lambda(Rc::new(Callable {
          decl: decl.clone(),
          captured,
        })))
      }
    }
  }

  /// Read resolution order: object field, local, struct name, function
  /// name, constant, then null.
  fn resolve_identifier(&self, name: &str) -> Value {
    if let Some(object) = &self.stack.current().object_context {
      if let Some(value) = object.borrow().fields.get(name) {
        return value.clone();
      }
    }
    if let Some(value) = self.stack.get(name) {
      return value.clone();
    }
    if let Some(def) = self.structs.get(name) {
      return Value::Struct(def.clone());
    }
    if let Some(decl) = self.functions.get(name) {
      return Value::Lambda(Rc::new(Callable {
        decl: (**decl).clone(),
        captured: HashMap::new(),
      }));
    }
    if let Some(value) = self.constants.get(name) {
      return value.clone();
    }
    Value::Null
  }

  fn require_object_context(&self, token: &Token) -> LangResult<Rc<RefCell<Instance>>> {
    self.stack.current().object_context.clone().ok_or_else(|| {
      LangError::new(
        ErrorKind::InvalidContext("no object context here".into()),
        token,
      )
    })
  }

  fn assign(&mut self, target: &Expr, value: Value) -> LangResult<()> {
    let token = &target.token;
    match &target.kind {
      ExprKind::Identifier(name) => {
        if self.constants.contains_key(name) {
          return Err(LangError::new(
            ErrorKind::IllegalName(format!("cannot assign to constant '{name}'")),
            token,
          ));
        }
        self.stack.set(name.clone(), value);
        Ok(())
      }
      ExprKind::InstanceVar(name) => {
        let object = self.require_object_context(token)?;
        object.borrow_mut().fields.insert(name.clone(), value);
        Ok(())
      }
      ExprKind::Index { target, index } => {
        let container = self.eval_expr(target)?;
        let index = self.eval_expr(index)?;
        write_index(token, &container, index, value)
      }
      ExprKind::Member { target, name } => {
        let object = self.eval_expr(target)?;
        match object {
          Value::Object(obj) => {
            obj.borrow_mut().fields.insert(name.clone(), value);
            Ok(())
          }
          Value::Null => Err(LangError::new(
            ErrorKind::NullObject(format!("member '{name}' on null")),
            token,
          )),
          other => Err(LangError::type_error(
            token,
            format!("{} has no member '{name}'", other.type_name()),
          )),
        }
      }
      _ => Err(LangError::syntax(token, "invalid assignment target")),
    }
  }

  // ---- calls ----

  /// Resolves a bare call: local lambda binding, sibling method of the
  /// active object context, declared function, constant lambda.
  fn call_named(&mut self, token: &Token, name: &str, args: Vec<Value>) -> LangResult<Value> {
    if let Some(Value::Lambda(callable)) = self.stack.get(name).cloned() {
      return self.invoke(token, &callable.decl, Some(&callable.captured), None, args);
    }
    if let Some(object) = self.stack.current().object_context.clone() {
      let struct_name = object.borrow().struct_name.clone();
      if let Some(method) = self
        .structs
        .get(&struct_name)
        .and_then(|def| def.methods.get(name).cloned())
      {
        return self.invoke(token, &method, None, Some(object), args);
      }
    }
    if let Some(decl) = self.functions.get(name).cloned() {
      return self.invoke(token, &decl, None, None, args);
    }
    if let Some(Value::Lambda(callable)) = self.constants.get(name).cloned() {
      return self.invoke(token, &callable.decl, Some(&callable.captured), None, args);
    }
    Err(LangError::new(
      ErrorKind::FunctionUndefined(format!("'{name}' is not defined")),
      token,
    ))
  }

  fn call_method(
    &mut self,
    token: &Token,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
  ) -> LangResult<Value> {
    match receiver {
      Value::Struct(def) if name == "new" => self.construct(token, &def, args),
      Value::Object(object) => {
        let struct_name = object.borrow().struct_name.clone();
        let method = self
          .structs
          .get(&struct_name)
          .and_then(|def| def.methods.get(name).cloned())
          .ok_or_else(|| {
            LangError::new(
              ErrorKind::UnimplementedMethod(format!("{struct_name} has no method '{name}'")),
              token,
            )
          })?;
        self.invoke(token, &method, None, Some(object), args)
      }
      Value::Null => Err(LangError::new(
        ErrorKind::NullObject(format!("method '{name}' on null")),
        token,
      )),
      other => Err(LangError::new(
        ErrorKind::UnimplementedMethod(format!(
          "{} has no method '{name}'",
          other.type_name()
        )),
        token,
      )),
    }
  }

  /// `Type.new(args)`: makes an empty instance, then runs the struct's
  /// `new` method (if any) with the instance as object context.
  fn construct(&mut self, token: &Token, def: &Rc<StructDef>, args: Vec<Value>) -> LangResult<Value> {
    let instance = Rc::new(RefCell::new(Instance {
      struct_name: def.name.clone(),
      fields: IndexMap::new(),
    }));
    match def.methods.get("new").cloned() {
      Some(ctor) => {
        self.invoke(token, &ctor, None, Some(instance.clone()), args)?;
      }
      None if args.is_empty() => {}
      None => {
        return Err(LangError::new(
          ErrorKind::ParameterCountMismatch(format!(
            "{} has no constructor but got {} argument(s)",
            def.name,
            args.len()
          )),
          token,
        ))
      }
    }
    Ok(Value::Object(instance))
  }

  /// Shared call path for functions, methods and lambdas. Binds
  /// parameters left to right (defaults evaluate inside the new frame),
  /// runs the body, and yields the returned or last value.
  fn invoke(
    &mut self,
    token: &Token,
    decl: &FunctionDecl,
    captured: Option<&HashMap<String, Value>>,
    object: Option<Rc<RefCell<Instance>>>,
    args: Vec<Value>,
  ) -> LangResult<Value> {
    let required = decl.params.iter().filter(|p| p.default.is_none()).count();
    if args.len() < required || args.len() > decl.params.len() {
      return Err(LangError::new(
        ErrorKind::ParameterCountMismatch(format!(
          "'{}' takes {}..={} argument(s), got {}",
          decl.name,
          required,
          decl.params.len(),
          args.len()
        )),
        token,
      ));
    }

    let object = object.or_else(|| self.stack.current().object_context.clone());
    self.stack.push_call_frame(&decl.name, object);
    if let Some(captured) = captured {
      self.stack.current_mut().in_lambda = true;
      for (name, value) in captured {
        self.stack.set(name.clone(), value.clone());
      }
    }

    let result = self.bind_params_and_run(token, decl, args);
    self.stack.pop();

    match result? {
      Flow::Normal(v) | Flow::Return(v) => Ok(v),
      Flow::Exit(code) => std::process::exit(code as i32),
      Flow::Break | Flow::Next => Err(LangError::new(
        ErrorKind::InvalidContext("loop flow escaped a call".into()),
        token,
      )),
    }
  }

  fn bind_params_and_run(
    &mut self,
    token: &Token,
    decl: &FunctionDecl,
    args: Vec<Value>,
  ) -> LangResult<Flow> {
    let mut args = args.into_iter();
    for param in &decl.params {
      let value = match args.next() {
        Some(v) => v,
        None => match &param.default {
          Some(default) => self.eval_expr(default)?,
          None => Value::Null,
        },
      };
      if let Some(hint) = &param.type_hint {
        if !value.matches_type_hint(hint) {
          return Err(LangError::new(
            ErrorKind::ParameterTypeMismatch(format!(
              "parameter '{}' expects {hint}, got {}",
              param.name,
              value.type_name()
            )),
            token,
          ));
        }
      }
      self.stack.set(param.name.clone(), value);
    }
    self.run_block(&decl.body)
  }

  fn lookup_callable(&mut self, token: &Token, name: &str) -> LangResult<Value> {
    match self.resolve_identifier(name) {
      Value::Lambda(c) => Ok(Value::Lambda(c)),
      Value::Null => Err(LangError::new(
        ErrorKind::FunctionUndefined(format!("'{name}' is not defined")),
        token,
      )),
      other => Err(LangError::type_error(
        token,
        format!("cannot spawn {}", other.type_name()),
      )),
    }
  }

  fn eval_binary(
    &mut self,
    token: &Token,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
  ) -> LangResult<Value> {
    // Logical operators short-circuit.
    match op {
      BinaryOp::And => {
        let left = self.eval_expr(left)?;
        if !left.is_truthy() {
          return Ok(Value::Bool(false));
        }
        let right = self.eval_expr(right)?;
        return Ok(Value::Bool(right.is_truthy()));
      }
      BinaryOp::Or => {
        let left = self.eval_expr(left)?;
        if left.is_truthy() {
          return Ok(Value::Bool(true));
        }
        let right = self.eval_expr(right)?;
        return Ok(Value::Bool(right.is_truthy()));
      }
      _ => {}
    }
    let left = self.eval_expr(left)?;
    let right = self.eval_expr(right)?;
    binary_op(token, op, left, right)
  }
}

// ---- operator semantics ----

fn overflow(token: &Token) -> LangError {
  LangError::new(ErrorKind::Range("integer overflow".into()), token)
}

fn numeric_type_error(token: &Token, op: &str, l: &Value, r: &Value) -> LangError {
  LangError::type_error(
    token,
    format!("cannot {op} {} and {}", l.type_name(), r.type_name()),
  )
}

fn binary_op(token: &Token, op: BinaryOp, left: Value, right: Value) -> LangResult<Value> {
  match op {
    BinaryOp::Add => match (&left, &right) {
      // A string on either side concatenates display forms.
      (Value::String(_), _) | (_, Value::String(_)) => {
        Ok(Value::String(format!("{left}{right}")))
      }
      (Value::Int(a), Value::Int(b)) => {
        a.checked_add(*b).map(Value::Int).ok_or_else(|| overflow(token))
      }
      _ => numeric_pair(token, "add", &left, &right).map(|(a, b)| Value::Float(a + b)),
    },
    BinaryOp::Sub => match (&left, &right) {
      (Value::Int(a), Value::Int(b)) => {
        a.checked_sub(*b).map(Value::Int).ok_or_else(|| overflow(token))
      }
      _ => numeric_pair(token, "subtract", &left, &right).map(|(a, b)| Value::Float(a - b)),
    },
    BinaryOp::Mul => match (&left, &right) {
      (Value::Int(a), Value::Int(b)) => {
        a.checked_mul(*b).map(Value::Int).ok_or_else(|| overflow(token))
      }
      _ => numeric_pair(token, "multiply", &left, &right).map(|(a, b)| Value::Float(a * b)),
    },
    BinaryOp::Div => match (&left, &right) {
      (Value::Int(a), Value::Int(b)) => {
        if *b == 0 {
          Err(LangError::new(
            ErrorKind::DivideByZero("division by zero".into()),
            token,
          ))
        } else {
          a.checked_div(*b).map(Value::Int).ok_or_else(|| overflow(token))
        }
      }
      _ => numeric_pair(token, "divide", &left, &right).map(|(a, b)| Value::Float(a / b)),
    },
    BinaryOp::Mod => match (&left, &right) {
      (Value::Int(a), Value::Int(b)) => {
        if *b == 0 {
          Err(LangError::new(
            ErrorKind::DivideByZero("modulo by zero".into()),
            token,
          ))
        } else {
          a.checked_rem(*b).map(Value::Int).ok_or_else(|| overflow(token))
        }
      }
      _ => numeric_pair(token, "modulo", &left, &right).map(|(a, b)| Value::Float(a % b)),
    },
    BinaryOp::Pow => match (&left, &right) {
      (Value::Int(a), Value::Int(b)) if *b >= 0 => {
        let exp = u32::try_from(*b).map_err(|_| overflow(token))?;
        a.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow(token))
      }
      _ => numeric_pair(token, "exponentiate", &left, &right)
        .map(|(a, b)| Value::Float(a.powf(b))),
    },

    BinaryOp::Eq => Ok(Value::Bool(left == right)),
    BinaryOp::NotEq => Ok(Value::Bool(left != right)),
    BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
      compare(token, op, &left, &right)
    }

    BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
    BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),

    BinaryOp::BitAnd => int_pair(token, "bitwise-and", &left, &right).map(|(a, b)| Value::Int(a & b)),
    BinaryOp::BitOr => int_pair(token, "bitwise-or", &left, &right).map(|(a, b)| Value::Int(a | b)),
    BinaryOp::BitXor => {
      int_pair(token, "bitwise-xor", &left, &right).map(|(a, b)| Value::Int(a ^ b))
    }
    BinaryOp::Shl => {
      let (a, b) = int_pair(token, "shift", &left, &right)?;
      let shift = valid_shift(token, b)?;
      Ok(Value::Int(a.wrapping_shl(shift)))
    }
    BinaryOp::Shr => {
      let (a, b) = int_pair(token, "shift", &left, &right)?;
      let shift = valid_shift(token, b)?;
      Ok(Value::Int(a.wrapping_shr(shift)))
    }
    BinaryOp::UShr => {
      let (a, b) = int_pair(token, "shift", &left, &right)?;
      let shift = valid_shift(token, b)?;
      Ok(Value::Int(((a as u64) >> shift) as i64))
    }
  }
}

fn numeric_pair(token: &Token, op: &str, l: &Value, r: &Value) -> LangResult<(f64, f64)> {
  match (l.as_number(), r.as_number()) {
    (Some(a), Some(b)) => Ok((a, b)),
    _ => Err(numeric_type_error(token, op, l, r)),
  }
}

fn int_pair(token: &Token, op: &str, l: &Value, r: &Value) -> LangResult<(i64, i64)> {
  match (l, r) {
    (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
    _ => Err(numeric_type_error(token, op, l, r)),
  }
}

fn valid_shift(token: &Token, amount: i64) -> LangResult<u32> {
  if (0..64).contains(&amount) {
    Ok(amount as u32)
  } else {
    Err(LangError::new(
      ErrorKind::Range(format!("shift amount {amount} not in 0..64")),
      token,
    ))
  }
}

fn compare(token: &Token, op: BinaryOp, left: &Value, right: &Value) -> LangResult<Value> {
  let ordering = match (left, right) {
    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
    _ => match (left.as_number(), right.as_number()) {
      (Some(a), Some(b)) => a.partial_cmp(&b),
      _ => {
        return Err(numeric_type_error(token, "compare", left, right));
      }
    },
  };
  let result = match ordering {
    None => false, // NaN comparisons
    Some(ord) => match op {
      BinaryOp::Lt => ord.is_lt(),
      BinaryOp::LtEq => ord.is_le(),
      BinaryOp::Gt => ord.is_gt(),
      BinaryOp::GtEq => ord.is_ge(),
      _ => unreachable!(),
    },
  };
  Ok(Value::Bool(result))
}

fn eval_unary(token: &Token, op: UnaryOp, value: Value) -> LangResult<Value> {
  match op {
    UnaryOp::Neg => match value {
      Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| overflow(token)),
      Value::Float(f) => Ok(Value::Float(-f)),
      other => Err(LangError::type_error(
        token,
        format!("cannot negate {}", other.type_name()),
      )),
    },
    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
    UnaryOp::BitNot => match value {
      Value::Int(n) => Ok(Value::Int(!n)),
      other => Err(LangError::type_error(
        token,
        format!("cannot bitwise-invert {}", other.type_name()),
      )),
    },
  }
}

// ---- indexing ----

fn normalize_index(token: &Token, index: i64, len: usize) -> LangResult<usize> {
  let len = len as i64;
  let adjusted = if index < 0 { index + len } else { index };
  if adjusted < 0 || adjusted >= len {
    Err(LangError::index(
      token,
      format!("index {index} out of range for length {len}"),
    ))
  } else {
    Ok(adjusted as usize)
  }
}

fn read_index(token: &Token, target: &Value, index: &Value) -> LangResult<Value> {
  match target {
    Value::List(list) => {
      let i = normalize_index(token, index.expect_int(token)?, list.borrow().len())?;
      Ok(list.borrow()[i].clone())
    }
    Value::String(s) => {
      let chars: Vec<char> = s.chars().collect();
      let i = normalize_index(token, index.expect_int(token)?, chars.len())?;
      Ok(Value::String(chars[i].to_string()))
    }
    // A missing hashmap key reads as null.
    Value::Hashmap(map) => Ok(map.borrow().get(index).cloned().unwrap_or(Value::Null)),
    other => Err(LangError::type_error(
      token,
      format!("cannot index {}", other.type_name()),
    )),
  }
}

fn write_index(token: &Token, target: &Value, index: Value, value: Value) -> LangResult<()> {
  match target {
    Value::List(list) => {
      let i = normalize_index(token, index.expect_int(token)?, list.borrow().len())?;
      list.borrow_mut()[i] = value;
      Ok(())
    }
    Value::Hashmap(map) => {
      if !index.is_hashable_key() {
        return Err(LangError::new(
          ErrorKind::HashKey(format!("{} cannot be a hashmap key", index.type_name())),
          token,
        ));
      }
      map.borrow_mut().insert(index, value);
      Ok(())
    }
    other => Err(LangError::type_error(
      token,
      format!("cannot index-assign {}", other.type_name()),
    )),
  }
}

/// Slices clamp to the valid range instead of erroring; negative bounds
/// count from the end.
fn read_slice(
  token: &Token,
  target: &Value,
  start: Option<i64>,
  end: Option<i64>,
) -> LangResult<Value> {
  fn bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let clamp = |i: i64| -> usize {
      let adjusted = if i < 0 { i + len } else { i };
      adjusted.clamp(0, len) as usize
    };
    let lo = clamp(start.unwrap_or(0));
    let hi = clamp(end.unwrap_or(len));
    (lo, hi.max(lo))
  }

  match target {
    Value::List(list) => {
      let items = list.borrow();
      let (lo, hi) = bounds(items.len(), start, end);
      Ok(Value::list(items[lo..hi].to_vec()))
    }
    Value::String(s) => {
      let chars: Vec<char> = s.chars().collect();
      let (lo, hi) = bounds(chars.len(), start, end);
      Ok(Value::String(chars[lo..hi].iter().collect()))
    }
    other => Err(LangError::type_error(
      token,
      format!("cannot slice {}", other.type_name()),
    )),
  }
}
