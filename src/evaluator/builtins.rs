//! The builtin dispatch boundary. The evaluator never implements a
//! builtin inline: every call crosses [`BuiltinDispatch::call`] with the
//! receiver and arguments already evaluated, and arity and types are
//! checked before any side effect.

use indexmap::IndexMap;

use crate::error::{ErrorKind, LangError, LangResult};
use crate::lexer::token::Token;
use crate::lexer::Lexer;
use crate::parser::ast::{ExprKind, StmtKind, UnaryOp};
use crate::parser::{ParseMode, Parser};

use super::value::Value;

/// Identity of every builtin the lexer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinId {
  // Core (bare calls)
  Print,
  Println,
  Type,
  Deserialize,

  // Methods (receiver calls)
  Size,
  Empty,
  Contains,
  IndexOf,
  Push,
  Pop,
  Insert,
  Remove,
  Clear,
  Reverse,
  Sort,
  First,
  Last,
  Join,
  Split,
  Replace,
  Upcase,
  Downcase,
  Trim,
  Keys,
  Values,
  HasKey,
  Clone,
  Concat,
  ToInteger,
  ToFloat,
  ToString,
  Serialize,
}

impl BuiltinId {
  /// Builtins callable without a receiver, like `print(x)`.
  pub fn core_from_name(name: &str) -> Option<BuiltinId> {
    let id = match name {
      "print" => BuiltinId::Print,
      "println" => BuiltinId::Println,
      "type" => BuiltinId::Type,
      "deserialize" => BuiltinId::Deserialize,
      _ => return None,
    };
    Some(id)
  }

  /// Builtins callable as methods, like `list.push(x)`.
  pub fn method_from_name(name: &str) -> Option<BuiltinId> {
    let id = match name {
      "size" => BuiltinId::Size,
      "empty" => BuiltinId::Empty,
      "contains" => BuiltinId::Contains,
      "index_of" => BuiltinId::IndexOf,
      "push" => BuiltinId::Push,
      "pop" => BuiltinId::Pop,
      "insert" => BuiltinId::Insert,
      "remove" => BuiltinId::Remove,
      "clear" => BuiltinId::Clear,
      "reverse" => BuiltinId::Reverse,
      "sort" => BuiltinId::Sort,
      "first" => BuiltinId::First,
      "last" => BuiltinId::Last,
      "join" => BuiltinId::Join,
      "split" => BuiltinId::Split,
      "replace" => BuiltinId::Replace,
      "upcase" => BuiltinId::Upcase,
      "downcase" => BuiltinId::Downcase,
      "trim" => BuiltinId::Trim,
      "keys" => BuiltinId::Keys,
      "values" => BuiltinId::Values,
      "has_key" => BuiltinId::HasKey,
      "clone" => BuiltinId::Clone,
      "concat" => BuiltinId::Concat,
      "to_integer" => BuiltinId::ToInteger,
      "to_float" => BuiltinId::ToFloat,
      "to_string" => BuiltinId::ToString,
      "serialize" => BuiltinId::Serialize,
      _ => return None,
    };
    Some(id)
  }

  pub fn name(&self) -> &'static str {
    match self {
      BuiltinId::Print => "print",
      BuiltinId::Println => "println",
      BuiltinId::Type => "type",
      BuiltinId::Deserialize => "deserialize",
      BuiltinId::Size => "size",
      BuiltinId::Empty => "empty",
      BuiltinId::Contains => "contains",
      BuiltinId::IndexOf => "index_of",
      BuiltinId::Push => "push",
      BuiltinId::Pop => "pop",
      BuiltinId::Insert => "insert",
      BuiltinId::Remove => "remove",
      BuiltinId::Clear => "clear",
      BuiltinId::Reverse => "reverse",
      BuiltinId::Sort => "sort",
      BuiltinId::First => "first",
      BuiltinId::Last => "last",
      BuiltinId::Join => "join",
      BuiltinId::Split => "split",
      BuiltinId::Replace => "replace",
      BuiltinId::Upcase => "upcase",
      BuiltinId::Downcase => "downcase",
      BuiltinId::Trim => "trim",
      BuiltinId::Keys => "keys",
      BuiltinId::Values => "values",
      BuiltinId::HasKey => "has_key",
      BuiltinId::Clone => "clone",
      BuiltinId::Concat => "concat",
      BuiltinId::ToInteger => "to_integer",
      BuiltinId::ToFloat => "to_float",
      BuiltinId::ToString => "to_string",
      BuiltinId::Serialize => "serialize",
    }
  }
}

/// The boundary between the evaluator and builtin implementations.
/// External hosts implement this to add file/time/net handlers without
/// touching the interpreter.
pub trait BuiltinDispatch {
  fn call(
    &mut self,
    token: &Token,
    id: BuiltinId,
    receiver: Option<Value>,
    args: Vec<Value>,
  ) -> LangResult<Value>;
}

/// The language-core builtins this crate carries.
pub struct CoreBuiltins;

impl BuiltinDispatch for CoreBuiltins {
  fn call(
    &mut self,
    token: &Token,
    id: BuiltinId,
    receiver: Option<Value>,
    args: Vec<Value>,
  ) -> LangResult<Value> {
    match id {
      BuiltinId::Print => {
        let parts: Vec<String> = args.iter().map(Value::to_string).collect();
        print!("{}", parts.join(" "));
        Ok(Value::Null)
      }
      BuiltinId::Println => {
        let parts: Vec<String> = args.iter().map(Value::to_string).collect();
        println!("{}", parts.join(" "));
        Ok(Value::Null)
      }
      BuiltinId::Type => {
        let value = exactly_one(token, id, args)?;
        Ok(Value::String(value.type_name().to_string()))
      }
      BuiltinId::Deserialize => {
        let value = exactly_one(token, id, args)?;
        let source = value.expect_string(token)?;
        deserialize(token, source)
      }
      _ => {
        let receiver = receiver.ok_or_else(|| {
          LangError::new(
            ErrorKind::InvalidContext(format!("'{}' requires a receiver", id.name())),
            token,
          )
        })?;
        self.method(token, id, receiver, args)
      }
    }
  }
}

impl CoreBuiltins {
  fn method(
    &mut self,
    token: &Token,
    id: BuiltinId,
    receiver: Value,
    args: Vec<Value>,
  ) -> LangResult<Value> {
    match id {
      BuiltinId::Size => {
        no_args(token, id, &args)?;
        let n = match &receiver {
          Value::String(s) => s.chars().count(),
          Value::List(l) => l.borrow().len(),
          Value::Hashmap(h) => h.borrow().len(),
          other => return Err(type_mismatch(token, id, other)),
        };
        Ok(Value::Int(n as i64))
      }
      BuiltinId::Empty => {
        no_args(token, id, &args)?;
        let empty = match &receiver {
          Value::String(s) => s.is_empty(),
          Value::List(l) => l.borrow().is_empty(),
          Value::Hashmap(h) => h.borrow().is_empty(),
          other => return Err(type_mismatch(token, id, other)),
        };
        Ok(Value::Bool(empty))
      }
      BuiltinId::Contains => {
        let needle = exactly_one(token, id, args)?;
        let found = match &receiver {
          Value::String(s) => s.contains(needle.expect_string(token)?),
          Value::List(l) => l.borrow().iter().any(|v| *v == needle),
          Value::Hashmap(h) => h.borrow().contains_key(&needle),
          other => return Err(type_mismatch(token, id, other)),
        };
        Ok(Value::Bool(found))
      }
      BuiltinId::IndexOf => {
        let needle = exactly_one(token, id, args)?;
        match &receiver {
          Value::String(s) => {
            let pat = needle.expect_string(token)?;
            match s.find(pat) {
              Some(byte) => Ok(Value::Int(s[..byte].chars().count() as i64)),
              None => Ok(Value::Null),
            }
          }
          Value::List(l) => Ok(
            l.borrow()
              .iter()
              .position(|v| *v == needle)
              .map(|i| Value::Int(i as i64))
              .unwrap_or(Value::Null),
          ),
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Push => {
        let item = exactly_one(token, id, args)?;
        let list = receiver.expect_list(token)?;
        list.borrow_mut().push(item);
        Ok(receiver.clone())
      }
      BuiltinId::Pop => {
        no_args(token, id, &args)?;
        let list = receiver.expect_list(token)?;
        let popped = list.borrow_mut().pop();
        Ok(popped.unwrap_or(Value::Null))
      }
      BuiltinId::Insert => {
        let (a, b) = exactly_two(token, id, args)?;
        match &receiver {
          Value::List(list) => {
            let index = a.expect_int(token)?;
            let len = list.borrow().len() as i64;
            if index < 0 || index > len {
              return Err(LangError::index(
                token,
                format!("insert index {index} out of range for length {len}"),
              ));
            }
            list.borrow_mut().insert(index as usize, b);
            Ok(receiver.clone())
          }
          Value::Hashmap(map) => {
            if !a.is_hashable_key() {
              return Err(LangError::new(
                ErrorKind::HashKey(format!("{} cannot be a hashmap key", a.type_name())),
                token,
              ));
            }
            map.borrow_mut().insert(a, b);
            Ok(receiver.clone())
          }
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Remove => {
        let key = exactly_one(token, id, args)?;
        match &receiver {
          Value::List(list) => {
            let index = key.expect_int(token)?;
            let len = list.borrow().len() as i64;
            if index < 0 || index >= len {
              return Err(LangError::index(
                token,
                format!("remove index {index} out of range for length {len}"),
              ));
            }
            Ok(list.borrow_mut().remove(index as usize))
          }
          Value::Hashmap(map) => {
            Ok(map.borrow_mut().shift_remove(&key).unwrap_or(Value::Null))
          }
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Clear => {
        no_args(token, id, &args)?;
        match &receiver {
          Value::List(list) => list.borrow_mut().clear(),
          Value::Hashmap(map) => map.borrow_mut().clear(),
          other => return Err(type_mismatch(token, id, other)),
        }
        Ok(receiver.clone())
      }
      BuiltinId::Reverse => {
        no_args(token, id, &args)?;
        match &receiver {
          Value::List(list) => {
            list.borrow_mut().reverse();
            Ok(receiver.clone())
          }
          Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Sort => {
        no_args(token, id, &args)?;
        let list = receiver.expect_list(token)?;
        sort_in_place(token, list)?;
        Ok(receiver.clone())
      }
      BuiltinId::First => {
        no_args(token, id, &args)?;
        match &receiver {
          Value::List(l) => Ok(l.borrow().first().cloned().unwrap_or(Value::Null)),
          Value::String(s) => Ok(
            s.chars()
              .next()
              .map(|c| Value::String(c.to_string()))
              .unwrap_or(Value::Null),
          ),
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Last => {
        no_args(token, id, &args)?;
        match &receiver {
          Value::List(l) => Ok(l.borrow().last().cloned().unwrap_or(Value::Null)),
          Value::String(s) => Ok(
            s.chars()
              .last()
              .map(|c| Value::String(c.to_string()))
              .unwrap_or(Value::Null),
          ),
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::Join => {
        let sep = exactly_one(token, id, args)?;
        let sep = sep.expect_string(token)?;
        let list = receiver.expect_list(token)?;
        let parts: Vec<String> = list.borrow().iter().map(Value::to_string).collect();
        Ok(Value::String(parts.join(sep)))
      }
      BuiltinId::Split => {
        let sep = exactly_one(token, id, args)?;
        let sep = sep.expect_string(token)?.to_string();
        let s = receiver.expect_string(token)?;
        let parts: Vec<Value> = if sep.is_empty() {
          s.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
          s.split(&sep).map(|p| Value::String(p.to_string())).collect()
        };
        Ok(Value::list(parts))
      }
      BuiltinId::Replace => {
        let (from, to) = exactly_two(token, id, args)?;
        let s = receiver.expect_string(token)?;
        let from = from.expect_string(token)?;
        let to = to.expect_string(token)?;
        Ok(Value::String(s.replace(from, to)))
      }
      BuiltinId::Upcase => {
        no_args(token, id, &args)?;
        Ok(Value::String(receiver.expect_string(token)?.to_uppercase()))
      }
      BuiltinId::Downcase => {
        no_args(token, id, &args)?;
        Ok(Value::String(receiver.expect_string(token)?.to_lowercase()))
      }
      BuiltinId::Trim => {
        no_args(token, id, &args)?;
        Ok(Value::String(receiver.expect_string(token)?.trim().to_string()))
      }
      BuiltinId::Keys => {
        no_args(token, id, &args)?;
        let map = receiver.expect_hashmap(token)?;
        Ok(Value::list(map.borrow().keys().cloned().collect()))
      }
      BuiltinId::Values => {
        no_args(token, id, &args)?;
        let map = receiver.expect_hashmap(token)?;
        Ok(Value::list(map.borrow().values().cloned().collect()))
      }
      BuiltinId::HasKey => {
        let key = exactly_one(token, id, args)?;
        let map = receiver.expect_hashmap(token)?;
        Ok(Value::Bool(map.borrow().contains_key(&key)))
      }
      BuiltinId::Clone => {
        no_args(token, id, &args)?;
        Ok(receiver.deep_clone())
      }
      BuiltinId::Concat => {
        let other = exactly_one(token, id, args)?;
        match (&receiver, &other) {
          (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
          }
          (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
          (recv, _) => Err(type_mismatch(token, id, recv)),
        }
      }
      BuiltinId::ToInteger => to_integer(token, receiver, args),
      BuiltinId::ToFloat => {
        no_args(token, id, &args)?;
        match &receiver {
          Value::Int(n) => Ok(Value::Float(*n as f64)),
          Value::Float(_) => Ok(receiver.clone()),
          Value::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            LangError::conversion(token, format!("cannot convert \"{s}\" to float"))
          }),
          other => Err(type_mismatch(token, id, other)),
        }
      }
      BuiltinId::ToString => to_string(token, receiver, args),
      BuiltinId::Serialize => {
        no_args(token, id, &args)?;
        Ok(Value::String(receiver.serialize()))
      }
      _ => Err(LangError::new(
        ErrorKind::UnimplementedMethod(format!("'{}' is not a method", id.name())),
        token,
      )),
    }
  }
}

// ---- argument validation ----

fn arity_error(token: &Token, id: BuiltinId, expected: usize, got: usize) -> LangError {
  LangError::new(
    ErrorKind::ParameterCountMismatch(format!(
      "'{}' takes {expected} argument(s), got {got}",
      id.name()
    )),
    token,
  )
}

fn no_args(token: &Token, id: BuiltinId, args: &[Value]) -> LangResult<()> {
  if args.is_empty() {
    Ok(())
  } else {
    Err(arity_error(token, id, 0, args.len()))
  }
}

fn exactly_one(token: &Token, id: BuiltinId, mut args: Vec<Value>) -> LangResult<Value> {
  if args.len() == 1 {
    Ok(args.remove(0))
  } else {
    Err(arity_error(token, id, 1, args.len()))
  }
}

fn exactly_two(token: &Token, id: BuiltinId, mut args: Vec<Value>) -> LangResult<(Value, Value)> {
  if args.len() == 2 {
    let b = args.remove(1);
    let a = args.remove(0);
    Ok((a, b))
  } else {
    Err(arity_error(token, id, 2, args.len()))
  }
}

fn type_mismatch(token: &Token, id: BuiltinId, receiver: &Value) -> LangError {
  LangError::type_error(
    token,
    format!("'{}' not supported on {}", id.name(), receiver.type_name()),
  )
}

// ---- conversions ----

fn to_integer(token: &Token, receiver: Value, args: Vec<Value>) -> LangResult<Value> {
  match &receiver {
    Value::Int(_) if args.is_empty() => Ok(receiver.clone()),
    Value::Float(f) if args.is_empty() => {
      if f.is_finite() {
        Ok(Value::Int(f.trunc() as i64))
      } else {
        Err(LangError::conversion(
          token,
          format!("cannot convert {f} to integer"),
        ))
      }
    }
    Value::String(s) => {
      let base = match args.len() {
        0 => 10,
        1 => {
          let base = args[0].expect_int(token)?;
          if !(2..=36).contains(&base) {
            return Err(LangError::new(
              ErrorKind::Range(format!("base {base} not in 2..=36")),
              token,
            ));
          }
          base as u32
        }
        n => return Err(arity_error(token, BuiltinId::ToInteger, 1, n)),
      };
      let trimmed = s.trim();
      i64::from_str_radix(trimmed, base).map(Value::Int).map_err(|_| {
        LangError::conversion(
          token,
          format!("cannot convert \"{trimmed}\" to integer in base {base}"),
        )
      })
    }
    other => Err(type_mismatch(token, BuiltinId::ToInteger, other)),
  }
}

fn to_string(token: &Token, receiver: Value, args: Vec<Value>) -> LangResult<Value> {
  match args.len() {
    0 => Ok(Value::String(receiver.to_string())),
    1 => {
      let spec = args[0].expect_string(token)?.to_string();
      // Fixed-point ".N" works for any number; radix forms need an integer.
      if let Some(digits) = spec.strip_prefix('.') {
        let precision: usize = digits.parse().map_err(|_| {
          LangError::conversion(token, format!("bad format \"{spec}\""))
        })?;
        let number = receiver.as_number().ok_or_else(|| {
          type_mismatch(token, BuiltinId::ToString, &receiver)
        })?;
        return Ok(Value::String(format!("{number:.precision$}")));
      }
      let n = receiver.expect_int(token)?;
      let formatted = match spec.as_str() {
        "x" => format!("{n:x}"),
        "X" => format!("{n:X}"),
        "b" => format!("{n:b}"),
        "o" => format!("{n:o}"),
        _ => {
          return Err(LangError::conversion(
            token,
            format!("bad format \"{spec}\""),
          ))
        }
      };
      Ok(Value::String(formatted))
    }
    n => Err(arity_error(token, BuiltinId::ToString, 1, n)),
  }
}

// ---- sorting ----

fn sort_in_place(token: &Token, list: &super::value::ListRef) -> LangResult<()> {
  {
    let items = list.borrow();
    let all_numbers = items.iter().all(|v| v.as_number().is_some());
    let all_strings = items.iter().all(|v| matches!(v, Value::String(_)));
    if !all_numbers && !all_strings {
      return Err(LangError::type_error(
        token,
        "sort requires all numbers or all strings",
      ));
    }
  }
  list.borrow_mut().sort_by(|a, b| match (a, b) {
    (Value::String(x), Value::String(y)) => x.cmp(y),
    _ => {
      let x = a.as_number().unwrap_or(f64::NAN);
      let y = b.as_number().unwrap_or(f64::NAN);
      x.total_cmp(&y)
    }
  });
  Ok(())
}

// ---- deserialize ----

/// Re-lexes and re-parses serialized source in `Rethrow` mode and folds
/// the literal tree back into a value. No interpreter involved: only
/// literal shapes are accepted.
fn deserialize(token: &Token, source: &str) -> LangResult<Value> {
  let stream = Lexer::new(source, token.span.file_id).tokenize();
  let (program, errors) = Parser::new(stream, ParseMode::Rethrow).parse();
  if let Some(err) = errors.into_iter().next() {
    return Err(LangError::conversion(
      token,
      format!("invalid serialized value: {}", err.kind),
    ));
  }

  let mut statements = program.statements;
  if statements.len() != 1 {
    return Err(LangError::conversion(
      token,
      "serialized value must be a single literal",
    ));
  }
  match statements.remove(0).kind {
    StmtKind::Expr(expr) => fold_literal(token, &expr.kind),
    _ => Err(LangError::conversion(
      token,
      "serialized value must be a single literal",
    )),
  }
}

fn fold_literal(token: &Token, kind: &ExprKind) -> LangResult<Value> {
  match kind {
    ExprKind::Int(n) => Ok(Value::Int(*n)),
    ExprKind::Float(f) => Ok(Value::Float(*f)),
    ExprKind::Bool(b) => Ok(Value::Bool(*b)),
    ExprKind::Str(s) => Ok(Value::String(s.clone())),
    ExprKind::Null => Ok(Value::Null),
    ExprKind::Unary {
      op: UnaryOp::Neg,
      operand,
    } => match fold_literal(token, &operand.kind)? {
      Value::Int(n) => Ok(Value::Int(-n)),
      Value::Float(f) => Ok(Value::Float(-f)),
      other => Err(LangError::conversion(
        token,
        format!("cannot negate {} in a literal", other.type_name()),
      )),
    },
    ExprKind::List(items) => {
      let mut out = Vec::with_capacity(items.len());
      for item in items {
        out.push(fold_literal(token, &item.kind)?);
      }
      Ok(Value::list(out))
    }
    ExprKind::Hashmap(pairs) => {
      let mut map = IndexMap::with_capacity(pairs.len());
      for (k, v) in pairs {
        let key = fold_literal(token, &k.kind)?;
        if !key.is_hashable_key() {
          return Err(LangError::new(
            ErrorKind::HashKey(format!("{} cannot be a hashmap key", key.type_name())),
            token,
          ));
        }
        map.insert(key, fold_literal(token, &v.kind)?);
      }
      Ok(Value::hashmap(map))
    }
    _ => Err(LangError::conversion(
      token,
      "serialized value must be a literal",
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use crate::evaluator::value::Value;
  use crate::lexer::token::{Name, Span, Token, TokenKind};
  use indexmap::IndexMap;

  fn tok() -> Token {
    Token::new(TokenKind::Identifier, Name::None, Span::new(0, 1, 1), "t")
  }

  fn call(id: BuiltinId, receiver: Option<Value>, args: Vec<Value>) -> LangResult<Value> {
    CoreBuiltins.call(&tok(), id, receiver, args)
  }

  #[test]
  fn push_mutates_through_the_alias() {
    let list = Value::list(vec![Value::Int(1)]);
    let alias = list.clone();
    call(BuiltinId::Push, Some(list), vec![Value::Int(2)]).unwrap();
    if let Value::List(inner) = alias {
      assert_eq!(inner.borrow().len(), 2);
    } else {
      unreachable!();
    }
  }

  #[test]
  fn clone_detaches() {
    let list = Value::list(vec![Value::Int(1)]);
    let copy = call(BuiltinId::Clone, Some(list.clone()), vec![]).unwrap();
    call(BuiltinId::Push, Some(list), vec![Value::Int(2)]).unwrap();
    if let Value::List(inner) = copy {
      assert_eq!(inner.borrow().len(), 1);
    } else {
      unreachable!();
    }
  }

  #[test]
  fn to_integer_bases_and_overflow() {
    let ff = Value::String("ff".into());
    assert_eq!(
      call(BuiltinId::ToInteger, Some(ff), vec![Value::Int(16)]).unwrap(),
      Value::Int(255)
    );

    let base = call(
      BuiltinId::ToInteger,
      Some(Value::String("1".into())),
      vec![Value::Int(1)],
    );
    assert!(matches!(base.unwrap_err().kind, ErrorKind::Range(_)));

    let huge = Value::String("9999999999999999999999".into());
    let overflow = call(BuiltinId::ToInteger, Some(huge), vec![]);
    assert!(matches!(overflow.unwrap_err().kind, ErrorKind::Conversion(_)));
  }

  #[test]
  fn to_string_formats() {
    assert_eq!(
      call(BuiltinId::ToString, Some(Value::Int(255)), vec![Value::String("x".into())]).unwrap(),
      Value::String("ff".into())
    );
    assert_eq!(
      call(BuiltinId::ToString, Some(Value::Int(5)), vec![Value::String("b".into())]).unwrap(),
      Value::String("101".into())
    );
    assert_eq!(
      call(
        BuiltinId::ToString,
        Some(Value::Float(3.14159)),
        vec![Value::String(".2".into())]
      )
      .unwrap(),
      Value::String("3.14".into())
    );
  }

  #[test]
  fn serialize_round_trips_through_deserialize() {
    let mut map = IndexMap::new();
    map.insert(Value::String("k".into()), Value::list(vec![Value::Int(1), Value::Null]));
    let original = Value::hashmap(map);

    let serialized = call(BuiltinId::Serialize, Some(original.clone()), vec![]).unwrap();
    let text = match &serialized {
      Value::String(s) => s.clone(),
      _ => unreachable!(),
    };
    let restored = call(BuiltinId::Deserialize, None, vec![Value::String(text)]).unwrap();
    assert_eq!(restored, original);
  }

  #[test]
  fn arity_checked_before_side_effects() {
    let list = Value::list(vec![Value::Int(1)]);
    let err = call(BuiltinId::Push, Some(list.clone()), vec![]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ParameterCountMismatch(_)));
    if let Value::List(inner) = list {
      assert_eq!(inner.borrow().len(), 1);
    }
  }

  #[test]
  fn sort_rejects_mixed_types() {
    let list = Value::list(vec![Value::Int(1), Value::String("a".into())]);
    let err = call(BuiltinId::Sort, Some(list), vec![]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Type(_)));
  }
}
