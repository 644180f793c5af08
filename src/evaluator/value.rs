//! Runtime values. Containers alias through `Rc<RefCell<..>>` until a
//! script asks for `clone()`, which deep-copies.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::{ErrorKind, LangError, LangResult};
use crate::lexer::token::Token;
use crate::parser::ast::FunctionDecl;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type HashRef = Rc<RefCell<IndexMap<Value, Value>>>;

/// A lambda bound as a value: its declaration plus the by-value snapshot
/// of the bindings visible where it was created. Containers in the
/// snapshot still alias through their `Rc` handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
  pub decl: FunctionDecl,
  pub captured: HashMap<String, Value>,
}

/// An instantiated struct: its type name plus `@field` storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
  pub struct_name: String,
  pub fields: IndexMap<String, Value>,
}

/// A struct declaration registered at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
  pub name: String,
  pub methods: IndexMap<String, Rc<FunctionDecl>>,
}

#[derive(Debug, Clone)]
pub enum Value {
  Int(i64),
  Float(f64),
  Bool(bool),
  String(String),
  List(ListRef),
  Hashmap(HashRef),
  Object(Rc<RefCell<Instance>>),
  Lambda(Rc<Callable>),
  Struct(Rc<StructDef>),
  Date(DateTime<Utc>),
  Null,
}

impl Value {
  pub fn list(items: Vec<Value>) -> Self {
    Value::List(Rc::new(RefCell::new(items)))
  }

  pub fn hashmap(map: IndexMap<Value, Value>) -> Self {
    Value::Hashmap(Rc::new(RefCell::new(map)))
  }

  /// The name scripts see from `type(x)` and in type hints.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Int(_) => "integer",
      Value::Float(_) => "float",
      Value::Bool(_) => "boolean",
      Value::String(_) => "string",
      Value::List(_) => "list",
      Value::Hashmap(_) => "hashmap",
      Value::Object(_) => "object",
      Value::Lambda(_) => "lambda",
      Value::Struct(_) => "struct",
      Value::Date(_) => "date",
      Value::Null => "none",
    }
  }

  pub fn is_truthy(&self) -> bool {
    match self {
      Value::Null => false,
      Value::Bool(b) => *b,
      Value::Int(n) => *n != 0,
      Value::Float(f) => *f != 0.0,
      Value::String(s) => !s.is_empty(),
      Value::List(l) => !l.borrow().is_empty(),
      Value::Hashmap(h) => !h.borrow().is_empty(),
      _ => true,
    }
  }

  pub fn matches_type_hint(&self, hint: &str) -> bool {
    hint == "any" || self.type_name() == hint
  }

  /// Recursively copies containers so the result shares no storage with
  /// the original. Lambdas and struct definitions stay shared; they are
  /// immutable.
  pub fn deep_clone(&self) -> Value {
    match self {
      Value::List(list) => {
        let items = list.borrow().iter().map(Value::deep_clone).collect();
        Value::list(items)
      }
      Value::Hashmap(map) => {
        let copied = map
          .borrow()
          .iter()
          .map(|(k, v)| (k.deep_clone(), v.deep_clone()))
          .collect();
        Value::hashmap(copied)
      }
      Value::Object(obj) => {
        let inner = obj.borrow();
        let fields = inner
          .fields
          .iter()
          .map(|(k, v)| (k.clone(), v.deep_clone()))
          .collect();
        Value::Object(Rc::new(RefCell::new(Instance {
          struct_name: inner.struct_name.clone(),
          fields,
        })))
      }
      other => other.clone(),
    }
  }

  /// Round-trippable literal form: strings quoted and escaped,
  /// containers in literal syntax.
  pub fn serialize(&self) -> String {
    match self {
      Value::String(s) => format!("\"{}\"", escape_string(s)),
      Value::List(list) => {
        let items: Vec<String> = list.borrow().iter().map(Value::serialize).collect();
        format!("[{}]", items.join(", "))
      }
      Value::Hashmap(map) => {
        let pairs: Vec<String> = map
          .borrow()
          .iter()
          .map(|(k, v)| format!("{}: {}", k.serialize(), v.serialize()))
          .collect();
        format!("{{{}}}", pairs.join(", "))
      }
      Value::Object(obj) => {
        let inner = obj.borrow();
        let fields: Vec<String> = inner
          .fields
          .iter()
          .map(|(k, v)| format!("{}: {}", k, v.serialize()))
          .collect();
        format!("{}{{{}}}", inner.struct_name, fields.join(", "))
      }
      other => other.to_string(),
    }
  }

  // ---- checked projections used at the builtin boundary ----

  pub fn expect_int(&self, token: &Token) -> LangResult<i64> {
    match self {
      Value::Int(n) => Ok(*n),
      other => Err(LangError::new(
        ErrorKind::Type(format!("expected integer, got {}", other.type_name())),
        token,
      )),
    }
  }

  pub fn expect_string(&self, token: &Token) -> LangResult<&str> {
    match self {
      Value::String(s) => Ok(s),
      other => Err(LangError::new(
        ErrorKind::Type(format!("expected string, got {}", other.type_name())),
        token,
      )),
    }
  }

  pub fn expect_list(&self, token: &Token) -> LangResult<&ListRef> {
    match self {
      Value::List(l) => Ok(l),
      other => Err(LangError::new(
        ErrorKind::Type(format!("expected list, got {}", other.type_name())),
        token,
      )),
    }
  }

  pub fn expect_hashmap(&self, token: &Token) -> LangResult<&HashRef> {
    match self {
      Value::Hashmap(h) => Ok(h),
      other => Err(LangError::new(
        ErrorKind::Type(format!("expected hashmap, got {}", other.type_name())),
        token,
      )),
    }
  }

  /// Numeric widening used by arithmetic and comparisons.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Int(n) => Some(*n as f64),
      Value::Float(f) => Some(*f),
      _ => None,
    }
  }

  /// Only hashable (scalar) values may key a hashmap.
  pub fn is_hashable_key(&self) -> bool {
    matches!(
      self,
      Value::Int(_)
        | Value::Float(_)
        | Value::Bool(_)
        | Value::String(_)
        | Value::Date(_)
        | Value::Null
    )
  }
}

/// A float that holds an exact integer, if it does.
fn integral_float(f: f64) -> Option<i64> {
  if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
    Some(f as i64)
  } else {
    None
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Int(a), Value::Int(b)) => a == b,
      // NaN equals itself so Eq stays reflexive for hashmap keys.
      (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
      (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
        integral_float(*b) == Some(*a)
      }
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Null, Value::Null) => true,
      (Value::Date(a), Value::Date(b)) => a == b,
      (Value::List(a), Value::List(b)) => {
        Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
      }
      (Value::Hashmap(a), Value::Hashmap(b)) => {
        if Rc::ptr_eq(a, b) {
          return true;
        }
        let (a, b) = (a.borrow(), b.borrow());
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
      }
      (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
      (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
      (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl Eq for Value {}

impl Hash for Value {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match self {
      Value::Int(n) => {
        0u8.hash(state);
        n.hash(state);
      }
      // An integral float must collide with the equal integer.
      Value::Float(f) => match integral_float(*f) {
        Some(n) => {
          0u8.hash(state);
          n.hash(state);
        }
        None => {
          1u8.hash(state);
          f.to_bits().hash(state);
        }
      },
      Value::Bool(b) => {
        2u8.hash(state);
        b.hash(state);
      }
      Value::String(s) => {
        3u8.hash(state);
        s.hash(state);
      }
      Value::Null => 4u8.hash(state),
      Value::Date(d) => {
        5u8.hash(state);
        d.timestamp_nanos_opt().unwrap_or_default().hash(state);
      }
      Value::List(list) => {
        6u8.hash(state);
        for item in list.borrow().iter() {
          item.hash(state);
        }
      }
      // Insertion order must not affect the hash.
      Value::Hashmap(map) => {
        7u8.hash(state);
        let mut sum = 0u64;
        for (k, v) in map.borrow().iter() {
          let mut pair = DefaultHasher::new();
          k.hash(&mut pair);
          v.hash(&mut pair);
          sum = sum.wrapping_add(pair.finish());
        }
        sum.hash(state);
      }
      Value::Object(obj) => {
        8u8.hash(state);
        (Rc::as_ptr(obj) as usize).hash(state);
      }
      Value::Lambda(l) => {
        9u8.hash(state);
        (Rc::as_ptr(l) as usize).hash(state);
      }
      Value::Struct(s) => {
        10u8.hash(state);
        (Rc::as_ptr(s) as usize).hash(state);
      }
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Int(n) => write!(f, "{n}"),
      Value::Float(x) => {
        if x.is_finite() && x.fract() == 0.0 {
          write!(f, "{x:.1}")
        } else {
          write!(f, "{x}")
        }
      }
      Value::Bool(b) => write!(f, "{b}"),
      Value::String(s) => write!(f, "{s}"),
      Value::Null => write!(f, "null"),
      Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
      Value::Lambda(l) => write!(f, "<lambda {}>", l.decl.name),
      Value::Struct(s) => write!(f, "<struct {}>", s.name),
      // Containers display in their serialized literal form.
      Value::List(_) | Value::Hashmap(_) | Value::Object(_) => {
        write!(f, "{}", self.serialize())
      }
    }
  }
}

pub fn escape_string(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      '\u{0008}' => out.push_str("\\b"),
      '\u{000C}' => out.push_str("\\f"),
      other => out.push(other),
    }
  }
  out
}
