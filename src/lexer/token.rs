use crate::evaluator::builtins::BuiltinId;
use crate::evaluator::value::Value;

/// Source location attached to every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
  pub file_id: u32,
  pub line: u32,
  pub column: u32,
}

impl Span {
  pub fn new(file_id: u32, line: u32, column: u32) -> Self {
    Self {
      file_id,
      line,
      column,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  // Literals
  Int,
  Float,
  String,
  Boolean,
  Null,

  // Names
  Identifier,
  InstanceVar,
  TypeName,
  Keyword,
  Operator,
  Builtin,

  // Delimiters
  LParen,
  RParen,
  LBracket,
  RBracket,
  LBrace,
  RBrace,
  Comma,

  // Special
  Error,
  Eof,
}

/// Fine-grained operator identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  StarStar,

  PlusEq,
  MinusEq,
  StarEq,
  SlashEq,
  PercentEq,
  StarStarEq,

  Assign,
  Eq,
  NotEq,
  Lt,
  LtEq,
  Gt,
  GtEq,

  Shl,
  Shr,
  UShr,
  ShlEq,
  ShrEq,
  UShrEq,

  BitAnd,
  BitOr,
  BitXor,
  BitNot,
  BitAndEq,
  BitOrEq,
  BitXorEq,

  And,
  Or,
  Not,

  Dot,
  Colon,
  Question,
  Range,
}

/// Fine-grained keyword identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
  If,
  Elsif,
  Else,
  End,
  Case,
  When,
  While,
  For,
  In,
  Do,
  Fn,
  Struct,
  Const,
  Return,
  Break,
  Next,
  Exit,
  Try,
  Catch,
  Spawn,
  With,
  This,
}

/// The fine-grained name carried alongside the coarse kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name {
  None,
  Op(Op),
  Kw(Kw),
  Builtin(BuiltinId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub name: Name,
  pub span: Span,
  pub text: String,
  /// Pre-parsed literal value, computed once at lex time.
  pub value: Option<Value>,
}

impl Token {
  pub fn new(kind: TokenKind, name: Name, span: Span, text: impl Into<String>) -> Self {
    Self {
      kind,
      name,
      span,
      text: text.into(),
      value: None,
    }
  }

  pub fn with_value(
    kind: TokenKind,
    name: Name,
    span: Span,
    text: impl Into<String>,
    value: Value,
  ) -> Self {
    Self {
      kind,
      name,
      span,
      text: text.into(),
      value: Some(value),
    }
  }

  pub fn eof(span: Span) -> Self {
    Self::new(TokenKind::Eof, Name::None, span, "")
  }

  pub fn is_op(&self, op: Op) -> bool {
    self.name == Name::Op(op)
  }

  pub fn is_kw(&self, kw: Kw) -> bool {
    self.name == Name::Kw(kw)
  }
}

/// Classify a lexed word. First match wins, in the order the language
/// defines: exact keyword, typename, logical, conditional, literal,
/// lambda introducer, core builtin, builtin method, plain identifier.
pub fn classify_word(word: &str) -> (TokenKind, Name) {
  if let Some(kw) = as_keyword(word) {
    return (TokenKind::Keyword, Name::Kw(kw));
  }
  if is_typename(word) {
    return (TokenKind::TypeName, Name::None);
  }
  if let Some(op) = as_logical(word) {
    return (TokenKind::Operator, Name::Op(op));
  }
  if let Some(kw) = as_conditional(word) {
    return (TokenKind::Keyword, Name::Kw(kw));
  }
  match word {
    "true" | "false" => return (TokenKind::Boolean, Name::None),
    "null" => return (TokenKind::Null, Name::None),
    "with" => return (TokenKind::Keyword, Name::Kw(Kw::With)),
    _ => {}
  }
  if let Some(id) = BuiltinId::core_from_name(word) {
    return (TokenKind::Builtin, Name::Builtin(id));
  }
  if let Some(id) = BuiltinId::method_from_name(word) {
    return (TokenKind::Builtin, Name::Builtin(id));
  }
  (TokenKind::Identifier, Name::None)
}

fn as_keyword(word: &str) -> Option<Kw> {
  let kw = match word {
    "while" => Kw::While,
    "for" => Kw::For,
    "in" => Kw::In,
    "do" => Kw::Do,
    "fn" => Kw::Fn,
    "struct" => Kw::Struct,
    "const" => Kw::Const,
    "return" => Kw::Return,
    "break" => Kw::Break,
    "next" => Kw::Next,
    "exit" => Kw::Exit,
    "try" => Kw::Try,
    "catch" => Kw::Catch,
    "spawn" => Kw::Spawn,
    "this" => Kw::This,
    _ => return None,
  };
  Some(kw)
}

fn is_typename(word: &str) -> bool {
  matches!(
    word,
    "integer"
      | "float"
      | "boolean"
      | "string"
      | "list"
      | "hashmap"
      | "object"
      | "lambda"
      | "date"
      | "none"
      | "any"
  )
}

fn as_logical(word: &str) -> Option<Op> {
  let op = match word {
    "and" => Op::And,
    "or" => Op::Or,
    "not" => Op::Not,
    _ => return None,
  };
  Some(op)
}

fn as_conditional(word: &str) -> Option<Kw> {
  let kw = match word {
    "if" => Kw::If,
    "elsif" => Kw::Elsif,
    "else" => Kw::Else,
    "end" => Kw::End,
    "case" => Kw::Case,
    "when" => Kw::When,
    _ => return None,
  };
  Some(kw)
}

/// Look up a multi-character operator by its exact text.
pub fn lookup_operator(text: &str) -> Option<Op> {
  let op = match text {
    ">>>=" => Op::UShrEq,
    ">>>" => Op::UShr,
    "<<=" => Op::ShlEq,
    ">>=" => Op::ShrEq,
    "**=" => Op::StarStarEq,
    "**" => Op::StarStar,
    "==" => Op::Eq,
    "!=" => Op::NotEq,
    "<=" => Op::LtEq,
    ">=" => Op::GtEq,
    "<<" => Op::Shl,
    ">>" => Op::Shr,
    "&&" => Op::And,
    "||" => Op::Or,
    "+=" => Op::PlusEq,
    "-=" => Op::MinusEq,
    "*=" => Op::StarEq,
    "/=" => Op::SlashEq,
    "%=" => Op::PercentEq,
    "&=" => Op::BitAndEq,
    "|=" => Op::BitOrEq,
    "^=" => Op::BitXorEq,
    ".." => Op::Range,
    "+" => Op::Plus,
    "-" => Op::Minus,
    "*" => Op::Star,
    "/" => Op::Slash,
    "%" => Op::Percent,
    "=" => Op::Assign,
    "<" => Op::Lt,
    ">" => Op::Gt,
    "!" => Op::Not,
    "&" => Op::BitAnd,
    "|" => Op::BitOr,
    "^" => Op::BitXor,
    "~" => Op::BitNot,
    "." => Op::Dot,
    ":" => Op::Colon,
    "?" => Op::Question,
    _ => return None,
  };
  Some(op)
}
