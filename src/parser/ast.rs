//! Syntax tree produced by the parser. Every node keeps the token it
//! started at so runtime errors can point back into the source.

use crate::evaluator::builtins::BuiltinId;
use crate::lexer::token::Token;

#[derive(Debug, Clone, Default)]
pub struct Program {
  pub statements: Vec<Stmt>,
}

impl Program {
  /// Appends another parsed stream; later declarations shadow earlier
  /// ones at registration time.
  pub fn extend(&mut self, other: Program) {
    self.statements.extend(other.statements);
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
  pub kind: StmtKind,
  pub token: Token,
}

impl Stmt {
  pub fn new(kind: StmtKind, token: Token) -> Self {
    Self { kind, token }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
  Expr(Expr),
  Function(FunctionDecl),
  Struct {
    name: String,
    methods: Vec<FunctionDecl>,
  },
  Const {
    name: String,
    value: Expr,
  },
  If {
    /// Condition/body pairs: the `if` arm followed by each `elsif`.
    branches: Vec<(Expr, Vec<Stmt>)>,
    else_body: Option<Vec<Stmt>>,
  },
  While {
    condition: Expr,
    body: Vec<Stmt>,
  },
  For {
    var: String,
    index_var: Option<String>,
    iterable: Expr,
    body: Vec<Stmt>,
  },
  Case {
    subject: Expr,
    /// Each `when` arm may carry several comma-separated candidates.
    whens: Vec<(Vec<Expr>, Vec<Stmt>)>,
    else_body: Option<Vec<Stmt>>,
  },
  Try {
    body: Vec<Stmt>,
    catch_var: Option<String>,
    catch_body: Vec<Stmt>,
  },
  Return(Option<Expr>),
  Break,
  Next,
  Exit(Option<Expr>),
  Spawn(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
  pub kind: ExprKind,
  pub token: Token,
}

impl Expr {
  pub fn new(kind: ExprKind, token: Token) -> Self {
    Self { kind, token }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  Int(i64),
  Float(f64),
  Bool(bool),
  Str(String),
  Null,

  Identifier(String),
  InstanceVar(String),
  This,

  List(Vec<Expr>),
  Hashmap(Vec<(Expr, Expr)>),
  Range {
    start: Box<Expr>,
    end: Box<Expr>,
  },

  Binary {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Ternary {
    condition: Box<Expr>,
    then_branch: Box<Expr>,
    else_branch: Box<Expr>,
  },

  Assign {
    target: Box<Expr>,
    value: Box<Expr>,
  },
  CompoundAssign {
    target: Box<Expr>,
    op: BinaryOp,
    value: Box<Expr>,
  },

  Index {
    target: Box<Expr>,
    index: Box<Expr>,
  },
  Slice {
    target: Box<Expr>,
    start: Option<Box<Expr>>,
    end: Option<Box<Expr>>,
  },
  Member {
    target: Box<Expr>,
    name: String,
  },

  Call {
    name: String,
    args: Vec<Expr>,
  },
  MethodCall {
    receiver: Box<Expr>,
    name: String,
    args: Vec<Expr>,
  },
  BuiltinCall {
    id: BuiltinId,
    receiver: Option<Box<Expr>>,
    args: Vec<Expr>,
  },

  Lambda(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
  pub name: String,
  pub params: Vec<Param>,
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub name: String,
  pub type_hint: Option<String>,
  pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Pow,

  Eq,
  NotEq,
  Lt,
  LtEq,
  Gt,
  GtEq,

  And,
  Or,

  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
  BitNot,
}
