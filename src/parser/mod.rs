pub mod ast;

use std::collections::HashMap;

use crate::error::{LangError, LangResult};
use crate::lexer::stream::TokenStream;
use crate::lexer::token::{Kw, Name, Op, Token, TokenKind};
use ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Param, Program, Stmt, StmtKind, UnaryOp};

/// What the parser does when a statement fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
  /// Record the error, resynchronize at the next statement keyword and
  /// keep going. Used for whole-script diagnostics.
  Recover,
  /// Stop at the first error. Used for embedded parses where a partial
  /// tree is useless.
  Rethrow,
}

/// Recursive-descent parser over a [`TokenStream`].
pub struct Parser {
  stream: TokenStream,
  mode: ParseMode,
  errors: Vec<LangError>,
  /// Lambda parameter rename scopes, innermost last.
  manglers: Vec<HashMap<String, String>>,
  mangle_counter: usize,
}

impl Parser {
  pub fn new(stream: TokenStream, mode: ParseMode) -> Self {
    Self {
      stream,
      mode,
      errors: Vec::new(),
      manglers: Vec::new(),
      mangle_counter: 0,
    }
  }

  /// Parses the whole stream. In `Recover` mode the program holds every
  /// statement that parsed cleanly and `errors` holds the rest; in
  /// `Rethrow` mode parsing stops at the first error.
  pub fn parse(mut self) -> (Program, Vec<LangError>) {
    let mut program = Program::default();

    while !self.stream.is_at_end() {
      match self.statement() {
        Ok(stmt) => program.statements.push(stmt),
        Err(err) => {
          self.errors.push(err);
          if self.mode == ParseMode::Rethrow {
            break;
          }
          self.synchronize();
        }
      }
    }

    (program, self.errors)
  }

  /// Skips to the next statement keyword. Progress is guaranteed:
  /// keyword statements consume their keyword before they can fail, and
  /// all other failures leave the cursor on a non-keyword token.
  fn synchronize(&mut self) {
    while !self.stream.is_at_end() && !is_statement_keyword(self.stream.current()) {
      self.stream.advance();
    }
  }

  // ---- token helpers ----

  fn check_op(&self, op: Op) -> bool {
    self.stream.current().is_op(op)
  }

  fn check_kw(&self, kw: Kw) -> bool {
    self.stream.current().is_kw(kw)
  }

  fn match_op(&mut self, op: Op) -> Option<Token> {
    if self.check_op(op) {
      Some(self.stream.advance())
    } else {
      None
    }
  }

  fn match_kw(&mut self, kw: Kw) -> Option<Token> {
    if self.check_kw(kw) {
      Some(self.stream.advance())
    } else {
      None
    }
  }

  fn consume_op(&mut self, op: Op, what: &str) -> LangResult<Token> {
    match self.match_op(op) {
      Some(token) => Ok(token),
      None => Err(self.unexpected(what)),
    }
  }

  fn consume_kw(&mut self, kw: Kw, what: &str) -> LangResult<Token> {
    match self.match_kw(kw) {
      Some(token) => Ok(token),
      None => Err(self.unexpected(what)),
    }
  }

  fn consume_kind(&mut self, kind: TokenKind, what: &str) -> LangResult<Token> {
    if self.stream.current().kind == kind {
      Ok(self.stream.advance())
    } else {
      Err(self.unexpected(what))
    }
  }

  fn unexpected(&self, what: &str) -> LangError {
    let token = self.stream.current();
    let found = match token.kind {
      TokenKind::Eof => "end of input".to_string(),
      _ => format!("'{}'", token.text),
    };
    LangError::syntax(token, format!("expected {what}, found {found}"))
  }

  // ---- statements ----

  fn statement(&mut self) -> LangResult<Stmt> {
    let token = self.stream.current().clone();
    if token.kind == TokenKind::Error {
      self.stream.advance();
      return Err(LangError::syntax(
        &token,
        format!("malformed token '{}'", token.text),
      ));
    }

    match token.name {
      Name::Kw(Kw::Fn) => self.function_statement(),
      Name::Kw(Kw::Struct) => self.struct_statement(),
      Name::Kw(Kw::Const) => self.const_statement(),
      Name::Kw(Kw::If) => self.if_statement(),
      Name::Kw(Kw::While) => self.while_statement(),
      Name::Kw(Kw::For) => self.for_statement(),
      Name::Kw(Kw::Case) => self.case_statement(),
      Name::Kw(Kw::Try) => self.try_statement(),
      Name::Kw(Kw::Return) => self.return_statement(),
      Name::Kw(Kw::Break) => {
        self.stream.advance();
        Ok(Stmt::new(StmtKind::Break, token))
      }
      Name::Kw(Kw::Next) => {
        self.stream.advance();
        Ok(Stmt::new(StmtKind::Next, token))
      }
      Name::Kw(Kw::Exit) => self.exit_statement(),
      Name::Kw(Kw::Spawn) => self.spawn_statement(),
      _ => {
        let expr = self.expression()?;
        Ok(Stmt::new(StmtKind::Expr(expr), token))
      }
    }
  }

  /// Parses statements until one of `terminators` (not consumed).
  fn block(&mut self, terminators: &[Kw]) -> LangResult<Vec<Stmt>> {
    let mut body = Vec::new();
    loop {
      if self.stream.is_at_end() {
        return Err(self.unexpected("'end'"));
      }
      if terminators.iter().any(|kw| self.check_kw(*kw)) {
        return Ok(body);
      }
      body.push(self.statement()?);
    }
  }

  fn function_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Fn, "'fn'")?;
    let decl = self.function_decl()?;
    Ok(Stmt::new(StmtKind::Function(decl), token))
  }

  fn function_decl(&mut self) -> LangResult<FunctionDecl> {
    let name = self.consume_kind(TokenKind::Identifier, "function name")?;
    self.consume_kind(TokenKind::LParen, "'('")?;
    let params = self.parameter_list()?;
    let body = self.block(&[Kw::End])?;
    self.consume_kw(Kw::End, "'end'")?;
    Ok(FunctionDecl {
      name: name.text,
      params,
      body,
    })
  }

  /// Parses `name [: typename] [= default], ...` up to and including the
  /// closing parenthesis. Required parameters must precede defaulted ones.
  fn parameter_list(&mut self) -> LangResult<Vec<Param>> {
    let mut params = Vec::new();
    if self.stream.current().kind == TokenKind::RParen {
      self.stream.advance();
      return Ok(params);
    }

    loop {
      let name = self.consume_kind(TokenKind::Identifier, "parameter name")?;

      let mut type_hint = None;
      if self.match_op(Op::Colon).is_some() {
        let hint = self.consume_kind(TokenKind::TypeName, "type name")?;
        type_hint = Some(hint.text);
      }

      let mut default = None;
      if self.match_op(Op::Assign).is_some() {
        default = Some(self.expression()?);
      } else if params.iter().any(|p: &Param| p.default.is_some()) {
        return Err(LangError::syntax(
          &name,
          format!("required parameter '{}' after a defaulted one", name.text),
        ));
      }

      params.push(Param {
        name: name.text,
        type_hint,
        default,
      });

      if self.stream.current().kind == TokenKind::Comma {
        self.stream.advance();
        continue;
      }
      self.consume_kind(TokenKind::RParen, "')'")?;
      return Ok(params);
    }
  }

  fn struct_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Struct, "'struct'")?;
    let name = self.consume_kind(TokenKind::Identifier, "struct name")?;

    let mut methods = Vec::new();
    while !self.check_kw(Kw::End) {
      if self.stream.is_at_end() {
        return Err(self.unexpected("'end'"));
      }
      self.consume_kw(Kw::Fn, "'fn' or 'end'")?;
      methods.push(self.function_decl()?);
    }
    self.consume_kw(Kw::End, "'end'")?;

    Ok(Stmt::new(
      StmtKind::Struct {
        name: name.text,
        methods,
      },
      token,
    ))
  }

  fn const_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Const, "'const'")?;
    let name = self.consume_kind(TokenKind::Identifier, "constant name")?;
    self.consume_op(Op::Assign, "'='")?;
    let value = self.expression()?;
    Ok(Stmt::new(
      StmtKind::Const {
        name: name.text,
        value,
      },
      token,
    ))
  }

  fn if_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::If, "'if'")?;

    let mut branches = Vec::new();
    let condition = self.expression()?;
    let body = self.block(&[Kw::Elsif, Kw::Else, Kw::End])?;
    branches.push((condition, body));

    while self.match_kw(Kw::Elsif).is_some() {
      let condition = self.expression()?;
      let body = self.block(&[Kw::Elsif, Kw::Else, Kw::End])?;
      branches.push((condition, body));
    }

    let else_body = if self.match_kw(Kw::Else).is_some() {
      Some(self.block(&[Kw::End])?)
    } else {
      None
    };
    self.consume_kw(Kw::End, "'end'")?;

    Ok(Stmt::new(StmtKind::If { branches, else_body }, token))
  }

  fn while_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::While, "'while'")?;
    let condition = self.expression()?;
    let body = self.block(&[Kw::End])?;
    self.consume_kw(Kw::End, "'end'")?;
    Ok(Stmt::new(StmtKind::While { condition, body }, token))
  }

  fn for_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::For, "'for'")?;
    let var = self.consume_kind(TokenKind::Identifier, "loop variable")?;

    let index_var = if self.stream.current().kind == TokenKind::Comma {
      self.stream.advance();
      let index = self.consume_kind(TokenKind::Identifier, "index variable")?;
      Some(index.text)
    } else {
      None
    };

    self.consume_kw(Kw::In, "'in'")?;
    let iterable = self.expression()?;
    let body = self.block(&[Kw::End])?;
    self.consume_kw(Kw::End, "'end'")?;

    Ok(Stmt::new(
      StmtKind::For {
        var: var.text,
        index_var,
        iterable,
        body,
      },
      token,
    ))
  }

  fn case_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Case, "'case'")?;
    let subject = self.expression()?;

    let mut whens = Vec::new();
    while self.match_kw(Kw::When).is_some() {
      let mut candidates = vec![self.expression()?];
      while self.stream.current().kind == TokenKind::Comma {
        self.stream.advance();
        candidates.push(self.expression()?);
      }
      let body = self.block(&[Kw::When, Kw::Else, Kw::End])?;
      whens.push((candidates, body));
    }
    if whens.is_empty() {
      return Err(self.unexpected("'when'"));
    }

    let else_body = if self.match_kw(Kw::Else).is_some() {
      Some(self.block(&[Kw::End])?)
    } else {
      None
    };
    self.consume_kw(Kw::End, "'end'")?;

    Ok(Stmt::new(
      StmtKind::Case {
        subject,
        whens,
        else_body,
      },
      token,
    ))
  }

  fn try_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Try, "'try'")?;
    let body = self.block(&[Kw::Catch])?;
    self.consume_kw(Kw::Catch, "'catch'")?;

    let catch_var = if self.stream.current().kind == TokenKind::LParen {
      self.stream.advance();
      let var = self.consume_kind(TokenKind::Identifier, "catch variable")?;
      self.consume_kind(TokenKind::RParen, "')'")?;
      Some(var.text)
    } else if self.stream.current().kind == TokenKind::Identifier {
      Some(self.stream.advance().text)
    } else {
      None
    };

    let catch_body = self.block(&[Kw::End])?;
    self.consume_kw(Kw::End, "'end'")?;

    Ok(Stmt::new(
      StmtKind::Try {
        body,
        catch_var,
        catch_body,
      },
      token,
    ))
  }

  fn return_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Return, "'return'")?;
    let value = if can_start_expression(self.stream.current()) {
      Some(self.expression()?)
    } else {
      None
    };
    Ok(Stmt::new(StmtKind::Return(value), token))
  }

  fn exit_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Exit, "'exit'")?;
    let code = if self.stream.current().kind == TokenKind::LParen {
      self.stream.advance();
      let code = self.expression()?;
      self.consume_kind(TokenKind::RParen, "')'")?;
      Some(code)
    } else {
      None
    };
    Ok(Stmt::new(StmtKind::Exit(code), token))
  }

  fn spawn_statement(&mut self) -> LangResult<Stmt> {
    let token = self.consume_kw(Kw::Spawn, "'spawn'")?;
    let target = self.expression()?;
    match target.kind {
      ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
        Ok(Stmt::new(StmtKind::Spawn(target), token))
      }
      _ => Err(LangError::syntax(&token, "spawn requires a call")),
    }
  }

  // ---- expressions, loosest binding first ----

  fn expression(&mut self) -> LangResult<Expr> {
    self.ternary()
  }

  fn ternary(&mut self) -> LangResult<Expr> {
    let condition = self.assignment()?;
    if let Some(token) = self.match_op(Op::Question) {
      let then_branch = self.expression()?;
      self.consume_op(Op::Colon, "':'")?;
      let else_branch = self.expression()?;
      return Ok(Expr::new(
        ExprKind::Ternary {
          condition: Box::new(condition),
          then_branch: Box::new(then_branch),
          else_branch: Box::new(else_branch),
        },
        token,
      ));
    }
    Ok(condition)
  }

  fn assignment(&mut self) -> LangResult<Expr> {
    let target = self.range()?;

    if let Some(token) = self.match_op(Op::Assign) {
      self.require_assignable(&target, &token)?;
      let value = self.expression()?;
      return Ok(Expr::new(
        ExprKind::Assign {
          target: Box::new(target),
          value: Box::new(value),
        },
        token,
      ));
    }

    if let Some(op) = compound_assign_op(self.stream.current()) {
      let token = self.stream.advance();
      self.require_assignable(&target, &token)?;
      let value = self.expression()?;
      return Ok(Expr::new(
        ExprKind::CompoundAssign {
          target: Box::new(target),
          op,
          value: Box::new(value),
        },
        token,
      ));
    }

    Ok(target)
  }

  fn require_assignable(&self, target: &Expr, token: &Token) -> LangResult<()> {
    match target.kind {
      ExprKind::Identifier(_)
      | ExprKind::InstanceVar(_)
      | ExprKind::Index { .. }
      | ExprKind::Member { .. } => Ok(()),
      _ => Err(LangError::syntax(token, "invalid assignment target")),
    }
  }

  fn range(&mut self) -> LangResult<Expr> {
    let start = self.or_expr()?;
    if let Some(token) = self.match_op(Op::Range) {
      let end = self.or_expr()?;
      return Ok(Expr::new(
        ExprKind::Range {
          start: Box::new(start),
          end: Box::new(end),
        },
        token,
      ));
    }
    Ok(start)
  }

  fn or_expr(&mut self) -> LangResult<Expr> {
    self.binary_level(&[(Op::Or, BinaryOp::Or)], Self::and_expr)
  }

  fn and_expr(&mut self) -> LangResult<Expr> {
    self.binary_level(&[(Op::And, BinaryOp::And)], Self::bit_or)
  }

  fn bit_or(&mut self) -> LangResult<Expr> {
    self.binary_level(&[(Op::BitOr, BinaryOp::BitOr)], Self::bit_xor)
  }

  fn bit_xor(&mut self) -> LangResult<Expr> {
    self.binary_level(&[(Op::BitXor, BinaryOp::BitXor)], Self::bit_and)
  }

  fn bit_and(&mut self) -> LangResult<Expr> {
    self.binary_level(&[(Op::BitAnd, BinaryOp::BitAnd)], Self::equality)
  }

  fn equality(&mut self) -> LangResult<Expr> {
    self.binary_level(
      &[(Op::Eq, BinaryOp::Eq), (Op::NotEq, BinaryOp::NotEq)],
      Self::comparison,
    )
  }

  fn comparison(&mut self) -> LangResult<Expr> {
    self.binary_level(
      &[
        (Op::Lt, BinaryOp::Lt),
        (Op::LtEq, BinaryOp::LtEq),
        (Op::Gt, BinaryOp::Gt),
        (Op::GtEq, BinaryOp::GtEq),
      ],
      Self::shift,
    )
  }

  fn shift(&mut self) -> LangResult<Expr> {
    self.binary_level(
      &[
        (Op::Shl, BinaryOp::Shl),
        (Op::Shr, BinaryOp::Shr),
        (Op::UShr, BinaryOp::UShr),
      ],
      Self::additive,
    )
  }

  fn additive(&mut self) -> LangResult<Expr> {
    self.binary_level(
      &[(Op::Plus, BinaryOp::Add), (Op::Minus, BinaryOp::Sub)],
      Self::multiplicative,
    )
  }

  fn multiplicative(&mut self) -> LangResult<Expr> {
    self.binary_level(
      &[
        (Op::Star, BinaryOp::Mul),
        (Op::Slash, BinaryOp::Div),
        (Op::Percent, BinaryOp::Mod),
      ],
      Self::exponent,
    )
  }

  fn binary_level(
    &mut self,
    ops: &[(Op, BinaryOp)],
    next: fn(&mut Self) -> LangResult<Expr>,
  ) -> LangResult<Expr> {
    let mut left = next(self)?;
    'outer: loop {
      for (op, binop) in ops {
        if let Some(token) = self.match_op(*op) {
          let right = next(self)?;
          left = Expr::new(
            ExprKind::Binary {
              op: *binop,
              left: Box::new(left),
              right: Box::new(right),
            },
            token,
          );
          continue 'outer;
        }
      }
      return Ok(left);
    }
  }

  /// Exponentiation is right-associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
  fn exponent(&mut self) -> LangResult<Expr> {
    let base = self.unary()?;
    if let Some(token) = self.match_op(Op::StarStar) {
      let power = self.exponent()?;
      return Ok(Expr::new(
        ExprKind::Binary {
          op: BinaryOp::Pow,
          left: Box::new(base),
          right: Box::new(power),
        },
        token,
      ));
    }
    Ok(base)
  }

  fn unary(&mut self) -> LangResult<Expr> {
    let unop = match self.stream.current().name {
      Name::Op(Op::Minus) => Some(UnaryOp::Neg),
      Name::Op(Op::Not) => Some(UnaryOp::Not),
      Name::Op(Op::BitNot) => Some(UnaryOp::BitNot),
      _ => None,
    };
    if let Some(op) = unop {
      let token = self.stream.advance();
      let operand = self.unary()?;
      return Ok(Expr::new(
        ExprKind::Unary {
          op,
          operand: Box::new(operand),
        },
        token,
      ));
    }
    self.postfix()
  }

  fn postfix(&mut self) -> LangResult<Expr> {
    let mut expr = self.primary()?;

    loop {
      if self.stream.current().kind == TokenKind::LBracket {
        let token = self.stream.advance();
        expr = self.index_or_slice(expr, token)?;
      } else if self.check_op(Op::Dot) {
        let token = self.stream.advance();
        expr = self.member_access(expr, token)?;
      } else {
        return Ok(expr);
      }
    }
  }

  fn index_or_slice(&mut self, target: Expr, token: Token) -> LangResult<Expr> {
    // `[:b]`, `[:]`
    if self.match_op(Op::Colon).is_some() {
      let end = if self.stream.current().kind == TokenKind::RBracket {
        None
      } else {
        Some(Box::new(self.expression()?))
      };
      self.consume_kind(TokenKind::RBracket, "']'")?;
      return Ok(Expr::new(
        ExprKind::Slice {
          target: Box::new(target),
          start: None,
          end,
        },
        token,
      ));
    }

    let first = self.expression()?;

    // `[a:b]`, `[a:]`
    if self.match_op(Op::Colon).is_some() {
      let end = if self.stream.current().kind == TokenKind::RBracket {
        None
      } else {
        Some(Box::new(self.expression()?))
      };
      self.consume_kind(TokenKind::RBracket, "']'")?;
      return Ok(Expr::new(
        ExprKind::Slice {
          target: Box::new(target),
          start: Some(Box::new(first)),
          end,
        },
        token,
      ));
    }

    self.consume_kind(TokenKind::RBracket, "']'")?;
    Ok(Expr::new(
      ExprKind::Index {
        target: Box::new(target),
        index: Box::new(first),
      },
      token,
    ))
  }

  fn member_access(&mut self, target: Expr, dot: Token) -> LangResult<Expr> {
    let member = self.stream.current().clone();
    match member.kind {
      TokenKind::Builtin => {
        self.stream.advance();
        let id = match member.name {
          Name::Builtin(id) => id,
          _ => return Err(self.unexpected("method name")),
        };
        self.consume_kind(TokenKind::LParen, "'('")?;
        let args = self.argument_list()?;
        Ok(Expr::new(
          ExprKind::BuiltinCall {
            id,
            receiver: Some(Box::new(target)),
            args,
          },
          member,
        ))
      }
      TokenKind::Identifier => {
        self.stream.advance();
        if self.stream.current().kind == TokenKind::LParen {
          self.stream.advance();
          let args = self.argument_list()?;
          Ok(Expr::new(
            ExprKind::MethodCall {
              receiver: Box::new(target),
              name: member.text.clone(),
              args,
            },
            member,
          ))
        } else {
          Ok(Expr::new(
            ExprKind::Member {
              target: Box::new(target),
              name: member.text.clone(),
            },
            member,
          ))
        }
      }
      _ => Err(LangError::syntax(&dot, "expected member name after '.'")),
    }
  }

  /// Parses arguments up to and including the closing parenthesis.
  fn argument_list(&mut self) -> LangResult<Vec<Expr>> {
    let mut args = Vec::new();
    if self.stream.current().kind == TokenKind::RParen {
      self.stream.advance();
      return Ok(args);
    }
    loop {
      args.push(self.expression()?);
      if self.stream.current().kind == TokenKind::Comma {
        self.stream.advance();
        continue;
      }
      self.consume_kind(TokenKind::RParen, "')'")?;
      return Ok(args);
    }
  }

  fn primary(&mut self) -> LangResult<Expr> {
    let token = self.stream.current().clone();
    match token.kind {
      TokenKind::Int => {
        self.stream.advance();
        match &token.value {
          Some(crate::evaluator::value::Value::Int(n)) => {
            let n = *n;
            Ok(Expr::new(ExprKind::Int(n), token))
          }
          _ => Err(LangError::syntax(&token, "malformed integer literal")),
        }
      }
      TokenKind::Float => {
        self.stream.advance();
        match &token.value {
          Some(crate::evaluator::value::Value::Float(f)) => {
            let f = *f;
            Ok(Expr::new(ExprKind::Float(f), token))
          }
          _ => Err(LangError::syntax(&token, "malformed float literal")),
        }
      }
      TokenKind::String => {
        self.stream.advance();
        Ok(Expr::new(ExprKind::Str(token.text.clone()), token))
      }
      TokenKind::Boolean => {
        self.stream.advance();
        Ok(Expr::new(ExprKind::Bool(token.text == "true"), token))
      }
      TokenKind::Null => {
        self.stream.advance();
        Ok(Expr::new(ExprKind::Null, token))
      }
      TokenKind::Identifier => {
        self.stream.advance();
        if self.stream.current().kind == TokenKind::LParen {
          self.stream.advance();
          let args = self.argument_list()?;
          let name = self.resolve_name(&token.text);
          Ok(Expr::new(ExprKind::Call { name, args }, token))
        } else {
          let name = self.resolve_name(&token.text);
          Ok(Expr::new(ExprKind::Identifier(name), token))
        }
      }
      TokenKind::InstanceVar => {
        self.stream.advance();
        Ok(Expr::new(ExprKind::InstanceVar(token.text.clone()), token))
      }
      TokenKind::Builtin => {
        self.stream.advance();
        let id = match token.name {
          Name::Builtin(id) => id,
          _ => return Err(self.unexpected("builtin call")),
        };
        self.consume_kind(TokenKind::LParen, "'('")?;
        let args = self.argument_list()?;
        Ok(Expr::new(
          ExprKind::BuiltinCall {
            id,
            receiver: None,
            args,
          },
          token,
        ))
      }
      TokenKind::LParen => {
        self.stream.advance();
        let inner = self.expression()?;
        self.consume_kind(TokenKind::RParen, "')'")?;
        Ok(inner)
      }
      TokenKind::LBracket => self.list_literal(),
      TokenKind::LBrace => self.hashmap_literal(),
      TokenKind::Keyword if token.is_kw(Kw::This) => {
        self.stream.advance();
        Ok(Expr::new(ExprKind::This, token))
      }
      TokenKind::Keyword if token.is_kw(Kw::With) => self.lambda_literal(),
      TokenKind::Error => {
        self.stream.advance();
        Err(LangError::syntax(
          &token,
          format!("malformed token '{}'", token.text),
        ))
      }
      _ => Err(self.unexpected("an expression")),
    }
  }

  fn list_literal(&mut self) -> LangResult<Expr> {
    let token = self.consume_kind(TokenKind::LBracket, "'['")?;
    let mut items = Vec::new();
    if self.stream.current().kind == TokenKind::RBracket {
      self.stream.advance();
      return Ok(Expr::new(ExprKind::List(items), token));
    }
    loop {
      items.push(self.expression()?);
      if self.stream.current().kind == TokenKind::Comma {
        self.stream.advance();
        continue;
      }
      self.consume_kind(TokenKind::RBracket, "']'")?;
      return Ok(Expr::new(ExprKind::List(items), token));
    }
  }

  fn hashmap_literal(&mut self) -> LangResult<Expr> {
    let token = self.consume_kind(TokenKind::LBrace, "'{'")?;
    let mut pairs = Vec::new();
    if self.stream.current().kind == TokenKind::RBrace {
      self.stream.advance();
      return Ok(Expr::new(ExprKind::Hashmap(pairs), token));
    }
    loop {
      let key = self.expression()?;
      self.consume_op(Op::Colon, "':'")?;
      let value = self.expression()?;
      pairs.push((key, value));
      if self.stream.current().kind == TokenKind::Comma {
        self.stream.advance();
        continue;
      }
      self.consume_kind(TokenKind::RBrace, "'}'")?;
      return Ok(Expr::new(ExprKind::Hashmap(pairs), token));
    }
  }

  /// `with (a, b = 1) do ... end`. A lambda body runs in the caller's
  /// frame, so parameters are renamed to collision-proof spellings here
  /// and the body is parsed with that renaming active.
  fn lambda_literal(&mut self) -> LangResult<Expr> {
    let token = self.consume_kw(Kw::With, "'with'")?;
    self.consume_kind(TokenKind::LParen, "'('")?;
    let mut params = self.parameter_list()?;

    let mut renames = HashMap::new();
    for param in &mut params {
      self.mangle_counter += 1;
      let mangled = format!("{}#{}", param.name, self.mangle_counter);
      renames.insert(param.name.clone(), mangled.clone());
      param.name = mangled;
    }

    self.consume_kw(Kw::Do, "'do'")?;
    self.manglers.push(renames);
    let body = self.block(&[Kw::End]);
    self.manglers.pop();
    let body = body?;
    self.consume_kw(Kw::End, "'end'")?;

    self.mangle_counter += 1;
    let name = format!("lambda#{}", self.mangle_counter);
    Ok(Expr::new(
      ExprKind::Lambda(FunctionDecl { name, params, body }),
      token,
    ))
  }

  /// Applies the innermost lambda-parameter rename that knows `name`.
  fn resolve_name(&self, name: &str) -> String {
    for scope in self.manglers.iter().rev() {
      if let Some(mangled) = scope.get(name) {
        return mangled.clone();
      }
    }
    name.to_string()
  }
}

fn is_statement_keyword(token: &Token) -> bool {
  matches!(
    token.name,
    Name::Kw(Kw::Fn)
      | Name::Kw(Kw::Struct)
      | Name::Kw(Kw::Const)
      | Name::Kw(Kw::If)
      | Name::Kw(Kw::While)
      | Name::Kw(Kw::For)
      | Name::Kw(Kw::Case)
      | Name::Kw(Kw::Try)
      | Name::Kw(Kw::Return)
      | Name::Kw(Kw::Break)
      | Name::Kw(Kw::Next)
      | Name::Kw(Kw::Exit)
      | Name::Kw(Kw::Spawn)
  )
}

fn can_start_expression(token: &Token) -> bool {
  match token.kind {
    TokenKind::Int
    | TokenKind::Float
    | TokenKind::String
    | TokenKind::Boolean
    | TokenKind::Null
    | TokenKind::Identifier
    | TokenKind::InstanceVar
    | TokenKind::Builtin
    | TokenKind::LParen
    | TokenKind::LBracket
    | TokenKind::LBrace => true,
    _ => matches!(
      token.name,
      Name::Op(Op::Minus) | Name::Op(Op::Not) | Name::Op(Op::BitNot) | Name::Kw(Kw::This) | Name::Kw(Kw::With)
    ),
  }
}

fn compound_assign_op(token: &Token) -> Option<BinaryOp> {
  let op = match token.name {
    Name::Op(Op::PlusEq) => BinaryOp::Add,
    Name::Op(Op::MinusEq) => BinaryOp::Sub,
    Name::Op(Op::StarEq) => BinaryOp::Mul,
    Name::Op(Op::SlashEq) => BinaryOp::Div,
    Name::Op(Op::PercentEq) => BinaryOp::Mod,
    Name::Op(Op::StarStarEq) => BinaryOp::Pow,
    Name::Op(Op::ShlEq) => BinaryOp::Shl,
    Name::Op(Op::ShrEq) => BinaryOp::Shr,
    Name::Op(Op::UShrEq) => BinaryOp::UShr,
    Name::Op(Op::BitAndEq) => BinaryOp::BitAnd,
    Name::Op(Op::BitOrEq) => BinaryOp::BitOr,
    Name::Op(Op::BitXorEq) => BinaryOp::BitXor,
    _ => return None,
  };
  Some(op)
}
