pub mod stream;
pub mod token;

use crate::evaluator::value::Value;
use stream::TokenStream;
use token::{classify_word, lookup_operator, Name, Op, Span, Token, TokenKind};

/// Longest operator the greedy scan will attempt (`>>>=`).
const MAX_OPERATOR_LEN: usize = 4;

/// Single-pass lexer. Malformed input never aborts the scan: it becomes
/// an `Error` token for the parser to reject with a position.
pub struct Lexer {
  input: Vec<char>,
  position: usize,
  line: u32,
  column: u32,
  file_id: u32,
}

impl Lexer {
  pub fn new(input: &str, file_id: u32) -> Self {
    Self {
      input: input.chars().collect(),
      position: 0,
      line: 1,
      column: 1,
      file_id,
    }
  }

  fn current_char(&self) -> Option<char> {
    self.input.get(self.position).copied()
  }

  fn peek_char(&self) -> Option<char> {
    self.input.get(self.position + 1).copied()
  }

  fn advance(&mut self) -> Option<char> {
    let ch = self.current_char()?;
    self.position += 1;
    if ch == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(ch)
  }

  fn span(&self) -> Span {
    Span::new(self.file_id, self.line, self.column)
  }

  fn skip_whitespace_and_comments(&mut self) {
    while let Some(ch) = self.current_char() {
      if ch.is_whitespace() {
        self.advance();
      } else if ch == '#' {
        while self.current_char().is_some() && self.current_char() != Some('\n') {
          self.advance();
        }
      } else {
        break;
      }
    }
  }

  /// Lexes the whole input. The result always ends with an `Eof` token.
  pub fn tokenize(&mut self) -> TokenStream {
    let mut out = Vec::new();

    loop {
      self.skip_whitespace_and_comments();

      let span = self.span();
      match self.current_char() {
        None => {
          out.push(Token::eof(span));
          break;
        }
        Some(ch) if ch.is_ascii_digit() => out.push(self.read_number()),
        Some('"') => self.read_string(&mut out),
        Some(ch) if ch.is_alphabetic() || ch == '_' => out.push(self.read_word()),
        Some('@') => out.push(self.read_instance_var()),
        Some('(') => {
          self.advance();
          out.push(Token::new(TokenKind::LParen, Name::None, span, "("));
        }
        Some(')') => {
          self.advance();
          out.push(Token::new(TokenKind::RParen, Name::None, span, ")"));
        }
        Some('[') => {
          self.advance();
          out.push(Token::new(TokenKind::LBracket, Name::None, span, "["));
        }
        Some(']') => {
          self.advance();
          out.push(Token::new(TokenKind::RBracket, Name::None, span, "]"));
        }
        Some('{') => {
          self.advance();
          out.push(Token::new(TokenKind::LBrace, Name::None, span, "{"));
        }
        Some('}') => {
          self.advance();
          out.push(Token::new(TokenKind::RBrace, Name::None, span, "}"));
        }
        Some(',') => {
          self.advance();
          out.push(Token::new(TokenKind::Comma, Name::None, span, ","));
        }
        Some(_) => out.push(self.read_operator()),
      }
    }

    TokenStream::new(out)
  }

  fn read_number(&mut self) -> Token {
    let span = self.span();

    if self.current_char() == Some('0') {
      match self.peek_char() {
        Some('x') | Some('X') => return self.read_radix_number(span, 16),
        Some('b') | Some('B') => return self.read_radix_number(span, 2),
        Some('o') | Some('O') => return self.read_radix_number(span, 8),
        _ => {}
      }
    }

    let mut text = String::new();
    let mut dots = 0usize;
    let mut exponents = 0usize;

    while let Some(ch) = self.current_char() {
      if ch.is_ascii_digit() {
        text.push(ch);
        self.advance();
      } else if ch == '_' {
        self.advance();
      } else if ch == '.' && self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        dots += 1;
        text.push(ch);
        self.advance();
      } else if ch == 'e' || ch == 'E' {
        let mut lookahead = self.position + 1;
        if matches!(self.input.get(lookahead), Some('+') | Some('-')) {
          lookahead += 1;
        }
        if !matches!(self.input.get(lookahead), Some(c) if c.is_ascii_digit()) {
          break;
        }
        exponents += 1;
        text.push(ch);
        self.advance();
        if let Some(sign @ ('+' | '-')) = self.current_char() {
          text.push(sign);
          self.advance();
        }
      } else {
        break;
      }
    }

    if dots > 1 || exponents > 1 {
      return Token::new(TokenKind::Error, Name::None, span, text);
    }

    if dots == 0 && exponents == 0 {
      match text.parse::<i64>() {
        Ok(n) => Token::with_value(TokenKind::Int, Name::None, span, text, Value::Int(n)),
        Err(_) => Token::new(TokenKind::Error, Name::None, span, text),
      }
    } else {
      match text.parse::<f64>() {
        Ok(f) => Token::with_value(TokenKind::Float, Name::None, span, text, Value::Float(f)),
        Err(_) => Token::new(TokenKind::Error, Name::None, span, text),
      }
    }
  }

  fn read_radix_number(&mut self, span: Span, radix: u32) -> Token {
    let mut text = String::new();
    text.push(self.advance().unwrap_or('0'));
    text.push(self.advance().unwrap_or('x'));

    let mut digits = String::new();
    while let Some(ch) = self.current_char() {
      if ch.is_digit(radix) {
        digits.push(ch);
        text.push(ch);
        self.advance();
      } else if ch == '_' {
        self.advance();
      } else {
        break;
      }
    }

    if digits.is_empty() {
      return Token::new(TokenKind::Error, Name::None, span, text);
    }

    match i64::from_str_radix(&digits, radix) {
      Ok(n) => Token::with_value(TokenKind::Int, Name::None, span, text, Value::Int(n)),
      Err(_) => Token::new(TokenKind::Error, Name::None, span, text),
    }
  }

  /// Reads a string literal. Interpolation splices the expression tokens
  /// into the output wrapped in parentheses and joined to adjacent
  /// literal segments with `+`, so `"a${x}b"` lexes exactly like
  /// `"a" + (x) + "b"`.
  fn read_string(&mut self, out: &mut Vec<Token>) {
    let start = self.span();
    self.advance(); // opening quote

    let mut literal = String::new();
    let mut emitted_any = false;

    loop {
      match self.current_char() {
        None => break,
        Some('"') => {
          self.advance();
          break;
        }
        Some('\\') => {
          self.advance();
          match self.current_char() {
            Some('n') => literal.push('\n'),
            Some('r') => literal.push('\r'),
            Some('t') => literal.push('\t'),
            Some('\\') => literal.push('\\'),
            Some('b') => literal.push('\u{0008}'),
            Some('f') => literal.push('\u{000C}'),
            Some('"') => literal.push('"'),
            Some(other) => {
              literal.push('\\');
              literal.push(other);
            }
            None => {
              // Trailing escape at end of input is preserved literally.
              literal.push('\\');
              break;
            }
          }
          self.advance();
        }
        Some('$') if self.peek_char() == Some('{') => {
          let inner_span = self.span();
          self.advance(); // $
          self.advance(); // {

          let mut inner = String::new();
          let mut depth = 1usize;
          while let Some(ch) = self.current_char() {
            if ch == '{' {
              depth += 1;
            } else if ch == '}' {
              depth -= 1;
              if depth == 0 {
                self.advance();
                break;
              }
            }
            inner.push(ch);
            self.advance();
          }

          if !literal.is_empty() || !emitted_any {
            self.emit_literal_segment(out, start, &mut literal, emitted_any);
            emitted_any = true;
          }

          out.push(Token::new(
            TokenKind::Operator,
            Name::Op(Op::Plus),
            inner_span,
            "+",
          ));
          out.push(Token::new(TokenKind::LParen, Name::None, inner_span, "("));

          let mut sub = Lexer::new(&inner, self.file_id);
          sub.line = inner_span.line;
          sub.column = inner_span.column;
          let mut sub_stream = sub.tokenize();
          while !sub_stream.is_at_end() {
            out.push(sub_stream.advance());
          }

          out.push(Token::new(TokenKind::RParen, Name::None, inner_span, ")"));
        }
        Some(ch) => {
          literal.push(ch);
          self.advance();
        }
      }
    }

    if !literal.is_empty() || !emitted_any {
      self.emit_literal_segment(out, start, &mut literal, emitted_any);
    }
  }

  fn emit_literal_segment(
    &self,
    out: &mut Vec<Token>,
    span: Span,
    literal: &mut String,
    emitted_any: bool,
  ) {
    if emitted_any {
      out.push(Token::new(TokenKind::Operator, Name::Op(Op::Plus), span, "+"));
    }
    let text = std::mem::take(literal);
    out.push(Token::with_value(
      TokenKind::String,
      Name::None,
      span,
      text.clone(),
      Value::String(text),
    ));
  }

  fn read_word(&mut self) -> Token {
    let span = self.span();
    let mut word = String::new();
    while let Some(ch) = self.current_char() {
      if ch.is_alphanumeric() || ch == '_' {
        word.push(ch);
        self.advance();
      } else {
        break;
      }
    }

    let (kind, name) = classify_word(&word);
    match kind {
      TokenKind::Boolean => {
        let value = Value::Bool(word == "true");
        Token::with_value(kind, name, span, word, value)
      }
      TokenKind::Null => Token::with_value(kind, name, span, word, Value::Null),
      _ => Token::new(kind, name, span, word),
    }
  }

  fn read_instance_var(&mut self) -> Token {
    let span = self.span();
    self.advance(); // @

    let mut name = String::new();
    while let Some(ch) = self.current_char() {
      if ch.is_alphanumeric() || ch == '_' {
        name.push(ch);
        self.advance();
      } else {
        break;
      }
    }

    if name.is_empty() {
      Token::new(TokenKind::Error, Name::None, span, "@")
    } else {
      Token::new(TokenKind::InstanceVar, Name::None, span, name)
    }
  }

  /// Builds multi-character operators with bounded greedy lookahead:
  /// the longest of the next four characters that names an operator wins.
  fn read_operator(&mut self) -> Token {
    let span = self.span();

    let mut candidate = String::new();
    for k in 0..MAX_OPERATOR_LEN {
      match self.input.get(self.position + k) {
        Some(ch) => candidate.push(*ch),
        None => break,
      }
    }

    while !candidate.is_empty() {
      if let Some(op) = lookup_operator(&candidate) {
        for _ in 0..candidate.len() {
          self.advance();
        }
        return Token::new(TokenKind::Operator, Name::Op(op), span, candidate);
      }
      candidate.pop();
    }

    let ch = self.advance().unwrap_or('\0');
    Token::new(TokenKind::Error, Name::None, span, ch.to_string())
  }
}
