use super::token::{Name, Token, TokenKind};

/// Forward matches further than this are treated as "not found" so a
/// speculative scan can never make parse time quadratic.
pub const MAX_LOOKAHEAD: usize = 10;

/// An addressable, peekable, rewindable token buffer.
#[derive(Debug, Clone)]
pub struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  pub fn new(tokens: Vec<Token>) -> Self {
    debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
    Self { tokens, pos: 0 }
  }

  pub fn current(&self) -> &Token {
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  /// Token `k` positions ahead of the cursor; clamps to the Eof token.
  pub fn peek(&self, k: usize) -> &Token {
    let idx = (self.pos + k).min(self.tokens.len() - 1);
    &self.tokens[idx]
  }

  /// Returns the current token and moves the cursor forward.
  pub fn advance(&mut self) -> Token {
    let token = self.current().clone();
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
    token
  }

  /// Steps the cursor back one token.
  pub fn rewind(&mut self) {
    self.pos = self.pos.saturating_sub(1);
  }

  /// Resets the cursor to the start of the stream.
  pub fn reset(&mut self) {
    self.pos = 0;
  }

  pub fn is_at_end(&self) -> bool {
    self.current().kind == TokenKind::Eof
  }

  /// Scans forward for an exact contiguous token-name sequence, starting
  /// at most `MAX_LOOKAHEAD` tokens from the cursor. Returns the offset
  /// of the first token of the match.
  pub fn look_ahead(&self, names: &[Name]) -> Option<usize> {
    if names.is_empty() {
      return Some(0);
    }
    for start in 0..MAX_LOOKAHEAD {
      if self.peek(start).kind == TokenKind::Eof {
        return None;
      }
      let matched = names
        .iter()
        .enumerate()
        .all(|(i, name)| self.peek(start + i).name == *name);
      if matched {
        return Some(start);
      }
    }
    None
  }
}
