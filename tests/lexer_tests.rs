use kelp_lang::lexer::token::{Kw, Name, Op, Token, TokenKind};
use kelp_lang::lexer::Lexer;
use kelp_lang::Value;

fn lex(source: &str) -> Vec<Token> {
  let mut stream = Lexer::new(source, 0).tokenize();
  let mut tokens = Vec::new();
  loop {
    let token = stream.advance();
    let done = token.kind == TokenKind::Eof;
    tokens.push(token);
    if done {
      return tokens;
    }
  }
}

fn kinds(source: &str) -> Vec<TokenKind> {
  lex(source).iter().map(|t| t.kind).collect()
}

#[test]
fn always_ends_with_eof() {
  assert_eq!(lex("").last().unwrap().kind, TokenKind::Eof);
  assert_eq!(lex("x + 1").last().unwrap().kind, TokenKind::Eof);
  assert_eq!(lex("\"unterminated").last().unwrap().kind, TokenKind::Eof);
}

#[test]
fn integer_literals_in_every_base() {
  let cases = [
    ("42", 42),
    ("1_000_000", 1_000_000),
    ("0x1f", 31),
    ("0X1F", 31),
    ("0b101", 5),
    ("0o17", 15),
  ];
  for (source, expected) in cases {
    let tokens = lex(source);
    assert_eq!(tokens[0].kind, TokenKind::Int, "lexing {source}");
    assert_eq!(tokens[0].value, Some(Value::Int(expected)), "lexing {source}");
  }
}

#[test]
fn float_literals_with_exponents() {
  let tokens = lex("1.5e3");
  assert_eq!(tokens[0].kind, TokenKind::Float);
  assert_eq!(tokens[0].value, Some(Value::Float(1500.0)));

  let tokens = lex("2.25");
  assert_eq!(tokens[0].value, Some(Value::Float(2.25)));
}

#[test]
fn malformed_numbers_become_error_tokens() {
  let tokens = lex("1.2.3");
  assert_eq!(tokens[0].kind, TokenKind::Error);
  assert_eq!(tokens[0].text, "1.2.3");

  let tokens = lex("1e2e3");
  assert_eq!(tokens[0].kind, TokenKind::Error);

  // Radix prefix with no digits.
  let tokens = lex("0x");
  assert_eq!(tokens[0].kind, TokenKind::Error);

  // Integer literal overflow.
  let tokens = lex("99999999999999999999999");
  assert_eq!(tokens[0].kind, TokenKind::Error);
}

#[test]
fn dot_dot_is_a_range_not_a_float() {
  let tokens = lex("1..5");
  assert_eq!(tokens[0].kind, TokenKind::Int);
  assert!(tokens[1].is_op(Op::Range));
  assert_eq!(tokens[2].kind, TokenKind::Int);
}

#[test]
fn greedy_operator_matching() {
  let tokens = lex(">>>=");
  assert!(tokens[0].is_op(Op::UShrEq));

  let tokens = lex(">>>");
  assert!(tokens[0].is_op(Op::UShr));

  let tokens = lex(">>=");
  assert!(tokens[0].is_op(Op::ShrEq));

  // Adjacent operators split at the longest match.
  let tokens = lex("a<<=b");
  assert!(tokens[1].is_op(Op::ShlEq));
}

#[test]
fn word_classification_precedence() {
  assert!(lex("if")[0].is_kw(Kw::If));
  assert!(lex("while")[0].is_kw(Kw::While));
  assert_eq!(lex("integer")[0].kind, TokenKind::TypeName);
  assert!(lex("and")[0].is_op(Op::And));
  assert!(lex("not")[0].is_op(Op::Not));
  assert_eq!(lex("true")[0].kind, TokenKind::Boolean);
  assert_eq!(lex("null")[0].kind, TokenKind::Null);
  assert!(lex("with")[0].is_kw(Kw::With));
  assert_eq!(lex("print")[0].kind, TokenKind::Builtin);
  assert_eq!(lex("push")[0].kind, TokenKind::Builtin);
  assert_eq!(lex("whale")[0].kind, TokenKind::Identifier);
}

#[test]
fn string_escapes_decode() {
  let tokens = lex(r#""a\tb\n\"q\"""#);
  assert_eq!(tokens[0].kind, TokenKind::String);
  assert_eq!(tokens[0].text, "a\tb\n\"q\"");
}

#[test]
fn unknown_escape_is_kept_literally() {
  let tokens = lex(r#""a\zb""#);
  assert_eq!(tokens[0].text, "a\\zb");
}

#[test]
fn interpolation_splices_into_concatenation() {
  // "a${x}b" lexes exactly like "a" + ( x ) + "b".
  let tokens = lex(r#""a${x}b""#);
  let expected = [
    TokenKind::String,
    TokenKind::Operator, // +
    TokenKind::LParen,
    TokenKind::Identifier,
    TokenKind::RParen,
    TokenKind::Operator, // +
    TokenKind::String,
    TokenKind::Eof,
  ];
  let got: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
  assert_eq!(got, expected);
  assert_eq!(tokens[0].text, "a");
  assert_eq!(tokens[3].text, "x");
  assert_eq!(tokens[6].text, "b");
}

#[test]
fn interpolation_tracks_brace_depth() {
  let tokens = lex(r#""${ {"k": 1} }""#);
  // The inner hashmap braces must not close the interpolation.
  assert!(tokens.iter().any(|t| t.kind == TokenKind::LBrace));
  assert!(tokens.iter().any(|t| t.kind == TokenKind::RBrace));
  assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
}

#[test]
fn leading_interpolation_keeps_empty_segment() {
  // "${x}" still starts with an (empty) string so + coerces to string.
  let tokens = lex(r#""${x}""#);
  assert_eq!(tokens[0].kind, TokenKind::String);
  assert_eq!(tokens[0].text, "");
  assert!(tokens[1].is_op(Op::Plus));
}

#[test]
fn comments_and_whitespace_are_skipped() {
  let got = kinds("x # a comment\ny");
  assert_eq!(
    got,
    vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
  );
}

#[test]
fn instance_vars() {
  let tokens = lex("@count");
  assert_eq!(tokens[0].kind, TokenKind::InstanceVar);
  assert_eq!(tokens[0].text, "count");

  let tokens = lex("@ ");
  assert_eq!(tokens[0].kind, TokenKind::Error);
}

#[test]
fn unknown_characters_become_error_tokens() {
  let tokens = lex("x ` y");
  assert_eq!(tokens[1].kind, TokenKind::Error);
  assert_eq!(tokens[1].text, "`");
  // The scan continues afterwards.
  assert_eq!(tokens[2].kind, TokenKind::Identifier);
}

#[test]
fn spans_track_lines_and_columns() {
  let tokens = lex("x\n  y");
  assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
  assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
}

#[test]
fn name_carries_fine_grained_identity() {
  let tokens = lex("a or b");
  assert_eq!(tokens[1].name, Name::Op(Op::Or));
}
