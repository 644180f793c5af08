use kelp_lang::error::{ErrorKind, LangError};
use kelp_lang::{Config, Flow, Runner, Value};

fn eval(source: &str) -> Value {
  let runner = Runner::new(Config::default());
  match runner.run_source(source) {
    Ok(Flow::Normal(value)) => value,
    Ok(other) => panic!("unexpected flow: {other:?}"),
    Err(err) => panic!("unexpected error: {err}"),
  }
}

fn eval_err(source: &str) -> LangError {
  let runner = Runner::new(Config::default());
  match runner.run_source(source) {
    Err(err) => err,
    Ok(flow) => panic!("expected an error, got {flow:?}"),
  }
}

#[test]
fn arithmetic_and_widening() {
  assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
  assert_eq!(eval("7 / 2"), Value::Int(3));
  assert_eq!(eval("1 + 2.5"), Value::Float(3.5));
  assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
  assert_eq!(eval("7 % 3"), Value::Int(1));
  assert_eq!(eval("2 ** -1"), Value::Float(0.5));
}

#[test]
fn string_concatenation_coerces_either_side() {
  assert_eq!(eval("\"a\" + 1"), Value::String("a1".into()));
  assert_eq!(eval("1 + \"a\""), Value::String("1a".into()));
  assert_eq!(eval("\"v\" + 1.0"), Value::String("v1.0".into()));
}

#[test]
fn interpolation_behaves_like_concatenation() {
  assert_eq!(eval("x = 5\n\"v: ${x + 1}\""), Value::String("v: 6".into()));
  assert_eq!(eval("\"${2}\""), Value::String("2".into()));
}

#[test]
fn bitwise_and_shifts() {
  assert_eq!(eval("6 & 3"), Value::Int(2));
  assert_eq!(eval("6 | 3"), Value::Int(7));
  assert_eq!(eval("6 ^ 3"), Value::Int(5));
  assert_eq!(eval("1 << 4"), Value::Int(16));
  assert_eq!(eval("-8 >> 1"), Value::Int(-4));
  assert_eq!(eval("-1 >>> 60"), Value::Int(15));
  assert!(matches!(eval_err("1 << 99").kind, ErrorKind::Range(_)));
}

#[test]
fn comparisons_and_logic() {
  assert_eq!(eval("1 < 2 and 2 <= 2"), Value::Bool(true));
  assert_eq!(eval("\"a\" < \"b\""), Value::Bool(true));
  assert_eq!(eval("not null"), Value::Bool(true));
  // Short circuit: the right side would divide by zero.
  assert_eq!(eval("false and 1 / 0"), Value::Bool(false));
  assert_eq!(eval("true or 1 / 0"), Value::Bool(true));
}

#[test]
fn ternary_and_compound_assignment() {
  assert_eq!(eval("x = 1 > 0 ? \"pos\" : \"neg\"\nx"), Value::String("pos".into()));
  assert_eq!(eval("x = 10\nx += 5\nx"), Value::Int(15));
  assert_eq!(eval("x = 2\nx **= 3\nx"), Value::Int(8));
}

#[test]
fn while_mutations_are_visible_after_the_loop() {
  assert_eq!(eval("x = 0\nwhile x < 3\n  x = x + 1\nend\nx"), Value::Int(3));
}

#[test]
fn loop_locals_do_not_leak() {
  let source = "x = 0\nwhile x < 1\n  y = 5\n  x = x + 1\nend\ny";
  // `y` was born inside the loop body, so it reads as null afterwards.
  assert_eq!(eval(source), Value::Null);
}

#[test]
fn for_over_list_with_index() {
  let source = "total = 0\nfor v, i in [10, 20, 30]\n  total = total + v + i\nend\ntotal";
  assert_eq!(eval(source), Value::Int(63));
}

#[test]
fn for_over_range_string_and_hashmap() {
  assert_eq!(eval("t = 0\nfor i in 1..4\n  t = t + i\nend\nt"), Value::Int(10));
  assert_eq!(
    eval("s = \"\"\nfor c in \"abc\"\n  s = c + s\nend\ns"),
    Value::String("cba".into())
  );
  assert_eq!(
    eval("ks = \"\"\nfor k in {\"a\": 1, \"b\": 2}\n  ks = ks + k\nend\nks"),
    Value::String("ab".into())
  );
}

#[test]
fn break_exits_only_the_innermost_loop() {
  let source = "\
hits = 0
for i in 1..3
  for j in 1..3
    if j == 2
      break
    end
    hits = hits + 1
  end
end
hits";
  assert_eq!(eval(source), Value::Int(3));
}

#[test]
fn next_skips_an_iteration() {
  let source = "t = 0\nfor i in 1..5\n  if i % 2 == 0\n    next\n  end\n  t = t + i\nend\nt";
  assert_eq!(eval(source), Value::Int(9));
}

#[test]
fn break_outside_a_loop_is_an_error() {
  assert!(matches!(eval_err("break").kind, ErrorKind::InvalidContext(_)));
}

#[test]
fn lists_alias_until_cloned() {
  assert_eq!(eval("a = [1]\nb = a\nb.push(2)\na.size()"), Value::Int(2));
  assert_eq!(eval("a = [1]\nc = a.clone()\nc.push(9)\na.size()"), Value::Int(1));
}

#[test]
fn indexing_and_slicing() {
  assert_eq!(eval("[10, 20, 30][1]"), Value::Int(20));
  assert_eq!(eval("[10, 20, 30][-1]"), Value::Int(30));
  assert!(matches!(eval_err("[1][5]").kind, ErrorKind::Index(_)));
  assert_eq!(eval("\"hello\"[1]"), Value::String("e".into()));
  assert_eq!(eval("[1, 2, 3, 4][1:3].join(\",\")"), Value::String("2,3".into()));
  assert_eq!(eval("\"hello\"[:2]"), Value::String("he".into()));
  assert_eq!(eval("\"hello\"[-2:]"), Value::String("lo".into()));
  assert_eq!(eval("l = [1, 2]\nl[0] = 9\nl[0]"), Value::Int(9));
}

#[test]
fn hashmap_reads_and_writes() {
  assert_eq!(eval("h = {\"a\": 1}\nh[\"b\"] = 2\nh[\"b\"]"), Value::Int(2));
  assert_eq!(eval("{\"a\": 1}[\"missing\"]"), Value::Null);
  assert!(matches!(eval_err("{[1]: 2}").kind, ErrorKind::HashKey(_)));
  // Integral float keys collide with the equal integer.
  assert_eq!(eval("h = {1: \"one\"}\nh[1.0]"), Value::String("one".into()));
}

#[test]
fn functions_defaults_and_hints() {
  assert_eq!(eval("fn add(a, b = 10)\n  return a + b\nend\nadd(1)"), Value::Int(11));
  assert_eq!(eval("fn add(a, b = 10)\n  return a + b\nend\nadd(1, 2)"), Value::Int(3));
  assert!(matches!(
    eval_err("fn f(a)\nend\nf(1, 2)").kind,
    ErrorKind::ParameterCountMismatch(_)
  ));
  assert!(matches!(
    eval_err("fn f(a: integer)\n  return a\nend\nf(\"s\")").kind,
    ErrorKind::ParameterTypeMismatch(_)
  ));
  assert!(matches!(
    eval_err("nope(1)").kind,
    ErrorKind::FunctionUndefined(_)
  ));
}

#[test]
fn function_body_yields_its_last_value() {
  assert_eq!(eval("fn f()\n  41 + 1\nend\nf()"), Value::Int(42));
}

#[test]
fn call_sites_may_precede_definitions() {
  assert_eq!(eval("fn outer()\n  return inner()\nend\nr = outer()\nfn inner()\n  return 7\nend\nr"), Value::Int(7));
}

#[test]
fn later_definitions_override_earlier_ones() {
  assert_eq!(eval("fn f()\n  return 1\nend\nfn f()\n  return 2\nend\nf()"), Value::Int(2));
}

#[test]
fn lambdas_capture_by_value_snapshot() {
  assert_eq!(eval("f = with (a, b) do\n  a + b\nend\nf(2, 3)"), Value::Int(5));
  // Rebinding n after creation does not affect the snapshot.
  assert_eq!(eval("n = 10\nf = with (x) do\n  x + n\nend\nn = 99\nf(1)"), Value::Int(11));
  // A captured list still aliases.
  assert_eq!(
    eval("l = []\nf = with (x) do\n  l.push(x)\nend\nf(1)\nf(2)\nl.size()"),
    Value::Int(2)
  );
  // Aliasing the lambda itself works.
  assert_eq!(eval("f = with (x) do\n  x * 2\nend\ng = f\ng(4)"), Value::Int(8));
}

#[test]
fn lambda_params_shadow_without_clobbering() {
  let source = "a = 1\nf = with (a) do\n  a * 10\nend\nr = f(5)\nr + a";
  assert_eq!(eval(source), Value::Int(51));
}

#[test]
fn case_selects_first_match_without_fallthrough() {
  let source = "\
fn describe(v)
  case v
  when 1, 2
    return \"low\"
  when 3
    return \"three\"
  else
    return \"other\"
  end
end
describe(2) + describe(3) + describe(9)";
  assert_eq!(eval(source), Value::String("lowthreeother".into()));
}

#[test]
fn structs_construct_and_dispatch() {
  let source = "\
struct Point
  fn new(x, y)
    @x = x
    @y = y
  end
  fn sum()
    return @x + @y
  end
  fn scaled(k)
    return sum() * k
  end
end
p = Point.new(1, 2)
p.sum() + p.scaled(10) + p.x";
  assert_eq!(eval(source), Value::Int(34));
}

#[test]
fn method_on_null_is_a_null_object_error() {
  assert!(matches!(eval_err("x = null\nx.sum()").kind, ErrorKind::NullObject(_)));
}

#[test]
fn missing_method_is_unimplemented() {
  let source = "struct P\nend\np = P.new()\np.nope()";
  assert!(matches!(eval_err(source).kind, ErrorKind::UnimplementedMethod(_)));
}

#[test]
fn instance_var_outside_a_method_is_invalid_context() {
  assert!(matches!(eval_err("@x = 1").kind, ErrorKind::InvalidContext(_)));
}

#[test]
fn try_catch_binds_type_and_message() {
  let source = "try\n  x = 1 / 0\ncatch (e)\n  e[\"type\"]\nend";
  assert_eq!(eval(source), Value::String("DivideByZeroError".into()));

  let source = "r = \"ok\"\ntry\n  r = [1][9]\ncatch (e)\n  r = e[\"type\"]\nend\nr";
  assert_eq!(eval(source), Value::String("IndexError".into()));
}

#[test]
fn errors_propagate_out_of_calls_into_try() {
  let source = "\
fn boom()
  return 1 / 0
end
try
  boom()
catch (e)
  e[\"type\"]
end";
  assert_eq!(eval(source), Value::String("DivideByZeroError".into()));
}

#[test]
fn constants_enforce_case_and_immutability() {
  assert_eq!(eval("const MAX = 5\nMAX + 1"), Value::Int(6));
  assert!(matches!(eval_err("const bad = 1").kind, ErrorKind::IllegalName(_)));
  assert!(matches!(
    eval_err("const MAX = 5\nMAX = 6").kind,
    ErrorKind::IllegalName(_)
  ));
}

#[test]
fn exit_reaches_the_runner() {
  let runner = Runner::new(Config::default());
  assert_eq!(runner.run_source("exit(3)").unwrap(), Flow::Exit(3));
  assert_eq!(runner.run_source("exit").unwrap(), Flow::Exit(0));
}

#[test]
fn spawn_goes_through_the_scheduler_seam() {
  // The default scheduler accepts the spawn and yields null.
  assert_eq!(eval("fn f(a)\n  return a\nend\nspawn f(1)\n\"done\""), Value::String("done".into()));
  assert!(matches!(
    eval_err("spawn nope(1)").kind,
    ErrorKind::FunctionUndefined(_)
  ));
}

#[test]
fn recursion_limit_raises_stack_exhausted() {
  let mut config = Config::default();
  config.recursion_limit = 64;
  let runner = Runner::new(config);
  let err = runner
    .run_source("fn down(n)\n  return down(n + 1)\nend\ndown(0)")
    .unwrap_err();
  assert!(matches!(err.kind, ErrorKind::StackExhausted(_)));
}

#[test]
fn division_by_zero_and_overflow() {
  assert!(matches!(eval_err("1 / 0").kind, ErrorKind::DivideByZero(_)));
  assert!(matches!(eval_err("1 % 0").kind, ErrorKind::DivideByZero(_)));
  assert_eq!(eval("1.0 / 0.0"), Value::Float(f64::INFINITY));
  assert!(matches!(
    eval_err("9223372036854775807 + 1").kind,
    ErrorKind::Range(_)
  ));
}

#[test]
fn oversized_ranges_are_rejected() {
  assert!(matches!(eval_err("1..99999999999").kind, ErrorKind::Range(_)));
}

#[test]
fn builtin_string_and_list_helpers() {
  assert_eq!(eval("\" hi \".trim().upcase()"), Value::String("HI".into()));
  assert_eq!(eval("\"a,b,c\".split(\",\").size()"), Value::Int(3));
  assert_eq!(eval("[3, 1, 2].sort().join(\"-\")"), Value::String("1-2-3".into()));
  assert_eq!(eval("[1, 2, 3].reverse().first()"), Value::Int(3));
  assert_eq!(eval("{\"a\": 1, \"b\": 2}.keys().join(\",\")"), Value::String("a,b".into()));
  assert_eq!(eval("{\"a\": 1}.has_key(\"a\")"), Value::Bool(true));
  assert_eq!(eval("type(1.5)"), Value::String("float".into()));
  assert_eq!(eval("[1, 2].contains(2)"), Value::Bool(true));
  assert_eq!(eval("\"hello\".index_of(\"ll\")"), Value::Int(2));
}

#[test]
fn conversions_in_language() {
  assert_eq!(eval("\"ff\".to_integer(16)"), Value::Int(255));
  assert_eq!(eval("255 .to_string(\"x\")"), Value::String("ff".into()));
  assert_eq!(eval("\"2.5\".to_float() + 0.5"), Value::Float(3.0));
  assert_eq!(eval("3.9.to_integer()"), Value::Int(3));
  assert!(matches!(
    eval_err("\"zz\".to_integer()").kind,
    ErrorKind::Conversion(_)
  ));
}

#[test]
fn serialize_deserialize_round_trip_in_language() {
  let source = "l = [1, 2.5, \"x\", {\"k\": null}]\ndeserialize(l.serialize()) == l";
  assert_eq!(eval(source), Value::Bool(true));
}

#[test]
fn undefined_identifiers_read_as_null() {
  assert_eq!(eval("ghost"), Value::Null);
}

#[test]
fn shadowed_if_blocks_share_the_frame() {
  // if/else do not open a scope; assignments inside stay visible.
  assert_eq!(eval("if true\n  x = 1\nend\nx"), Value::Int(1));
}
