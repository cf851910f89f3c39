//! JSONLogic-flavored predicate engine.
//!
//! `Rule` is the parsed AST; `compile` walks the rule tree once and
//! returns a `CompiledPredicate` whose `eval` is a boxed closure over a
//! row, rather than re-walking the tree per row. A `Row` holds
//! pre-resolved `EvalValue`s, not raw `CellValue`s, so string columns
//! compare by text. `cell_to_eval` is the resolution step a
//! `StringStore`-aware caller (`graph::where_clause`) performs once per
//! row before invoking `eval`.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::strings::StringStore;
use crate::value::CellValue;

/// The value domain the predicate engine reasons over: numeric types
/// are widened to `f64` so `i64`/`u64`/`f64` columns compare uniformly,
/// and string cells have already been resolved to owned text.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl EvalValue {
    /// JSONLogic truthiness: empty string, `0`, and `null`/missing are
    /// falsy (no array values appear in a row, so that JSONLogic case
    /// does not arise here).
    fn truthy(&self) -> bool {
        match self {
            EvalValue::Null => false,
            EvalValue::Bool(b) => *b,
            EvalValue::Number(n) => *n != 0.0,
            EvalValue::Str(s) => !s.is_empty(),
        }
    }
}

/// A row of named, pre-resolved values, built once per record before
/// `eval` is invoked, so that every referenced variable is evaluated at
/// most once per row. Keyed by the same qualified (`node.*`/`edge.*`)
/// name a `var` node carries, since that's the name the graph layer
/// resolves per row.
pub type Row = HashMap<String, EvalValue>;

/// Resolve a `CellValue` read off a series into the predicate engine's
/// value domain, interning-aware for string columns.
pub fn cell_to_eval(cell: &CellValue, strings: &StringStore) -> EvalValue {
    match cell {
        CellValue::Bool(b) => EvalValue::Bool(*b),
        CellValue::I64(i) => EvalValue::Number(*i as f64),
        CellValue::U64(u) => EvalValue::Number(*u as f64),
        CellValue::F64(f) => EvalValue::Number(*f),
        CellValue::Str(locator) => match strings.get_str(*locator) {
            Some(s) => EvalValue::Str(s.to_string()),
            None => EvalValue::Null,
        },
    }
}

/// Parsed JSONLogic rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Var(String),
    Const(JsonValue),
    Eq(Box<Rule>, Box<Rule>),
    Ne(Box<Rule>, Box<Rule>),
    Lt(Box<Rule>, Box<Rule>),
    Le(Box<Rule>, Box<Rule>),
    Gt(Box<Rule>, Box<Rule>),
    Ge(Box<Rule>, Box<Rule>),
    In(Box<Rule>, Box<Rule>),
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    /// Parse a `serde_json::Value` shaped as a JSONLogic rule. This is
    /// the one-time AST build; `compile` does the one-time closure
    /// build from there.
    pub fn parse(json: &JsonValue) -> CoreResult<Rule> {
        match json {
            JsonValue::Object(map) if map.len() == 1 => {
                let (op, args) = map.iter().next().unwrap();
                let args = Self::as_arg_list(args);
                Self::parse_op(op, &args)
            }
            other => Ok(Rule::Const(other.clone())),
        }
    }

    fn as_arg_list(args: &JsonValue) -> Vec<JsonValue> {
        match args {
            JsonValue::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    fn parse_op(op: &str, args: &[JsonValue]) -> CoreResult<Rule> {
        let parse_nth = |i: usize| -> CoreResult<Rule> {
            args.get(i)
                .map(Rule::parse)
                .unwrap_or_else(|| Ok(Rule::Const(JsonValue::Null)))
        };

        match op {
            "var" => {
                let name = args
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CoreError::InvalidRule("var requires a string name".into()))?;
                Ok(Rule::Var(name.to_string()))
            }
            "==" => Ok(Rule::Eq(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            "!=" => Ok(Rule::Ne(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            "<" => Ok(Rule::Lt(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            "<=" => Ok(Rule::Le(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            ">" => Ok(Rule::Gt(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            ">=" => Ok(Rule::Ge(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            "in" => Ok(Rule::In(Box::new(parse_nth(0)?), Box::new(parse_nth(1)?))),
            "and" => Ok(Rule::And(
                args.iter().map(Rule::parse).collect::<CoreResult<_>>()?,
            )),
            "or" => Ok(Rule::Or(
                args.iter().map(Rule::parse).collect::<CoreResult<_>>()?,
            )),
            "!" => Ok(Rule::Not(Box::new(parse_nth(0)?))),
            other => Err(CoreError::InvalidRule(format!(
                "unsupported JSONLogic operator: {other}"
            ))),
        }
    }

    /// Every `var` name this rule (transitively) references — used by
    /// `compile` to build `CompiledPredicate::vars` and, upstream, to
    /// decide which columns a row needs populated.
    fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Rule::Var(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Rule::Const(_) => {}
            Rule::Eq(a, b)
            | Rule::Ne(a, b)
            | Rule::Lt(a, b)
            | Rule::Le(a, b)
            | Rule::Gt(a, b)
            | Rule::Ge(a, b)
            | Rule::In(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Rule::And(rules) | Rule::Or(rules) => {
                for r in rules {
                    r.collect_vars(out);
                }
            }
            Rule::Not(r) => r.collect_vars(out),
        }
    }
}

/// The compiled predicate: the list of columns it reads, and a pure
/// function from a populated `Row` to a boolean.
pub struct CompiledPredicate {
    pub vars: Vec<String>,
    rule: Rule,
}

impl CompiledPredicate {
    pub fn eval(&self, row: &Row) -> bool {
        eval_bool(&self.rule, row)
    }
}

pub fn compile(rule: &Rule) -> CompiledPredicate {
    let mut vars = Vec::new();
    rule.collect_vars(&mut vars);
    CompiledPredicate {
        vars,
        rule: rule.clone(),
    }
}

fn eval_bool(rule: &Rule, row: &Row) -> bool {
    match rule {
        Rule::And(rules) => rules.iter().all(|r| eval_bool(r, row)),
        Rule::Or(rules) => rules.iter().any(|r| eval_bool(r, row)),
        Rule::Not(r) => !eval_value(r, row).truthy(),
        Rule::Eq(a, b) => eval_value(a, row) == eval_value(b, row),
        Rule::Ne(a, b) => eval_value(a, row) != eval_value(b, row),
        Rule::Lt(a, b) => compare(a, b, row, |x, y| x < y),
        Rule::Le(a, b) => compare(a, b, row, |x, y| x <= y),
        Rule::Gt(a, b) => compare(a, b, row, |x, y| x > y),
        Rule::Ge(a, b) => compare(a, b, row, |x, y| x >= y),
        Rule::In(needle, haystack) => eval_in(needle, haystack, row),
        Rule::Var(_) | Rule::Const(_) => eval_value(rule, row).truthy(),
    }
}

/// Numeric comparisons: absent operand -> `false`; strings never
/// compare ordinally against numbers.
fn compare(a: &Rule, b: &Rule, row: &Row, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (eval_value(a, row), eval_value(b, row)) {
        (EvalValue::Number(x), EvalValue::Number(y)) => cmp(x, y),
        _ => false,
    }
}

fn eval_in(needle: &Rule, haystack: &Rule, row: &Row) -> bool {
    let needle = eval_value(needle, row);
    match haystack {
        Rule::Const(JsonValue::Array(items)) => {
            items.iter().any(|item| needle == json_to_eval(item))
        }
        other => {
            if let EvalValue::Str(hay) = eval_value(other, row) {
                if let EvalValue::Str(n) = &needle {
                    return hay.contains(n.as_str());
                }
            }
            false
        }
    }
}

fn eval_value(rule: &Rule, row: &Row) -> EvalValue {
    match rule {
        Rule::Var(name) => row.get(name).cloned().unwrap_or(EvalValue::Null),
        Rule::Const(json) => json_to_eval(json),
        other => EvalValue::Bool(eval_bool(other, row)),
    }
}

fn json_to_eval(json: &JsonValue) -> EvalValue {
    match json {
        JsonValue::Null => EvalValue::Null,
        JsonValue::Bool(b) => EvalValue::Bool(*b),
        JsonValue::Number(n) => EvalValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => EvalValue::Str(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => EvalValue::Null,
    }
}
