//! Expression evaluation
//!
//! Leaves evaluate to the raw RDF term; operators interpret terms as
//! numbers, booleans or strings on demand. Simple literals whose lexical form
//! is a number compare numerically, so data loaded from untyped sources
//! (`"25"`) still satisfies `FILTER(?age > 18)`.
//!
//! Every failure is a [`SparqlError::TypeMismatch`]; the caller decides what
//! an error means (a filter treats it as false, a projection leaves the
//! variable unbound).

use super::algebra::{BinaryOp, Builtin, Expression, UnaryOp};
use super::bindings::TermSource;
use super::{SparqlError, SparqlResult};
use crate::rdf::{
    Literal, NamedNode, RdfTerm, RDF_NS, XSD_BOOLEAN, XSD_DECIMAL, XSD_DOUBLE, XSD_NS,
    XSD_STRING,
};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A term read from the bindings or written as a constant
    Term(RdfTerm),
    Integer(i64),
    Decimal(f64),
    Double(f64),
    Boolean(bool),
    String {
        value: String,
        language: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Numeric {
    fn to_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Decimal(d) | Numeric::Double(d) => d,
        }
    }

    fn compare(self, other: Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Numeric::Integer(i) => Value::Integer(i),
            Numeric::Decimal(d) => Value::Decimal(d),
            Numeric::Double(d) => Value::Double(d),
        }
    }
}

fn type_error(message: impl Into<String>) -> SparqlError {
    SparqlError::TypeMismatch(message.into())
}

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "nonPositiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

fn is_number_text(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    !body.is_empty()
        && body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

fn parse_untyped_number(text: &str) -> Option<Numeric> {
    if !is_number_text(text) {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Numeric::Integer(i));
    }
    let value = text.parse::<f64>().ok()?;
    if text.contains(['e', 'E']) {
        Some(Numeric::Double(value))
    } else {
        Some(Numeric::Decimal(value))
    }
}

fn literal_numeric(literal: &Literal) -> Option<Numeric> {
    let lexical = literal.value().trim();
    let datatype = literal.datatype();
    match datatype.strip_prefix(XSD_NS) {
        Some(local) if INTEGER_TYPES.contains(&local) => lexical.parse().ok().map(Numeric::Integer),
        Some("decimal") => lexical.parse().ok().map(Numeric::Decimal),
        Some("double") | Some("float") => match lexical {
            "INF" | "+INF" => Some(Numeric::Double(f64::INFINITY)),
            "-INF" => Some(Numeric::Double(f64::NEG_INFINITY)),
            "NaN" => Some(Numeric::Double(f64::NAN)),
            _ => lexical.parse().ok().map(Numeric::Double),
        },
        Some("string") if literal.language().is_none() => parse_untyped_number(lexical),
        _ => None,
    }
}

fn format_decimal(d: f64) -> String {
    if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        (if d > 0.0 { "INF" } else { "-INF" }).to_string()
    } else {
        format!("{:E}", d)
    }
}

fn typed(lexical: String, datatype: &str) -> RdfTerm {
    match NamedNode::new(datatype) {
        Ok(dt) => Literal::new_typed_literal(lexical, dt).into(),
        Err(_) => Literal::new_simple_literal(lexical).into(),
    }
}

impl Value {
    fn numeric(&self) -> Option<Numeric> {
        match self {
            Value::Integer(i) => Some(Numeric::Integer(*i)),
            Value::Decimal(d) => Some(Numeric::Decimal(*d)),
            Value::Double(d) => Some(Numeric::Double(*d)),
            Value::Term(RdfTerm::Literal(l)) => literal_numeric(l),
            Value::String { value, language: None } => parse_untyped_number(value),
            _ => None,
        }
    }

    fn boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Term(RdfTerm::Literal(l)) if l.datatype() == XSD_BOOLEAN => {
                match l.value() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Lexical form and language of a string-like value
    fn string(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Value::String { value, language } => Some((value, language.as_deref())),
            Value::Term(RdfTerm::Literal(l))
                if l.language().is_some() || l.datatype() == XSD_STRING =>
            {
                Some((l.value(), l.language()))
            }
            _ => None,
        }
    }

    /// Lexical form of any literal-like value
    fn lexical(&self) -> Option<String> {
        match self {
            Value::Term(RdfTerm::Literal(l)) => Some(l.value().to_string()),
            Value::Term(_) => None,
            other => match other.clone().into_term() {
                RdfTerm::Literal(l) => Some(l.value().to_string()),
                _ => None,
            },
        }
    }

    /// Convert back to an RDF term
    pub fn into_term(self) -> RdfTerm {
        match self {
            Value::Term(term) => term,
            Value::Integer(i) => Literal::integer(i).into(),
            Value::Decimal(d) => typed(format_decimal(d), XSD_DECIMAL),
            Value::Double(d) => typed(format_double(d), XSD_DOUBLE),
            Value::Boolean(b) => Literal::boolean(b).into(),
            Value::String {
                value,
                language: Some(language),
            } => match Literal::new_language_tagged_literal(value.clone(), language) {
                Ok(literal) => literal.into(),
                Err(_) => Literal::new_simple_literal(value).into(),
            },
            Value::String {
                value,
                language: None,
            } => Literal::new_simple_literal(value).into(),
        }
    }
}

/// Effective boolean value
pub fn effective_boolean(value: &Value) -> SparqlResult<bool> {
    if let Some(b) = value.boolean() {
        return Ok(b);
    }
    if let Some(n) = value.numeric() {
        let f = n.to_f64();
        return Ok(f != 0.0 && !f.is_nan());
    }
    match value {
        Value::String { value, .. } => Ok(!value.is_empty()),
        Value::Term(RdfTerm::Literal(l)) if l.datatype() == XSD_STRING || l.language().is_some() => {
            Ok(!l.value().is_empty())
        }
        other => Err(type_error(format!("{:?} has no boolean value", other))),
    }
}

fn values_equal(left: &Value, right: &Value) -> SparqlResult<bool> {
    if let (Some(a), Some(b)) = (left.numeric(), right.numeric()) {
        return Ok(a.compare(b) == Some(Ordering::Equal));
    }
    if let (Some(a), Some(b)) = (left.boolean(), right.boolean()) {
        return Ok(a == b);
    }
    if let (Some(a), Some(b)) = (left.string(), right.string()) {
        return Ok(a == b);
    }
    Ok(left.clone().into_term() == right.clone().into_term())
}

fn compare_values(left: &Value, right: &Value) -> SparqlResult<Ordering> {
    if let (Some(a), Some(b)) = (left.numeric(), right.numeric()) {
        return a
            .compare(b)
            .ok_or_else(|| type_error("NaN is not comparable"));
    }
    if let (Some(a), Some(b)) = (left.boolean(), right.boolean()) {
        return Ok(a.cmp(&b));
    }
    if let (Some((a, la)), Some((b, lb))) = (left.string(), right.string()) {
        if la == lb {
            return Ok(a.cmp(b));
        }
    }
    Err(type_error(format!(
        "cannot order {} and {}",
        left.clone().into_term(),
        right.clone().into_term()
    )))
}

fn arithmetic(op: BinaryOp, left: Numeric, right: Numeric) -> SparqlResult<Value> {
    use Numeric::*;
    let result = match (left, right) {
        (Integer(a), Integer(b)) if op != BinaryOp::Divide => {
            let checked = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            match checked {
                Some(v) => Integer(v),
                None => Decimal(float_op(op, a as f64, b as f64)),
            }
        }
        (Double(_), _) | (_, Double(_)) => Double(float_op(op, left.to_f64(), right.to_f64())),
        _ => {
            if op == BinaryOp::Divide && right.to_f64() == 0.0 {
                return Err(type_error("division by zero"));
            }
            Decimal(float_op(op, left.to_f64(), right.to_f64()))
        }
    };
    Ok(result.into_value())
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        _ => a / b,
    }
}

/// Evaluate `expr` against the variable values provided by `source`
pub fn evaluate<S: TermSource + ?Sized>(expr: &Expression, source: &S) -> SparqlResult<Value> {
    match expr {
        Expression::Variable(var) => source
            .term(*var)
            .map(Value::Term)
            .ok_or_else(|| type_error("unbound variable")),
        Expression::Constant(term) => Ok(Value::Term(term.clone())),
        Expression::Unary { op, expr } => {
            let value = evaluate(expr, source)?;
            match op {
                UnaryOp::Not => Ok(Value::Boolean(!effective_boolean(&value)?)),
                UnaryOp::Plus => value
                    .numeric()
                    .map(Numeric::into_value)
                    .ok_or_else(|| type_error("unary + expects a number")),
                UnaryOp::Minus => match value.numeric() {
                    Some(Numeric::Integer(i)) => Ok(Value::Integer(-i)),
                    Some(Numeric::Decimal(d)) => Ok(Value::Decimal(-d)),
                    Some(Numeric::Double(d)) => Ok(Value::Double(-d)),
                    None => Err(type_error("unary - expects a number")),
                },
            }
        }
        Expression::Binary { left, op, right } => evaluate_binary(left, *op, right, source),
        Expression::Function { function, args } => evaluate_function(*function, args, source),
    }
}

fn evaluate_binary<S: TermSource + ?Sized>(
    left: &Expression,
    op: BinaryOp,
    right: &Expression,
    source: &S,
) -> SparqlResult<Value> {
    match op {
        // an error on one side is masked when the other side decides
        BinaryOp::Or => {
            let l = evaluate(left, source).and_then(|v| effective_boolean(&v));
            if let Ok(true) = l {
                return Ok(Value::Boolean(true));
            }
            let r = evaluate(right, source).and_then(|v| effective_boolean(&v));
            match (l, r) {
                (_, Ok(true)) => Ok(Value::Boolean(true)),
                (Ok(false), Ok(false)) => Ok(Value::Boolean(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
                _ => Ok(Value::Boolean(false)),
            }
        }
        BinaryOp::And => {
            let l = evaluate(left, source).and_then(|v| effective_boolean(&v));
            if let Ok(false) = l {
                return Ok(Value::Boolean(false));
            }
            let r = evaluate(right, source).and_then(|v| effective_boolean(&v));
            match (l, r) {
                (_, Ok(false)) => Ok(Value::Boolean(false)),
                (Ok(true), Ok(true)) => Ok(Value::Boolean(true)),
                (Err(e), _) | (_, Err(e)) => Err(e),
                _ => Ok(Value::Boolean(false)),
            }
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equal = values_equal(&evaluate(left, source)?, &evaluate(right, source)?)?;
            Ok(Value::Boolean(equal == (op == BinaryOp::Equal)))
        }
        BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
            let ordering = compare_values(&evaluate(left, source)?, &evaluate(right, source)?)?;
            Ok(Value::Boolean(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
            let l = evaluate(left, source)?;
            let r = evaluate(right, source)?;
            match (l.numeric(), r.numeric()) {
                (Some(a), Some(b)) => arithmetic(op, a, b),
                _ => Err(type_error("arithmetic expects numbers")),
            }
        }
    }
}

fn string_arg(value: &Value) -> SparqlResult<(String, Option<String>)> {
    if let Some((text, language)) = value.string() {
        return Ok((text.to_string(), language.map(str::to_string)));
    }
    value
        .lexical()
        .map(|text| (text, None))
        .ok_or_else(|| type_error("expected a literal"))
}

fn evaluate_function<S: TermSource + ?Sized>(
    function: Builtin,
    args: &[Expression],
    source: &S,
) -> SparqlResult<Value> {
    if function == Builtin::Bound {
        return match args.first() {
            Some(Expression::Variable(var)) => Ok(Value::Boolean(source.term(*var).is_some())),
            _ => Err(type_error("BOUND expects a variable")),
        };
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, source))
        .collect::<SparqlResult<Vec<_>>>()?;
    let first = values
        .first()
        .ok_or_else(|| type_error("missing argument"))?;

    match function {
        Builtin::Bound => Err(type_error("BOUND expects a variable")),
        Builtin::IsIri => Ok(Value::Boolean(matches!(
            first,
            Value::Term(RdfTerm::NamedNode(_))
        ))),
        Builtin::IsBlank => Ok(Value::Boolean(matches!(
            first,
            Value::Term(RdfTerm::BlankNode(_))
        ))),
        Builtin::IsLiteral => Ok(Value::Boolean(!matches!(
            first,
            Value::Term(RdfTerm::NamedNode(_)) | Value::Term(RdfTerm::BlankNode(_))
        ))),
        Builtin::Str => match first {
            Value::Term(RdfTerm::NamedNode(n)) => Ok(Value::String {
                value: n.as_str().to_string(),
                language: None,
            }),
            Value::Term(RdfTerm::BlankNode(_)) => Err(type_error("STR of a blank node")),
            other => Ok(Value::String {
                value: other.lexical().unwrap_or_default(),
                language: None,
            }),
        },
        Builtin::Lang => match first.clone().into_term() {
            RdfTerm::Literal(l) => Ok(Value::String {
                value: l.language().unwrap_or_default().to_string(),
                language: None,
            }),
            _ => Err(type_error("LANG expects a literal")),
        },
        Builtin::Datatype => match first.clone().into_term() {
            RdfTerm::Literal(l) => {
                let datatype = if l.language().is_some() {
                    format!("{}langString", RDF_NS)
                } else {
                    l.datatype().to_string()
                };
                Ok(Value::Term(NamedNode::new(&datatype)?.into()))
            }
            _ => Err(type_error("DATATYPE expects a literal")),
        },
        Builtin::StrLen => {
            let (text, _) = string_arg(first)?;
            Ok(Value::Integer(text.chars().count() as i64))
        }
        Builtin::UCase | Builtin::LCase => {
            let (text, language) = string_arg(first)?;
            let value = if function == Builtin::UCase {
                text.to_uppercase()
            } else {
                text.to_lowercase()
            };
            Ok(Value::String { value, language })
        }
        Builtin::Contains | Builtin::StrStarts | Builtin::StrEnds => {
            let (text, _) = string_arg(first)?;
            let (needle, _) = string_arg(&values[1])?;
            Ok(Value::Boolean(match function {
                Builtin::Contains => text.contains(&needle),
                Builtin::StrStarts => text.starts_with(&needle),
                _ => text.ends_with(&needle),
            }))
        }
        Builtin::Regex => {
            let (text, _) = string_arg(first)?;
            let (pattern, _) = string_arg(&values[1])?;
            let flags = match values.get(2) {
                Some(v) => string_arg(v)?.0,
                None => String::new(),
            };
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(flags.contains('i'))
                .multi_line(flags.contains('m'))
                .dot_matches_new_line(flags.contains('s'))
                .ignore_whitespace(flags.contains('x'))
                .build()
                .map_err(|e| type_error(format!("invalid regex: {}", e)))?;
            Ok(Value::Boolean(regex.is_match(&text)))
        }
    }
}

/// Sort key of a numeric literal: value in IEEE total order, then the exact
/// integer when there is one
fn numeric_key(n: Numeric) -> (f64, Option<i64>) {
    match n {
        Numeric::Integer(i) => (i as f64, Some(i)),
        other => (other.to_f64(), None),
    }
}

/// Total order used by ORDER BY and MIN/MAX: unbound < blank nodes < IRIs <
/// numeric literals (by value) < other literals. Ties fall back to the
/// literal's own order.
pub fn compare_terms(left: Option<&RdfTerm>, right: Option<&RdfTerm>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(RdfTerm::Literal(a)), Some(RdfTerm::Literal(b))) => {
            match (literal_numeric(a), literal_numeric(b)) {
                (Some(x), Some(y)) => {
                    let (xf, xi) = numeric_key(x);
                    let (yf, yi) = numeric_key(y);
                    xf.total_cmp(&yf)
                        .then_with(|| xi.cmp(&yi))
                        .then_with(|| a.cmp(b))
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        }
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Numeric value of a literal term, if it has one
pub(crate) fn numeric_term(term: &RdfTerm) -> Option<f64> {
    match term {
        RdfTerm::Literal(l) => literal_numeric(l).map(Numeric::to_f64),
        _ => None,
    }
}

/// Exact value of a literal with an integer datatype or an integral lexical form
pub(crate) fn integer_term(term: &RdfTerm) -> Option<i64> {
    match term {
        RdfTerm::Literal(l) => match literal_numeric(l) {
            Some(Numeric::Integer(i)) => Some(i),
            _ => None,
        },
        _ => None,
    }
}
