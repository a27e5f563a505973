//! Runtime values carried by constants and produced by evaluation
use crate::expr::RcExpr;
use crate::types::TypeId;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use indexmap::IndexMap;
use itertools::Itertools;
use serde_json::Number;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Field values of a record (or anonymous record) instance
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub ty: TypeId,
    pub fields: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(Number),
    Char(char),
    Str(String),
    Guid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(Duration),
    /// Enumeration variant by name
    Enum(String),
    Record(Rc<RecordValue>),
    List(Rc<Vec<Value>>),
    /// A lambda expression used as a value (closed over nothing)
    Lambda(RcExpr),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Num(Number::from(n))
    }

    /// Floats without a JSON representation (NaN, infinities) become null
    pub fn float(f: f64) -> Self {
        Number::from_f64(f).map(Value::Num).unwrap_or(Value::Null)
    }

    pub fn str<S: AsRef<str>>(s: S) -> Self {
        Value::Str(s.as_ref().to_string())
    }

    pub fn enumeration<S: AsRef<str>>(variant: S) -> Self {
        Value::Enum(variant.as_ref().to_string())
    }

    pub fn record<S: AsRef<str>>(ty: TypeId, fields: Vec<(S, Value)>) -> Self {
        Value::Record(Rc::new(RecordValue {
            ty,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v))
                .collect(),
        }))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Num(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(&**r),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.fields.get(name))
    }

    /// Equality with numeric comparison across integer and float
    /// representations
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            _ => self == other,
        }
    }

    /// Ordering for comparable values; `None` for nulls and mismatches
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::TimeSpan(a), Value::TimeSpan(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Text form without quotes, as `ToString()` would produce
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Char(c) => c.to_string(),
            Value::Enum(v) => v.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Num(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Guid(g) => write!(f, "{}", g),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
            Value::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            Value::TimeSpan(d) => write!(f, "{}s", d.num_seconds()),
            Value::Enum(v) => write!(f, "{}", v),
            Value::Record(r) => write!(
                f,
                "{{ {} }}",
                r.fields
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .join(", ")
            ),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Lambda(_) => write!(f, "<lambda>"),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_numeric_equality_ignores_representation() {
        assert!(Value::int(10).loosely_equals(&Value::float(10.0)));
        assert!(!Value::int(10).loosely_equals(&Value::int(11)));
        assert!(!Value::int(1).loosely_equals(&Value::str("1")));
    }

    #[test]
    pub fn test_compare() {
        assert_eq!(Value::int(1).compare(&Value::int(2)), Some(Ordering::Less));
        assert_eq!(Value::str("b").compare(&Value::str("a")), Some(Ordering::Greater));
        assert_eq!(Value::Null.compare(&Value::int(1)), None);
    }

    #[test]
    pub fn test_display() {
        assert_eq!(Value::str("x").to_string(), "\"x\"");
        assert_eq!(Value::str("x").to_text(), "x");
        assert_eq!(Value::list(vec![Value::int(1), Value::Bool(true)]).to_string(), "[1, True]");
    }
}
