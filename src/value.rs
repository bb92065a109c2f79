use std::fmt::{self, Display, Formatter};

use ordered_float::OrderedFloat;

/// Numbers are compared after rounding to this many decimal places, which
/// absorbs the floating point noise introduced by sums and means.
pub const ROUND_DIGITS: i32 = 5;

/// The column types a table can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    String,
    Number,
    Boolean,
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DType::String => write!(f, "string"),
            DType::Number => write!(f, "number"),
            DType::Boolean => write!(f, "boolean"),
        }
    }
}

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Str(String),
    Num(OrderedFloat<f64>),
    Bool(bool),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Str(_) => DType::String,
            Value::Num(_) => DType::Number,
            Value::Bool(_) => DType::Boolean,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value used for equality during table inclusion: numbers are
    /// rounded, everything else is returned as is.
    pub fn key(&self) -> Value {
        match self {
            Value::Num(n) => Value::Num(OrderedFloat(round(n.0))),
            other => other.clone(),
        }
    }

    /// Parses a split fragment, preferring a number when the text is one.
    pub(crate) fn parse_fragment(text: &str) -> Value {
        match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && !text.trim().is_empty() => Value::from(n),
            _ => Value::Str(text.to_owned()),
        }
    }

    /// Types a column of split fragments: numeric when every fragment is a
    /// number, text otherwise.
    pub(crate) fn parse_fragments(parts: &[&str]) -> (DType, Vec<Value>) {
        let parsed: Vec<Value> = parts.iter().map(|p| Value::parse_fragment(p)).collect();
        if !parsed.is_empty() && parsed.iter().all(|v| v.dtype() == DType::Number) {
            (DType::Number, parsed)
        } else {
            (
                DType::String,
                parts.iter().map(|p| Value::Str((*p).to_owned())).collect(),
            )
        }
    }

    /// Renders the value as a literal inside a printed program.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

fn round(n: f64) -> f64 {
    let scale = 10f64.powi(ROUND_DIGITS);
    let rounded = (n * scale).round() / scale;
    // keep -0.0 and 0.0 in the same bucket
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Num(n) => {
                let n = n.0;
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(OrderedFloat(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(OrderedFloat(n as f64))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(OrderedFloat(n as f64))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
