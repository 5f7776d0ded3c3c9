//! Tags and the scalar values carried by metric updates.

use std::{
    fmt,
    time::Duration,
};

/// A scalar value attached to a metric update or a tag.
///
/// Values render with their natural textual form, so a [`Duration`] of one
/// second is written as `1s` and a float keeps only the digits it needs.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Duration(Duration),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Returns the value as a float when it is numeric.
    ///
    /// Durations, booleans and text are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Unsigned(v) => Some(v as f64),
            Value::Signed(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => v.fmt(f),
            Value::Signed(v) => v.fmt(f),
            Value::Float(v) => v.fmt(f),
            Value::Duration(v) => write!(f, "{:?}", v),
            Value::Bool(v) => v.fmt(f),
            Value::Text(v) => v.fmt(f),
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

value_from!(Unsigned, u64, u8, u16, u32, u64, usize);
value_from!(Signed, i64, i8, i16, i32, i64, isize);
value_from!(Float, f64, f32, f64);

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A key/value pair associated with an observation of a metric.
///
/// Some encoders ignore tags entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: Value,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// Ordered tag list. Insertion order is kept and duplicate keys are allowed.
pub type Tags = Vec<Tag>;

/// Renders tags as `k:v,k:v`.
pub(crate) fn join(tags: &[Tag]) -> String {
    let mut out = String::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&tag.to_string());
    }
    out
}
