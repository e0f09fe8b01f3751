use std::{cmp::Ordering, fmt::Display};

use arcstr::ArcStr;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::sequence::Sequence;

/// The dynamic value model exchanged between repositories and the query engine.
///
/// Entities and complex values are [Value::Struct]s tagged with the full name of their type.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, Debug)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(OrderedFloat<f64>),
    Text(String),
    DateTime(DateTime<Utc>),
    Struct(Box<Struct>),
    Sequence(Sequence<Value>),
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Struct {
    pub type_name: ArcStr,
    pub props: IndexMap<String, Value>,
}

pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn new_struct<K: Into<String>>(
        type_name: impl Into<ArcStr>,
        props: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        Self::Struct(Box::new(Struct {
            type_name: type_name.into(),
            props: props.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }))
    }

    pub fn sequence(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Sequence(elements.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The type name of a struct value
    pub fn type_name(&self) -> Option<&ArcStr> {
        match self {
            Self::Struct(s) => Some(&s.type_name),
            _ => None,
        }
    }

    /// Get a property of a struct value
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(s) => s.props.get(name),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Self::Struct(s) => s.props.get_mut(name),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert into a sequence.
    /// A non-sequence value becomes a one-element sequence.
    pub fn wrap_into_sequence(self) -> Sequence<Value> {
        match self {
            Self::Sequence(seq) => seq,
            other => [other].into_iter().collect(),
        }
    }

    /// Human readable name of the value's kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::I64(_) => "integer",
            Self::F64(_) => "float",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::Struct(_) => "struct",
            Self::Sequence(_) => "sequence",
        }
    }

    /// Compare two scalar values.
    ///
    /// Null sorts before everything else. Integers and floats compare numerically.
    /// Returns `None` for values of incompatible kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::I64(a), Self::I64(b)) => Some(a.cmp(b)),
            (Self::F64(a), Self::F64(b)) => Some(a.cmp(b)),
            (Self::I64(a), Self::F64(b)) => Some(OrderedFloat(*a as f64).cmp(b)),
            (Self::F64(a), Self::I64(b)) => Some(a.cmp(&OrderedFloat(*b as f64))),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as seen by the `==` operator of lambda expressions
    pub fn loose_eq(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::I64(i) => write!(f, "{i}"),
            Self::F64(float) => write!(f, "{float}"),
            Self::Text(t) => write!(f, "{t}"),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Struct(s) => write!(f, "{}", s.type_name),
            Self::Sequence(seq) => write!(f, "[{}]", seq.iter().join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::I64(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::F64(OrderedFloat(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<Sequence<Value>> for Value {
    fn from(value: Sequence<Value>) -> Self {
        Self::Sequence(value)
    }
}
