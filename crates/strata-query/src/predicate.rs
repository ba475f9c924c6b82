//! Filter predicates over extracted payload fields.
//!
//! Operators form a closed set: anything outside the whitelist fails at
//! construction (deserialization), long before query execution. This
//! replaces runtime string-based operator dispatch with a statically
//! checked enum.

use std::cmp::Ordering;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::path;

/// Comparison operator whitelist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Neq,
}

impl Operator {
    /// Parse a wire-format symbol. Anything else is rejected.
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "=" => Ok(Self::Eq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            "!=" => Ok(Self::Neq),
            other => Err(QueryError::InvalidOperator(other.to_owned())),
        }
    }

    /// The wire-format symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Neq => "!=",
        }
    }

    /// Evaluate the operator against an ordering between two values.
    /// `None` (incomparable values) never matches, like SQL null
    /// comparisons.
    pub fn matches(&self, ordering: Option<Ordering>) -> bool {
        let Some(ordering) = ordering else {
            return false;
        };
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Neq => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }

    /// The strict form of an inclusive operator (used by keyset cursors).
    pub fn strict(&self) -> Self {
        match self {
            Self::Gte => Self::Gt,
            Self::Lte => Self::Lt,
            other => *other,
        }
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|_| de::Error::custom(format!("invalid operator: {s:?}")))
    }
}

/// How a predicate chains onto the previous one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verb {
    #[default]
    And,
    Or,
}

impl Verb {
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(QueryError::InvalidVerb(other.to_owned())),
        }
    }
}

impl Serialize for Verb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

impl<'de> Deserialize<'de> for Verb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|_| de::Error::custom(format!("invalid verb: {s:?}")))
    }
}

/// One filter clause: `field operator value`, chained by `verb`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    #[serde(default)]
    pub verb: Verb,
}

impl Predicate {
    /// Evaluate against one payload. A missing or incomparable field never
    /// matches.
    pub fn eval(&self, data: &Map<String, Value>) -> bool {
        let Some(actual) = path::get(data, &self.field) else {
            return false;
        };
        self.operator.matches(compare_values(actual, &self.value))
    }
}

/// Evaluate an ordered predicate list with SQL operator precedence.
///
/// The list compiles to one flat SQL `WHERE` clause, where AND binds
/// tighter than OR: runs of AND-chained predicates form conjuncts, and
/// OR separates the runs, so `a OR b AND c` means `a OR (b AND c)`. An
/// empty list matches everything.
pub fn eval_all(predicates: &[Predicate], data: &Map<String, Value>) -> bool {
    let mut iter = predicates.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    let mut any_run = false;
    let mut run = first.eval(data);
    for predicate in iter {
        match predicate.verb {
            Verb::And => run = run && predicate.eval(data),
            Verb::Or => {
                any_run = any_run || run;
                run = predicate.eval(data);
            }
        }
    }
    any_run || run
}

/// Total-ish ordering over scalar JSON values.
///
/// Numbers compare numerically, strings lexicographically, booleans
/// false-before-true. Mixed types and composites are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort key for a requested ordering direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A single user-requested ordering over one extracted field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self {
            field: "id".into(),
            direction: Direction::Asc,
        }
    }
}
