// src/model/filter.rs
use serde::{Deserialize, Serialize};

use super::field::FieldRef;
use super::value::Value;

/// A typed predicate: `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: FieldRef,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(field: FieldRef, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// A condition whose operator takes no payload (`is_true`, `is_blank`, ...).
    pub fn unary(field: FieldRef, operator: FilterOperator) -> Self {
        Self {
            field,
            operator,
            value: FilterValue::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    /// Inclusive on both bounds.
    Between,
    IsTrue,
    IsFalse,
    In,
    /// Case-insensitive substring.
    Contains,
    IsBlank,
}

/// Payload shapes: nothing, one scalar, or a list (`in`, and the two bounds
/// of `between`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    #[default]
    None,
    Scalar(Value),
    List(Vec<Value>),
}

impl FilterValue {
    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        FilterValue::List(vec![low.into(), high.into()])
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<T> for FilterValue {
    fn from(value: T) -> Self {
        FilterValue::Scalar(value.into())
    }
}

/// Global table filters, AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl FilterSet {
    pub fn new(conditions: Vec<FilterCondition>) -> Self {
        Self { conditions }
    }
}
