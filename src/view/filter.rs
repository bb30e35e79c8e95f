//! Filter engine.
//!
//! Conditions are AND-combined and dispatched on the field's declared type.
//! A condition that cannot be evaluated (unknown field, operator not defined
//! for the type, payload of the wrong shape) is skipped rather than failing
//! the pass, so a half-edited report still shows data.
//!
//! | Field type | Operators                                                  |
//! |------------|------------------------------------------------------------|
//! | number     | equals, not_equals, greater_than, less_than, between       |
//! | date       | equals, not_equals, greater_than, less_than, between       |
//! | boolean    | is_true, is_false                                          |
//! | enum       | in, equals                                                 |
//! | text / id  | contains, in                                               |
//! | any        | is_blank                                                   |

use std::cmp::Ordering;
use tracing::debug;

use super::rows::RowView;
use crate::model::{
    parse_instant, DateBound, FieldRef, FieldType, FilterCondition, FilterOperator, FilterValue,
    Record, Schema, Value,
};

/// Anything a condition can be evaluated against.
pub trait FieldSource {
    /// The value of `field`, or `None` if this source cannot address it.
    fn value_of(&self, field: &FieldRef) -> Option<&Value>;
}

impl FieldSource for RowView {
    fn value_of(&self, field: &FieldRef) -> Option<&Value> {
        self.values.get(&field.qualified())
    }
}

/// A raw record of a known entity.
pub struct EntityRecord<'a> {
    pub entity: &'a str,
    pub record: &'a Record,
}

impl FieldSource for EntityRecord<'_> {
    fn value_of(&self, field: &FieldRef) -> Option<&Value> {
        (field.entity == self.entity).then(|| self.record.get(&field.field))
    }
}

/// Keep the rows satisfying every condition. Row order is preserved.
pub fn apply_filters(
    mut rows: Vec<RowView>,
    conditions: &[FilterCondition],
    schema: &Schema,
) -> Vec<RowView> {
    let compiled = compile_all(conditions, schema);
    if compiled.is_empty() {
        return rows;
    }
    rows.retain(|row| compiled.iter().all(|c| c.matches(row)));
    rows
}

/// Keep the records of `entity` satisfying every condition.
pub fn filter_records<'a>(
    entity: &str,
    records: &'a [Record],
    conditions: &[FilterCondition],
    schema: &Schema,
) -> Vec<&'a Record> {
    let compiled = compile_all(conditions, schema);
    records
        .iter()
        .filter(|record| {
            let source = EntityRecord { entity, record };
            compiled.iter().all(|c| c.matches(&source))
        })
        .collect()
}

/// Evaluate conditions against a single source.
pub fn matches_all<S: FieldSource>(
    source: &S,
    conditions: &[FilterCondition],
    schema: &Schema,
) -> bool {
    compile_all(conditions, schema)
        .iter()
        .all(|c| c.matches(source))
}

fn compile_all(conditions: &[FilterCondition], schema: &Schema) -> Vec<Compiled> {
    conditions
        .iter()
        .filter_map(|condition| {
            let compiled = Compiled::new(condition, schema);
            if compiled.is_none() {
                debug!(
                    field = %condition.field,
                    operator = ?condition.operator,
                    "skipping malformed filter condition"
                );
            }
            compiled
        })
        .collect()
}

/// A condition checked once against the schema and payload.
struct Compiled {
    field: FieldRef,
    predicate: Predicate,
}

enum Predicate {
    Blank,
    Number(Compare<f64>),
    Date(Compare<DateBound>),
    Bool(bool),
    /// Exact match against any accepted value.
    OneOf(Vec<String>),
    /// Case-insensitive substring of any needle.
    Contains(Vec<String>),
    /// Case-insensitive equality with any accepted value.
    OneOfFolded(Vec<String>),
}

enum Compare<T> {
    Eq(T),
    Ne(T),
    Gt(T),
    Lt(T),
    Between(T, T),
}

impl Compiled {
    fn new(condition: &FilterCondition, schema: &Schema) -> Option<Self> {
        use FilterOperator as Op;

        let predicate = if condition.operator == Op::IsBlank {
            Predicate::Blank
        } else {
            let field_type = schema.field_type(&condition.field)?;
            match (field_type, condition.operator) {
                (FieldType::Number, op) => Predicate::Number(compare(
                    op,
                    &condition.value,
                    Value::as_f64,
                    |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal),
                )?),
                (FieldType::Date, op) => Predicate::Date(compare(
                    op,
                    &condition.value,
                    DateBound::parse,
                    compare_bounds,
                )?),
                (FieldType::Boolean, Op::IsTrue) => Predicate::Bool(true),
                (FieldType::Boolean, Op::IsFalse) => Predicate::Bool(false),
                (FieldType::Enum, Op::In | Op::Equals) => {
                    Predicate::OneOf(accepted_values(&condition.value)?)
                }
                (FieldType::Text, Op::In) => Predicate::OneOfFolded(
                    accepted_values(&condition.value)?
                        .into_iter()
                        .map(|v| v.to_lowercase())
                        .collect(),
                ),
                (FieldType::Text, Op::Contains) => Predicate::Contains(needles(&condition.value)?),
                _ => return None,
            }
        };

        Some(Self {
            field: condition.field.clone(),
            predicate,
        })
    }

    fn matches<S: FieldSource>(&self, source: &S) -> bool {
        let Some(value) = source.value_of(&self.field) else {
            // not addressable from this source: the condition does not apply
            return true;
        };

        if value.is_null() && !matches!(self.predicate, Predicate::Blank) {
            return false;
        }

        match &self.predicate {
            Predicate::Blank => value.is_blank(),
            Predicate::Number(cmp) => value
                .as_f64()
                .is_some_and(|n| cmp.test(|bound| n.partial_cmp(bound).unwrap_or(Ordering::Less))),
            Predicate::Date(cmp) => parse_instant(value)
                .is_some_and(|t| cmp.test(|bound| bound.compare(t))),
            Predicate::Bool(expected) => value.as_bool() == Some(*expected),
            Predicate::OneOf(accepted) => value
                .key()
                .is_some_and(|k| accepted.iter().any(|a| *a == k.trim())),
            Predicate::OneOfFolded(accepted) => value.key().is_some_and(|k| {
                let k = k.trim().to_lowercase();
                accepted.iter().any(|a| *a == k)
            }),
            Predicate::Contains(needles) => value.key().is_some_and(|k| {
                let haystack = k.to_lowercase();
                needles.iter().any(|n| haystack.contains(n.as_str()))
            }),
        }
    }
}

impl<T> Compare<T> {
    /// `order` places the row value relative to a bound.
    fn test(&self, order: impl Fn(&T) -> Ordering) -> bool {
        match self {
            Compare::Eq(b) => order(b) == Ordering::Equal,
            Compare::Ne(b) => order(b) != Ordering::Equal,
            Compare::Gt(b) => order(b) == Ordering::Greater,
            Compare::Lt(b) => order(b) == Ordering::Less,
            Compare::Between(lo, hi) => order(lo) != Ordering::Less && order(hi) != Ordering::Greater,
        }
    }
}

fn compare<T>(
    operator: FilterOperator,
    payload: &FilterValue,
    parse: impl Fn(&Value) -> Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Option<Compare<T>> {
    let scalar = || match payload {
        FilterValue::Scalar(v) => parse(v),
        FilterValue::List(items) if items.len() == 1 => parse(&items[0]),
        _ => None,
    };

    Some(match operator {
        FilterOperator::Equals => Compare::Eq(scalar()?),
        FilterOperator::NotEquals => Compare::Ne(scalar()?),
        FilterOperator::GreaterThan => Compare::Gt(scalar()?),
        FilterOperator::LessThan => Compare::Lt(scalar()?),
        FilterOperator::Between => {
            let FilterValue::List(items) = payload else {
                return None;
            };
            let [lo, hi] = items.as_slice() else {
                return None;
            };
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            // reversed bounds are read as the same range
            if cmp(&lo, &hi) == Ordering::Greater {
                Compare::Between(hi, lo)
            } else {
                Compare::Between(lo, hi)
            }
        }
        _ => return None,
    })
}

fn compare_bounds(a: &DateBound, b: &DateBound) -> Ordering {
    match (a, b) {
        (DateBound::Day(x), DateBound::Day(y)) => x.cmp(y),
        (DateBound::Instant(x), DateBound::Instant(y)) => x.cmp(y),
        (DateBound::Day(d), DateBound::Instant(t)) => d.cmp(&t.date_naive()),
        (DateBound::Instant(t), DateBound::Day(d)) => t.date_naive().cmp(d),
    }
}

/// Accepted values of an `in` condition: a list, or a comma-separated string.
fn accepted_values(payload: &FilterValue) -> Option<Vec<String>> {
    let values: Vec<String> = match payload {
        FilterValue::List(items) => items
            .iter()
            .filter_map(Value::key)
            .map(|v| v.trim().to_string())
            .collect(),
        FilterValue::Scalar(Value::String(s)) => split_commas(s),
        FilterValue::Scalar(v) => v.key().into_iter().collect(),
        FilterValue::None => return None,
    };
    (!values.is_empty()).then_some(values)
}

/// Lowercased substrings for `contains`. A comma in the text supplies
/// several alternatives.
fn needles(payload: &FilterValue) -> Option<Vec<String>> {
    let needles: Vec<String> = match payload {
        FilterValue::Scalar(Value::String(s)) => split_commas(s),
        FilterValue::Scalar(v) => v.key().into_iter().collect(),
        FilterValue::List(items) => items.iter().filter_map(Value::key).collect(),
        FilterValue::None => return None,
    };
    let needles: Vec<String> = needles
        .into_iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    (!needles.is_empty()).then_some(needles)
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
