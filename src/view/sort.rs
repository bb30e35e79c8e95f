//! Sort engine.
//!
//! Stable single-column ordering. Nulls go last in both directions; values of
//! different shapes rank numbers before booleans before strings.

use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::rows::RowView;
use crate::model::{SortDirection, Value};

/// Sort rows by one qualified column. Equal keys keep their input order.
pub fn sort_rows(mut rows: Vec<RowView>, column: &str, direction: SortDirection) -> Vec<RowView> {
    rows.sort_by(|a, b| compare_values(a.get(column), b.get(column), direction));
    rows
}

/// Ordering of two cell values under `direction`, nulls always last.
pub fn compare_values(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = compare_present(a, b);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => collate(x, y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::Bool(_) => 1,
        Value::String(_) => 2,
        Value::Null => 3,
    }
}

/// Locale-style string order: case and accents are secondary.
fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

fn fold(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
