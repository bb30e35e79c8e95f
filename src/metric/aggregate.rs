//! Aggregation operators over a block's source values.

use std::collections::HashSet;

use crate::model::{AggregationOperator, Value};

/// Reduce source values with `operator`.
///
/// `None` when there is nothing to reduce: no values at all, or no numeric
/// values for the numeric operators. Counting operators skip nulls, so a
/// non-empty set of null values counts as zero.
pub fn aggregate(values: &[&Value], operator: AggregationOperator) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    match operator {
        AggregationOperator::Count => Some(values.iter().filter(|v| !v.is_null()).count() as f64),
        AggregationOperator::DistinctCount => {
            let distinct: HashSet<String> = values.iter().filter_map(|v| v.key()).collect();
            Some(distinct.len() as f64)
        }
        AggregationOperator::Sum => numbers(values).map(|n| n.iter().sum()),
        AggregationOperator::Avg => numbers(values).map(|n| mean(&n)),
        AggregationOperator::Median => numbers(values).map(median),
        AggregationOperator::Mode => numbers(values).map(mode),
    }
}

fn numbers(values: &[&Value]) -> Option<Vec<f64>> {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    (!numbers.is_empty()).then_some(numbers)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average of the two middle values for an even count.
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Most frequent value; the smallest one among ties.
fn mode(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);

    let mut best = values[0];
    let mut best_run = 0;
    let mut i = 0;
    while i < values.len() {
        let mut j = i;
        while j < values.len() && values[j] == values[i] {
            j += 1;
        }
        // strictly greater keeps the earlier, smaller value on ties
        if j - i > best_run {
            best = values[i];
            best_run = j - i;
        }
        i = j;
    }
    best
}
