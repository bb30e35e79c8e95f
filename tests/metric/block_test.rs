#[path = "../support/mod.rs"]
mod support;

use ledgerview::metric::{
    aggregate, average_per_bucket, evaluate_block, evaluate_block_series, EvaluationContext,
};
use ledgerview::model::{
    AggregationBasis, AggregationOperator, FieldRef, FilterCondition, FilterOperator, MetricBlock,
    TimeGrain, TimeWindow, Value,
};
use ledgerview::units::UnitType;
use support::{date, january, ledger_snapshot, schema};

fn amount() -> FieldRef {
    FieldRef::new("charges", "amount")
}

fn succeeded() -> FilterCondition {
    FilterCondition::new(
        FieldRef::new("charges", "status"),
        FilterOperator::Equals,
        "succeeded",
    )
}

#[test]
fn test_sum_and_count_over_january() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = january();
    let ctx = EvaluationContext::new(&snapshot, &schema).with_window(&window);

    let sum = MetricBlock::new("revenue", amount(), AggregationOperator::Sum).with_filter(succeeded());
    let count = MetricBlock::new(
        "charges",
        FieldRef::new("charges", "id"),
        AggregationOperator::Count,
    )
    .with_filter(succeeded());

    let sum = evaluate_block(&sum, &ctx);
    assert_eq!(sum.value, Some(6000.0));
    assert_eq!(sum.unit, UnitType::Currency);

    let count = evaluate_block(&count, &ctx);
    assert_eq!(count.value, Some(3.0));
    assert_eq!(count.unit, UnitType::Count);
}

#[test]
fn test_statistical_operators() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = january();
    let ctx = EvaluationContext::new(&snapshot, &schema).with_window(&window);

    // january amounts: 1000, 3000, 500, 2000
    let value = |operator| evaluate_block(&MetricBlock::new("b", amount(), operator), &ctx).value;
    assert_eq!(value(AggregationOperator::Avg), Some(1625.0));
    assert_eq!(value(AggregationOperator::Median), Some(1500.0));
    assert_eq!(value(AggregationOperator::Mode), Some(500.0));
    assert_eq!(value(AggregationOperator::DistinctCount), Some(4.0));
}

#[test]
fn test_empty_window_yields_null_not_zero() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = TimeWindow::from_dates(date(2024, 6, 1), date(2024, 7, 1));
    let ctx = EvaluationContext::new(&snapshot, &schema).with_window(&window);

    for operator in [
        AggregationOperator::Sum,
        AggregationOperator::Avg,
        AggregationOperator::Count,
        AggregationOperator::DistinctCount,
    ] {
        let block = MetricBlock::new("b", amount(), operator);
        assert_eq!(evaluate_block(&block, &ctx).value, None, "{:?}", operator);
    }
}

#[test]
fn test_latest_and_first_use_the_time_column() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = january();
    let ctx = EvaluationContext::new(&snapshot, &schema).with_window(&window);

    let latest = MetricBlock::new("l", amount(), AggregationOperator::Sum)
        .with_basis(AggregationBasis::Latest)
        .with_filter(succeeded());
    let first = MetricBlock::new("f", amount(), AggregationOperator::Sum)
        .with_basis(AggregationBasis::First);

    // ch_2 (Jan 20) is the last succeeded charge in January
    assert_eq!(evaluate_block(&latest, &ctx).value, Some(3000.0));
    assert_eq!(evaluate_block(&first, &ctx).value, Some(1000.0));
}

#[test]
fn test_monthly_series_and_average_over_period() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = TimeWindow::from_dates(date(2025, 1, 1), date(2025, 4, 1));
    let ctx = EvaluationContext::new(&snapshot, &schema)
        .with_window(&window)
        .with_grain(TimeGrain::Month);

    let block = MetricBlock::new("revenue", amount(), AggregationOperator::Sum);
    let series = evaluate_block_series(&block, &ctx);
    let values: Vec<Option<f64>> = series.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![Some(6500.0), Some(9000.0), None]);
    assert_eq!(series[1].bucket.start.date_naive(), date(2025, 2, 1));

    // empty March is left out of the per-bucket average
    assert_eq!(average_per_bucket(&series), Some(7750.0));

    // the block value itself still covers the whole window
    let average = block.with_basis(AggregationBasis::AverageOverPeriod);
    assert_eq!(evaluate_block(&average, &ctx).value, Some(15500.0));
}

#[test]
fn test_grain_does_not_change_block_value() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let window = TimeWindow::from_dates(date(2025, 1, 1), date(2025, 3, 1));
    let plain = EvaluationContext::new(&snapshot, &schema).with_window(&window);

    let block = MetricBlock::new("avg", amount(), AggregationOperator::Avg)
        .with_basis(AggregationBasis::AverageOverPeriod);

    // 1000, 3000, 500, 2000 in January and 9000 on Feb 1
    let expected = Some(3100.0);
    assert_eq!(evaluate_block(&block, &plain).value, expected);
    for grain in [TimeGrain::Day, TimeGrain::Week, TimeGrain::Month] {
        assert_eq!(evaluate_block(&block, &plain.with_grain(grain)).value, expected);
    }
}

#[test]
fn test_bucket_narrows_block_window() {
    let snapshot = ledger_snapshot();
    let schema = schema();
    let global = TimeWindow::from_dates(date(2025, 1, 1), date(2025, 3, 1));
    let bucket = TimeWindow::from_dates(date(2025, 1, 27), date(2025, 2, 3));
    let effective = global.effective(Some(&bucket));
    let ctx = EvaluationContext::new(&snapshot, &schema).with_window(&effective);

    let block = MetricBlock::new("revenue", amount(), AggregationOperator::Sum);
    assert_eq!(evaluate_block(&block, &ctx).value, Some(9500.0));
}

#[test]
fn test_aggregate_null_handling() {
    let raw = [Value::Null, Value::Null];
    let values: Vec<&Value> = raw.iter().collect();

    assert_eq!(aggregate(&values, AggregationOperator::Sum), None);
    assert_eq!(aggregate(&values, AggregationOperator::Count), Some(0.0));
    assert_eq!(aggregate(&[], AggregationOperator::Count), None);
}
