//! Block evaluator.
//!
//! A block reads its source entity, applies its one active filter, keeps the
//! records whose time column falls in the window, then reduces by basis:
//!
//! ```text
//!   records ──filter──▶ matched ──[start, end)──▶ in window ──basis──▶ value
//!                                                    │
//!                              sum/average_over_period: aggregate(values)
//!                              latest / first:          pick by time column
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregate::{aggregate, mean};
use crate::model::{
    parse_instant, AggregationBasis, BlockResult, MetricBlock, Record, Schema, TimeGrain,
    TimeWindow, Value,
};
use crate::units::UnitType;
use crate::view::filter_records;
use crate::warehouse::WarehouseSnapshot;

/// Everything a block needs besides its own definition.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub snapshot: &'a WarehouseSnapshot,
    pub schema: &'a Schema,
    /// Global window, already narrowed to any selected bucket.
    pub window: Option<&'a TimeWindow>,
    /// Bucket grain for series.
    pub grain: Option<TimeGrain>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(snapshot: &'a WarehouseSnapshot, schema: &'a Schema) -> Self {
        Self {
            snapshot,
            schema,
            window: None,
            grain: None,
        }
    }

    pub fn with_window(mut self, window: &'a TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_grain(mut self, grain: TimeGrain) -> Self {
        self.grain = Some(grain);
        self
    }
}

/// One chart point of a block series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub bucket: TimeWindow,
    pub value: Option<f64>,
}

/// Unit a block resolves to: counting operators always count, everything
/// else follows the source field.
pub fn block_unit(block: &MetricBlock, schema: &Schema) -> UnitType {
    match &block.source {
        Some(_) if block.operator.is_counting() => UnitType::Count,
        Some(source) => schema.unit_of(source),
        None => UnitType::Number,
    }
}

/// Evaluate one block over the context window.
///
/// Both period bases reduce every in-window record at once; the context grain
/// only matters to [`evaluate_block_series`].
pub fn evaluate_block(block: &MetricBlock, ctx: &EvaluationContext<'_>) -> BlockResult {
    let unit = block_unit(block, ctx.schema);
    let value = Matched::collect(block, ctx).and_then(|matched| matched.reduce(block, ctx.window));

    BlockResult {
        block_id: block.id.clone(),
        value,
        unit,
    }
}

/// Mean of the non-null points of a series. `None` when every bucket is empty.
pub fn average_per_bucket(points: &[SeriesPoint]) -> Option<f64> {
    let values: Vec<f64> = points.iter().filter_map(|p| p.value).collect();
    (!values.is_empty()).then(|| mean(&values))
}

/// Evaluate one block per bucket of the context window.
///
/// Without a grain the whole window is one bucket. Without a window there is
/// nothing to split and the series is empty.
pub fn evaluate_block_series(block: &MetricBlock, ctx: &EvaluationContext<'_>) -> Vec<SeriesPoint> {
    let Some(window) = ctx.window else {
        return Vec::new();
    };
    let buckets = match ctx.grain {
        Some(grain) => window.buckets(grain),
        None => vec![*window],
    };

    let matched = Matched::collect(block, ctx);
    buckets
        .into_iter()
        .map(|bucket| SeriesPoint {
            value: matched
                .as_ref()
                .and_then(|m| m.reduce(block, Some(&bucket))),
            bucket,
        })
        .collect()
}

/// Records of the source entity that passed the block filter, with their
/// parsed time.
struct Matched<'a> {
    field: &'a str,
    /// False when the entity has no time column; the window then does not
    /// restrict anything.
    has_time: bool,
    records: Vec<(Option<DateTime<Utc>>, &'a Record)>,
}

impl<'a> Matched<'a> {
    fn collect(block: &'a MetricBlock, ctx: &EvaluationContext<'a>) -> Option<Self> {
        let source = block.source.as_ref()?;

        if block.filters.len() > 1 {
            debug!(
                block = %block.id,
                ignored = block.filters.len() - 1,
                "block carries more than one filter; only the first applies"
            );
        }
        let filters: Vec<_> = block.active_filter().cloned().into_iter().collect();

        let time_field = ctx.schema.time_field(&source.entity);
        let records = filter_records(
            &source.entity,
            ctx.snapshot.get_entity(&source.entity),
            &filters,
            ctx.schema,
        )
        .into_iter()
        .map(|record| (time_field.and_then(|f| parse_instant(record.get(f))), record))
        .collect();

        Some(Self {
            field: &source.field,
            has_time: time_field.is_some(),
            records,
        })
    }

    /// Reduce the records inside `window` by the block's basis.
    fn reduce(&self, block: &MetricBlock, window: Option<&TimeWindow>) -> Option<f64> {
        let in_window: Vec<&(Option<DateTime<Utc>>, &Record)> = self
            .records
            .iter()
            .filter(|(time, _)| match (window, self.has_time) {
                (Some(window), true) => time.is_some_and(|t| window.contains(t)),
                _ => true,
            })
            .collect();

        match block.basis {
            AggregationBasis::SumOverPeriod | AggregationBasis::AverageOverPeriod => {
                let values: Vec<&Value> = in_window.iter().map(|(_, r)| r.get(self.field)).collect();
                aggregate(&values, block.operator)
            }
            AggregationBasis::Latest | AggregationBasis::First => {
                let picked = self.pick(&in_window, block.basis == AggregationBasis::Latest)?;
                let value = picked.get(self.field);
                if block.operator.is_counting() {
                    Some(if value.is_null() { 0.0 } else { 1.0 })
                } else {
                    value.as_f64()
                }
            }
        }
    }

    /// The record with the greatest (`latest`) or least time. Records without
    /// a readable time are passed over; ties keep the later record for
    /// `latest` and the earlier one for `first`. Entities without a time
    /// column fall back to record order.
    fn pick<'r>(
        &self,
        records: &[&'r (Option<DateTime<Utc>>, &'a Record)],
        latest: bool,
    ) -> Option<&'a Record> {
        if !self.has_time {
            let record = if latest { records.last() } else { records.first() };
            return record.map(|(_, r)| *r);
        }

        let mut best: Option<(DateTime<Utc>, &'a Record)> = None;
        for (time, record) in records.iter().map(|entry| (entry.0, entry.1)) {
            let Some(time) = time else { continue };
            let replace = match best {
                None => true,
                Some((current, _)) if latest => time >= current,
                Some((current, _)) => time < current,
            };
            if replace {
                best = Some((time, record));
            }
        }
        best.map(|(_, r)| r)
    }
}
