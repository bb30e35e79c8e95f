// src/model/metric.rs
use serde::{Deserialize, Serialize};

use super::field::FieldRef;
use super::filter::FilterCondition;
use crate::units::{CalcOperator, UnitType};

/// One aggregation definition within a metric formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBlock {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// A block without a source produces no value.
    #[serde(default)]
    pub source: Option<FieldRef>,
    #[serde(default)]
    pub operator: AggregationOperator,
    #[serde(default)]
    pub basis: AggregationBasis,
    /// Only the first condition is applied; see [`MetricBlock::active_filter`].
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
}

impl MetricBlock {
    pub fn new(id: &str, source: FieldRef, operator: AggregationOperator) -> Self {
        Self {
            id: id.into(),
            name: id.into(),
            source: Some(source),
            operator,
            basis: AggregationBasis::default(),
            filters: Vec::new(),
        }
    }

    pub fn with_basis(mut self, basis: AggregationBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_filter(mut self, filter: FilterCondition) -> Self {
        self.filters = vec![filter];
        self
    }

    /// A block carries at most one active filter.
    pub fn active_filter(&self) -> Option<&FilterCondition> {
        self.filters.first()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationOperator {
    #[default]
    Sum,
    Avg,
    Median,
    Mode,
    Count,
    DistinctCount,
}

impl AggregationOperator {
    /// Counting operators always yield a count, whatever the source field.
    pub fn is_counting(&self) -> bool {
        matches!(self, Self::Count | Self::DistinctCount)
    }
}

/// Temporal reduction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationBasis {
    #[default]
    SumOverPeriod,
    AverageOverPeriod,
    Latest,
    First,
}

/// Cross-block arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub operator: CalcOperator,
    pub left: String,
    pub right: String,
    /// Explicit pick among the legal result units. Defaults to the first.
    #[serde(default)]
    pub result_unit: Option<UnitType>,
}

impl Calculation {
    pub fn new(operator: CalcOperator, left: &str, right: &str) -> Self {
        Self {
            operator,
            left: left.into(),
            right: right.into(),
            result_unit: None,
        }
    }

    pub fn with_result_unit(mut self, unit: UnitType) -> Self {
        self.result_unit = Some(unit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFormula {
    #[serde(default)]
    pub blocks: Vec<MetricBlock>,
    #[serde(default)]
    pub calculation: Option<Calculation>,
    /// Blocks whose intermediate value is surfaced to the report.
    #[serde(default)]
    pub expose_blocks: Vec<String>,
}

impl MetricFormula {
    pub fn new(blocks: Vec<MetricBlock>) -> Self {
        Self {
            blocks,
            ..Default::default()
        }
    }

    pub fn with_calculation(mut self, calculation: Calculation) -> Self {
        self.calculation = Some(calculation);
        self
    }

    pub fn block(&self, id: &str) -> Option<&MetricBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

/// The computed value of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResult {
    pub block_id: String,
    /// `None` means no data, which is distinct from zero.
    pub value: Option<f64>,
    pub unit: UnitType,
}
