// src/model/report.rs
use serde::{Deserialize, Serialize};

use super::field::SelectedField;
use super::filter::FilterSet;
use super::metric::MetricFormula;
use super::time::{TimeGrain, TimeWindow};

/// A report configuration, passed by value on every recomputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub name: String,
    /// Display projection. Order is significant.
    #[serde(default)]
    pub fields: Vec<SelectedField>,
    /// Qualified `entity.field` names overriding column order.
    #[serde(default)]
    pub field_order: Vec<String>,
    /// Entity whose records become rows. Inferred when unset.
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Drill-down bucket, clipped to `window`.
    #[serde(default)]
    pub bucket: Option<TimeWindow>,
    #[serde(default)]
    pub sort: Option<SortItem>,
    #[serde(default)]
    pub formula: Option<MetricFormula>,
    /// Grain for `average_over_period` blocks and series.
    #[serde(default)]
    pub grain: Option<TimeGrain>,
}

impl ReportConfig {
    /// The window applied to rows and blocks: the global window narrowed to
    /// the selected bucket.
    pub fn effective_window(&self) -> Option<TimeWindow> {
        self.window.map(|w| w.effective(self.bucket.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortItem {
    /// Qualified column name.
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}
