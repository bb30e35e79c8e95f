//! # ledgerview
//!
//! An in-memory report data engine for ledger-style datasets: joined row
//! views, typed filters, and unit-checked metric formulas.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        ReportConfig (fields, filters, window, formula)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [report engine, memoized per version]
//! ┌───────────────────────────┐   ┌─────────────────────────┐
//! │ view                      │   │ metric                  │
//! │  build_rows (left joins)  │   │  evaluate_block         │
//! │  apply_filters            │   │  evaluate_formula       │
//! │  sort_rows / paginate     │   │   └─ units algebra      │
//! └───────────────────────────┘   └─────────────────────────┘
//!                          │ read
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │           WarehouseSnapshot (frozen, versioned)          │
//! └─────────────────────────────────────────────────────────┘
//!                          ▲ snapshot()
//! ┌─────────────────────────────────────────────────────────┐
//! │     Warehouse (async loads, collapsed per entity)        │
//! │               └─ EntityLoader (JSON dir, static)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Loading is the only asynchronous step. Everything above the snapshot is a
//! pure function of `(snapshot, configuration)`.

pub mod cache;
pub mod config;
pub mod metric;
pub mod model;
pub mod report;
pub mod units;
pub mod view;
pub mod warehouse;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::metric::{
        evaluate_block, evaluate_block_series, evaluate_formula, CalculationOutcome,
        EvaluationContext, FormulaResult,
    };
    pub use crate::model::{
        AggregationBasis, AggregationOperator, BlockResult, Calculation, FieldRef, FieldType,
        FilterCondition, FilterOperator, FilterSet, FilterValue, MetricBlock, MetricFormula,
        Record, ReportConfig, Schema, SortDirection, SortItem, TimeGrain, TimeWindow, Value,
    };
    pub use crate::report::{ReportEngine, ReportOutput, Staged};
    pub use crate::units::{
        available_result_units, combine, format_value_by_unit, unit_label, validate, CalcOperator,
        UnitType, ValidationError,
    };
    pub use crate::view::{apply_filters, build_rows, paginate, sort_rows, RowView, TableView};
    pub use crate::warehouse::{
        EntityLoader, JsonDirLoader, LoadError, StaticLoader, Warehouse, WarehouseSnapshot,
    };
}

pub use report::{ReportEngine, ReportError};
pub use warehouse::{Warehouse, WarehouseSnapshot};
