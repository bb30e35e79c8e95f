//! Report data model: records, field references, schema, filters, metric
//! formulas and report configuration.

pub mod field;
pub mod filter;
pub mod metric;
pub mod report;
pub mod schema;
pub mod time;
pub mod value;

pub use field::{FieldRef, SelectedField};
pub use filter::{FilterCondition, FilterOperator, FilterSet, FilterValue};
pub use metric::{
    AggregationBasis, AggregationOperator, BlockResult, Calculation, MetricBlock, MetricFormula,
};
pub use report::{ReportConfig, SortDirection, SortItem};
pub use schema::{EntitySchema, FieldDef, FieldType, JoinKeys, Relation, Schema};
pub use time::{parse_instant, DateBound, TimeGrain, TimeWindow};
pub use value::{Record, Value};
