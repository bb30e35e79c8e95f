//! Metric formulas: per-block aggregation and the cross-block combinator.
//!
//! A formula is evaluated in a single pass. All blocks are computed first,
//! then the calculation (if any, and only with at least two blocks) combines
//! two of them through the unit algebra in [`crate::units`].

mod aggregate;
mod block;
mod formula;

pub use aggregate::aggregate;
pub use block::{
    average_per_bucket, block_unit, evaluate_block, evaluate_block_series, EvaluationContext,
    SeriesPoint,
};
pub use formula::{calculate, evaluate_formula, CalculationOutcome, FormulaResult};
