//! Formula evaluation: every block once, then the optional calculation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::block::{evaluate_block, EvaluationContext};
use crate::model::{BlockResult, Calculation, MetricFormula};
use crate::units::{combine, resolve_result_unit, UnitType, ValidationError};

/// Result of a calculation that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalculationOutcome {
    /// Units are compatible. `value` is `None` when either side had no data
    /// or the division was by zero.
    Value { value: Option<f64>, unit: UnitType },
    /// The units cannot be combined; no value is produced.
    Invalid { error: ValidationError },
}

impl CalculationOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            CalculationOutcome::Value { value, .. } => *value,
            CalculationOutcome::Invalid { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            CalculationOutcome::Invalid { error } => Some(error),
            CalculationOutcome::Value { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CalculationOutcome::Value { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaResult {
    /// One result per block, in block order.
    pub blocks: Vec<BlockResult>,
    /// Results of the blocks listed in `expose_blocks`, in that order.
    pub exposed: Vec<BlockResult>,
    /// `None` when no calculation is configured or there are fewer than two
    /// blocks.
    pub calculation: Option<CalculationOutcome>,
}

/// Evaluate all blocks in one pass, then combine.
pub fn evaluate_formula(formula: &MetricFormula, ctx: &EvaluationContext<'_>) -> FormulaResult {
    let blocks: Vec<BlockResult> = formula
        .blocks
        .iter()
        .map(|block| evaluate_block(block, ctx))
        .collect();

    let exposed = formula
        .expose_blocks
        .iter()
        .filter_map(|id| blocks.iter().find(|b| &b.block_id == id).cloned())
        .collect();

    let calculation = match &formula.calculation {
        Some(calc) if blocks.len() >= 2 => Some(calculate(calc, &blocks)),
        _ => None,
    };

    FormulaResult {
        blocks,
        exposed,
        calculation,
    }
}

/// Combine two block results under `calc`.
pub fn calculate(calc: &Calculation, blocks: &[BlockResult]) -> CalculationOutcome {
    let find = |id: &str| {
        blocks
            .iter()
            .find(|b| b.block_id == id)
            .ok_or_else(|| ValidationError::UnknownBlock {
                block_id: id.to_string(),
            })
    };

    let resolved = find(&calc.left).and_then(|left| {
        let right = find(&calc.right)?;
        let unit = resolve_result_unit(calc.operator, left.unit, right.unit, calc.result_unit)?;
        Ok((left, right, unit))
    });

    match resolved {
        Ok((left, right, unit)) => CalculationOutcome::Value {
            value: combine(calc.operator, left.value, right.value, unit),
            unit,
        },
        Err(error) => {
            debug!(left = %calc.left, right = %calc.right, error = %error, "formula failed validation");
            CalculationOutcome::Invalid { error }
        }
    }
}
