//! Operator compatibility table and the combinator.

use serde::{Deserialize, Serialize};

use super::{CalcOperator, UnitType};

/// A formula that cannot be computed as configured.
///
/// Returned as a value so the caller can render it inline and withhold the
/// final number while the rest of the report keeps computing.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// The operator is not defined for this pair of units.
    #[error("{message}")]
    IncompatibleUnits {
        operator: CalcOperator,
        left: UnitType,
        right: UnitType,
        message: String,
    },

    /// An explicit result unit was requested that the operator cannot produce.
    #[error(
        "{requested} is not a valid result unit for {left} {} {right}; available: {}",
        .operator.symbol(),
        join_units(.available)
    )]
    UnavailableResultUnit {
        operator: CalcOperator,
        left: UnitType,
        right: UnitType,
        requested: UnitType,
        available: Vec<UnitType>,
    },

    /// A calculation operand names a block that is not in the formula.
    #[error("Calculation references unknown block '{block_id}'")]
    UnknownBlock { block_id: String },
}

fn join_units(units: &[UnitType]) -> String {
    units
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check that `left <operator> right` is meaningful.
pub fn validate(
    operator: CalcOperator,
    left: UnitType,
    right: UnitType,
) -> Result<(), ValidationError> {
    if available_result_units(operator, left, right).is_empty() {
        return Err(ValidationError::IncompatibleUnits {
            operator,
            left,
            right,
            message: incompatibility_message(operator, left, right),
        });
    }
    Ok(())
}

/// Legal result units, most natural first. Empty when the combination is
/// not allowed.
pub fn available_result_units(
    operator: CalcOperator,
    left: UnitType,
    right: UnitType,
) -> Vec<UnitType> {
    match operator {
        CalcOperator::Add | CalcOperator::Subtract => {
            if left == right {
                vec![left]
            } else {
                vec![]
            }
        }
        CalcOperator::Multiply => multiply_units(left, right),
        CalcOperator::Divide => divide_units(left, right),
    }
}

/// Pick the result unit: the requested one if legal, otherwise the first
/// candidate.
pub fn resolve_result_unit(
    operator: CalcOperator,
    left: UnitType,
    right: UnitType,
    requested: Option<UnitType>,
) -> Result<UnitType, ValidationError> {
    validate(operator, left, right)?;
    let available = available_result_units(operator, left, right);
    match requested {
        Some(unit) if available.contains(&unit) => Ok(unit),
        Some(unit) => Err(ValidationError::UnavailableResultUnit {
            operator,
            left,
            right,
            requested: unit,
            available,
        }),
        None => Ok(available[0]),
    }
}

/// Apply the operator to two block values.
///
/// Missing data on either side propagates as `None`, as does division by
/// zero. Currency and count results are rounded to whole units since both
/// are integral in storage.
pub fn combine(
    operator: CalcOperator,
    left: Option<f64>,
    right: Option<f64>,
    result_unit: UnitType,
) -> Option<f64> {
    let (left, right) = (left?, right?);
    let value = match operator {
        CalcOperator::Add => left + right,
        CalcOperator::Subtract => left - right,
        CalcOperator::Multiply => left * right,
        CalcOperator::Divide => {
            if right == 0.0 {
                return None;
            }
            left / right
        }
    };

    if !value.is_finite() {
        return None;
    }

    match result_unit {
        UnitType::Currency | UnitType::Count => Some(value.round()),
        _ => Some(value),
    }
}

fn multiply_units(left: UnitType, right: UnitType) -> Vec<UnitType> {
    use UnitType::*;

    match (left, right) {
        (Number, other) | (other, Number) => vec![other],
        (Ratio, Ratio) => vec![Ratio],
        (Percentage, Percentage) => vec![Percentage],
        (Ratio, Percentage) | (Percentage, Ratio) => vec![Percentage, Ratio],
        // scaling a dimensioned value keeps its unit
        (Ratio | Percentage, other) | (other, Ratio | Percentage) => vec![other],
        (Count, Count) => vec![Count, Number],
        (Currency, Count) | (Count, Currency) => vec![Currency],
        (Duration, Count) | (Count, Duration) => vec![Duration],
        (Currency, Currency) | (Duration, Duration) | (Currency, Duration) | (Duration, Currency) => {
            vec![]
        }
    }
}

fn divide_units(left: UnitType, right: UnitType) -> Vec<UnitType> {
    use UnitType::*;

    match (left, right) {
        (other, Number) => vec![other],
        (Number, _) => vec![Number],
        (Count, Count)
        | (Currency, Currency)
        | (Duration, Duration)
        | (Ratio, Ratio)
        | (Percentage, Percentage)
        | (Ratio, Percentage)
        | (Percentage, Ratio) => vec![Ratio, Percentage],
        (other, Ratio | Percentage) => vec![other],
        (Currency, Count) => vec![Currency, Ratio],
        (Duration, Count) => vec![Duration, Ratio],
        (Count, Duration) => vec![Number],
        (Ratio | Percentage, Count | Currency | Duration) => vec![],
        (Count, Currency) | (Currency, Duration) | (Duration, Currency) => vec![],
    }
}

fn incompatibility_message(operator: CalcOperator, left: UnitType, right: UnitType) -> String {
    match operator {
        CalcOperator::Add => format!(
            "Cannot add {} and {}: both sides must have the same unit",
            left, right
        ),
        CalcOperator::Subtract => format!(
            "Cannot subtract {} from {}: both sides must have the same unit",
            right, left
        ),
        CalcOperator::Multiply => format!(
            "Cannot multiply {} by {}: the product has no meaningful unit",
            left, right
        ),
        CalcOperator::Divide => format!(
            "Cannot divide {} by {}: the quotient has no meaningful unit",
            left, right
        ),
    }
}
