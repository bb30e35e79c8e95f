//! Unit type system.
//!
//! A closed set of measurement kinds plus the operator table that decides
//! which arithmetic combinations of block results are meaningful.
//!
//! # Numeric representation
//!
//! | Unit         | Stored as                         |
//! |--------------|-----------------------------------|
//! | `count`      | plain number of items             |
//! | `currency`   | integer minor units (cents)       |
//! | `ratio`      | plain fraction                    |
//! | `percentage` | fraction (`0.25` is 25%)          |
//! | `duration`   | seconds                           |
//! | `number`     | plain number                      |
//!
//! Conversion to display form happens only in [`format_value_by_unit`].

mod algebra;
mod format;

pub use algebra::{
    available_result_units, combine, resolve_result_unit, validate, ValidationError,
};
pub use format::{format_value_by_unit, unit_label};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement kind of a numeric result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Count,
    Currency,
    Ratio,
    Percentage,
    Duration,
    /// A generic number with no physical unit.
    Number,
}

impl UnitType {
    pub const ALL: [UnitType; 6] = [
        UnitType::Count,
        UnitType::Currency,
        UnitType::Ratio,
        UnitType::Percentage,
        UnitType::Duration,
        UnitType::Number,
    ];

    /// Dimensionless units scale whatever they multiply.
    pub fn is_dimensionless(&self) -> bool {
        matches!(self, UnitType::Ratio | UnitType::Percentage | UnitType::Number)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(unit_label(*self))
    }
}

/// Arithmetic operator of a formula calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl CalcOperator {
    pub const ALL: [CalcOperator; 4] = [
        CalcOperator::Add,
        CalcOperator::Subtract,
        CalcOperator::Multiply,
        CalcOperator::Divide,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            CalcOperator::Add => "+",
            CalcOperator::Subtract => "-",
            CalcOperator::Multiply => "*",
            CalcOperator::Divide => "/",
        }
    }
}

impl fmt::Display for CalcOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalcOperator::Add => "add",
            CalcOperator::Subtract => "subtract",
            CalcOperator::Multiply => "multiply",
            CalcOperator::Divide => "divide",
        };
        f.write_str(name)
    }
}
