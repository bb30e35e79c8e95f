// src/model/field.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reference to a field: `entity.field`.
///
/// Serialized as the qualified string so report files can write
/// `field = "charges.amount"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldRef {
    pub entity: String,
    pub field: String,
}

/// A selected display column. Order in a selection is significant.
pub type SelectedField = FieldRef;

impl FieldRef {
    pub fn new(entity: &str, field: &str) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// The qualified column name, `entity.field`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.entity, self.field)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

impl FromStr for FieldRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((entity, field)) if !entity.is_empty() && !field.is_empty() => {
                Ok(FieldRef::new(entity.trim(), field.trim()))
            }
            _ => Err(format!(
                "Invalid field reference '{}': expected 'entity.field'",
                s
            )),
        }
    }
}

impl TryFrom<String> for FieldRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FieldRef> for String {
    fn from(field: FieldRef) -> Self {
        field.qualified()
    }
}
