// src/model/schema.rs
//! Entity schema: the slice of the report schema the engine needs.
//!
//! Labels and presentation metadata live outside this crate. What remains is
//! the declared type of each field (filter dispatch), its unit (metric unit
//! inference), the id and time columns, and foreign keys (joins).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field::FieldRef;
use crate::units::UnitType;

/// Declared field type. `Text` covers both free text and id columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Date,
    Boolean,
    Enum,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Measurement kind of numeric fields. Defaults to a plain number.
    #[serde(default)]
    pub unit: Option<UnitType>,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: UnitType) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// A foreign key: `field` on the declaring entity references
/// `target.target_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub field: String,
    pub target: String,
    #[serde(default = "default_id_field")]
    pub target_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Column used for time windows, latest/first and bucketing.
    #[serde(default)]
    pub time_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl Default for EntitySchema {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            time_field: None,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Join keys between a primary record and a related entity: the primary
/// record's `local` value must equal the related record's `remote` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeys {
    pub local: String,
    pub remote: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub entities: BTreeMap<String, EntitySchema>,
}

impl Schema {
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn field(&self, field: &FieldRef) -> Option<&FieldDef> {
        self.entity(&field.entity)?.field(&field.field)
    }

    pub fn field_type(&self, field: &FieldRef) -> Option<FieldType> {
        self.field(field).map(|f| f.field_type)
    }

    /// Unit implied by the field's declared semantic.
    pub fn unit_of(&self, field: &FieldRef) -> UnitType {
        self.field(field)
            .and_then(|f| f.unit)
            .unwrap_or(UnitType::Number)
    }

    pub fn id_field(&self, entity: &str) -> &str {
        self.entity(entity)
            .map(|e| e.id_field.as_str())
            .unwrap_or("id")
    }

    pub fn time_field(&self, entity: &str) -> Option<&str> {
        self.entity(entity)?.time_field.as_deref()
    }

    /// Resolve the single join hop from `primary` to `related`.
    ///
    /// A foreign key declared on the primary entity wins (many-to-one, e.g.
    /// charge → customer); otherwise a key on the related entity pointing
    /// back at the primary is used (one-to-many, e.g. customer → subscription).
    pub fn join_keys(&self, primary: &str, related: &str) -> Option<JoinKeys> {
        if let Some(rel) = self
            .entity(primary)
            .and_then(|e| e.relations.iter().find(|r| r.target == related))
        {
            return Some(JoinKeys {
                local: rel.field.clone(),
                remote: rel.target_field.clone(),
            });
        }

        self.entity(related)
            .and_then(|e| e.relations.iter().find(|r| r.target == primary))
            .map(|rel| JoinKeys {
                local: rel.target_field.clone(),
                remote: rel.field.clone(),
            })
    }

    /// Add or replace entity definitions.
    pub fn merge(&mut self, other: Schema) {
        self.entities.extend(other.entities);
    }

    /// The payments ledger schema: customers, products, subscriptions,
    /// charges, refunds and payouts. Amounts are integer minor units.
    pub fn ledger() -> Self {
        use FieldType::*;

        let fk = |field: &str, target: &str| Relation {
            field: field.into(),
            target: target.into(),
            target_field: default_id_field(),
        };

        let mut entities = BTreeMap::new();

        entities.insert(
            "customers".to_string(),
            EntitySchema {
                time_field: Some("created".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("email", Text),
                    FieldDef::new("name", Text),
                    FieldDef::new("country", Enum),
                    FieldDef::new("delinquent", Boolean),
                    FieldDef::new("balance", Number).with_unit(UnitType::Currency),
                    FieldDef::new("created", Date),
                ],
                ..Default::default()
            },
        );

        entities.insert(
            "products".to_string(),
            EntitySchema {
                time_field: Some("created".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("name", Text),
                    FieldDef::new("active", Boolean),
                    FieldDef::new("unit_amount", Number).with_unit(UnitType::Currency),
                    FieldDef::new("created", Date),
                ],
                ..Default::default()
            },
        );

        entities.insert(
            "subscriptions".to_string(),
            EntitySchema {
                time_field: Some("created".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("customer_id", Text),
                    FieldDef::new("product_id", Text),
                    FieldDef::new("status", Enum),
                    FieldDef::new("quantity", Number).with_unit(UnitType::Count),
                    FieldDef::new("mrr", Number).with_unit(UnitType::Currency),
                    FieldDef::new("trial_days", Number).with_unit(UnitType::Duration),
                    FieldDef::new("cancel_at_period_end", Boolean),
                    FieldDef::new("created", Date),
                ],
                relations: vec![fk("customer_id", "customers"), fk("product_id", "products")],
                ..Default::default()
            },
        );

        entities.insert(
            "charges".to_string(),
            EntitySchema {
                time_field: Some("created".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("customer_id", Text),
                    FieldDef::new("subscription_id", Text),
                    FieldDef::new("amount", Number).with_unit(UnitType::Currency),
                    FieldDef::new("fee", Number).with_unit(UnitType::Currency),
                    FieldDef::new("currency", Enum),
                    FieldDef::new("status", Enum),
                    FieldDef::new("refunded", Boolean),
                    FieldDef::new("description", Text),
                    FieldDef::new("created", Date),
                ],
                relations: vec![
                    fk("customer_id", "customers"),
                    fk("subscription_id", "subscriptions"),
                ],
                ..Default::default()
            },
        );

        entities.insert(
            "refunds".to_string(),
            EntitySchema {
                time_field: Some("created".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("charge_id", Text),
                    FieldDef::new("amount", Number).with_unit(UnitType::Currency),
                    FieldDef::new("reason", Enum),
                    FieldDef::new("created", Date),
                ],
                relations: vec![fk("charge_id", "charges")],
                ..Default::default()
            },
        );

        entities.insert(
            "payouts".to_string(),
            EntitySchema {
                time_field: Some("arrival_date".into()),
                fields: vec![
                    FieldDef::new("id", Text),
                    FieldDef::new("amount", Number).with_unit(UnitType::Currency),
                    FieldDef::new("status", Enum),
                    FieldDef::new("method", Enum),
                    FieldDef::new("arrival_date", Date),
                ],
                ..Default::default()
            },
        );

        Schema { entities }
    }
}
