//! Row view builder.
//!
//! One row per record of the primary entity, in record order, with fields of
//! related entities attached through a single join hop. Joins are left joins:
//! a primary record without a match still yields its row, with nulls in the
//! related columns.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::model::{parse_instant, Record, Schema, SelectedField, TimeWindow, Value};
use crate::warehouse::WarehouseSnapshot;

/// Stable identity of a row: the primary entity and the record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub entity: String,
    pub id: String,
}

/// One materialized row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub key: RowKey,
    /// Qualified column name to value.
    pub values: HashMap<String, Value>,
}

impl RowView {
    /// Value of a qualified column, `Null` when the row does not carry it.
    pub fn get(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(column).unwrap_or(&NULL)
    }
}

/// A materialized table: display columns plus rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub primary: Option<String>,
    /// Display columns, qualified, in display order.
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
}

impl TableView {
    /// Apply an explicit column order. Listed columns come first in the
    /// given order; the remaining columns keep their current relative order.
    /// Names that are not columns are ignored.
    pub fn reorder_columns(&mut self, field_order: &[String]) {
        let mut ordered: Vec<String> = Vec::with_capacity(self.columns.len());
        for name in field_order {
            if self.columns.contains(name) && !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }
        for name in &self.columns {
            if !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }
        self.columns = ordered;
    }
}

/// The entity referenced by the most selected fields; ties go to the entity
/// selected first.
pub fn infer_primary_entity(fields: &[SelectedField]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for field in fields {
        match counts.iter_mut().find(|(e, _)| *e == field.entity) {
            Some((_, n)) => *n += 1,
            None => counts.push((&field.entity, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (entity, n) in counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((entity, n));
        }
    }
    best.map(|(e, _)| e.to_string())
}

/// Materialize rows for `fields`.
///
/// `primary` overrides primary-entity inference. When `window` is given and
/// the primary entity has a time column, only records whose time falls in the
/// half-open window become rows.
pub fn build_rows(
    snapshot: &WarehouseSnapshot,
    schema: &Schema,
    fields: &[SelectedField],
    primary: Option<&str>,
    window: Option<&TimeWindow>,
) -> TableView {
    let mut columns: Vec<String> = Vec::new();
    for field in fields {
        let name = field.qualified();
        if !columns.contains(&name) {
            columns.push(name);
        }
    }

    let Some(primary) = primary
        .map(str::to_string)
        .or_else(|| infer_primary_entity(fields))
    else {
        return TableView::default();
    };

    let joins = resolve_joins(snapshot, schema, &primary, fields);
    let id_field = schema.id_field(&primary);
    let time_field = window.and(schema.time_field(&primary));

    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();

    for (index, record) in snapshot.get_entity(&primary).iter().enumerate() {
        if let (Some(window), Some(time_field)) = (window, time_field) {
            match parse_instant(record.get(time_field)) {
                Some(t) if window.contains(t) => {}
                _ => continue,
            }
        }

        let mut values = HashMap::with_capacity(fields.len());
        for field in fields {
            let value = if field.entity == primary {
                record.get(&field.field).clone()
            } else {
                joins
                    .get(&field.entity)
                    .and_then(|join| join.lookup(record))
                    .map(|related| related.get(&field.field).clone())
                    .unwrap_or(Value::Null)
            };
            values.insert(field.qualified(), value);
        }

        let id = unique_id(record.get(id_field), index, &mut seen);
        rows.push(RowView {
            key: RowKey {
                entity: primary.clone(),
                id,
            },
            values,
        });
    }

    TableView {
        primary: Some(primary),
        columns,
        rows,
    }
}

/// Record id as text, disambiguated so keys stay unique even when the data
/// has missing or repeated ids.
///
/// A suffix is bumped until the candidate is free, since a real id may
/// already look like a disambiguated one (`ch_1#2`).
fn unique_id(value: &Value, index: usize, seen: &mut HashSet<String>) -> String {
    let (base, mut id) = match value.key() {
        Some(key) => (key.clone(), key),
        None => (String::new(), format!("#{}", index)),
    };
    let mut suffix = index;
    while seen.contains(&id) {
        id = format!("{}#{}", base, suffix);
        suffix += 1;
    }
    seen.insert(id.clone());
    id
}

/// Index over a related entity, keyed by its join column.
struct JoinIndex<'a> {
    local: String,
    by_key: HashMap<String, &'a Record>,
}

impl<'a> JoinIndex<'a> {
    fn lookup(&self, primary_record: &Record) -> Option<&'a Record> {
        let key = primary_record.get(&self.local).key()?;
        self.by_key.get(&key).copied()
    }
}

fn resolve_joins<'a>(
    snapshot: &'a WarehouseSnapshot,
    schema: &Schema,
    primary: &str,
    fields: &[SelectedField],
) -> HashMap<String, JoinIndex<'a>> {
    let mut joins = HashMap::new();

    for field in fields {
        if field.entity == primary || joins.contains_key(&field.entity) {
            continue;
        }

        let Some(keys) = schema.join_keys(primary, &field.entity) else {
            debug!(primary, related = %field.entity, "no relationship; related columns stay null");
            continue;
        };

        let mut by_key = HashMap::new();
        for record in snapshot.get_entity(&field.entity) {
            if let Some(key) = record.get(&keys.remote).key() {
                // first match wins so a one-to-many hop never duplicates rows
                by_key.entry(key).or_insert(record);
            }
        }

        joins.insert(
            field.entity.clone(),
            JoinIndex {
                local: keys.local,
                by_key,
            },
        );
    }

    joins
}
