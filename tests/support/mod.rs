//! Shared ledger fixture for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use ledgerview::model::{Record, Schema, TimeWindow};
use ledgerview::warehouse::{StaticLoader, WarehouseSnapshot};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `[2025-01-01, 2025-02-01)`
pub fn january() -> TimeWindow {
    TimeWindow::from_dates(date(2025, 1, 1), date(2025, 2, 1))
}

pub fn customers() -> Vec<Record> {
    vec![
        Record::new()
            .with("id", "cus_1")
            .with("name", "Ada")
            .with("country", "GB")
            .with("delinquent", false)
            .with("created", "2024-11-02T09:00:00Z"),
        Record::new()
            .with("id", "cus_2")
            .with("name", "Émile")
            .with("country", "FR")
            .with("delinquent", true)
            .with("created", "2024-12-10T09:00:00Z"),
        Record::new()
            .with("id", "cus_3")
            .with("name", "bob")
            .with("country", "US")
            .with("delinquent", false)
            .with("created", "2025-01-05T09:00:00Z"),
    ]
}

/// January holds ch_1, ch_2, ch_3 and ch_5; ch_4 sits exactly on the
/// February boundary. ch_4 points at a customer that does not exist.
pub fn charges() -> Vec<Record> {
    let charge = |id: &str, customer: &str, amount: f64, status: &str, created: &str| {
        Record::new()
            .with("id", id)
            .with("customer_id", customer)
            .with("amount", amount)
            .with("status", status)
            .with("refunded", false)
            .with("created", created)
    };

    vec![
        charge("ch_1", "cus_1", 1000.0, "succeeded", "2025-01-03T10:00:00Z")
            .with("description", "Monthly plan"),
        charge("ch_2", "cus_2", 3000.0, "succeeded", "2025-01-20T10:00:00Z")
            .with("description", "Annual upgrade"),
        charge("ch_3", "cus_1", 500.0, "failed", "2025-01-31T23:59:59Z")
            .with("description", "Card declined"),
        charge("ch_4", "cus_9", 9000.0, "succeeded", "2025-02-01T00:00:00Z")
            .with("refunded", true),
        charge("ch_5", "cus_3", 2000.0, "succeeded", "2025-01-15"),
    ]
}

/// cus_1 has two subscriptions; the first one is the join match.
pub fn subscriptions() -> Vec<Record> {
    vec![
        Record::new()
            .with("id", "sub_1")
            .with("customer_id", "cus_1")
            .with("status", "active")
            .with("quantity", 2)
            .with("mrr", 2000)
            .with("created", "2024-11-02T09:05:00Z"),
        Record::new()
            .with("id", "sub_2")
            .with("customer_id", "cus_1")
            .with("status", "canceled")
            .with("quantity", 1)
            .with("mrr", 900)
            .with("created", "2024-12-01T00:00:00Z"),
    ]
}

pub fn ledger_snapshot() -> WarehouseSnapshot {
    WarehouseSnapshot::from_entities(
        1,
        vec![
            ("customers".to_string(), customers()),
            ("charges".to_string(), charges()),
            ("subscriptions".to_string(), subscriptions()),
        ],
    )
}

pub fn ledger_loader() -> StaticLoader {
    StaticLoader::new()
        .with_entity("customers", customers())
        .with_entity("charges", charges())
        .with_entity("subscriptions", subscriptions())
}

pub fn schema() -> Schema {
    Schema::ledger()
}

/// Ids of the primary records, in row order.
pub fn row_ids(rows: &[ledgerview::view::RowView]) -> Vec<String> {
    rows.iter().map(|r| r.key.id.clone()).collect()
}
