#[path = "../support/mod.rs"]
mod support;

use ledgerview::config::Settings;
use ledgerview::metric::CalculationOutcome;
use ledgerview::model::{
    FieldRef, FilterCondition, FilterOperator, FilterSet, ReportConfig, SortDirection, SortItem,
    TimeWindow,
};
use ledgerview::report::{load_report_config, load_required, ReportEngine, Staged};
use ledgerview::units::UnitType;
use ledgerview::warehouse::{StaticLoader, Warehouse};
use support::{date, january, ledger_loader, ledger_snapshot, row_ids, schema};

const AVERAGE_CHARGE: &str = r#"
name = "Average charge"
fields = ["charges.id", "charges.amount", "customers.name"]
field_order = ["customers.name"]
grain = "month"

[window]
start = "2025-01-01"
end = "2025-02-01"

[sort]
column = "charges.amount"
direction = "desc"

[[filters.conditions]]
field = "charges.status"
operator = "equals"
value = "succeeded"

[formula]
expose_blocks = ["revenue"]

[[formula.blocks]]
id = "revenue"
source = "charges.amount"
operator = "sum"

[[formula.blocks.filters]]
field = "charges.status"
operator = "equals"
value = "succeeded"

[[formula.blocks]]
id = "count"
source = "charges.id"
operator = "count"

[[formula.blocks.filters]]
field = "charges.status"
operator = "equals"
value = "succeeded"

[formula.calculation]
operator = "divide"
left = "revenue"
right = "count"
"#;

fn average_charge() -> ReportConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("average_charge.toml");
    std::fs::write(&path, AVERAGE_CHARGE).unwrap();
    load_report_config(&path).unwrap()
}

#[test]
fn test_table_and_metric_reconcile() {
    let engine = ReportEngine::new(schema());
    let output = engine.run(&ledger_snapshot(), &average_charge()).unwrap();

    assert_eq!(output.version, 1);
    assert_eq!(
        output.table.columns,
        vec!["customers.name", "charges.id", "charges.amount"]
    );
    assert_eq!(row_ids(&output.table.rows), vec!["ch_2", "ch_5", "ch_1"]);

    let table_total: f64 = output
        .table
        .rows
        .iter()
        .filter_map(|r| r.get("charges.amount").as_f64())
        .sum();

    let formula = output.formula.unwrap();
    assert_eq!(formula.exposed[0].value, Some(table_total));
    assert_eq!(
        formula.calculation,
        Some(CalculationOutcome::Value {
            value: Some(2000.0),
            unit: UnitType::Currency
        })
    );
}

#[test]
fn test_filter_on_hidden_field() {
    let config = ReportConfig {
        fields: vec![FieldRef::new("charges", "id")],
        filters: FilterSet::new(vec![FilterCondition::new(
            FieldRef::new("customers", "country"),
            FilterOperator::In,
            "GB",
        )]),
        ..Default::default()
    };

    let table = ReportEngine::new(schema())
        .table(&ledger_snapshot(), &config)
        .unwrap();

    assert_eq!(table.columns, vec!["charges.id"]);
    assert_eq!(row_ids(&table.rows), vec!["ch_1", "ch_3"]);
    assert!(table.rows.iter().all(|r| r.values.len() == 1));
}

#[test]
fn test_recomputation_is_idempotent() {
    let engine = ReportEngine::new(schema());
    let snapshot = ledger_snapshot();
    let config = average_charge();

    assert_eq!(
        engine.run(&snapshot, &config).unwrap(),
        engine.run(&snapshot, &config).unwrap()
    );
}

#[test]
fn test_cached_engine_matches_uncached() {
    let snapshot = ledger_snapshot();
    let config = average_charge();
    let plain = ReportEngine::new(schema());
    let cached = ReportEngine::new(schema()).with_cache();

    let expected = plain.run(&snapshot, &config).unwrap();
    assert_eq!(cached.run(&snapshot, &config).unwrap(), expected);
    assert_eq!(cached.cache().unwrap().stats().entry_count, 2);

    // served from cache
    assert_eq!(cached.run(&snapshot, &config).unwrap(), expected);
    assert_eq!(cached.cache().unwrap().stats().entry_count, 2);
}

#[tokio::test]
async fn test_reload_invalidates_cached_results() {
    let warehouse = Warehouse::new(ledger_loader());
    let config = average_charge();
    load_required(&warehouse, &config).await;

    let engine = ReportEngine::new(schema()).with_cache();
    let before = engine.run(&warehouse.snapshot(), &config).unwrap();

    warehouse.reload_entity("charges").await.unwrap();
    let after = engine.run(&warehouse.snapshot(), &config).unwrap();

    assert!(after.version > before.version);
    assert_eq!(after.table, before.table);
    // the older version's entries are gone
    assert_eq!(engine.cache().unwrap().stats().entry_count, 2);
}

#[tokio::test]
async fn test_missing_entity_reads_as_empty() {
    let warehouse = Warehouse::new(StaticLoader::new().with_entity("charges", support::charges()));
    let config = average_charge();

    let errors = load_required(&warehouse, &config).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].entity(), "customers");

    let output = ReportEngine::new(schema())
        .run(&warehouse.snapshot(), &config)
        .unwrap();
    assert_eq!(output.table.rows.len(), 3);
    assert!(output
        .table
        .rows
        .iter()
        .all(|r| r.get("customers.name").is_null()));
}

#[test]
fn test_series_per_block() {
    let mut config = average_charge();
    config.window = Some(TimeWindow::from_dates(date(2025, 1, 1), date(2025, 3, 1)));

    let series = ReportEngine::new(schema())
        .series(&ledger_snapshot(), &config)
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].block_id, "revenue");
    assert_eq!(series[0].unit, UnitType::Currency);
    let revenue: Vec<Option<f64>> = series[0].points.iter().map(|p| p.value).collect();
    assert_eq!(revenue, vec![Some(6000.0), Some(9000.0)]);
    assert_eq!(series[1].unit, UnitType::Count);
}

#[test]
fn test_bucket_narrows_table_and_metrics() {
    let mut config = average_charge();
    config.bucket = Some(TimeWindow::from_dates(date(2025, 1, 10), date(2025, 1, 17)));

    let output = ReportEngine::new(schema())
        .run(&ledger_snapshot(), &config)
        .unwrap();

    assert_eq!(row_ids(&output.table.rows), vec!["ch_5"]);
    assert_eq!(output.formula.unwrap().blocks[0].value, Some(2000.0));
}

#[test]
fn test_engine_default_grain_from_settings() {
    let settings: Settings = toml::from_str("[report]\ndefault_grain = \"week\"\ncache_enabled = false").unwrap();
    let engine = ReportEngine::from_settings(&settings);
    assert!(engine.cache().is_none());

    let mut config = average_charge();
    config.grain = None;
    config.window = Some(january());

    let series = engine.series(&ledger_snapshot(), &config).unwrap();
    // 2024-12-30, Jan 6, 13, 20, 27
    assert_eq!(series[0].points.len(), 5);
    assert_eq!(
        series[0].points[0].bucket.start.date_naive(),
        date(2025, 1, 1)
    );
}

#[test]
fn test_staged_config_only_reaches_engine_when_applied() {
    let engine = ReportEngine::new(schema());
    let snapshot = ledger_snapshot();
    let mut staged = Staged::new(average_charge());

    staged.edit().sort = Some(SortItem {
        column: "charges.amount".to_string(),
        direction: SortDirection::Asc,
    });
    let shown = engine.table(&snapshot, staged.committed()).unwrap();
    assert_eq!(row_ids(&shown.rows), vec!["ch_2", "ch_5", "ch_1"]);

    assert!(staged.apply());
    let shown = engine.table(&snapshot, staged.committed()).unwrap();
    assert_eq!(row_ids(&shown.rows), vec!["ch_1", "ch_5", "ch_2"]);
}
