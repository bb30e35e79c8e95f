#[path = "../support/mod.rs"]
mod support;

use ledgerview::model::{FieldRef, FilterCondition, FilterOperator, FilterValue};
use ledgerview::view::{apply_filters, build_rows, RowView};
use support::{ledger_snapshot, row_ids, schema};

fn field(qualified: &str) -> FieldRef {
    qualified.parse().unwrap()
}

fn charge_rows() -> Vec<RowView> {
    let fields = vec![
        field("charges.id"),
        field("charges.amount"),
        field("charges.status"),
        field("charges.refunded"),
        field("charges.description"),
        field("charges.created"),
        field("customers.country"),
        field("customers.delinquent"),
    ];
    build_rows(&ledger_snapshot(), &schema(), &fields, None, None).rows
}

fn kept(conditions: Vec<FilterCondition>) -> Vec<String> {
    row_ids(&apply_filters(charge_rows(), &conditions, &schema()))
}

#[test]
fn test_inclusive_date_between_covers_the_last_day() {
    let ids = kept(vec![FilterCondition::new(
        field("charges.created"),
        FilterOperator::Between,
        FilterValue::between("2025-01-01", "2025-01-31"),
    )]);

    // ch_3 is 2025-01-31T23:59:59, ch_4 is 2025-02-01T00:00:00
    assert_eq!(ids, vec!["ch_1", "ch_2", "ch_3", "ch_5"]);
}

#[test]
fn test_date_comparisons() {
    let after = kept(vec![FilterCondition::new(
        field("charges.created"),
        FilterOperator::GreaterThan,
        "2025-01-20",
    )]);
    assert_eq!(after, vec!["ch_3", "ch_4"]);

    let on = kept(vec![FilterCondition::new(
        field("charges.created"),
        FilterOperator::Equals,
        "2025-01-15",
    )]);
    assert_eq!(on, vec!["ch_5"]);
}

#[test]
fn test_number_comparisons() {
    let greater = kept(vec![FilterCondition::new(
        field("charges.amount"),
        FilterOperator::GreaterThan,
        1000,
    )]);
    assert_eq!(greater, vec!["ch_2", "ch_4", "ch_5"]);

    let reversed = kept(vec![FilterCondition::new(
        field("charges.amount"),
        FilterOperator::Between,
        FilterValue::between(3000, 1000),
    )]);
    assert_eq!(reversed, vec!["ch_1", "ch_2", "ch_5"]);

    let typed_as_text = kept(vec![FilterCondition::new(
        field("charges.amount"),
        FilterOperator::Equals,
        "500",
    )]);
    assert_eq!(typed_as_text, vec!["ch_3"]);
}

#[test]
fn test_boolean_and_enum() {
    let refunded = kept(vec![FilterCondition::unary(
        field("charges.refunded"),
        FilterOperator::IsTrue,
    )]);
    assert_eq!(refunded, vec!["ch_4"]);

    let succeeded = kept(vec![FilterCondition::new(
        field("charges.status"),
        FilterOperator::In,
        FilterValue::list(["succeeded"]),
    )]);
    assert_eq!(succeeded, vec!["ch_1", "ch_2", "ch_4", "ch_5"]);
}

#[test]
fn test_conditions_on_joined_fields() {
    // ch_4 has no customer, so its country is null and fails `in`
    let european = kept(vec![FilterCondition::new(
        field("customers.country"),
        FilterOperator::In,
        "GB, FR",
    )]);
    assert_eq!(european, vec!["ch_1", "ch_2", "ch_3"]);

    let not_delinquent = kept(vec![FilterCondition::unary(
        field("customers.delinquent"),
        FilterOperator::IsFalse,
    )]);
    assert_eq!(not_delinquent, vec!["ch_1", "ch_3", "ch_5"]);
}

#[test]
fn test_text_contains_is_case_insensitive() {
    let ids = kept(vec![FilterCondition::new(
        field("charges.description"),
        FilterOperator::Contains,
        "PLAN",
    )]);
    assert_eq!(ids, vec!["ch_1"]);
}

#[test]
fn test_is_blank_matches_missing_values() {
    let ids = kept(vec![FilterCondition::unary(
        field("charges.description"),
        FilterOperator::IsBlank,
    )]);
    assert_eq!(ids, vec!["ch_4", "ch_5"]);
}

#[test]
fn test_conditions_are_and_combined() {
    let ids = kept(vec![
        FilterCondition::new(
            field("charges.status"),
            FilterOperator::Equals,
            "succeeded",
        ),
        FilterCondition::new(field("charges.amount"), FilterOperator::LessThan, 2500),
    ]);
    assert_eq!(ids, vec!["ch_1", "ch_5"]);
}

#[test]
fn test_malformed_condition_shows_everything() {
    let ids = kept(vec![
        FilterCondition::new(field("charges.refunded"), FilterOperator::Contains, "x"),
        FilterCondition::new(field("charges.unknown"), FilterOperator::Equals, 1),
        FilterCondition::unary(field("charges.amount"), FilterOperator::GreaterThan),
    ]);
    assert_eq!(ids.len(), 5);
}

#[test]
fn test_conditions_deserialize_from_report_json() {
    let condition: FilterCondition = serde_json::from_str(
        r#"{"field": "charges.created", "operator": "between", "value": ["2025-01-01", "2025-01-31"]}"#,
    )
    .unwrap();
    assert_eq!(condition.operator, FilterOperator::Between);
    assert_eq!(
        condition.value,
        FilterValue::between("2025-01-01", "2025-01-31")
    );
}

#[test]
fn test_filtering_twice_equals_filtering_once() {
    let schema = schema();
    let conditions = vec![
        FilterCondition::new(field("charges.amount"), FilterOperator::GreaterThan, 600),
        FilterCondition::new(field("customers.country"), FilterOperator::In, "GB, FR, US"),
    ];

    let once = apply_filters(charge_rows(), &conditions, &schema);
    let twice = apply_filters(once.clone(), &conditions, &schema);
    assert_eq!(once, twice);
    assert_eq!(row_ids(&once), vec!["ch_1", "ch_2", "ch_5"]);
}
