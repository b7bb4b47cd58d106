use harvest_core::{dedupe, WinRecord};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record(value: Value) -> WinRecord {
    WinRecord::from_value(value).expect("object")
}

fn win(date: &str, amount: u64, name: &str, game: &str) -> WinRecord {
    record(json!({
        "date_of_win": date,
        "prize_amount_usd": amount,
        "name": name,
        "retailer": "Corner Store",
        "retailer_location": "Quincy",
        "game": game,
    }))
}

#[test]
fn keeps_first_seen_when_only_non_identity_fields_differ() {
    let first = win("2025-01-02", 600, "Lucky 7s", "Scratch A");
    let second = win("2025-01-02", 600, "Lucky 7s", "Scratch B");

    let out = dedupe(vec![first.clone(), second]);
    assert_eq!(out, vec![first]);
}

#[test]
fn preserves_input_order_of_survivors() {
    let a = win("2025-01-01", 100, "A", "g");
    let b = win("2025-01-02", 200, "B", "g");
    let c = win("2025-01-03", 300, "C", "g");

    let out = dedupe(vec![a.clone(), b.clone(), a.clone(), c.clone(), b.clone()]);
    assert_eq!(out, vec![a, b, c]);
}

#[test]
fn dedupe_is_idempotent() {
    let records = vec![
        win("2025-01-01", 100, "A", "g"),
        win("2025-01-01", 100, "A", "h"),
        win("2025-01-01", 101, "A", "g"),
        record(json!({ "name": "no date" })),
        record(json!({ "name": "no date", "date_of_win": null })),
    ];

    let once = dedupe(records);
    let twice = dedupe(once.clone());
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn records_missing_every_identity_field_collapse_together() {
    let out = dedupe(vec![
        record(json!({ "game": "x" })),
        record(json!({ "game": "y" })),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].str_field("game"), Some("x"));
}

#[test]
fn numeric_and_string_amounts_are_distinct_keys() {
    let numeric = record(json!({ "prize_amount_usd": 600 }));
    let text = record(json!({ "prize_amount_usd": "600" }));
    assert_eq!(dedupe(vec![numeric.clone(), text.clone()]), vec![numeric, text]);
}

#[test]
fn same_text_in_string_fields_still_collapses() {
    let a = record(json!({ "name": "Lucky 7s", "prize_amount_usd": "600", "game": "a" }));
    let b = record(json!({ "name": "Lucky 7s", "prize_amount_usd": "600", "game": "b" }));
    assert_eq!(dedupe(vec![a.clone(), b]), vec![a]);
}
