use chrono::NaiveDate;
use harvest_core::{HarvestSummary, WinRecord};
use serde_json::json;

#[test]
fn summary_tolerates_missing_fields() {
    let records: Vec<WinRecord> = [
        json!({ "date_of_win": "2025-01-03", "prize_amount_usd": 600, "retailer": "A", "retailer_location": "Quincy" }),
        json!({ "date_of_win": "2024-12-30T00:00:00", "prize_amount_usd": "1000", "retailer": "B", "retailer_location": "Quincy" }),
        json!({ "prize_amount_usd": "n/a", "retailer": "A" }),
        json!({ "date_of_win": null, "prize_amount_usd": 200 }),
    ]
    .into_iter()
    .filter_map(WinRecord::from_value)
    .collect();

    let summary = HarvestSummary::from_records(&records);
    assert_eq!(summary.wins, 4);
    assert_eq!(summary.total_payout, 1800.0);
    assert_eq!(summary.median_payout, Some(600.0));
    assert_eq!(summary.unique_retailers, 2);
    assert_eq!(summary.unique_cities, 1);
    assert_eq!(summary.first_win, NaiveDate::from_ymd_opt(2024, 12, 30));
    assert_eq!(summary.last_win, NaiveDate::from_ymd_opt(2025, 1, 3));
}

#[test]
fn empty_summary_has_no_median_or_dates() {
    let summary = HarvestSummary::from_records(&[]);
    assert_eq!(summary, HarvestSummary::default());
}
