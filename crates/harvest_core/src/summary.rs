use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::record::{FIELD_RETAILER, FIELD_RETAILER_LOCATION, FIELD_WIN_DATE};
use crate::WinRecord;

/// Headline figures over a harvested record set. Read-only; records with
/// missing or unparseable fields are counted but skipped for the figure
/// they cannot contribute to.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HarvestSummary {
    pub wins: usize,
    pub total_payout: f64,
    pub median_payout: Option<f64>,
    pub unique_retailers: usize,
    pub unique_cities: usize,
    pub first_win: Option<NaiveDate>,
    pub last_win: Option<NaiveDate>,
}

impl HarvestSummary {
    pub fn from_records(records: &[WinRecord]) -> Self {
        let mut amounts: Vec<f64> = records
            .iter()
            .filter_map(WinRecord::amount)
            .filter(|a| a.is_finite())
            .collect();
        amounts.sort_by(f64::total_cmp);

        let retailers: HashSet<&str> = records
            .iter()
            .filter_map(|r| r.str_field(FIELD_RETAILER))
            .collect();
        let cities: HashSet<&str> = records
            .iter()
            .filter_map(|r| r.str_field(FIELD_RETAILER_LOCATION))
            .collect();

        let dates: Vec<NaiveDate> = records
            .iter()
            .filter_map(|r| r.str_field(FIELD_WIN_DATE))
            .filter_map(parse_win_date)
            .collect();

        Self {
            wins: records.len(),
            total_payout: amounts.iter().sum(),
            median_payout: median(&amounts),
            unique_retailers: retailers.len(),
            unique_cities: cities.len(),
            first_win: dates.iter().min().copied(),
            last_win: dates.iter().max().copied(),
        }
    }
}

/// Accepts `YYYY-MM-DD` with or without a trailing time part.
fn parse_win_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn median(sorted: &[f64]) -> Option<f64> {
    match sorted.len() {
        0 => None,
        n if n % 2 == 1 => Some(sorted[n / 2]),
        n => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_date_accepts_timestamps() {
        assert_eq!(
            parse_win_date("2025-03-04T12:00:00"),
            NaiveDate::from_ymd_opt(2025, 3, 4)
        );
        assert_eq!(parse_win_date("03/04/2025"), None);
        assert_eq!(parse_win_date("short"), None);
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert_eq!(median(&[1.0, 2.0, 4.0, 10.0]), Some(3.0));
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[]), None);
    }
}
