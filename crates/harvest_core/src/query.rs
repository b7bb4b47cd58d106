use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("date_to {date_to} is before date_from {date_from}")]
    InvertedRange {
        date_from: NaiveDate,
        date_to: NaiveDate,
    },
}

/// A harvest request: an inclusive date range and an optional set of
/// categories (cities). An empty category set means unfiltered.
///
/// Categories are normalized on construction (trimmed, empties dropped,
/// deduplicated and sorted), so two queries with the same effective filters
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    date_from: NaiveDate,
    date_to: NaiveDate,
    categories: BTreeSet<String>,
}

impl Query {
    pub fn new<I, S>(date_from: NaiveDate, date_to: NaiveDate, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let categories = categories
            .into_iter()
            .filter_map(|c| normalize_category(c.as_ref()))
            .collect();
        Self {
            date_from,
            date_to,
            categories,
        }
    }

    pub fn unfiltered(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self::new(date_from, date_to, std::iter::empty::<&str>())
    }

    /// Split a comma separated category list such as `"Quincy, N Quincy"`.
    pub fn parse_categories(raw: &str) -> Vec<String> {
        raw.split(',')
            .filter_map(normalize_category)
            .collect()
    }

    pub fn date_from(&self) -> NaiveDate {
        self.date_from
    }

    pub fn date_to(&self) -> NaiveDate {
        self.date_to
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn is_unfiltered(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.date_to < self.date_from {
            return Err(QueryError::InvertedRange {
                date_from: self.date_from,
                date_to: self.date_to,
            });
        }
        Ok(())
    }

    /// Comma joined categories in sorted order, or `None` when unfiltered.
    pub fn categories_param(&self) -> Option<String> {
        if self.categories.is_empty() {
            return None;
        }
        Some(
            self.categories
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature::of(self)
    }

    fn canonical_form(&self) -> String {
        format!(
            "date_from={};date_to={};categories={}",
            self.date_from.format("%Y-%m-%d"),
            self.date_to.format("%Y-%m-%d"),
            self.categories_param().unwrap_or_default()
        )
    }
}

fn normalize_category(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Deterministic cache key for a [`Query`]: hex SHA-256 of its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuerySignature(String);

impl QuerySignature {
    pub fn of(query: &Query) -> Self {
        let digest = Sha256::digest(query.canonical_form().as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for log lines. Shorter signatures are
    /// returned whole.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
