use std::collections::HashSet;

use crate::WinRecord;

/// Keep the first record for each identity key, preserving input order.
pub fn dedupe<I>(records: I) -> Vec<WinRecord>
where
    I: IntoIterator<Item = WinRecord>,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.identity_key()))
        .collect()
}
