#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEffect {
    FetchFirst,
    Dispatch { offsets: Vec<u64> },
    /// Stop handing out offsets; in-flight fetches may finish.
    StopDispatch,
    Progress { fetched: u64, total: u64 },
    Warn(crate::HarvestWarning),
    Completed,
    Aborted(crate::PageFailure),
}
