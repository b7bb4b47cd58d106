#[derive(Debug, Clone, PartialEq)]
pub enum HarvestMsg {
    /// Caller submitted a validated query.
    Start,
    /// Remaining offsets were handed to the worker pool.
    Dispatched,
    /// A page arrived (first page or worker result).
    PageFetched(crate::Page),
    /// An offset exhausted its retry budget.
    PageFailed(crate::PageFailure),
}
