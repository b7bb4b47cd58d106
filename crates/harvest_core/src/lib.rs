//! Harvest core: query model, record identity, offset planning, dedupe and
//! the pure harvest state machine.
mod dedupe;
mod effect;
mod msg;
mod plan;
mod query;
pub mod record;
mod state;
mod summary;
mod update;

pub use dedupe::dedupe;
pub use effect::HarvestEffect;
pub use msg::HarvestMsg;
pub use plan::plan_offsets;
pub use query::{Query, QueryError, QuerySignature};
pub use record::{IdentityKey, WinRecord};
pub use state::{
    CollectedPages, FailureMode, HarvestState, HarvestWarning, Page, PageFailure, Phase,
};
pub use summary::HarvestSummary;
pub use update::update;
