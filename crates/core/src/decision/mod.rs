//! Terminal download decision for a single candidate.

mod risk;
mod service;
mod types;

pub use risk::{HrRecord, HrStatus, RiskLookup, RiskLookupError};
pub use service::DecisionService;
pub use types::{
    Decision, DecisionContext, DecisionOutcome, DecisionReason, ExistingItem,
};
