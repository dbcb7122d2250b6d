//! Subscription rules: security pre-filter, filtering and scoring.
//!
//! Results flow through [`SecurityPolicyFilter::apply`] first, then
//! [`RuleEngine::filter_and_sort_results`], which narrows the set and orders
//! it best-first.

mod criteria;
mod engine;
mod pattern;
mod security;

pub use criteria::{FilterGroup, FilterRule, RuleKind, RuleLogic, SubscriptionCriteria};
pub use engine::{FilterStage, RuleEngine, ScoredResult};
pub use pattern::TextPattern;
pub use security::{SecurityPolicy, SecurityPolicyFilter};
