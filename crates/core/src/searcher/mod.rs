//! Canonical search types and multi-indexer search.
//!
//! [`SearchOrchestrator`] fans one [`SearchRequest`] out to every eligible
//! indexer and returns the concatenated [`TorrentResult`]s. A
//! [`SiteGuard`] may veto individual sites before dispatch.

mod dedup;
mod orchestrator;
mod site_guard;
mod types;

pub use dedup::deduplicate_results;
pub use orchestrator::{SearchOrchestrator, SearchReport, SkippedIndexer};
pub use site_guard::{OpenSiteGuard, SiteBudget, SiteGuard, SiteGuardError};
pub use types::*;
