pub mod acquisition;
pub mod config;
pub mod decision;
pub mod indexer;
pub mod metrics;
pub mod parser;
pub mod rules;
pub mod searcher;
pub mod testing;

pub use acquisition::{
    AcquisitionOutcome, AcquisitionPipeline, AcquisitionReport, AcquisitionRequest,
    DownloadInitiator, HandoffError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DecisionConfig,
    IndexerConfig, SanitizedConfig, SearchConfig,
};
pub use decision::{
    Decision, DecisionContext, DecisionOutcome, DecisionReason, DecisionService, ExistingItem,
    HrRecord, HrStatus, RiskLookup, RiskLookupError,
};
pub use indexer::{Indexer, IndexerError, IndexerRegistry, IndexerStatus};
pub use parser::{ParserKind, ParserStrategy, SiteParser, TorrentDetail};
pub use rules::{RuleEngine, SecurityPolicy, SecurityPolicyFilter, SubscriptionCriteria};
pub use searcher::{
    deduplicate_results, MediaType, SearchOrchestrator, SearchReport, SearchRequest, SiteBudget,
    SiteGuard, SiteGuardError, TorrentResult,
};
