//! Testing utilities and mock implementations.
//!
//! Mocks for every collaborator the search and decision pipeline consumes,
//! so the whole flow can run without real tracker sites.
//!
//! # Example
//!
//! ```rust,ignore
//! use trackhub_core::testing::{fixtures, MockIndexer, MockSiteGuard};
//!
//! let registry = Arc::new(IndexerRegistry::new());
//! registry.add(Arc::new(
//!     MockIndexer::new("site-a").with_results(vec![fixtures::result("Show S01E01", "site-a", 12)]),
//! )).await;
//!
//! let guard = Arc::new(MockSiteGuard::new());
//! guard.block("site-b", "cooldown").await;
//! ```

mod mock_download;
mod mock_indexer;
mod mock_risk;
mod mock_site_guard;

pub use mock_download::{MockDownloadInitiator, RecordedHandoff};
pub use mock_indexer::{MockIndexer, RecordedSearch};
pub use mock_risk::MockRiskLookup;
pub use mock_site_guard::MockSiteGuard;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::TorrentResult;

    /// A usable result with a torrent URL and title-derived tags.
    pub fn result(title: &str, site: &str, seeders: u32) -> TorrentResult {
        let mut r = TorrentResult::new(title, site);
        r.torrent_url = Some(format!(
            "https://{}.example/download.php?id={}",
            site,
            title.len()
        ));
        r.seeders = seeders;
        r.leechers = seeders / 4;
        r.size_gb = 4.0;
        r.fill_from_title();
        r
    }

    /// A result with a magnet link. `hash_char` is repeated to form the
    /// 40-character info-hash, so it must be a hex digit.
    pub fn magnet_result(title: &str, site: &str, hash_char: &str, seeders: u32) -> TorrentResult {
        let hash = hash_char.repeat(40 / hash_char.len().max(1));
        let mut r = result(title, site, seeders);
        r.torrent_url = None;
        r.magnet_link = Some(format!("magnet:?xt=urn:btih:{}&dn={}", hash, title));
        r.info_hash = Some(hash.to_lowercase());
        r
    }

    /// A TV episode result, e.g. `Show.S01E03.1080p.WEB-DL`.
    pub fn episode(show: &str, season: u32, episode: u32, site: &str, seeders: u32) -> TorrentResult {
        result(
            &format!("{}.S{:02}E{:02}.1080p.WEB-DL.x265", show, season, episode),
            site,
            seeders,
        )
    }
}
