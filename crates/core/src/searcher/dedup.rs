//! Deduplication of torrent search results across indexers.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::TorrentResult;
use crate::parser::title_similarity;

const SANE_SIZE_GB: std::ops::RangeInclusive<f64> = 0.5..=50.0;

/// Keyless results above this title similarity are the same release.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Merge results that point at the same torrent.
///
/// Results are keyed by lowercase info_hash, falling back to an identical
/// magnet link. A result with neither key merges into the first kept record
/// whose title is similar enough. The better record wins (more seeders, then
/// a plausible size, then the newer upload). First-seen order is preserved.
pub fn deduplicate_results(results: Vec<TorrentResult>) -> Vec<TorrentResult> {
    let mut kept: Vec<TorrentResult> = Vec::with_capacity(results.len());
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for mut result in results {
        if let Some(hash) = result.info_hash.as_mut() {
            hash.make_ascii_lowercase();
        }

        let keys = dedup_keys(&result);
        let existing = if keys.is_empty() {
            kept.iter().position(|k| {
                title_similarity(&result.title, &k.title) > TITLE_SIMILARITY_THRESHOLD
            })
        } else {
            keys.iter().find_map(|k| by_key.get(k).copied())
        };

        match existing {
            Some(idx) => {
                if is_better(&result, &kept[idx]) {
                    kept[idx] = result;
                }
                // Both records' keys now resolve to the same slot.
                for key in keys.into_iter().chain(dedup_keys(&kept[idx])) {
                    by_key.entry(key).or_insert(idx);
                }
            }
            None => {
                let idx = kept.len();
                for key in keys {
                    by_key.insert(key, idx);
                }
                kept.push(result);
            }
        }
    }

    kept
}

fn dedup_keys(result: &TorrentResult) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    if let Some(hash) = result.info_hash.as_deref().filter(|h| !h.is_empty()) {
        keys.push(format!("hash:{}", hash.to_ascii_lowercase()));
    }
    if let Some(magnet) = result.magnet_link.as_deref().filter(|m| !m.is_empty()) {
        keys.push(format!("magnet:{}", magnet));
    }
    keys
}

fn is_better(candidate: &TorrentResult, current: &TorrentResult) -> bool {
    let sane = |r: &TorrentResult| SANE_SIZE_GB.contains(&r.size_gb);
    candidate
        .seeders
        .cmp(&current.seeders)
        .then_with(|| sane(candidate).cmp(&sane(current)))
        .then_with(|| candidate.uploaded_at().cmp(&current.uploaded_at()))
        == Ordering::Greater
}
