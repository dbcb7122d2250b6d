//! Risk-tolerance pre-filter.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metrics;
use crate::searcher::TorrentResult;

/// A subscription's risk tolerance. Defaults forbid H&R exposure and do not
/// require free torrents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    pub allow_hr: bool,
    /// Extended H&R tier (H3/H5). There is no dedicated signal for it, so
    /// `is_hr` stands in.
    pub allow_h3h5: bool,
    pub strict_free_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    HitAndRun,
    ExtendedHitAndRun,
    NotFree,
}

impl Violation {
    fn label(self) -> &'static str {
        match self {
            Violation::HitAndRun => "hr",
            Violation::ExtendedHitAndRun => "h3h5",
            Violation::NotFree => "free_only",
        }
    }
}

/// Removes results that break a [`SecurityPolicy`].
pub struct SecurityPolicyFilter;

impl SecurityPolicyFilter {
    pub fn apply(results: Vec<TorrentResult>, policy: &SecurityPolicy) -> Vec<TorrentResult> {
        let before = results.len();
        let mut removed = [0usize; 3];

        let kept: Vec<TorrentResult> = results
            .into_iter()
            .filter(|r| match Self::violation(r, policy) {
                Some(v) => {
                    removed[v as usize] += 1;
                    metrics::SECURITY_FILTERED.with_label_values(&[v.label()]).inc();
                    false
                }
                None => true,
            })
            .collect();

        if kept.len() < before {
            info!(
                removed = before - kept.len(),
                hr = removed[Violation::HitAndRun as usize],
                h3h5 = removed[Violation::ExtendedHitAndRun as usize],
                free_only = removed[Violation::NotFree as usize],
                kept = kept.len(),
                "Security policy removed results"
            );
        }
        kept
    }

    /// Whether a single result passes the policy.
    pub fn allows(result: &TorrentResult, policy: &SecurityPolicy) -> bool {
        Self::violation(result, policy).is_none()
    }

    fn violation(result: &TorrentResult, policy: &SecurityPolicy) -> Option<Violation> {
        if !policy.allow_hr && result.is_hr {
            return Some(Violation::HitAndRun);
        }
        if !policy.allow_h3h5 && result.is_hr {
            return Some(Violation::ExtendedHitAndRun);
        }
        if policy.strict_free_only && !(result.is_free || result.is_half_free) {
            return Some(Violation::NotFree);
        }
        None
    }
}
