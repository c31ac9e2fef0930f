//! Risk priority utilities
//!
//! Total order over [`RiskLevel`] and the merge used to turn per-detector
//! outcomes into one overall level.

use crate::models::config::MergePolicy;
use crate::models::types::{DetectorReport, RiskLevel};

/// Numeric rank of a level (higher is more severe)
#[inline]
pub fn priority(level: RiskLevel) -> u8 {
    level as u8
}

/// Rank of a textual label. Unrecognized labels rank as `safe`.
pub fn priority_of(label: &str) -> u8 {
    priority(RiskLevel::from_label(label))
}

/// Most severe level of the input. Empty input yields `Unknown`
/// ("nothing measured"), and among equal ranks the first one wins.
pub fn highest<I>(levels: I) -> RiskLevel
where
    I: IntoIterator<Item = RiskLevel>,
{
    let mut levels = levels.into_iter();
    let Some(first) = levels.next() else {
        return RiskLevel::Unknown;
    };
    levels.fold(first, |best, level| {
        if priority(level) > priority(best) {
            level
        } else {
            best
        }
    })
}

/// `highest` over textual labels, parsed leniently
pub fn highest_label<'a, I>(labels: I) -> RiskLevel
where
    I: IntoIterator<Item = &'a str>,
{
    highest(labels.into_iter().map(RiskLevel::from_label))
}

/// Merge per-detector reports into the overall level and the flattened,
/// `[id]`-prefixed detail list. Details keep report order, then per-report
/// order; failures contribute their message.
pub fn combine_results(reports: &[DetectorReport], policy: MergePolicy) -> (RiskLevel, Vec<String>) {
    let overall = highest(
        reports
            .iter()
            .filter(|r| policy == MergePolicy::IncludeFailures || r.outcome.is_success())
            .map(|r| r.outcome.risk_level()),
    );

    let details = reports
        .iter()
        .flat_map(|r| {
            r.outcome
                .details()
                .iter()
                .map(move |detail| format!("[{}] {}", r.detector_id, detail))
        })
        .collect();

    (overall, details)
}
