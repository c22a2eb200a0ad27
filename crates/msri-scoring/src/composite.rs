//! Composite score, status tier, breach flags and multiplier.

use msri_core::{PillarConfig, Status, TierThresholds};

use crate::types::PillarScores;

/// Weighted mean over present pillars with weights renormalized among them.
///
/// Returns `None` when no pillar is present or the present pillars carry no
/// weight. Pillars missing from `weights` are ignored.
#[must_use]
pub fn composite_score(pillars: &PillarScores, weights: &[PillarConfig]) -> Option<f64> {
    let (weighted, total) = weights
        .iter()
        .filter_map(|p| {
            pillars
                .get(&p.name)
                .copied()
                .flatten()
                .map(|score| (score, p.weight))
        })
        .fold((0.0, 0.0), |(acc, total), (score, weight)| {
            (acc + score * weight, total + weight)
        });

    if total <= 0.0 {
        return None;
    }
    Some((weighted / total).clamp(0.0, 1.0))
}

/// Level-based tier. Lower bounds are inclusive, so a score exactly on a
/// threshold lands in the higher tier.
#[must_use]
pub fn classify(score: f64, tiers: &TierThresholds) -> Status {
    if score >= tiers.robust {
        Status::Robust
    } else if score >= tiers.stable {
        Status::Stable
    } else if score >= tiers.stretched {
        Status::Stretched
    } else {
        Status::Fragile
    }
}

/// Names of present pillars scoring strictly below `threshold`, in name order.
#[must_use]
pub fn breach_flags(pillars: &PillarScores, threshold: f64) -> Vec<String> {
    pillars
        .iter()
        .filter(|(_, score)| score.is_some_and(|s| s < threshold))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Impact multiplier, `2 - score`. Ranges from 1.0 (fully resilient) to 2.0.
#[must_use]
pub fn multiplier(score: f64) -> f64 {
    2.0 - score.clamp(0.0, 1.0)
}
