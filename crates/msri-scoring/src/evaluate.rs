//! One full scoring pass: normalize, aggregate, combine, classify.

use msri_core::{IndexConfig, Status};

use crate::composite::{breach_flags, classify, composite_score, multiplier};
use crate::error::ScoringError;
use crate::momentum::detect_deterioration;
use crate::normalize::normalize_all;
use crate::pillars::aggregate_pillars;
use crate::types::{CompositeScoreResult, Populations, RawIndicators};

/// Evaluate one cycle.
///
/// `populations` supplies the comparison population per indicator and
/// `history` the previous composite scores (chronological, most recent last)
/// for the momentum overlay.
///
/// # Errors
///
/// Returns [`ScoringError::InsufficientData`] when fewer than
/// `scoring.min_indicators` indicators normalize to a value. The caller must
/// skip the cycle; no neutral score is fabricated.
pub fn evaluate(
    raw: &RawIndicators,
    populations: &Populations,
    history: &[f64],
    config: &IndexConfig,
) -> Result<CompositeScoreResult, ScoringError> {
    let scoring = &config.scoring;
    let normalized = normalize_all(raw, populations, config);
    let available = normalized.values().filter(|v| v.is_some()).count();

    if available < scoring.min_indicators {
        return Err(ScoringError::InsufficientData {
            available,
            required: scoring.min_indicators,
        });
    }

    let pillars = aggregate_pillars(&normalized, &config.pillars);
    let composite = composite_score(&pillars, &config.pillars);
    let breaches = breach_flags(&pillars, scoring.breach_threshold);

    let level_status = composite.map(|c| classify(c, &scoring.tiers));
    let deterioration =
        composite.and_then(|c| detect_deterioration(c, history, &scoring.momentum));
    let status = if deterioration.is_some() {
        Some(Status::Deteriorating)
    } else {
        level_status
    };

    if let Some(d) = deterioration {
        tracing::info!(
            delta = d.delta,
            lookback = d.lookback,
            level = ?level_status,
            "momentum overlay fired; status overridden to deteriorating"
        );
    }

    Ok(CompositeScoreResult {
        composite,
        pillars,
        status,
        level_status,
        breach_flags: breaches,
        multiplier: composite.map(multiplier),
        deterioration,
        indicators_used: available,
    })
}
