//! Pillar aggregation.

use msri_core::PillarConfig;

use crate::types::{NormalizedIndicators, PillarScores};

/// Average the available members of each pillar.
///
/// A pillar with no available member is `None`, never `0.0`: missing data
/// must not read as a stress signal. Every configured pillar appears in the
/// output.
#[must_use]
pub fn aggregate_pillars(
    normalized: &NormalizedIndicators,
    pillars: &[PillarConfig],
) -> PillarScores {
    pillars
        .iter()
        .map(|pillar| {
            let values: Vec<f64> = pillar
                .indicators
                .iter()
                .filter_map(|name| normalized.get(name).copied().flatten())
                .collect();

            let score = if values.is_empty() {
                tracing::debug!(pillar = %pillar.name, "no member indicators available");
                None
            } else {
                #[allow(clippy::cast_precision_loss)]
                let denom = values.len() as f64;
                Some(values.iter().sum::<f64>() / denom)
            };

            (pillar.name.clone(), score)
        })
        .collect()
}
