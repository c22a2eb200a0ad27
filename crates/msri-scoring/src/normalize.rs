//! Percentile winsorization onto `[0, 1]`.

use msri_core::IndexConfig;

use crate::types::{NormalizedIndicators, Populations, RawIndicators};

const LOWER_PERCENTILE: f64 = 0.01;
const UPPER_PERCENTILE: f64 = 0.99;

/// Percentile of a sorted, non-empty slice using linear interpolation
/// between closest ranks. `p` is a fraction in `[0, 1]`.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    #[allow(clippy::cast_precision_loss)]
    let rank = p.clamp(0.0, 1.0) * last as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(last);
    #[allow(clippy::cast_precision_loss)]
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Normalize one raw value against its comparison population.
///
/// The value is clipped to the population's 1st/99th percentiles and
/// rescaled so p1 maps to 0 and p99 to 1. A degenerate population (p1 ==
/// p99) yields 0.5. `lower_is_better` flips the result.
///
/// Returns `None` when the value is absent or non-finite, or when the
/// population has no finite members.
#[must_use]
pub fn normalize(value: Option<f64>, population: &[f64], lower_is_better: bool) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;

    let mut sorted: Vec<f64> = population.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let p_low = percentile(&sorted, LOWER_PERCENTILE)?;
    let p_high = percentile(&sorted, UPPER_PERCENTILE)?;

    let scaled = if (p_high - p_low).abs() <= f64::EPSILON {
        0.5
    } else {
        (value.clamp(p_low, p_high) - p_low) / (p_high - p_low)
    };

    let oriented = if lower_is_better { 1.0 - scaled } else { scaled };
    Some(oriented.clamp(0.0, 1.0))
}

/// Normalize every pillar member indicator.
///
/// Indicators not reported this cycle, or with no population, come back as
/// `None`. Indicators outside every pillar are ignored.
#[must_use]
pub fn normalize_all(
    raw: &RawIndicators,
    populations: &Populations,
    config: &IndexConfig,
) -> NormalizedIndicators {
    config
        .pillar_indicators()
        .map(|name| {
            let value = raw.get(name).copied().flatten();
            let population = populations.get(name).map_or(&[][..], Vec::as_slice);
            let normalized = normalize(value, population, config.is_lower_better(name));
            (name.to_string(), normalized)
        })
        .collect()
}
