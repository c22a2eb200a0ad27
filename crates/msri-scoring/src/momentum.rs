//! Momentum overlay: flags a falling composite before it crosses a tier.

use msri_core::MomentumPolicy;

use crate::types::Deterioration;

/// Compare `current` with the composite `policy.lookback` periods ago.
///
/// `history` holds previous composite scores in chronological order, most
/// recent last, excluding `current`. Fires when the drop reaches
/// `policy.threshold` and `current` is still below `policy.upper_bound`.
/// Returns `None` when disabled or when history is shorter than the lookback.
#[must_use]
pub fn detect_deterioration(
    current: f64,
    history: &[f64],
    policy: &MomentumPolicy,
) -> Option<Deterioration> {
    if !policy.enabled || policy.lookback == 0 {
        return None;
    }

    let index = history.len().checked_sub(policy.lookback)?;
    let delta = current - history[index];

    (delta <= policy.threshold && current < policy.upper_bound).then_some(Deterioration {
        delta,
        lookback: policy.lookback,
    })
}
