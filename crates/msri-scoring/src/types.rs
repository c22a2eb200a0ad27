use std::collections::BTreeMap;

use msri_core::Status;
use serde::{Deserialize, Serialize};

/// Raw indicator values as delivered by sources. `None` means the source
/// reported the indicator but had no value.
pub type RawIndicators = BTreeMap<String, Option<f64>>;

/// Comparison population per indicator (historical window of raw values).
pub type Populations = BTreeMap<String, Vec<f64>>;

/// Indicator name to normalized value in `[0, 1]`, or absent.
pub type NormalizedIndicators = BTreeMap<String, Option<f64>>;

/// Pillar name to score in `[0, 1]`, or absent when no member was available.
pub type PillarScores = BTreeMap<String, Option<f64>>;

/// Momentum overlay details recorded when the deteriorating tier fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deterioration {
    pub delta: f64,
    pub lookback: usize,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScoreResult {
    /// Absent only when no weighted pillar was present.
    pub composite: Option<f64>,
    pub pillars: PillarScores,
    /// Final status after the momentum overlay.
    pub status: Option<Status>,
    /// Level-based tier before the overlay was applied.
    pub level_status: Option<Status>,
    pub breach_flags: Vec<String>,
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deterioration: Option<Deterioration>,
    pub indicators_used: usize,
}
