//! Static index configuration: pillars, thresholds, source specs, reference events.
//!
//! Loaded once from YAML at startup, validated, then shared immutably.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub scoring: ScoringConfig,
    pub pillars: Vec<PillarConfig>,
    /// Indicators where a lower raw value means more resilience.
    #[serde(default)]
    pub lower_is_better: BTreeSet<String>,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub series: SeriesConfig,
    /// Canonical, ordered list. Order is the annotation tie-break.
    #[serde(default)]
    pub events: Vec<ReferenceEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_min_indicators")]
    pub min_indicators: usize,
    #[serde(default = "default_breach_threshold")]
    pub breach_threshold: f64,
    #[serde(default)]
    pub tiers: TierThresholds,
    #[serde(default)]
    pub momentum: MomentumPolicy,
    /// Number of historical raw values kept per indicator as the
    /// normalization population.
    #[serde(default = "default_population_window")]
    pub population_window: usize,
}

/// Lower bounds (inclusive) for the level tiers. Anything below
/// `stretched` is fragile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub robust: f64,
    pub stable: f64,
    pub stretched: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            robust: 0.65,
            stable: 0.50,
            stretched: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Periods between the current score and the comparison score.
    pub lookback: usize,
    /// Delta at or below which the overlay fires. Negative.
    pub threshold: f64,
    /// The overlay only fires while the composite is strictly below this.
    pub upper_bound: f64,
}

impl Default for MomentumPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback: 4,
            threshold: -0.05,
            upper_bound: 0.60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarConfig {
    pub name: String,
    pub weight: f64,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    /// Endpoint returning a flat JSON object of indicator values.
    #[serde(default)]
    pub url: Option<String>,
    /// Informational only.
    #[serde(default)]
    pub cadence: Option<String>,
    pub max_staleness_hours: u32,
    pub indicators: Vec<IndicatorSpec>,
}

impl SourceSpec {
    pub fn expected_indicators(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name.as_str())
    }

    #[must_use]
    pub fn max_staleness(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.max_staleness_hours))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    #[serde(default = "default_series_key")]
    pub key: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    #[serde(default = "default_event_tolerance_days")]
    pub event_tolerance_days: i64,
    #[serde(default = "default_lead_time_window_days")]
    pub lead_time_window_days: i64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            key: default_series_key(),
            chunk_size: default_chunk_size(),
            max_record_bytes: default_max_record_bytes(),
            event_tolerance_days: default_event_tolerance_days(),
            lead_time_window_days: default_lead_time_window_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEvent {
    pub name: String,
    pub date: NaiveDate,
}

fn default_min_indicators() -> usize {
    3
}

fn default_breach_threshold() -> f64 {
    0.40
}

fn default_population_window() -> usize {
    260
}

fn default_true() -> bool {
    true
}

fn default_series_key() -> String {
    "composite".to_string()
}

fn default_chunk_size() -> usize {
    100
}

fn default_max_record_bytes() -> usize {
    64 * 1024
}

fn default_event_tolerance_days() -> i64 {
    3
}

fn default_lead_time_window_days() -> i64 {
    90
}

impl IndexConfig {
    /// Every indicator referenced by any pillar.
    pub fn pillar_indicators(&self) -> impl Iterator<Item = &str> {
        self.pillars
            .iter()
            .flat_map(|p| p.indicators.iter().map(String::as_str))
    }

    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn is_lower_better(&self, indicator: &str) -> bool {
        self.lower_is_better.contains(indicator)
    }
}

/// Load and validate the index configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_index_config(path: &Path) -> Result<IndexConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IndexFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_index_config(&content)
}

/// Parse and validate an index configuration from a YAML string.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_index_config(content: &str) -> Result<IndexConfig, ConfigError> {
    let config: IndexConfig = serde_yaml::from_str(content)?;
    validate_index_config(&config)?;
    Ok(config)
}

fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    validate_scoring(&config.scoring)?;
    let provided = validate_sources(&config.sources)?;
    validate_pillars(&config.pillars, &provided)?;

    let pillar_members: HashSet<&str> = config.pillar_indicators().collect();
    for name in &config.lower_is_better {
        if !pillar_members.contains(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "lower_is_better lists unknown indicator '{name}'"
            )));
        }
    }

    validate_series(&config.series)?;

    let mut seen_events = HashSet::new();
    for event in &config.events {
        if event.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "reference event name must be non-empty".to_string(),
            ));
        }
        if !seen_events.insert(event.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate reference event: '{}'",
                event.name
            )));
        }
    }

    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    if scoring.min_indicators == 0 {
        return Err(ConfigError::Validation(
            "scoring.min_indicators must be at least 1".to_string(),
        ));
    }
    if !unit_interval(scoring.breach_threshold) {
        return Err(ConfigError::Validation(format!(
            "scoring.breach_threshold {} must be within [0, 1]",
            scoring.breach_threshold
        )));
    }

    let t = scoring.tiers;
    let ordered = unit_interval(t.robust)
        && unit_interval(t.stretched)
        && t.robust > t.stable
        && t.stable > t.stretched;
    if !ordered {
        return Err(ConfigError::Validation(format!(
            "scoring.tiers must satisfy 1 >= robust > stable > stretched >= 0 (got {}/{}/{})",
            t.robust, t.stable, t.stretched
        )));
    }

    let m = scoring.momentum;
    if m.lookback == 0 {
        return Err(ConfigError::Validation(
            "scoring.momentum.lookback must be at least 1".to_string(),
        ));
    }
    if !m.threshold.is_finite() || m.threshold > 0.0 {
        return Err(ConfigError::Validation(format!(
            "scoring.momentum.threshold {} must be a non-positive number",
            m.threshold
        )));
    }
    if !unit_interval(m.upper_bound) {
        return Err(ConfigError::Validation(format!(
            "scoring.momentum.upper_bound {} must be within [0, 1]",
            m.upper_bound
        )));
    }

    if scoring.population_window == 0 {
        return Err(ConfigError::Validation(
            "scoring.population_window must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates sources and returns the set of indicator names they provide.
fn validate_sources(sources: &[SourceSpec]) -> Result<HashSet<String>, ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one source must be configured".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut provided: HashMap<String, String> = HashMap::new();

    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id must be non-empty".to_string(),
            ));
        }
        if !seen_ids.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id: '{}'",
                source.id
            )));
        }
        if source.max_staleness_hours == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{}' must declare a positive max_staleness_hours",
                source.id
            )));
        }
        if source.indicators.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' declares no indicators",
                source.id
            )));
        }

        for indicator in &source.indicators {
            if !indicator.min.is_finite()
                || !indicator.max.is_finite()
                || indicator.min > indicator.max
            {
                return Err(ConfigError::Validation(format!(
                    "source '{}' indicator '{}' has invalid range [{}, {}]",
                    source.id, indicator.name, indicator.min, indicator.max
                )));
            }
            if let Some(owner) = provided.insert(indicator.name.clone(), source.id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "indicator '{}' is provided by both '{owner}' and '{}'",
                    indicator.name, source.id
                )));
            }
        }
    }

    Ok(provided.into_keys().collect())
}

fn validate_pillars(
    pillars: &[PillarConfig],
    provided: &HashSet<String>,
) -> Result<(), ConfigError> {
    if pillars.is_empty() {
        return Err(ConfigError::Validation(
            "at least one pillar must be configured".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();
    let mut seen_members = HashSet::new();
    let mut total_weight = 0.0;

    for pillar in pillars {
        if pillar.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "pillar name must be non-empty".to_string(),
            ));
        }
        if !seen_names.insert(pillar.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate pillar name: '{}'",
                pillar.name
            )));
        }
        if !pillar.weight.is_finite() || pillar.weight < 0.0 {
            return Err(ConfigError::Validation(format!(
                "pillar '{}' has invalid weight {}",
                pillar.name, pillar.weight
            )));
        }
        if pillar.indicators.is_empty() {
            return Err(ConfigError::Validation(format!(
                "pillar '{}' has no member indicators",
                pillar.name
            )));
        }
        for member in &pillar.indicators {
            if !provided.contains(member) {
                return Err(ConfigError::Validation(format!(
                    "pillar '{}' references indicator '{member}' that no source provides",
                    pillar.name
                )));
            }
            if !seen_members.insert(member.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "indicator '{member}' belongs to more than one pillar"
                )));
            }
        }
        total_weight += pillar.weight;
    }

    if total_weight <= 0.0 {
        return Err(ConfigError::Validation(
            "pillar weights must sum to a positive value".to_string(),
        ));
    }

    Ok(())
}

fn validate_series(series: &SeriesConfig) -> Result<(), ConfigError> {
    if series.key.trim().is_empty() || series.key.contains('/') {
        return Err(ConfigError::Validation(format!(
            "series.key '{}' must be non-empty and must not contain '/'",
            series.key
        )));
    }
    if series.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "series.chunk_size must be at least 1".to_string(),
        ));
    }
    if series.max_record_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "series.max_record_bytes {} is below the 1024 byte minimum",
            series.max_record_bytes
        )));
    }
    if series.event_tolerance_days < 0 || series.lead_time_window_days < 0 {
        return Err(ConfigError::Validation(
            "series day windows must be non-negative".to_string(),
        ));
    }
    Ok(())
}

fn unit_interval(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

#[cfg(test)]
#[path = "index_test.rs"]
mod tests;
