use serde::{Deserialize, Serialize};

/// Index status tier. Level tiers are ordered best to worst; `Deteriorating`
/// is the momentum overlay and replaces the level tier when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Robust,
    Stable,
    Stretched,
    Fragile,
    Deteriorating,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Robust,
        Status::Stable,
        Status::Stretched,
        Status::Fragile,
        Status::Deteriorating,
    ];

    /// Tiers that count as an early-warning signal for lead-time analytics.
    #[must_use]
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            Status::Stretched | Status::Fragile | Status::Deteriorating
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Robust => "robust",
            Status::Stable => "stable",
            Status::Stretched => "stretched",
            Status::Fragile => "fragile",
            Status::Deteriorating => "deteriorating",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health grade for one upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Stale,
    Down,
}

impl HealthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Stale => "stale",
            HealthStatus::Down => "down",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_tiers() {
        assert!(!Status::Robust.is_warning());
        assert!(!Status::Stable.is_warning());
        assert!(Status::Stretched.is_warning());
        assert!(Status::Fragile.is_warning());
        assert!(Status::Deteriorating.is_warning());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::Deteriorating).unwrap();
        assert_eq!(json, "\"deteriorating\"");
        let back: Status = serde_json::from_str("\"stretched\"").unwrap();
        assert_eq!(back, Status::Stretched);
    }

    #[test]
    fn health_status_defaults_to_unknown() {
        assert_eq!(HealthStatus::default(), HealthStatus::Unknown);
        assert_eq!(HealthStatus::Stale.to_string(), "stale");
    }
}
