//! Per-source health state machine and cross-source summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use msri_core::{HealthStatus, SourceSpec};
use msri_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::fetch::SourceOutcome;
use crate::validate::{validate_payload, PayloadValidation, RangeViolation};

const HEALTH_PREFIX: &str = "health/";

/// Latest grading of one source. Overwritten on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub source_id: String,
    /// Status recorded at the last attempt. See
    /// [`HealthReport::displayed_status`] for the staleness-aware view.
    pub status: HealthStatus,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub missing: Vec<String>,
    pub violations: Vec<RangeViolation>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub consecutive_failures: u32,
}

impl HealthReport {
    #[must_use]
    pub fn unknown(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            status: HealthStatus::Unknown,
            last_attempt: None,
            last_success: None,
            missing: Vec::new(),
            violations: Vec::new(),
            latency_ms: None,
            error: None,
            consecutive_failures: 0,
        }
    }

    /// Recorded status, promoted to `stale` once the last success is older
    /// than `max_staleness`. A source that never succeeded is never stale,
    /// and a `down` source stays `down`.
    #[must_use]
    pub fn displayed_status(
        &self,
        now: DateTime<Utc>,
        max_staleness: chrono::Duration,
    ) -> HealthStatus {
        match (self.status, self.last_success) {
            (HealthStatus::Down, _) => HealthStatus::Down,
            (_, Some(at)) if now - at > max_staleness => HealthStatus::Stale,
            (status, _) => status,
        }
    }
}

/// Cross-source view. `reports` carry their displayed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub degraded_sources: Vec<String>,
    pub stale_sources: Vec<String>,
    pub down_sources: Vec<String>,
    pub unknown_sources: Vec<String>,
    pub reports: Vec<HealthReport>,
}

/// Strict precedence: down, then degraded or stale, then healthy. Unknown
/// sources do not drag the result down; if nothing but unknown is present
/// the overall status is unknown.
#[must_use]
pub fn aggregate_status<I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = HealthStatus>,
{
    let mut any_known = false;
    let mut any_degraded = false;
    for status in statuses {
        match status {
            HealthStatus::Down => return HealthStatus::Down,
            HealthStatus::Degraded | HealthStatus::Stale => {
                any_known = true;
                any_degraded = true;
            }
            HealthStatus::Healthy => any_known = true,
            HealthStatus::Unknown => {}
        }
    }
    if any_degraded {
        HealthStatus::Degraded
    } else if any_known {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unknown
    }
}

pub struct HealthMonitor {
    sources: BTreeMap<String, SourceSpec>,
    reports: BTreeMap<String, HealthReport>,
    store: Option<Arc<dyn KvStore>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("reports", &self.reports)
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Every configured source starts `unknown`.
    #[must_use]
    pub fn new(sources: &[SourceSpec]) -> Self {
        Self {
            sources: sources.iter().map(|s| (s.id.clone(), s.clone())).collect(),
            reports: sources
                .iter()
                .map(|s| (s.id.clone(), HealthReport::unknown(&s.id)))
                .collect(),
            store: None,
        }
    }

    /// Persist every recorded report under `health/{source_id}`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Load persisted reports for configured sources. Returns how many were
    /// restored; unreadable reports and sources no longer configured are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn restore(&mut self) -> Result<usize, StoreError> {
        let Some(store) = self.store.clone() else {
            return Ok(0);
        };
        let mut restored = 0;
        for key in store.list(HEALTH_PREFIX).await? {
            let Some(blob) = store.get(&key).await? else {
                continue;
            };
            let report: HealthReport = match serde_json::from_slice(&blob) {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable health report");
                    continue;
                }
            };
            if self.sources.contains_key(&report.source_id) {
                self.reports.insert(report.source_id.clone(), report);
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Grade one fetch attempt and persist the report.
    ///
    /// Persistence failures are logged and swallowed.
    pub async fn record(&mut self, outcome: &SourceOutcome, now: DateTime<Utc>) -> HealthReport {
        let previous = self
            .reports
            .get(&outcome.source_id)
            .cloned()
            .unwrap_or_else(|| HealthReport::unknown(&outcome.source_id));

        let mut report = HealthReport {
            last_attempt: Some(now),
            latency_ms: Some(outcome.latency_ms),
            missing: Vec::new(),
            violations: Vec::new(),
            error: None,
            ..previous
        };

        match &outcome.result {
            Err(e) => {
                report.status = HealthStatus::Down;
                report.error = Some(e.to_string());
            }
            Ok(payload) => {
                let validation = match self.sources.get(&outcome.source_id) {
                    Some(spec) => validate_payload(spec, payload),
                    None => {
                        tracing::warn!(
                            source = %outcome.source_id,
                            "outcome for unconfigured source"
                        );
                        PayloadValidation {
                            present: payload
                                .values()
                                .filter(|v| v.is_some_and(f64::is_finite))
                                .count(),
                            ..PayloadValidation::default()
                        }
                    }
                };
                if validation.is_empty_result() {
                    report.status = HealthStatus::Down;
                    report.error = Some("source returned no indicator values".to_string());
                } else {
                    report.last_success = Some(now);
                    let clean = validation.missing.is_empty() && validation.violations.is_empty();
                    report.status = if clean {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Degraded
                    };
                }
                report.missing = validation.missing;
                report.violations = validation.violations;
            }
        }

        report.consecutive_failures = if report.status == HealthStatus::Down {
            report.consecutive_failures.saturating_add(1)
        } else {
            0
        };

        match report.status {
            HealthStatus::Down => tracing::warn!(
                source = %report.source_id,
                failures = report.consecutive_failures,
                error = report.error.as_deref().unwrap_or_default(),
                "source down"
            ),
            HealthStatus::Degraded => tracing::warn!(
                source = %report.source_id,
                missing = ?report.missing,
                violations = report.violations.len(),
                "source degraded"
            ),
            _ => tracing::debug!(
                source = %report.source_id,
                status = %report.status,
                "source healthy"
            ),
        }

        self.persist(&report).await;
        self.reports.insert(report.source_id.clone(), report.clone());
        report
    }

    #[must_use]
    pub fn report(&self, source_id: &str) -> Option<&HealthReport> {
        self.reports.get(source_id)
    }

    /// Summary as of `now`, with staleness applied.
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> HealthSummary {
        let mut summary = HealthSummary {
            status: HealthStatus::Unknown,
            degraded_sources: Vec::new(),
            stale_sources: Vec::new(),
            down_sources: Vec::new(),
            unknown_sources: Vec::new(),
            reports: Vec::with_capacity(self.reports.len()),
        };

        for report in self.reports.values() {
            let status = self.sources.get(&report.source_id).map_or(report.status, |spec| {
                report.displayed_status(now, spec.max_staleness())
            });
            let id = report.source_id.clone();
            match status {
                HealthStatus::Down => summary.down_sources.push(id),
                HealthStatus::Degraded => summary.degraded_sources.push(id),
                HealthStatus::Stale => summary.stale_sources.push(id),
                HealthStatus::Unknown => summary.unknown_sources.push(id),
                HealthStatus::Healthy => {}
            }
            summary.reports.push(HealthReport {
                status,
                ..report.clone()
            });
        }

        summary.status = aggregate_status(summary.reports.iter().map(|r| r.status));
        summary
    }

    async fn persist(&self, report: &HealthReport) {
        let Some(store) = &self.store else {
            return;
        };
        let key = format!("{HEALTH_PREFIX}{}", report.source_id);
        let result = match serde_json::to_vec(report) {
            Ok(blob) => store.put(&key, &blob).await,
            Err(e) => Err(StoreError::from(e)),
        };
        if let Err(e) = result {
            tracing::warn!(
                source = %report.source_id,
                error = %e,
                "failed to persist health report"
            );
        }
    }
}

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;
