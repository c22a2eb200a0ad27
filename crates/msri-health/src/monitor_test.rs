use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, TimeZone};
use msri_core::IndicatorSpec;
use msri_store::MemoryStore;

use super::*;
use crate::error::FetchError;
use crate::fetch::IndicatorPayload;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap()
}

fn spec(id: &str, indicators: &[(&str, f64, f64)]) -> SourceSpec {
    SourceSpec {
        id: id.to_string(),
        url: None,
        cadence: None,
        max_staleness_hours: 24,
        indicators: indicators
            .iter()
            .map(|(name, min, max)| IndicatorSpec {
                name: (*name).to_string(),
                min: *min,
                max: *max,
            })
            .collect(),
    }
}

fn sources() -> Vec<SourceSpec> {
    vec![
        spec("options", &[("vix", 5.0, 90.0), ("move_index", 30.0, 300.0)]),
        spec("credit", &[("hy_credit_spread", 1.0, 25.0)]),
    ]
}

fn ok(id: &str, pairs: &[(&str, Option<f64>)]) -> SourceOutcome {
    let payload: IndicatorPayload = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), *v))
        .collect();
    SourceOutcome {
        source_id: id.to_string(),
        result: Ok(payload),
        latency_ms: 12,
    }
}

fn failed(id: &str) -> SourceOutcome {
    SourceOutcome {
        source_id: id.to_string(),
        result: Err(FetchError::Timeout { after_ms: 20_000 }),
        latency_ms: 20_000,
    }
}

#[test]
fn starts_unknown() {
    let monitor = HealthMonitor::new(&sources());
    let summary = monitor.summary(t0());
    assert_eq!(summary.status, HealthStatus::Unknown);
    assert_eq!(summary.unknown_sources, vec!["credit", "options"]);
}

#[tokio::test]
async fn complete_payload_is_healthy() {
    let mut monitor = HealthMonitor::new(&sources());
    let report = monitor
        .record(&ok("options", &[("vix", Some(18.0)), ("move_index", Some(95.0))]), t0())
        .await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.last_success, Some(t0()));
    assert_eq!(report.latency_ms, Some(12));
}

#[tokio::test]
async fn missing_indicator_degrades() {
    let mut monitor = HealthMonitor::new(&sources());
    let report = monitor
        .record(&ok("options", &[("vix", Some(18.0)), ("move_index", None)]), t0())
        .await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.missing, vec!["move_index"]);
    assert_eq!(report.last_success, Some(t0()));
}

#[tokio::test]
async fn range_violation_degrades_but_counts_as_success() {
    let mut monitor = HealthMonitor::new(&sources());
    let report = monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(480.0))]), t0())
        .await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.last_success, Some(t0()));
}

#[tokio::test]
async fn empty_or_failed_result_is_down() {
    let mut monitor = HealthMonitor::new(&sources());
    let report = monitor
        .record(&ok("credit", &[("hy_credit_spread", None)]), t0())
        .await;
    assert_eq!(report.status, HealthStatus::Down);
    assert_eq!(report.last_success, None);

    let report = monitor.record(&failed("credit"), t0()).await;
    assert_eq!(report.status, HealthStatus::Down);
    assert_eq!(report.consecutive_failures, 2);
    assert!(report.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn recovery_resets_failures_but_keeps_last_success_history() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.0))]), t0())
        .await;
    let later = t0() + Duration::hours(1);
    let report = monitor.record(&failed("credit"), later).await;
    assert_eq!(report.last_success, Some(t0()));
    assert_eq!(report.last_attempt, Some(later));
    assert_eq!(report.consecutive_failures, 1);

    let report = monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.1))]), later)
        .await;
    assert_eq!(report.consecutive_failures, 0);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn stale_promotion_applies_to_display_only() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.0))]), t0())
        .await;

    let within = monitor.summary(t0() + Duration::hours(24));
    assert!(within.stale_sources.is_empty());

    let beyond = monitor.summary(t0() + Duration::hours(25));
    assert_eq!(beyond.stale_sources, vec!["credit"]);
    assert_eq!(beyond.status, HealthStatus::Degraded);
    assert_eq!(
        monitor.report("credit").unwrap().status,
        HealthStatus::Healthy
    );
}

#[tokio::test]
async fn never_successful_source_is_not_stale() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor.record(&failed("credit"), t0()).await;
    let summary = monitor.summary(t0() + Duration::days(30));
    assert_eq!(summary.down_sources, vec!["credit"]);
    assert!(summary.stale_sources.is_empty());
}

#[tokio::test]
async fn long_dead_source_stays_down_past_staleness() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.0))]), t0())
        .await;
    monitor.record(&failed("credit"), t0() + Duration::hours(1)).await;
    monitor.record(&failed("credit"), t0() + Duration::hours(30)).await;

    let summary = monitor.summary(t0() + Duration::hours(30));
    assert_eq!(summary.status, HealthStatus::Down);
    assert_eq!(summary.down_sources, vec!["credit"]);
    assert!(summary.stale_sources.is_empty());

    let report = monitor.report("credit").unwrap();
    assert_eq!(report.consecutive_failures, 2);
    assert_eq!(
        report.displayed_status(t0() + Duration::days(10), Duration::hours(24)),
        HealthStatus::Down
    );
}

#[tokio::test]
async fn stale_promotion_covers_degraded_sources() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor
        .record(&ok("options", &[("vix", Some(18.0)), ("move_index", None)]), t0())
        .await;

    let summary = monitor.summary(t0() + Duration::hours(25));
    assert_eq!(summary.stale_sources, vec!["options"]);
    assert!(summary.degraded_sources.is_empty());
    assert_eq!(summary.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn any_down_source_makes_overall_down() {
    let mut monitor = HealthMonitor::new(&sources());
    monitor
        .record(&ok("options", &[("vix", Some(18.0)), ("move_index", Some(95.0))]), t0())
        .await;
    monitor.record(&failed("credit"), t0()).await;
    assert_eq!(monitor.summary(t0()).status, HealthStatus::Down);
}

#[test]
fn aggregation_precedence() {
    use HealthStatus::{Degraded, Down, Healthy, Stale, Unknown};
    assert_eq!(aggregate_status([Healthy, Healthy, Down]), Down);
    assert_eq!(aggregate_status([Stale, Degraded, Down]), Down);
    assert_eq!(aggregate_status([Healthy, Stale]), Degraded);
    assert_eq!(aggregate_status([Healthy, Unknown]), Healthy);
    assert_eq!(aggregate_status([Unknown]), Unknown);
    assert_eq!(aggregate_status(std::iter::empty()), Unknown);
}

#[tokio::test]
async fn reports_are_persisted_and_restored() {
    let store = Arc::new(MemoryStore::default());
    let mut monitor = HealthMonitor::new(&sources()).with_store(store.clone());
    monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.0))]), t0())
        .await;
    store.put("health/garbled", b"{}").await.unwrap();

    let mut fresh = HealthMonitor::new(&sources()).with_store(store);
    assert_eq!(fresh.restore().await.unwrap(), 1);
    assert_eq!(
        fresh.report("credit").unwrap().status,
        HealthStatus::Healthy
    );
    assert_eq!(
        fresh.report("options").unwrap().status,
        HealthStatus::Unknown
    );
}

/// Store whose writes always fail.
struct BrokenStore;

#[async_trait]
impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Backend("offline".to_string()))
    }

    async fn put(&self, _key: &str, _blob: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Backend("offline".to_string()))
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Backend("offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("offline".to_string()))
    }

    async fn compare_and_put(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _blob: &[u8],
    ) -> Result<bool, StoreError> {
        Err(StoreError::Backend("offline".to_string()))
    }

    fn max_record_bytes(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn persistence_failure_does_not_block_recording() {
    let mut monitor = HealthMonitor::new(&sources()).with_store(Arc::new(BrokenStore));
    let report = monitor
        .record(&ok("credit", &[("hy_credit_spread", Some(4.0))]), t0())
        .await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(
        monitor.report("credit").unwrap().status,
        HealthStatus::Healthy
    );
}

#[test]
fn summary_lists_every_configured_source() {
    let monitor = HealthMonitor::new(&sources());
    let ids: BTreeMap<_, _> = monitor
        .summary(t0())
        .reports
        .into_iter()
        .map(|r| (r.source_id, r.status))
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.values().all(|s| *s == HealthStatus::Unknown));
}
