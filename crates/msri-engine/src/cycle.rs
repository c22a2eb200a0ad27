//! One end-to-end scoring cycle: fetch, grade, normalize, score, persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use msri_core::{AppConfig, IndexConfig};
use msri_health::{fetch_all, retry_budget, HealthMonitor, HealthSummary, SourceFetcher};
use msri_scoring::{evaluate, RawIndicators, ScoringError};
use msri_store::{KvStore, MergedSeriesSummary, SeriesCache, StoreError, TimeSeriesPoint};
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::history::IndicatorHistory;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Outer bound on one source's fetch, retries included.
    pub fetch_timeout: Duration,
    pub merge_max_attempts: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(20),
            merge_max_attempts: msri_store::series::DEFAULT_MERGE_ATTEMPTS,
        }
    }
}

impl EngineOptions {
    /// `fetch_timeout_secs` bounds a single request; the outer bound is
    /// sized so every configured retry can still run.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: retry_budget(
                Duration::from_secs(config.fetch_timeout_secs),
                config.fetch_max_retries,
                config.fetch_retry_backoff_ms,
            ),
            merge_max_attempts: config.merge_max_attempts,
        }
    }
}

/// What a cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Scored and merged into the series.
    Scored {
        point: TimeSeriesPoint,
        merged: MergedSeriesSummary,
        health: HealthSummary,
    },
    /// Too few indicators; nothing was written.
    Skipped {
        reason: ScoringError,
        health: HealthSummary,
    },
    /// Scored, but the series write failed. The point is still usable.
    WriteFailed {
        point: TimeSeriesPoint,
        error: StoreError,
        health: HealthSummary,
    },
}

impl CycleOutcome {
    #[must_use]
    pub fn health(&self) -> &HealthSummary {
        match self {
            Self::Scored { health, .. }
            | Self::Skipped { health, .. }
            | Self::WriteFailed { health, .. } => health,
        }
    }

    #[must_use]
    pub fn point(&self) -> Option<&TimeSeriesPoint> {
        match self {
            Self::Scored { point, .. } | Self::WriteFailed { point, .. } => Some(point),
            Self::Skipped { .. } => None,
        }
    }
}

pub struct Engine {
    config: Arc<IndexConfig>,
    fetcher: Arc<dyn SourceFetcher>,
    monitor: Mutex<HealthMonitor>,
    history: IndicatorHistory,
    series: SeriesCache,
    options: EngineOptions,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("series", &self.series)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    #[must_use]
    pub fn new(
        config: IndexConfig,
        store: Arc<dyn KvStore>,
        fetcher: Arc<dyn SourceFetcher>,
        options: EngineOptions,
    ) -> Self {
        let config = Arc::new(config);
        let monitor = HealthMonitor::new(&config.sources).with_store(Arc::clone(&store));
        let history = IndicatorHistory::new(Arc::clone(&store), config.scoring.population_window);
        let series = SeriesCache::new(store, config.series.clone(), config.events.clone())
            .with_max_attempts(options.merge_max_attempts);
        Self {
            config,
            fetcher,
            monitor: Mutex::new(monitor),
            history,
            series,
            options,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[must_use]
    pub fn series(&self) -> &SeriesCache {
        &self.series
    }

    /// Load persisted health reports into the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn restore_health(&self) -> Result<usize, StoreError> {
        self.monitor.lock().await.restore().await
    }

    pub async fn health(&self, now: DateTime<Utc>) -> HealthSummary {
        self.monitor.lock().await.summary(now)
    }

    /// Run a cycle for `date`, timestamping health reports with the current
    /// time.
    ///
    /// # Errors
    ///
    /// See [`Engine::run_cycle_at`].
    pub async fn run_cycle(&self, date: NaiveDate) -> Result<CycleOutcome, EngineError> {
        self.run_cycle_at(date, Utc::now()).await
    }

    /// Run a cycle for `date` with an explicit clock.
    ///
    /// Source failures and insufficient data are reported through the
    /// outcome, as is a failed series write.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only when the indicator history or the prior
    /// composites cannot be read, since scoring is impossible without them.
    pub async fn run_cycle_at(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, EngineError> {
        let outcomes = fetch_all(
            self.fetcher.as_ref(),
            &self.config.sources,
            self.options.fetch_timeout,
        )
        .await;

        let mut raw = RawIndicators::new();
        let health = {
            let mut monitor = self.monitor.lock().await;
            for outcome in &outcomes {
                monitor.record(outcome, now).await;
                let (Some(payload), Some(spec)) =
                    (outcome.payload(), self.config.source(&outcome.source_id))
                else {
                    continue;
                };
                for name in spec.expected_indicators() {
                    raw.insert(name.to_string(), payload.get(name).copied().flatten());
                }
            }
            monitor.summary(now)
        };

        if let Err(e) = self.history.record(date, &raw).await {
            tracing::warn!(%date, error = %e, "failed to record indicator history");
        }

        let populations = self
            .history
            .populations(self.config.pillar_indicators())
            .await
            .map_err(EngineError::History)?;
        let prior = self
            .series
            .recent_composites(date, self.config.scoring.momentum.lookback)
            .await
            .map_err(EngineError::Series)?;

        let result = match evaluate(&raw, &populations, &prior, &self.config) {
            Ok(result) => result,
            Err(reason) => {
                tracing::info!(%date, health = %health.status, %reason, "cycle skipped");
                return Ok(CycleOutcome::Skipped { reason, health });
            }
        };

        let point = TimeSeriesPoint::new(date, result);
        match self.series.merge_point(point.clone()).await {
            Ok(merged) => {
                tracing::info!(
                    %date,
                    composite = ?point.result.composite,
                    status = ?point.result.status,
                    breaches = ?point.result.breach_flags,
                    health = %health.status,
                    "cycle scored"
                );
                Ok(CycleOutcome::Scored {
                    point,
                    merged,
                    health,
                })
            }
            Err(error) => {
                tracing::error!(%date, error = %error, "series write failed");
                Ok(CycleOutcome::WriteFailed {
                    point,
                    error,
                    health,
                })
            }
        }
    }
}
