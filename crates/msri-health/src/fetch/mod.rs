//! Fetching indicator payloads from upstream sources.

mod http;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use msri_core::SourceSpec;

use crate::error::FetchError;

pub use http::HttpJsonFetcher;

/// Indicator name to value as delivered; `None` is an explicit null.
pub type IndicatorPayload = BTreeMap<String, Option<f64>>;

/// Adapts one provider's wire format into an [`IndicatorPayload`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceSpec) -> Result<IndicatorPayload, FetchError>;
}

/// Result of one fetch attempt, successful or not.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub result: Result<IndicatorPayload, FetchError>,
    pub latency_ms: u64,
}

impl SourceOutcome {
    /// The payload, if the fetch returned one.
    #[must_use]
    pub fn payload(&self) -> Option<&IndicatorPayload> {
        self.result.as_ref().ok()
    }
}

/// Fetch every source concurrently, each bounded by `timeout`.
///
/// Outcomes come back in `sources` order. A slow or failing source never
/// affects the others.
pub async fn fetch_all(
    fetcher: &dyn SourceFetcher,
    sources: &[SourceSpec],
    timeout: Duration,
) -> Vec<SourceOutcome> {
    let attempts = sources.iter().map(|source| async move {
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, fetcher.fetch(source)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: millis(timeout),
            }),
        };
        let latency_ms = millis(started.elapsed());

        match &result {
            Ok(payload) => tracing::debug!(
                source = %source.id,
                latency_ms,
                indicators = payload.len(),
                "source fetched"
            ),
            Err(e) => tracing::warn!(
                source = %source.id,
                latency_ms,
                error = %e,
                "source fetch failed"
            ),
        }

        SourceOutcome {
            source_id: source.id.clone(),
            result,
            latency_ms,
        }
    });

    join_all(attempts).await
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
