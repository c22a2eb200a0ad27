use std::time::Duration;

use async_trait::async_trait;
use msri_core::SourceSpec;
use reqwest::Client;
use serde_json::Value;

use super::{IndicatorPayload, SourceFetcher};
use crate::error::FetchError;
use crate::retry::retry_with_backoff;

/// Generic fetcher for sources that serve a flat JSON object of indicator
/// values from `SourceSpec::url`.
///
/// Accepts either `{"vix": 18.2, ...}` or the same object nested under an
/// `"indicators"` key. Numbers pass through, numeric strings are parsed, and
/// `null` or anything else becomes an explicit missing value.
#[derive(Debug, Clone)]
pub struct HttpJsonFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpJsonFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    /// # Errors
    ///
    /// See [`HttpJsonFetcher::new`].
    pub fn from_app_config(config: &msri_core::AppConfig) -> Result<Self, FetchError> {
        Self::new(
            config.fetch_timeout_secs,
            &config.fetch_user_agent,
            config.fetch_max_retries,
            config.fetch_retry_backoff_ms,
        )
    }
}

#[async_trait]
impl SourceFetcher for HttpJsonFetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<IndicatorPayload, FetchError> {
        let url = source
            .url
            .clone()
            .ok_or_else(|| FetchError::NoUrl(source.id.clone()))?;

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                let value: Value =
                    serde_json::from_str(&body).map_err(|e| FetchError::Deserialize {
                        context: format!("indicator payload from {url}"),
                        source: e,
                    })?;
                payload_from_json(&value).ok_or(FetchError::UnexpectedShape { url })
            }
        })
        .await
    }
}

pub(crate) fn payload_from_json(value: &Value) -> Option<IndicatorPayload> {
    let object = value.as_object()?;
    let object = match object.get("indicators") {
        Some(Value::Object(inner)) => inner,
        _ => object,
    };

    Some(
        object
            .iter()
            .map(|(name, v)| (name.clone(), numeric(v)))
            .collect(),
    )
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
