//! Source fetching and the per-source health monitor.
//!
//! Every fetch attempt becomes a [`SourceOutcome`]; the [`HealthMonitor`]
//! validates it against the source's [`msri_core::SourceSpec`] and grades the
//! source. Fetch failures never escape as errors from this layer.

#[cfg(feature = "demo")]
pub mod demo;
pub mod error;
pub mod fetch;
pub mod monitor;
pub(crate) mod retry;
pub mod validate;

pub use error::FetchError;
pub use fetch::{fetch_all, HttpJsonFetcher, IndicatorPayload, SourceFetcher, SourceOutcome};
pub use monitor::{aggregate_status, HealthMonitor, HealthReport, HealthSummary};
pub use retry::retry_budget;
pub use validate::{validate_payload, PayloadValidation, RangeViolation};
