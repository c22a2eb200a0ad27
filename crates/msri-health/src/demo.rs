//! Deterministic synthetic source data for local runs without upstream
//! access. Only compiled with the `demo` feature.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use msri_core::SourceSpec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::FetchError;
use crate::fetch::{IndicatorPayload, SourceFetcher};

/// Share of indicator values emitted as null.
const NULL_RATE: f64 = 0.03;

/// Produces in-range values that are a pure function of
/// `(seed, date, indicator)`.
#[derive(Debug, Clone, Copy)]
pub struct DemoFetcher {
    seed: u64,
    date: NaiveDate,
}

impl DemoFetcher {
    #[must_use]
    pub fn new(seed: u64, date: NaiveDate) -> Self {
        Self { seed, date }
    }

    fn rng_for(&self, indicator: &str) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        self.date.num_days_from_ce().hash(&mut hasher);
        indicator.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }
}

#[async_trait]
impl SourceFetcher for DemoFetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<IndicatorPayload, FetchError> {
        Ok(source
            .indicators
            .iter()
            .map(|spec| {
                let mut rng = self.rng_for(&spec.name);
                let value = (!rng.random_bool(NULL_RATE)).then(|| {
                    // Keep to the middle of the plausible band.
                    let u: f64 = rng.random();
                    spec.min + (spec.max - spec.min) * (0.2 + 0.6 * u)
                });
                (spec.name.clone(), value)
            })
            .collect())
    }
}
