//! Bounded per-indicator windows of raw observations.
//!
//! Each indicator's window is one record at `history/{indicator}`, keyed by
//! date so re-running a day replaces its observation instead of adding one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use msri_scoring::{Populations, RawIndicators};
use msri_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};

const HISTORY_PREFIX: &str = "history/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryRecord {
    observations: BTreeMap<NaiveDate, f64>,
}

pub struct IndicatorHistory {
    store: Arc<dyn KvStore>,
    window: usize,
}

impl IndicatorHistory {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, window: usize) -> Self {
        Self {
            store,
            window: window.max(1),
        }
    }

    /// Add every finite value in `raw` as the observation for `date`,
    /// trimming each window to its most recent entries. The observation for
    /// `date` itself is never trimmed, so a backfilled day is scored against
    /// a population that contains it.
    ///
    /// # Errors
    ///
    /// Returns the first store or encode error; earlier indicators stay
    /// recorded.
    pub async fn record(&self, date: NaiveDate, raw: &RawIndicators) -> Result<usize, StoreError> {
        let mut recorded = 0;
        for (indicator, value) in raw {
            let Some(value) = value.filter(|v| v.is_finite()) else {
                continue;
            };
            let mut record = self.load(indicator).await?;
            record.observations.insert(date, value);
            while record.observations.len() > self.window {
                let Some(oldest) = record.observations.keys().copied().find(|d| *d != date)
                else {
                    break;
                };
                record.observations.remove(&oldest);
            }
            let blob = serde_json::to_vec(&record)?;
            self.store.put(&key(indicator), &blob).await?;
            recorded += 1;
        }
        Ok(recorded)
    }

    /// Comparison population per indicator. Indicators with no history map
    /// to an empty population.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub async fn populations<'a, I>(&self, indicators: I) -> Result<Populations, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut populations = Populations::new();
        for indicator in indicators {
            let record = self.load(indicator).await?;
            populations.insert(
                indicator.to_string(),
                record.observations.into_values().collect(),
            );
        }
        Ok(populations)
    }

    async fn load(&self, indicator: &str) -> Result<HistoryRecord, StoreError> {
        match self.store.get(&key(indicator)).await? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(HistoryRecord::default()),
        }
    }
}

fn key(indicator: &str) -> String {
    format!("{HISTORY_PREFIX}{indicator}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use msri_store::MemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn raw(pairs: &[(&str, Option<f64>)]) -> RawIndicators {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect()
    }

    #[tokio::test]
    async fn window_is_bounded_to_most_recent() {
        let history = IndicatorHistory::new(Arc::new(MemoryStore::default()), 3);
        for d in 1..=5 {
            history
                .record(date(d), &raw(&[("vix", Some(f64::from(d)))]))
                .await
                .unwrap();
        }
        let pops = history.populations(["vix"]).await.unwrap();
        assert_eq!(pops["vix"], vec![3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn backfilled_date_survives_a_full_window() {
        let history = IndicatorHistory::new(Arc::new(MemoryStore::default()), 3);
        for d in 5..=7 {
            history
                .record(date(d), &raw(&[("vix", Some(f64::from(d)))]))
                .await
                .unwrap();
        }

        history.record(date(1), &raw(&[("vix", Some(1.0))])).await.unwrap();

        let pops = history.populations(["vix"]).await.unwrap();
        assert_eq!(pops["vix"], vec![1.0, 6.0, 7.0]);
    }

    #[tokio::test]
    async fn rerun_replaces_same_date() {
        let history = IndicatorHistory::new(Arc::new(MemoryStore::default()), 10);
        history.record(date(1), &raw(&[("vix", Some(20.0))])).await.unwrap();
        history.record(date(1), &raw(&[("vix", Some(25.0))])).await.unwrap();
        let pops = history.populations(["vix"]).await.unwrap();
        assert_eq!(pops["vix"], vec![25.0]);
    }

    #[tokio::test]
    async fn missing_values_are_not_recorded() {
        let history = IndicatorHistory::new(Arc::new(MemoryStore::default()), 10);
        let recorded = history
            .record(
                date(1),
                &raw(&[
                    ("vix", None),
                    ("move_index", Some(f64::INFINITY)),
                    ("cape_ratio", Some(30.0)),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(recorded, 1);
        let pops = history.populations(["vix", "cape_ratio"]).await.unwrap();
        assert!(pops["vix"].is_empty());
        assert_eq!(pops["cape_ratio"], vec![30.0]);
    }
}
