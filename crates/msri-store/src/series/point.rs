use chrono::NaiveDate;
use msri_scoring::CompositeScoreResult;
use serde::{Deserialize, Serialize};

/// One scored date in the persisted series. Replaced wholesale on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub result: CompositeScoreResult,
    /// Reference event within the annotation tolerance, if any. Recomputed
    /// on every merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl TimeSeriesPoint {
    #[must_use]
    pub fn new(date: NaiveDate, result: CompositeScoreResult) -> Self {
        Self {
            date,
            result,
            event: None,
        }
    }
}

/// Inclusive date bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }

    /// Whether `[first, last]` intersects this range.
    #[must_use]
    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.from.is_none_or(|f| last >= f) && self.to.is_none_or(|t| first <= t)
    }
}
