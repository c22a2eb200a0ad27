//! Derived statistics over the full merged series.
//!
//! Always recomputed from scratch on merge so the pointer can never drift
//! from the chunks it describes.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use msri_core::{ReferenceEvent, SeriesConfig, Status};
use serde::{Deserialize, Serialize};

use super::events::nearest_point;
use super::point::TimeSeriesPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPoint {
    pub date: NaiveDate,
    pub composite: Option<f64>,
    pub status: Option<Status>,
}

/// How the series behaved in the run-up to one reference event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLeadTime {
    pub name: String,
    pub date: NaiveDate,
    /// Whether any point falls inside the lookback window.
    pub observed: bool,
    pub detected: bool,
    pub first_warning: Option<NaiveDate>,
    pub lead_days: Option<i64>,
    pub composite_at_event: Option<f64>,
    pub status_at_event: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub point_count: usize,
    /// Points carrying a composite.
    pub scored_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub min_composite: Option<f64>,
    pub max_composite: Option<f64>,
    pub mean_composite: Option<f64>,
    /// Keyed by [`Status::as_str`].
    pub status_counts: BTreeMap<String, usize>,
    /// Days each pillar was flagged as breached.
    pub breach_counts: BTreeMap<String, usize>,
    pub latest: Option<LatestPoint>,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub events: Vec<EventLeadTime>,
    pub updated_at: DateTime<Utc>,
}

/// Compute the summary of `points`, which must be strictly date-ordered.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_summary(
    points: &[TimeSeriesPoint],
    events: &[ReferenceEvent],
    config: &SeriesConfig,
    now: DateTime<Utc>,
) -> SeriesSummary {
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut breach_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut sum = 0.0;
    let mut scored = 0usize;

    for point in points {
        if let Some(c) = point.result.composite {
            scored += 1;
            sum += c;
            min = Some(min.map_or(c, |m| m.min(c)));
            max = Some(max.map_or(c, |m| m.max(c)));
        }
        if let Some(status) = point.result.status {
            *status_counts.entry(status.as_str().to_string()).or_default() += 1;
        }
        for pillar in &point.result.breach_flags {
            *breach_counts.entry(pillar.clone()).or_default() += 1;
        }
    }

    let chunk_size = config.chunk_size.max(1);

    SeriesSummary {
        point_count: points.len(),
        scored_count: scored,
        first_date: points.first().map(|p| p.date),
        last_date: points.last().map(|p| p.date),
        min_composite: min,
        max_composite: max,
        mean_composite: (scored > 0).then(|| sum / scored as f64),
        status_counts,
        breach_counts,
        latest: points.last().map(|p| LatestPoint {
            date: p.date,
            composite: p.result.composite,
            status: p.result.status,
        }),
        chunk_count: points.len().div_ceil(chunk_size),
        chunk_size,
        events: events
            .iter()
            .map(|e| lead_time(points, e, config))
            .collect(),
        updated_at: now,
    }
}

fn lead_time(
    points: &[TimeSeriesPoint],
    event: &ReferenceEvent,
    config: &SeriesConfig,
) -> EventLeadTime {
    let window_days = u64::try_from(config.lead_time_window_days.max(0)).unwrap_or(0);
    let window_start = event
        .date
        .checked_sub_days(Days::new(window_days))
        .unwrap_or(NaiveDate::MIN);

    let mut in_window = points
        .iter()
        .filter(|p| p.date >= window_start && p.date <= event.date)
        .peekable();
    let observed = in_window.peek().is_some();
    let first_warning = in_window
        .find(|p| p.result.status.is_some_and(Status::is_warning))
        .map(|p| p.date);

    let at_event = nearest_point(points, event.date, config.event_tolerance_days);

    EventLeadTime {
        name: event.name.clone(),
        date: event.date,
        observed,
        detected: first_warning.is_some(),
        first_warning,
        lead_days: first_warning.map(|d| (event.date - d).num_days()),
        composite_at_event: at_event.and_then(|p| p.result.composite),
        status_at_event: at_event.and_then(|p| p.result.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msri_scoring::CompositeScoreResult;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn point(d: NaiveDate, composite: Option<f64>, status: Option<Status>) -> TimeSeriesPoint {
        TimeSeriesPoint::new(
            d,
            CompositeScoreResult {
                composite,
                pillars: BTreeMap::new(),
                status,
                level_status: status,
                breach_flags: if composite.is_some_and(|c| c < 0.4) {
                    vec!["liquidity".to_string()]
                } else {
                    vec![]
                },
                multiplier: composite.map(|c| 2.0 - c),
                deterioration: None,
                indicators_used: 3,
            },
        )
    }

    fn config() -> SeriesConfig {
        SeriesConfig {
            chunk_size: 2,
            ..SeriesConfig::default()
        }
    }

    #[test]
    fn aggregate_statistics() {
        let points = vec![
            point(date(2024, 1, 1), Some(0.7), Some(Status::Robust)),
            point(date(2024, 1, 2), Some(0.3), Some(Status::Fragile)),
            point(date(2024, 1, 3), None, None),
            point(date(2024, 1, 4), Some(0.5), Some(Status::Stable)),
        ];
        let summary = compute_summary(&points, &[], &config(), Utc::now());

        assert_eq!(summary.point_count, 4);
        assert_eq!(summary.scored_count, 3);
        assert_eq!(summary.min_composite, Some(0.3));
        assert_eq!(summary.max_composite, Some(0.7));
        assert!((summary.mean_composite.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(summary.status_counts["fragile"], 1);
        assert!(!summary.status_counts.contains_key("stretched"));
        assert_eq!(summary.breach_counts["liquidity"], 1);
        assert_eq!(summary.first_date, Some(date(2024, 1, 1)));
        assert_eq!(summary.latest.as_ref().unwrap().date, date(2024, 1, 4));
        assert_eq!(summary.chunk_count, 2);
    }

    #[test]
    fn empty_series_summary() {
        let summary = compute_summary(&[], &[], &config(), Utc::now());
        assert_eq!(summary.point_count, 0);
        assert_eq!(summary.mean_composite, None);
        assert_eq!(summary.latest, None);
        assert_eq!(summary.chunk_count, 0);
    }

    #[test]
    fn lead_time_uses_earliest_warning_in_window() {
        let event = ReferenceEvent {
            name: "shock".to_string(),
            date: date(2020, 3, 16),
        };
        let points = vec![
            // Outside the 90-day window.
            point(date(2019, 11, 1), Some(0.3), Some(Status::Fragile)),
            point(date(2020, 1, 10), Some(0.6), Some(Status::Stable)),
            point(date(2020, 2, 20), Some(0.45), Some(Status::Stretched)),
            point(date(2020, 3, 1), Some(0.40), Some(Status::Deteriorating)),
            point(date(2020, 3, 17), Some(0.25), Some(Status::Fragile)),
        ];
        let summary = compute_summary(&points, &[event], &config(), Utc::now());
        let lead = &summary.events[0];

        assert!(lead.observed);
        assert!(lead.detected);
        assert_eq!(lead.first_warning, Some(date(2020, 2, 20)));
        assert_eq!(lead.lead_days, Some(25));
        assert_eq!(lead.composite_at_event, Some(0.25));
        assert_eq!(lead.status_at_event, Some(Status::Fragile));
    }

    #[test]
    fn calm_run_up_is_not_detected() {
        let event = ReferenceEvent {
            name: "blind_spot".to_string(),
            date: date(2021, 1, 27),
        };
        let points = vec![
            point(date(2021, 1, 1), Some(0.7), Some(Status::Robust)),
            point(date(2021, 1, 20), Some(0.66), Some(Status::Robust)),
        ];
        let lead = &compute_summary(&points, &[event], &config(), Utc::now()).events[0];
        assert!(lead.observed);
        assert!(!lead.detected);
        assert_eq!(lead.lead_days, None);
        assert_eq!(lead.composite_at_event, None);
    }
}
