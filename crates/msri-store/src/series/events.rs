//! Reference-event annotation.

use chrono::NaiveDate;
use msri_core::ReferenceEvent;

use super::point::TimeSeriesPoint;

/// First event, in list order, whose date is within `tolerance_days` of
/// `date`.
#[must_use]
pub fn match_event(
    date: NaiveDate,
    events: &[ReferenceEvent],
    tolerance_days: i64,
) -> Option<&ReferenceEvent> {
    events
        .iter()
        .find(|e| (date - e.date).num_days().abs() <= tolerance_days)
}

/// Overwrite every point's annotation from `events`.
pub fn annotate(points: &mut [TimeSeriesPoint], events: &[ReferenceEvent], tolerance_days: i64) {
    for point in points {
        point.event = match_event(point.date, events, tolerance_days).map(|e| e.name.clone());
    }
}

/// Point closest to `date` within the tolerance. Ties go to the earlier date.
#[must_use]
pub fn nearest_point(
    points: &[TimeSeriesPoint],
    date: NaiveDate,
    tolerance_days: i64,
) -> Option<&TimeSeriesPoint> {
    let mut best: Option<(i64, &TimeSeriesPoint)> = None;
    for point in points {
        let distance = (point.date - date).num_days().abs();
        if distance > tolerance_days {
            continue;
        }
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, point));
        }
    }
    best.map(|(_, p)| p)
}
