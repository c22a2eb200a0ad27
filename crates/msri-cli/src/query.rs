use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use msri_core::IndexConfig;
use msri_health::HealthMonitor;
use msri_store::{DateRange, KvStore, SeriesCache, SeriesSummary};

use crate::run::{print_health, print_point};

pub(crate) fn run_config_check(path: &Path) -> anyhow::Result<()> {
    let index = msri_core::load_index_config(path)?;
    let indicators = index.pillar_indicators().count();
    println!(
        "{}: ok ({} pillar(s), {indicators} indicator(s), {} source(s), {} event(s))",
        path.display(),
        index.pillars.len(),
        index.sources.len(),
        index.events.len()
    );
    Ok(())
}

pub(crate) async fn run_health(
    store: Arc<dyn KvStore>,
    index: &IndexConfig,
    json: bool,
) -> anyhow::Result<()> {
    let mut monitor = HealthMonitor::new(&index.sources).with_store(store);
    monitor.restore().await?;
    let summary = monitor.summary(Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_health(&summary);
    for report in &summary.reports {
        let last_success = report
            .last_success
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        println!(
            "  {:<16} {:<9} last success {last_success}, {} consecutive failure(s)",
            report.source_id,
            report.status.as_str(),
            report.consecutive_failures
        );
        if let Some(error) = &report.error {
            println!("    error: {error}");
        }
    }
    Ok(())
}

pub(crate) async fn run_series(
    store: Arc<dyn KvStore>,
    index: &IndexConfig,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    summary: bool,
    json: bool,
) -> anyhow::Result<()> {
    let cache = SeriesCache::new(store, index.series.clone(), index.events.clone());

    if summary {
        let Some(summary) = cache.summary().await? else {
            println!("series {} is empty", cache.key());
            return Ok(());
        };
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(cache.key(), &summary);
        }
        return Ok(());
    }

    let points = cache.get_series(DateRange { from, to }).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else if points.is_empty() {
        println!("no points in range");
    } else {
        for point in &points {
            print_point(point);
        }
    }
    Ok(())
}

fn print_summary(key: &str, summary: &SeriesSummary) {
    let range = match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => "n/a".to_string(),
    };
    println!(
        "series {key}: {} point(s) ({} scored) over {range}, {} chunk(s) of up to {}",
        summary.point_count, summary.scored_count, summary.chunk_count, summary.chunk_size
    );
    if let (Some(min), Some(max), Some(mean)) = (
        summary.min_composite,
        summary.max_composite,
        summary.mean_composite,
    ) {
        println!("  composite min {min:.3} max {max:.3} mean {mean:.3}");
    }
    for (status, count) in &summary.status_counts {
        println!("  {status:<14} {count}");
    }
    for event in &summary.events {
        match (event.first_warning, event.lead_days) {
            (Some(warning), Some(lead)) => println!(
                "  event {} ({}): first warning {warning}, {lead} day(s) ahead",
                event.name, event.date
            ),
            _ if event.observed => {
                println!("  event {} ({}): no warning", event.name, event.date);
            }
            _ => println!("  event {} ({}): not covered", event.name, event.date),
        }
    }
}
