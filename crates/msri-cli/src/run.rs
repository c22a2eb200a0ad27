use std::sync::Arc;

use chrono::NaiveDate;
use msri_core::{AppConfig, IndexConfig};
use msri_engine::{CycleOutcome, Engine, EngineOptions};
use msri_health::{HealthSummary, HttpJsonFetcher, SourceFetcher};
use msri_store::{KvStore, MemoryStore, TimeSeriesPoint};

pub(crate) async fn run_cycle(
    app: &AppConfig,
    index: IndexConfig,
    date: NaiveDate,
    memory: bool,
    json: bool,
    demo_seed: Option<u64>,
) -> anyhow::Result<()> {
    if demo_seed.is_some() && app.is_production() {
        anyhow::bail!("synthetic source data is refused when MSRI_ENV=production");
    }
    let store: Arc<dyn KvStore> = if memory {
        Arc::new(MemoryStore::new(index.series.max_record_bytes))
    } else {
        crate::open_store(app, &index).await?
    };
    let fetcher = build_fetcher(app, date, demo_seed)?;

    let engine = Engine::new(index, store, fetcher, EngineOptions::from_app_config(app));
    let restored = engine.restore_health().await?;
    tracing::debug!(restored, "health reports restored");

    let outcome = engine.run_cycle(date).await?;
    if json {
        print_json(date, &outcome)?;
    } else {
        print_text(date, &outcome);
    }

    if let CycleOutcome::WriteFailed { error, .. } = outcome {
        anyhow::bail!("score for {date} computed but not persisted: {error}");
    }
    Ok(())
}

#[cfg(feature = "demo")]
fn build_fetcher(
    app: &AppConfig,
    date: NaiveDate,
    demo_seed: Option<u64>,
) -> anyhow::Result<Arc<dyn SourceFetcher>> {
    if let Some(seed) = demo_seed {
        tracing::info!(seed, "serving synthetic source data");
        return Ok(Arc::new(msri_health::demo::DemoFetcher::new(seed, date)));
    }
    Ok(Arc::new(HttpJsonFetcher::from_app_config(app)?))
}

#[cfg(not(feature = "demo"))]
fn build_fetcher(
    app: &AppConfig,
    _date: NaiveDate,
    demo_seed: Option<u64>,
) -> anyhow::Result<Arc<dyn SourceFetcher>> {
    if demo_seed.is_some() {
        anyhow::bail!("synthetic data requires the `demo` feature");
    }
    Ok(Arc::new(HttpJsonFetcher::from_app_config(app)?))
}

fn print_json(date: NaiveDate, outcome: &CycleOutcome) -> anyhow::Result<()> {
    let value = match outcome {
        CycleOutcome::Scored {
            point,
            merged,
            health,
        } => serde_json::json!({
            "date": date,
            "outcome": "scored",
            "point": point,
            "series": merged,
            "health": health,
        }),
        CycleOutcome::Skipped { reason, health } => serde_json::json!({
            "date": date,
            "outcome": "skipped",
            "reason": reason.to_string(),
            "health": health,
        }),
        CycleOutcome::WriteFailed {
            point,
            error,
            health,
        } => serde_json::json!({
            "date": date,
            "outcome": "write_failed",
            "point": point,
            "error": error.to_string(),
            "health": health,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_text(date: NaiveDate, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Scored { point, merged, .. } => {
            print_point(point);
            println!(
                "series: {} point(s) in {} chunk(s), generation {}",
                merged.summary.point_count, merged.summary.chunk_count, merged.generation
            );
        }
        CycleOutcome::Skipped { reason, .. } => {
            println!("{date}: skipped ({reason})");
        }
        CycleOutcome::WriteFailed { point, error, .. } => {
            print_point(point);
            println!("series: write failed ({error})");
        }
    }
    print_health(outcome.health());
}

pub(crate) fn print_point(point: &TimeSeriesPoint) {
    let result = &point.result;
    let composite = result
        .composite
        .map_or_else(|| "n/a".to_string(), |c| format!("{c:.3}"));
    let status = result.status.map_or("n/a", |s| s.as_str());
    let multiplier = result
        .multiplier
        .map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}"));
    println!(
        "{}: composite {composite} [{status}] multiplier {multiplier}",
        point.date
    );
    for (pillar, score) in &result.pillars {
        match score {
            Some(score) => println!("  {pillar:<16} {score:.3}"),
            None => println!("  {pillar:<16} n/a"),
        }
    }
    if !result.breach_flags.is_empty() {
        println!("  breaches: {}", result.breach_flags.join(", "));
    }
    if let Some(event) = &point.event {
        println!("  event: {event}");
    }
}

pub(crate) fn print_health(health: &HealthSummary) {
    println!("health: {}", health.status);
    for (label, sources) in [
        ("down", &health.down_sources),
        ("degraded", &health.degraded_sources),
        ("stale", &health.stale_sources),
        ("unknown", &health.unknown_sources),
    ] {
        if !sources.is_empty() {
            println!("  {label}: {}", sources.join(", "));
        }
    }
}
