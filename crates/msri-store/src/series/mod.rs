//! Chunked, date-keyed series persisted through a [`KvStore`].
//!
//! A merge reads the whole series, upserts by date, re-partitions, and writes
//! a fresh immutable chunk set before swapping the pointer with
//! compare-and-put. Readers holding the old pointer keep seeing a complete
//! set until it is pruned two generations later.

mod chunk;
mod events;
mod point;
mod summary;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use msri_core::{ReferenceEvent, SeriesConfig};
use serde::Serialize;

use crate::kv::{check_size, KvStore};
use crate::lease::SeriesLocks;
use crate::StoreError;

pub use chunk::{partition, ChunkInfo, SeriesChunk, SeriesPointer};
pub use events::{annotate, match_event, nearest_point};
pub use point::{DateRange, TimeSeriesPoint};
pub use summary::{compute_summary, EventLeadTime, LatestPoint, SeriesSummary};

use chunk::{chunk_key, new_set_id, pointer_key, set_generation, set_id_of, sets_prefix};

pub const DEFAULT_MERGE_ATTEMPTS: u32 = 5;

/// Outcome of a successful merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSeriesSummary {
    pub series_key: String,
    pub generation: u64,
    /// Dates that did not exist before this merge.
    pub inserted: usize,
    /// Dates whose point was overwritten.
    pub replaced: usize,
    pub attempts: u32,
    pub pruned_sets: usize,
    pub summary: SeriesSummary,
}

pub struct SeriesCache {
    store: Arc<dyn KvStore>,
    config: SeriesConfig,
    events: Vec<ReferenceEvent>,
    locks: SeriesLocks,
    max_attempts: u32,
}

impl std::fmt::Debug for SeriesCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesCache")
            .field("config", &self.config)
            .field("events", &self.events.len())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SeriesCache {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, config: SeriesConfig, events: Vec<ReferenceEvent>) -> Self {
        Self {
            store,
            config,
            events,
            locks: SeriesLocks::new(),
            max_attempts: DEFAULT_MERGE_ATTEMPTS,
        }
    }

    /// Share a lease table with other caches in the same process.
    #[must_use]
    pub fn with_locks(mut self, locks: SeriesLocks) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.config.key
    }

    /// Upsert a single point.
    ///
    /// # Errors
    ///
    /// See [`SeriesCache::merge_points`].
    pub async fn merge_point(
        &self,
        point: TimeSeriesPoint,
    ) -> Result<MergedSeriesSummary, StoreError> {
        self.merge_points(vec![point]).await
    }

    /// Upsert `points` by date and persist the re-chunked series.
    ///
    /// On a later duplicate date within `points`, the later point wins.
    ///
    /// # Errors
    ///
    /// - [`StoreError::RecordTooLarge`] if any chunk or the pointer would
    ///   exceed the record ceiling; nothing is written.
    /// - [`StoreError::Conflict`] if the pointer kept moving for every attempt.
    /// - Any backend error from the store. The pointer is left untouched, so
    ///   readers keep the previous complete series.
    pub async fn merge_points(
        &self,
        points: Vec<TimeSeriesPoint>,
    ) -> Result<MergedSeriesSummary, StoreError> {
        let series = self.config.key.as_str();
        let pointer_key = pointer_key(series);
        let limit = self.record_limit();
        let _lease = self.locks.acquire(series).await;

        for attempt in 1..=self.max_attempts {
            let current = self.load_pointer().await?;
            let existing = match &current {
                Some((_, pointer)) => match self.read_consistent(pointer, DateRange::all()).await? {
                    Some(points) => points,
                    None => {
                        tracing::debug!(series, attempt, "chunk set pruned mid-read; retrying");
                        continue;
                    }
                },
                None => Vec::new(),
            };

            let mut by_date: BTreeMap<NaiveDate, TimeSeriesPoint> =
                existing.into_iter().map(|p| (p.date, p)).collect();
            let (mut inserted, mut replaced) = (0usize, 0usize);
            for point in &points {
                if by_date.insert(point.date, point.clone()).is_some() {
                    replaced += 1;
                } else {
                    inserted += 1;
                }
            }
            let mut merged: Vec<TimeSeriesPoint> = by_date.into_values().collect();
            annotate(&mut merged, &self.events, self.config.event_tolerance_days);

            let previous = current.as_ref().map(|(_, p)| p);
            let generation = previous.map_or(1, |p| p.generation + 1);
            let set_id = new_set_id(generation);
            let chunks = partition(&merged, self.config.chunk_size);

            let encoded = chunks
                .iter()
                .map(|c| {
                    let key = chunk_key(series, &set_id, c.index);
                    let blob = serde_json::to_vec(c)?;
                    check_size(&key, &blob, limit)?;
                    Ok((key, blob))
                })
                .collect::<Result<Vec<_>, StoreError>>()?;

            let summary = compute_summary(&merged, &self.events, &self.config, Utc::now());
            let pointer = SeriesPointer {
                series_key: series.to_string(),
                generation,
                chunk_set: set_id.clone(),
                previous_chunk_set: previous.map(|p| p.chunk_set.clone()),
                chunk_count: chunks.len(),
                chunk_size: self.config.chunk_size.max(1),
                chunks: chunks.iter().map(ChunkInfo::from).collect(),
                summary,
            };
            let pointer_blob = serde_json::to_vec(&pointer)?;
            check_size(&pointer_key, &pointer_blob, limit)?;

            for (key, blob) in &encoded {
                self.store.put(key, blob).await?;
            }

            let expected = current.as_ref().map(|(bytes, _)| bytes.as_slice());
            if self
                .store
                .compare_and_put(&pointer_key, expected, &pointer_blob)
                .await?
            {
                let pruned_sets = self.prune(&pointer).await;
                tracing::info!(
                    series,
                    generation,
                    inserted,
                    replaced,
                    points = pointer.summary.point_count,
                    chunks = pointer.chunk_count,
                    attempt,
                    "series merged"
                );
                return Ok(MergedSeriesSummary {
                    series_key: series.to_string(),
                    generation,
                    inserted,
                    replaced,
                    attempts: attempt,
                    pruned_sets,
                    summary: pointer.summary,
                });
            }

            tracing::warn!(series, attempt, "series pointer changed during merge; retrying");
        }

        Err(StoreError::Conflict {
            key: series.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Points within `range`, ascending by date. Empty when nothing has been
    /// written yet.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error, or [`StoreError::CorruptSeries`] if
    /// the current pointer references a missing chunk.
    pub async fn get_series(&self, range: DateRange) -> Result<Vec<TimeSeriesPoint>, StoreError> {
        for _ in 0..self.max_attempts {
            let Some((_, pointer)) = self.load_pointer().await? else {
                return Ok(Vec::new());
            };
            if let Some(points) = self.read_consistent(&pointer, range).await? {
                return Ok(points);
            }
        }
        Err(StoreError::Conflict {
            key: self.config.key.clone(),
            attempts: self.max_attempts,
        })
    }

    /// Summary from the current pointer.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub async fn summary(&self) -> Result<Option<SeriesSummary>, StoreError> {
        Ok(self.pointer().await?.map(|p| p.summary))
    }

    /// # Errors
    ///
    /// Returns a store or decode error.
    pub async fn pointer(&self) -> Result<Option<SeriesPointer>, StoreError> {
        Ok(self.load_pointer().await?.map(|(_, p)| p))
    }

    /// Most recent composites, oldest first, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// See [`SeriesCache::get_series`].
    pub async fn recent_composites(
        &self,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<f64>, StoreError> {
        let to = before.pred_opt().unwrap_or(NaiveDate::MIN);
        let range = DateRange {
            from: None,
            to: Some(to),
        };
        let composites: Vec<f64> = self
            .get_series(range)
            .await?
            .into_iter()
            .filter_map(|p| p.result.composite)
            .collect();
        let skip = composites.len().saturating_sub(limit);
        Ok(composites.into_iter().skip(skip).collect())
    }

    fn record_limit(&self) -> usize {
        self.config
            .max_record_bytes
            .min(self.store.max_record_bytes())
    }

    async fn load_pointer(&self) -> Result<Option<(Vec<u8>, SeriesPointer)>, StoreError> {
        let Some(bytes) = self.store.get(&pointer_key(&self.config.key)).await? else {
            return Ok(None);
        };
        let pointer: SeriesPointer = serde_json::from_slice(&bytes)?;
        Ok(Some((bytes, pointer)))
    }

    /// Read the chunks of `pointer`. `None` means a chunk vanished because a
    /// newer pointer replaced this one and pruned its set.
    async fn read_consistent(
        &self,
        pointer: &SeriesPointer,
        range: DateRange,
    ) -> Result<Option<Vec<TimeSeriesPoint>>, StoreError> {
        match self.load_chunks(pointer, range).await {
            Ok(points) => Ok(Some(points)),
            Err(err @ StoreError::CorruptSeries { .. }) => {
                let moved = self
                    .load_pointer()
                    .await?
                    .is_none_or(|(_, p)| p.chunk_set != pointer.chunk_set);
                if moved {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn load_chunks(
        &self,
        pointer: &SeriesPointer,
        range: DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, StoreError> {
        let series = self.config.key.as_str();
        let mut points = Vec::new();

        for info in &pointer.chunks {
            if !range.overlaps(info.first_date, info.last_date) {
                continue;
            }
            let key = chunk_key(series, &pointer.chunk_set, info.index);
            let blob = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| StoreError::CorruptSeries {
                    key: series.to_string(),
                    reason: format!("chunk {} of set {} is missing", info.index, pointer.chunk_set),
                })?;
            let chunk: SeriesChunk = serde_json::from_slice(&blob)?;
            if chunk.index != info.index || chunk.chunk_count != pointer.chunk_count {
                return Err(StoreError::CorruptSeries {
                    key: series.to_string(),
                    reason: format!("chunk {} does not match pointer directory", info.index),
                });
            }
            points.extend(chunk.points.into_iter().filter(|p| range.contains(p.date)));
        }

        Ok(points)
    }

    /// Delete chunk sets older than the previous generation. Best-effort:
    /// failures are logged and leave orphans for a later merge.
    async fn prune(&self, current: &SeriesPointer) -> usize {
        let prefix = sets_prefix(&self.config.key);
        let keys = match self.store.list(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(
                    series = %self.config.key,
                    error = %e,
                    "chunk set listing failed; skipping prune"
                );
                return 0;
            }
        };

        let keep_from = current.generation.saturating_sub(1);
        let mut pruned = BTreeSet::new();
        for key in &keys {
            let Some(set_id) = set_id_of(key, &prefix) else {
                continue;
            };
            if set_id == current.chunk_set
                || current.previous_chunk_set.as_deref() == Some(set_id)
            {
                continue;
            }
            let Some(generation) = set_generation(set_id) else {
                continue;
            };
            if generation >= keep_from {
                continue;
            }
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key = %key, error = %e, "failed to delete stale chunk");
                continue;
            }
            pruned.insert(set_id.to_string());
        }

        if !pruned.is_empty() {
            tracing::debug!(
                series = %self.config.key,
                sets = pruned.len(),
                "pruned stale chunk sets"
            );
        }
        pruned.len()
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
