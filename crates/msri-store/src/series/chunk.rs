//! Chunk and pointer records, and the key layout they live under.
//!
//! ```text
//! series/{key}/pointer                          current SeriesPointer
//! series/{key}/sets/{set_id}/chunk/{index}      immutable SeriesChunk
//! ```
//!
//! `set_id` is `{generation:010}-{uuid}`, so sets sort by the pointer
//! generation they were written against.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::point::TimeSeriesPoint;
use super::summary::SeriesSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesChunk {
    pub index: usize,
    pub chunk_count: usize,
    pub point_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub points: Vec<TimeSeriesPoint>,
}

/// Per-chunk directory entry kept in the pointer so range reads can skip
/// chunks without fetching them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub point_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Summary and directory of the current chunk set. Written last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPointer {
    pub series_key: String,
    pub generation: u64,
    pub chunk_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_chunk_set: Option<String>,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub chunks: Vec<ChunkInfo>,
    pub summary: SeriesSummary,
}

/// Split date-ordered points into consecutive chunks of at most
/// `chunk_size` points.
#[must_use]
pub fn partition(points: &[TimeSeriesPoint], chunk_size: usize) -> Vec<SeriesChunk> {
    let chunk_size = chunk_size.max(1);
    let chunk_count = points.len().div_ceil(chunk_size);

    points
        .chunks(chunk_size)
        .enumerate()
        .filter_map(|(index, slice)| {
            let first_date = slice.first()?.date;
            let last_date = slice.last()?.date;
            Some(SeriesChunk {
                index,
                chunk_count,
                point_count: slice.len(),
                first_date,
                last_date,
                points: slice.to_vec(),
            })
        })
        .collect()
}

impl From<&SeriesChunk> for ChunkInfo {
    fn from(chunk: &SeriesChunk) -> Self {
        Self {
            index: chunk.index,
            point_count: chunk.point_count,
            first_date: chunk.first_date,
            last_date: chunk.last_date,
        }
    }
}

pub(crate) fn pointer_key(series: &str) -> String {
    format!("series/{series}/pointer")
}

pub(crate) fn sets_prefix(series: &str) -> String {
    format!("series/{series}/sets/")
}

pub(crate) fn chunk_key(series: &str, set_id: &str, index: usize) -> String {
    format!("series/{series}/sets/{set_id}/chunk/{index:05}")
}

pub(crate) fn new_set_id(generation: u64) -> String {
    format!("{generation:010}-{}", uuid::Uuid::new_v4().simple())
}

/// Generation encoded in a set id, or `None` for foreign keys.
pub(crate) fn set_generation(set_id: &str) -> Option<u64> {
    set_id.split_once('-')?.0.parse().ok()
}

/// Set id component of a chunk key under `prefix`.
pub(crate) fn set_id_of<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.split('/').next()
}
