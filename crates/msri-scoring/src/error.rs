use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    /// Too few usable indicators to score the cycle. The cycle is skipped
    /// rather than written with a fabricated score.
    #[error("insufficient data: {available} indicators available, {required} required")]
    InsufficientData { available: usize, required: usize },
}
