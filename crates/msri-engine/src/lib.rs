//! Scoring-cycle orchestration over injected storage and fetchers.

pub mod cycle;
pub mod error;
pub mod history;

pub use cycle::{CycleOutcome, Engine, EngineOptions};
pub use error::EngineError;
pub use history::IndicatorHistory;
