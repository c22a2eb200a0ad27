//! Scoring core for the market stress/resilience index.
//!
//! Raw indicator values are winsorized and rescaled onto `[0, 1]`
//! ([`normalize`]), averaged into pillars ([`pillars`]), and combined into a
//! weight-renormalized composite with a status tier, breach flags, a
//! momentum overlay, and an impact multiplier ([`composite`], [`momentum`]).
//! [`evaluate`] runs the whole chain for one cycle.

pub mod composite;
pub mod error;
pub mod evaluate;
pub mod momentum;
pub mod normalize;
pub mod pillars;
pub mod types;

pub use composite::{breach_flags, classify, composite_score, multiplier};
pub use error::ScoringError;
pub use evaluate::evaluate;
pub use momentum::detect_deterioration;
pub use normalize::{normalize, normalize_all, percentile};
pub use pillars::aggregate_pillars;
pub use types::{
    CompositeScoreResult, Deterioration, NormalizedIndicators, PillarScores, Populations,
    RawIndicators,
};
