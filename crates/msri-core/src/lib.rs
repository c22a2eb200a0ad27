//! Shared configuration and domain vocabulary for the MSRI workspace.

pub mod app_config;
pub mod config;
pub mod index;
pub mod status;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use index::{
    load_index_config, parse_index_config, IndexConfig, IndicatorSpec, MomentumPolicy,
    PillarConfig, ReferenceEvent, ScoringConfig, SeriesConfig, SourceSpec, TierThresholds,
};
pub use status::{HealthStatus, Status};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read index config at {path}: {source}")]
    IndexFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse index config: {0}")]
    IndexFileParse(#[from] serde_yaml::Error),

    #[error("index config validation failed: {0}")]
    Validation(String),
}
