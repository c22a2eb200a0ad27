use msri_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("indicator history unavailable: {0}")]
    History(#[source] StoreError),

    #[error("series unavailable: {0}")]
    Series(#[source] StoreError),
}
