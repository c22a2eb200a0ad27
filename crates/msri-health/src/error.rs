use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("source {0} has no fetch URL configured")]
    NoUrl(String),

    #[error("failed to deserialize {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} is not a JSON object of indicator values")]
    UnexpectedShape { url: String },

    #[error("{0}")]
    Other(String),
}
