use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraderError {
    #[error("running-signals checkpoint I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("running-signals checkpoint serialization failed: {0}")]
    Serde(#[source] serde_json::Error),
}
