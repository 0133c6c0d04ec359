use thiserror::Error;

/// Observer-level errors. Parse failures are deliberately NOT part of this
/// type's "fatal" surface - `parse_signal_line` / `parse_order_line` / etc.
/// return `Result<_, LineParseError>` which callers log and skip, advancing
/// the checkpoint regardless so a bad line can never poison the stream.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Checkpoint(#[from] router_integration::IntegrationError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineParseError {
    #[error("expected {expected} fields, got {actual}: {line:?}")]
    FieldCount { expected: usize, actual: usize, line: String },

    #[error("unrecognised value {value:?} in field {field}")]
    BadField { field: &'static str, value: String },

    #[error("unknown strategy name {0:?}")]
    UnknownStrategy(String),

    #[error("unparseable filename {0:?}")]
    BadFilename(String),
}
