use thiserror::Error;

/// A reference cache failed its freshness predicate. Non-fatal: callers log
/// and skip the current event, or retry on the next pass.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    #[error("{cache} is stale: last updated more than the freshness tolerance ago")]
    Stale { cache: &'static str },

    #[error("{cache} has no entry for the requested key")]
    NotFound { cache: &'static str },
}
