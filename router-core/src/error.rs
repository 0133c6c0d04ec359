//! Aggregates errors from every subsystem the engine drives into one type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Integration(#[from] router_integration::IntegrationError),

    #[error(transparent)]
    Cache(#[from] router_markets::CacheError),

    #[error(transparent)]
    Execution(#[from] router_execution::ExecutionError),

    #[error(transparent)]
    DataStore(#[from] router_execution::DataStoreError),

    #[error(transparent)]
    Trader(#[from] router_trader::TraderError),

    #[error(transparent)]
    Observer(#[from] router_observer::ObserverError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("engine join failure: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for RouterError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(value.to_string())
    }
}
