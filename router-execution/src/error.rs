use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to write broker order log {path}: {source}")]
    OrderLogWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tick(#[from] router_integration::IntegrationError),
}
