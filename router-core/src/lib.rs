#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The order router's engine: configuration loading, the reference-data
//! sync / correlation / signal-routing core, structured logging, and the
//! aggregated error type every subsystem feeds into.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use config::RouterConfig;
pub use engine::{Engine, EngineOutcome, ReferenceCaches};
pub use error::RouterError;
pub use logging::{init_json_logging, init_logging};
pub use shutdown::{AsyncShutdown, Shutdown, SyncShutdown};
