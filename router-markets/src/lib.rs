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

//! Domain model for the order router, and the shared reference caches built
//! on top of it: Strategies, Positions, Contracts, Snapshots, TradingDates
//! and ComingDividends.
//!
//! Every cache guards its snapshot behind a `parking_lot::RwLock` and
//! exposes a single fallible `get` - there is no separate
//! check-then-strict-get pair to keep in sync.

pub mod cache;
pub mod error;
pub mod model;

pub use cache::{
    ComingDividendsCache, ContractsCache, PositionsCache, SnapshotsCache, StrategiesCache,
    TradingDatesCache,
};
pub use error::CacheError;
pub use model::*;
