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

//! Turns risk-validated signals into broker orders: batches same-code
//! buy/sell signals and offsets opposing quantities internally, splits
//! the remainder into broker orders, and writes the broker order log.

pub mod data_store;
pub mod error;
pub mod order_manager;
pub mod signal_collector;

pub use data_store::{DataStore, DataStoreError, InMemoryDataStore};
pub use error::ExecutionError;
pub use order_manager::{append_broker_order, decompose_signal, format_broker_order_line, system_check};
pub use signal_collector::{FlushResult, OffsetPair, SignalCollector};
