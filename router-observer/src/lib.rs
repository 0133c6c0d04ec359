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

//! Polls three file sources - strategy signal logs, broker order
//! callbacks, and broker trade/position callbacks - and turns them into
//! typed events for the engine. A full directory re-scan runs on a fixed
//! interval (`tokio::time::interval`), diffed against a per-source
//! checkpoint, matching `watchdog`'s `PollingObserver` rather than an
//! OS-level file-system watch.

pub mod callback_file;
pub mod error;
pub mod poller;
pub mod signal_file;

pub use error::{LineParseError, ObserverError};
pub use poller::{Observer, ObserverEvent, ObserverPaths, POSITION_TRUNCATE_LINES};
