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

//! Low-level primitives shared by every crate in the order router: the
//! exchange clock, trading-session scheduling predicates, B3 tick-size
//! snapping, id allocation, and checkpoint (file offset) persistence.
//!
//! Nothing here depends on the domain model - it is the foundation the
//! rest of the workspace builds on.

pub mod checkpoint;
pub mod clock;
pub mod error;
pub mod id;
pub mod schedule;
pub mod tick;

pub use checkpoint::{Checkpoints, load_checkpoints, store_checkpoints};
pub use clock::{Clock, SystemClock};
pub use error::IntegrationError;
pub use id::{OrderIdAllocator, SignalIdAllocator};
pub use schedule::ScheduleWindows;
pub use tick::adjust_price_for_tick;
