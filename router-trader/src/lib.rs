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

//! The exit handler: five rules (OutDate, DaysProfitLimit, TakeProfit,
//! StopLoss, ProfitPullback) evaluated per open position against fresh
//! quotes, emitting exactly one closing signal per position and
//! remembering it in a persisted `running_signals` set so a restart
//! can't double-fire a rule.

pub mod error;
pub mod exit_rules;
pub mod handler;

pub use error::TraderError;
pub use exit_rules::evaluate_exit;
pub use handler::ExitHandler;
