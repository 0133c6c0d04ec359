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

//! The risk manager: a synchronous, ordered validation pipeline run against
//! every [`Signal`](router_markets::Signal) before it reaches the order
//! manager.
//!
//! `validate_signal` never mutates its input in place - it returns the
//! (possibly price/quantity-adjusted) signal paired with a
//! [`RiskDecision`], per the redesign that replaces the original's
//! `rm_validated` / `rm_reject_reason` field mutation.

pub mod config;
pub mod risk_manager;

pub use config::RiskConfig;
pub use risk_manager::RiskManager;
