//! Inbound adapters that translate external triggers into domain calls.
//!
//! HTTP handlers live under [`http`]; the clock-driven reset trigger lives
//! under [`scheduler`].

pub mod http;
pub mod scheduler;
