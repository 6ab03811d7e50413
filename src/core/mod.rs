//! Core Module
//!
//! Infraestrutura comum do subsistema de display: logging e espera limitada.

pub mod logging;
pub mod poll;

pub use poll::{poll_timeout, PollTimeout};
