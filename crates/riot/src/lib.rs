//! Client for the rate-limited upstream timeline API.
//!
//! [`RetryingClient`] is the only way the exporter talks to the upstream:
//! it classifies errors, backs off exponentially and gates concurrency.

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod retry;

pub use client::*;
pub use config::*;
pub use error::*;
pub use retry::*;
