//! MongoDB source of match and timeline documents.

pub mod client;
pub mod config;
pub mod health;
pub mod query;
pub mod store;

pub use client::*;
pub use config::*;
pub use store::*;
