//! Shared mocks, fixtures and setup for the exporter integration tests.

pub mod mocks;
pub mod setup;
