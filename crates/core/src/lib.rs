//! Core types, partition keys, and errors for the match lake exporter.

pub mod error;
pub mod filter;
pub mod limits;
pub mod partition;
pub mod records;

pub use error::{Error, Result, Stage};
pub use filter::*;
pub use partition::*;
pub use records::*;
