//! Object store writer for the match lake exporter.

pub mod compression;
pub mod config;
pub mod health;
pub mod writer;

pub use compression::Codec;
pub use config::*;
pub use writer::*;
