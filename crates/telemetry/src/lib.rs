//! Internal telemetry for the match lake exporter.
//!
//! Structured logs via `tracing`, in-process atomic metrics that the progress
//! reporter logs periodically, and a health registry for external
//! dependencies.

pub mod health;
pub mod metrics;
pub mod resources;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use resources::ResourceSampler;
pub use tracing_setup::*;
