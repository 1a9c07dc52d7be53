//! Profile Metrics Library
//!
//! Derived per-tag analytics over the entities of a personal profile.
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod metrics;
pub mod profile_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use config::{AppConfig, MetricsSettings};
pub use metrics::{MetricsEngine, MetricsError, PassSummary};
pub use profile_store::{
    EntityTagStore, SqliteProfileStore, TagKey, TagMetrics, TagMetricsStore, TagType,
};
