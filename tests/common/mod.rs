//! Common test infrastructure
//!
//! Tests build a profile database on disk, seed it through direct SQL inserts
//! and run the metrics engine against it.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{today, TestProfile};
//!
//! #[test]
//! fn test_pass() {
//!     let profile = TestProfile::new();
//!     profile.add_point_entity("post", "oeuvre", "article", "2024-01-01");
//!     profile.tag("post", "Rust", "technology");
//!
//!     let summary = profile.engine().calculate_all_metrics_at(None, today()).unwrap();
//!     assert_eq!(summary.tags_processed, 1);
//! }
//! ```

mod fixtures;

pub use fixtures::*;
