//! Derived per-tag analytics: proficiency, experience, usage, trend and
//! relevance, and the pass that keeps them up to date.

pub mod dates;
mod engine;
mod experience;
mod growth;
pub mod intervals;
mod proficiency;
mod relevance;
mod usage;

pub use engine::{compute_tag_metrics, MetricsEngine, MetricsError, PassSummary};
pub use experience::calculate_experience_years;
pub use growth::{calculate_growth_trend, classify_slope};
pub use proficiency::{calculate_proficiency, recency_score, relevant_date};
pub use relevance::{calculate_relevance, RelevanceInputs};
pub use usage::{
    calculate_distribution, calculate_diversity, calculate_frequency, calculate_last_used,
};
