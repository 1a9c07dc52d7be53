use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,

    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: Option<bool>,
    /// Formula version stamped onto every record
    pub version: Option<String>,
    pub batch_size: Option<usize>,
    pub prune_stale_records: Option<bool>,

    pub proficiency: Option<ProficiencyConfig>,
    pub context_weights: Option<ContextWeightsConfig>,
    pub experience_years: Option<ExperienceYearsConfig>,
    pub diversity: Option<DiversityConfig>,
    pub growth: Option<GrowthConfig>,
    pub relevance: Option<RelevanceConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProficiencyConfig {
    pub recency_weight: Option<f64>,
    pub duration_weight: Option<f64>,
    pub recency_decay_halflife: Option<f64>,
    pub min_score: Option<f64>,
    pub default_oeuvre_duration_years: Option<f64>,
    pub duration_score_multiplier: Option<f64>,
}

/// `default_weight` plus one sub-table per flavor:
///
/// ```toml
/// [metrics.context_weights]
/// default_weight = 0.4
///
/// [metrics.context_weights.oeuvre]
/// talk = 0.65
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ContextWeightsConfig {
    pub default_weight: Option<f64>,
    #[serde(flatten)]
    pub flavors: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExperienceYearsConfig {
    pub deduplicate_overlaps: Option<bool>,
    pub current_bonus_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiversityConfig {
    pub flavor_weight: Option<f64>,
    pub category_weight: Option<f64>,
    pub saturation_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GrowthConfig {
    pub min_timespan_years: Option<f64>,
    pub min_entity_count: Option<usize>,
    pub increasing_threshold: Option<f64>,
    pub decreasing_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RelevanceConfig {
    pub weights: Option<RelevanceWeightsConfig>,
    pub current_bonus: Option<f64>,
    pub stale_penalty: Option<f64>,
    pub stale_threshold_years: Option<f64>,
    pub recency_decay_halflife: Option<f64>,
    pub experience_score_multiplier: Option<f64>,
    pub growth_scores: Option<GrowthScoresConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RelevanceWeightsConfig {
    pub proficiency: Option<f64>,
    pub frequency: Option<f64>,
    pub recency: Option<f64>,
    pub diversity: Option<f64>,
    pub experience: Option<f64>,
    pub growth: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GrowthScoresConfig {
    pub increasing: Option<f64>,
    pub stable: Option<f64>,
    pub decreasing: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
