mod file_config;

pub use file_config::{
    ContextWeightsConfig, DiversityConfig, ExperienceYearsConfig, FileConfig, GrowthConfig,
    GrowthScoresConfig, MetricsConfig, ProficiencyConfig, RelevanceConfig, RelevanceWeightsConfig,
};

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub metrics: MetricsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let metrics = MetricsSettings::resolve(file.metrics.unwrap_or_default())?;

        Ok(Self { db_path, metrics })
    }
}

// =============================================================================
// Metrics settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub version: String,
    /// Tags written per transaction
    pub batch_size: usize,
    /// Delete records of tags no longer carried by any visible entity
    pub prune_stale_records: bool,
    pub proficiency: ProficiencySettings,
    pub context_weights: ContextWeights,
    pub experience_years: ExperienceSettings,
    pub diversity: DiversitySettings,
    pub growth: GrowthSettings,
    pub relevance: RelevanceSettings,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            version: "1.0".to_string(),
            batch_size: 100,
            prune_stale_records: false,
            proficiency: ProficiencySettings::default(),
            context_weights: ContextWeights::default(),
            experience_years: ExperienceSettings::default(),
            diversity: DiversitySettings::default(),
            growth: GrowthSettings::default(),
            relevance: RelevanceSettings::default(),
        }
    }
}

impl MetricsSettings {
    /// Merges the `[metrics]` file section key by key over the defaults.
    pub fn resolve(file: MetricsConfig) -> Result<Self> {
        let defaults = Self::default();

        let batch_size = file.batch_size.unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            bail!("metrics.batch_size must be at least 1");
        }

        let version = file.version.unwrap_or(defaults.version);
        if version.trim().is_empty() {
            bail!("metrics.version must not be empty");
        }

        let p_file = file.proficiency.unwrap_or_default();
        let p_def = defaults.proficiency;
        let proficiency = ProficiencySettings {
            recency_weight: p_file.recency_weight.unwrap_or(p_def.recency_weight),
            duration_weight: p_file.duration_weight.unwrap_or(p_def.duration_weight),
            recency_decay_halflife: p_file
                .recency_decay_halflife
                .unwrap_or(p_def.recency_decay_halflife),
            min_score: p_file.min_score.unwrap_or(p_def.min_score),
            default_oeuvre_duration_years: p_file
                .default_oeuvre_duration_years
                .unwrap_or(p_def.default_oeuvre_duration_years),
            duration_score_multiplier: p_file
                .duration_score_multiplier
                .unwrap_or(p_def.duration_score_multiplier),
        };
        if proficiency.recency_decay_halflife <= 0.0 {
            bail!("metrics.proficiency.recency_decay_halflife must be positive");
        }

        let mut context_weights = defaults.context_weights;
        if let Some(cw_file) = file.context_weights {
            if let Some(default_weight) = cw_file.default_weight {
                context_weights.default_weight = default_weight;
            }
            for (flavor, categories) in cw_file.flavors {
                for (category, weight) in categories {
                    context_weights.set(&flavor, &category, weight);
                }
            }
        }

        let e_file = file.experience_years.unwrap_or_default();
        let e_def = defaults.experience_years;
        let experience_years = ExperienceSettings {
            deduplicate_overlaps: e_file
                .deduplicate_overlaps
                .unwrap_or(e_def.deduplicate_overlaps),
            current_bonus_multiplier: e_file
                .current_bonus_multiplier
                .unwrap_or(e_def.current_bonus_multiplier),
        };

        let d_file = file.diversity.unwrap_or_default();
        let d_def = defaults.diversity;
        let diversity = DiversitySettings {
            flavor_weight: d_file.flavor_weight.unwrap_or(d_def.flavor_weight),
            category_weight: d_file.category_weight.unwrap_or(d_def.category_weight),
            saturation_threshold: d_file
                .saturation_threshold
                .unwrap_or(d_def.saturation_threshold),
        };

        let g_file = file.growth.unwrap_or_default();
        let g_def = defaults.growth;
        let growth = GrowthSettings {
            min_timespan_years: g_file.min_timespan_years.unwrap_or(g_def.min_timespan_years),
            min_entity_count: g_file.min_entity_count.unwrap_or(g_def.min_entity_count),
            increasing_threshold: g_file
                .increasing_threshold
                .unwrap_or(g_def.increasing_threshold),
            decreasing_threshold: g_file
                .decreasing_threshold
                .unwrap_or(g_def.decreasing_threshold),
        };

        let r_file = file.relevance.unwrap_or_default();
        let r_def = defaults.relevance;
        let w_file = r_file.weights.unwrap_or_default();
        let gs_file = r_file.growth_scores.unwrap_or_default();
        let relevance = RelevanceSettings {
            weights: RelevanceWeights {
                proficiency: w_file.proficiency.unwrap_or(r_def.weights.proficiency),
                frequency: w_file.frequency.unwrap_or(r_def.weights.frequency),
                recency: w_file.recency.unwrap_or(r_def.weights.recency),
                diversity: w_file.diversity.unwrap_or(r_def.weights.diversity),
                experience: w_file.experience.unwrap_or(r_def.weights.experience),
                growth: w_file.growth.unwrap_or(r_def.weights.growth),
            },
            current_bonus: r_file.current_bonus.unwrap_or(r_def.current_bonus),
            stale_penalty: r_file.stale_penalty.unwrap_or(r_def.stale_penalty),
            stale_threshold_years: r_file
                .stale_threshold_years
                .unwrap_or(r_def.stale_threshold_years),
            recency_decay_halflife: r_file
                .recency_decay_halflife
                .unwrap_or(r_def.recency_decay_halflife),
            experience_score_multiplier: r_file
                .experience_score_multiplier
                .unwrap_or(r_def.experience_score_multiplier),
            growth_scores: GrowthScores {
                increasing: gs_file.increasing.unwrap_or(r_def.growth_scores.increasing),
                stable: gs_file.stable.unwrap_or(r_def.growth_scores.stable),
                decreasing: gs_file.decreasing.unwrap_or(r_def.growth_scores.decreasing),
            },
        };
        if relevance.recency_decay_halflife <= 0.0 {
            bail!("metrics.relevance.recency_decay_halflife must be positive");
        }

        Ok(Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            version,
            batch_size,
            prune_stale_records: file
                .prune_stale_records
                .unwrap_or(defaults.prune_stale_records),
            proficiency,
            context_weights,
            experience_years,
            diversity,
            growth,
            relevance,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProficiencySettings {
    pub recency_weight: f64,
    pub duration_weight: f64,
    pub recency_decay_halflife: f64,
    /// Floor applied to every entity score
    pub min_score: f64,
    /// Assumed engagement for point-in-time items, also used by experience years
    pub default_oeuvre_duration_years: f64,
    pub duration_score_multiplier: f64,
}

impl Default for ProficiencySettings {
    fn default() -> Self {
        Self {
            recency_weight: 0.6,
            duration_weight: 0.4,
            recency_decay_halflife: 3.0,
            min_score: 5.0,
            default_oeuvre_duration_years: 0.5,
            duration_score_multiplier: 15.0,
        }
    }
}

/// Multipliers distinguishing hands-on contexts from mentions, keyed by
/// flavor then category.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWeights {
    pub default_weight: f64,
    table: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ContextWeights {
    pub fn empty(default_weight: f64) -> Self {
        Self {
            default_weight,
            table: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, flavor: &str, category: &str, weight: f64) {
        self.table
            .entry(flavor.to_string())
            .or_default()
            .insert(category.to_string(), weight);
    }

    pub fn weight_for(&self, flavor: &str, category: &str) -> f64 {
        self.table
            .get(flavor)
            .and_then(|categories| categories.get(category))
            .copied()
            .unwrap_or(self.default_weight)
    }
}

impl Default for ContextWeights {
    fn default() -> Self {
        let mut weights = Self::empty(0.5);
        weights.set("stages", "job", 1.0);
        weights.set("stages", "education", 0.8);
        weights.set("oeuvre", "coding", 0.9);
        weights.set("oeuvre", "book", 0.7);
        weights.set("oeuvre", "website", 0.7);
        weights.set("oeuvre", "article", 0.6);
        weights.set("oeuvre", "blog_post", 0.6);
        weights
    }
}

#[derive(Debug, Clone)]
pub struct ExperienceSettings {
    pub deduplicate_overlaps: bool,
    pub current_bonus_multiplier: f64,
}

impl Default for ExperienceSettings {
    fn default() -> Self {
        Self {
            deduplicate_overlaps: true,
            current_bonus_multiplier: 1.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiversitySettings {
    pub flavor_weight: f64,
    pub category_weight: f64,
    /// Number of distinct values at which an axis scores 1
    pub saturation_threshold: f64,
}

impl Default for DiversitySettings {
    fn default() -> Self {
        Self {
            flavor_weight: 0.5,
            category_weight: 0.5,
            saturation_threshold: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrowthSettings {
    pub min_timespan_years: f64,
    pub min_entity_count: usize,
    pub increasing_threshold: f64,
    pub decreasing_threshold: f64,
}

impl Default for GrowthSettings {
    fn default() -> Self {
        Self {
            min_timespan_years: 1.0,
            min_entity_count: 3,
            increasing_threshold: 0.5,
            decreasing_threshold: -0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceWeights {
    pub proficiency: f64,
    pub frequency: f64,
    pub recency: f64,
    pub diversity: f64,
    pub experience: f64,
    pub growth: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            proficiency: 0.30,
            frequency: 0.20,
            recency: 0.20,
            diversity: 0.15,
            experience: 0.10,
            growth: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrowthScores {
    pub increasing: f64,
    pub stable: f64,
    pub decreasing: f64,
}

impl Default for GrowthScores {
    fn default() -> Self {
        Self {
            increasing: 100.0,
            stable: 50.0,
            decreasing: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceSettings {
    pub weights: RelevanceWeights,
    pub current_bonus: f64,
    pub stale_penalty: f64,
    pub stale_threshold_years: f64,
    pub recency_decay_halflife: f64,
    pub experience_score_multiplier: f64,
    pub growth_scores: GrowthScores,
}

impl Default for RelevanceSettings {
    fn default() -> Self {
        Self {
            weights: RelevanceWeights::default(),
            current_bonus: 10.0,
            stale_penalty: 15.0,
            stale_threshold_years: 5.0,
            recency_decay_halflife: 3.0,
            experience_score_multiplier: 10.0,
            growth_scores: GrowthScores::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/tmp/profile.db")),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/profile.db"));
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.version, "1.0");
        assert_eq!(config.metrics.batch_size, 100);
        assert!(!config.metrics.prune_stale_records);
        assert!(config.metrics.experience_years.deduplicate_overlaps);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/should/be/overridden.db")),
        };
        let file_config = FileConfig {
            db_path: Some("/toml/profile.db".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/toml/profile.db"));
    }

    #[test]
    fn test_resolve_missing_db_path_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_path must be specified"));
    }

    #[test]
    fn test_resolve_db_path_directory_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().to_path_buf()),
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("is a directory"));
    }

    #[test]
    fn test_metrics_merged_per_key() {
        let file: FileConfig = toml::from_str(
            r#"
            [metrics.proficiency]
            recency_weight = 0.7

            [metrics.relevance]
            stale_penalty = 20

            [metrics.relevance.growth_scores]
            stable = 40
            "#,
        )
        .unwrap();

        let settings = MetricsSettings::resolve(file.metrics.unwrap()).unwrap();

        assert!((settings.proficiency.recency_weight - 0.7).abs() < 0.001);
        // Siblings of an overridden key keep their defaults
        assert!((settings.proficiency.duration_weight - 0.4).abs() < 0.001);
        assert!((settings.proficiency.min_score - 5.0).abs() < 0.001);
        assert!((settings.relevance.stale_penalty - 20.0).abs() < 0.001);
        assert!((settings.relevance.current_bonus - 10.0).abs() < 0.001);
        assert!((settings.relevance.growth_scores.stable - 40.0).abs() < 0.001);
        assert!((settings.relevance.growth_scores.increasing - 100.0).abs() < 0.001);
        assert!((settings.relevance.weights.proficiency - 0.30).abs() < 0.001);
    }

    #[test]
    fn test_context_weights_cells_override_without_wiping_table() {
        let file: FileConfig = toml::from_str(
            r#"
            [metrics.context_weights]
            default_weight = 0.3

            [metrics.context_weights.oeuvre]
            article = 0.65
            talk = 0.75
            "#,
        )
        .unwrap();

        let settings = MetricsSettings::resolve(file.metrics.unwrap()).unwrap();
        let weights = &settings.context_weights;

        assert_eq!(weights.weight_for("oeuvre", "article"), 0.65);
        assert_eq!(weights.weight_for("oeuvre", "talk"), 0.75);
        assert_eq!(weights.weight_for("oeuvre", "coding"), 0.9);
        assert_eq!(weights.weight_for("stages", "job"), 1.0);
        assert_eq!(weights.weight_for("stages", "sabbatical"), 0.3);
        assert_eq!(weights.weight_for("unknown", "job"), 0.3);
    }

    #[test]
    fn test_metrics_zero_batch_size_error() {
        let file = MetricsConfig {
            batch_size: Some(0),
            ..Default::default()
        };
        let result = MetricsSettings::resolve(file);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("batch_size"));
    }

    #[test]
    fn test_metrics_non_positive_halflife_error() {
        let file = MetricsConfig {
            relevance: Some(RelevanceConfig {
                recency_decay_halflife: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(MetricsSettings::resolve(file).is_err());
    }

    #[test]
    fn test_metrics_disabled_and_version() {
        let file = MetricsConfig {
            enabled: Some(false),
            version: Some("2.0".to_string()),
            prune_stale_records: Some(true),
            ..Default::default()
        };
        let settings = MetricsSettings::resolve(file).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.version, "2.0");
        assert!(settings.prune_stale_records);
    }
}
