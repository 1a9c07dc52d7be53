use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Tags
// =============================================================================

/// Classification of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Technology,
    Skill,
    Generic,
}

impl TagType {
    pub const ALL: [TagType; 3] = [TagType::Technology, TagType::Skill, TagType::Generic];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Technology => "technology",
            TagType::Skill => "skill",
            TagType::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "technology" => Some(TagType::Technology),
            "skill" => Some(TagType::Skill),
            "generic" => Some(TagType::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a tag and of its metrics record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    pub tag_name: String,
    pub tag_type: TagType,
}

impl TagKey {
    pub fn new(tag_name: impl Into<String>, tag_type: TagType) -> Self {
        Self {
            tag_name: tag_name.into(),
            tag_type,
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tag_name, self.tag_type)
    }
}

// =============================================================================
// Entities
// =============================================================================

/// The fields of a visible entity that metric calculations look at.
///
/// Dates are kept as the raw stored strings: the store holds hand-edited partial
/// dates (`2020`, `2020-03`) and the scorers decide how to read them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityContext {
    pub id: String,
    pub flavor: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date: Option<String>,
    pub is_current: bool,
}

// =============================================================================
// Metrics
// =============================================================================

/// Usage trajectory of a tag over calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthTrend {
    Increasing,
    Stable,
    Decreasing,
}

impl GrowthTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrowthTrend::Increasing => "increasing",
            GrowthTrend::Stable => "stable",
            GrowthTrend::Decreasing => "decreasing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "increasing" => Some(GrowthTrend::Increasing),
            "stable" => Some(GrowthTrend::Stable),
            "decreasing" => Some(GrowthTrend::Decreasing),
            _ => None,
        }
    }
}

impl fmt::Display for GrowthTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity counts grouped by flavor and by category.
///
/// BTreeMap keeps the serialized JSON stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub by_flavor: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

/// The computed metrics of one tag. Replaced as a whole on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TagMetrics {
    pub tag_name: String,
    pub tag_type: TagType,
    /// 0-100
    pub proficiency: f64,
    pub experience_years: f64,
    pub entity_count: usize,
    /// 0-1
    pub frequency: f64,
    pub last_used: Option<NaiveDate>,
    /// 0-1
    pub diversity_score: f64,
    pub growth_trend: GrowthTrend,
    pub distribution: Distribution,
    /// 0-100
    pub relevance_score: f64,
    pub calculated_at: DateTime<Utc>,
    pub metrics_version: String,
}

impl TagMetrics {
    pub fn key(&self) -> TagKey {
        TagKey::new(self.tag_name.clone(), self.tag_type)
    }
}

/// Sort fields accepted when listing stored metrics. Always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsOrder {
    #[default]
    RelevanceScore,
    Proficiency,
    EntityCount,
    Frequency,
    LastUsed,
    ExperienceYears,
    DiversityScore,
}

impl MetricsOrder {
    pub fn column(&self) -> &'static str {
        match self {
            MetricsOrder::RelevanceScore => "relevance_score",
            MetricsOrder::Proficiency => "proficiency",
            MetricsOrder::EntityCount => "entity_count",
            MetricsOrder::Frequency => "frequency",
            MetricsOrder::LastUsed => "last_used",
            MetricsOrder::ExperienceYears => "experience_years",
            MetricsOrder::DiversityScore => "diversity_score",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "relevance_score" | "relevance" => Some(MetricsOrder::RelevanceScore),
            "proficiency" => Some(MetricsOrder::Proficiency),
            "entity_count" => Some(MetricsOrder::EntityCount),
            "frequency" => Some(MetricsOrder::Frequency),
            "last_used" => Some(MetricsOrder::LastUsed),
            "experience_years" => Some(MetricsOrder::ExperienceYears),
            "diversity_score" => Some(MetricsOrder::DiversityScore),
            _ => None,
        }
    }
}

// =============================================================================
// Metric runs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One full recalculation pass, as recorded in `metrics_runs`.
#[derive(Debug, Clone)]
pub struct MetricsRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub tag_type_filter: Option<TagType>,
    pub tags_processed: usize,
    pub error_message: Option<String>,
    pub metrics_version: String,
}
