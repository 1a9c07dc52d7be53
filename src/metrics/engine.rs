//! Tag metrics pass.
//!
//! A pass enumerates every (tag, tag_type) carried by a visible entity,
//! computes a complete [`TagMetrics`] record for each and replaces the stored
//! record. Records are written in batches of `batch_size`, one transaction per
//! batch, so an interrupted pass keeps what it committed and a re-run simply
//! recomputes everything.
//!
//! Within a batch the entity contexts are read sequentially, then the tags are
//! scored in parallel on the rayon pool. Scoring is a pure function of
//! (entities, total, settings, today), so output does not depend on the order
//! in which the pool finishes.

use super::experience::calculate_experience_years;
use super::growth::calculate_growth_trend;
use super::proficiency::calculate_proficiency;
use super::relevance::{calculate_relevance, RelevanceInputs};
use super::usage::{
    calculate_distribution, calculate_diversity, calculate_frequency, calculate_last_used,
};
use crate::config::MetricsSettings;
use crate::profile_store::{
    EntityContext, EntityTagStore, RunStatus, TagKey, TagMetrics, TagMetricsStore, TagType,
};
use chrono::{DateTime, NaiveDate, Utc};
#[cfg(not(feature = "sequential"))]
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that can occur while computing metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics calculation is disabled in configuration")]
    Disabled,

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Metrics pass aborted after {processed} tags: {source}")]
    PassAborted {
        processed: usize,
        source: anyhow::Error,
    },
}

impl MetricsError {
    /// Tags committed before the failure.
    pub fn processed(&self) -> usize {
        match self {
            MetricsError::PassAborted { processed, .. } => *processed,
            _ => 0,
        }
    }
}

/// Outcome of a completed pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub run_id: i64,
    pub tags_processed: usize,
    /// Records deleted because their tag is no longer carried by any visible entity
    pub pruned: usize,
    pub elapsed: Duration,
}

/// Computes every metric of one tag from its entities.
pub fn compute_tag_metrics(
    key: &TagKey,
    entities: &[EntityContext],
    total_entities: usize,
    settings: &MetricsSettings,
    today: NaiveDate,
    calculated_at: DateTime<Utc>,
) -> TagMetrics {
    let entity_count = entities.len();

    let proficiency = calculate_proficiency(
        entities,
        &settings.proficiency,
        &settings.context_weights,
        today,
    );
    let experience_years = calculate_experience_years(
        entities,
        &settings.experience_years,
        settings.proficiency.default_oeuvre_duration_years,
        today,
    );
    let frequency = calculate_frequency(entity_count, total_entities);
    let last_used = calculate_last_used(entities, today);
    let diversity_score = calculate_diversity(entities, &settings.diversity);
    let growth_trend = calculate_growth_trend(entities, &settings.growth);
    let distribution = calculate_distribution(entities);

    let relevance_score = calculate_relevance(
        &RelevanceInputs {
            proficiency,
            frequency,
            last_used,
            diversity: diversity_score,
            experience_years,
            growth_trend,
            any_current: entities.iter().any(|e| e.is_current),
        },
        &settings.relevance,
        today,
    );

    TagMetrics {
        tag_name: key.tag_name.clone(),
        tag_type: key.tag_type,
        proficiency,
        experience_years,
        entity_count,
        frequency,
        last_used,
        diversity_score,
        growth_trend,
        distribution,
        relevance_score,
        calculated_at,
        metrics_version: settings.version.clone(),
    }
}

pub struct MetricsEngine {
    entities: Arc<dyn EntityTagStore>,
    metrics: Arc<dyn TagMetricsStore>,
    settings: MetricsSettings,
}

impl MetricsEngine {
    pub fn new(
        entities: Arc<dyn EntityTagStore>,
        metrics: Arc<dyn TagMetricsStore>,
        settings: MetricsSettings,
    ) -> Self {
        Self {
            entities,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    /// True when the store holds records and all of them carry the configured
    /// formula version.
    pub fn is_up_to_date(&self) -> Result<bool, MetricsError> {
        let versions = self.metrics.stored_metrics_versions()?;
        Ok(!versions.is_empty() && versions.iter().all(|v| *v == self.settings.version))
    }

    /// Computes the metrics of a single tag without storing them.
    pub fn calculate_tag_metrics(&self, key: &TagKey) -> Result<TagMetrics, MetricsError> {
        self.calculate_tag_metrics_at(key, Utc::now().date_naive())
    }

    pub fn calculate_tag_metrics_at(
        &self,
        key: &TagKey,
        today: NaiveDate,
    ) -> Result<TagMetrics, MetricsError> {
        let entities = self.entities.collect_tag_entities(key)?;
        let total = self.entities.total_visible_entity_count()?;
        Ok(compute_tag_metrics(
            key,
            &entities,
            total,
            &self.settings,
            today,
            Utc::now(),
        ))
    }

    /// Recomputes and replaces the metrics of every tag (of `tag_type`, when
    /// given). The pass is recorded in the run history, including the number
    /// of tags committed when it fails.
    pub fn calculate_all_metrics(
        &self,
        tag_type: Option<TagType>,
    ) -> Result<PassSummary, MetricsError> {
        self.calculate_all_metrics_at(tag_type, Utc::now().date_naive())
    }

    pub fn calculate_all_metrics_at(
        &self,
        tag_type: Option<TagType>,
        today: NaiveDate,
    ) -> Result<PassSummary, MetricsError> {
        if !self.settings.enabled {
            warn!("Metrics pass requested but metrics are disabled");
            return Err(MetricsError::Disabled);
        }

        let started = Instant::now();
        let run_id = self
            .metrics
            .record_run_start(tag_type, &self.settings.version)?;
        info!(
            "Starting metrics pass {} (type: {}, version: {}, today: {})",
            run_id,
            tag_type.map_or("all", |t| t.as_str()),
            self.settings.version,
            today
        );

        let mut processed = 0;
        let outcome = self.run_pass(tag_type, today, &mut processed);

        match outcome {
            Ok(pruned) => {
                self.metrics
                    .record_run_finish(run_id, RunStatus::Completed, processed, None)?;
                let elapsed = started.elapsed();
                info!(
                    "Metrics pass {} completed: {} tags processed, {} pruned in {:?}",
                    run_id, processed, pruned, elapsed
                );
                Ok(PassSummary {
                    run_id,
                    tags_processed: processed,
                    pruned,
                    elapsed,
                })
            }
            Err(e) => {
                error!(
                    "Metrics pass {} failed after {} tags: {:#}",
                    run_id, processed, e
                );
                if let Err(record_err) = self.metrics.record_run_finish(
                    run_id,
                    RunStatus::Failed,
                    processed,
                    Some(format!("{:#}", e)),
                ) {
                    warn!("Failed to record failure of pass {}: {}", run_id, record_err);
                }
                Err(MetricsError::PassAborted {
                    processed,
                    source: e,
                })
            }
        }
    }

    /// Returns the number of pruned records. `processed` counts committed tags
    /// and stays valid when this fails.
    fn run_pass(
        &self,
        tag_type: Option<TagType>,
        today: NaiveDate,
        processed: &mut usize,
    ) -> anyhow::Result<usize> {
        let keys = self.entities.distinct_tag_keys(tag_type)?;
        let total = self.entities.total_visible_entity_count()?;
        info!(
            "Found {} tags across {} visible entities",
            keys.len(),
            total
        );

        for batch in keys.chunks(self.settings.batch_size) {
            let contexts = batch
                .iter()
                .map(|key| self.entities.collect_tag_entities(key))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let records = self.score_batch(batch, &contexts, total, today, Utc::now());
            self.metrics.upsert_metrics_batch(&records)?;
            *processed += records.len();
            info!("Committed {} of {} tags", processed, keys.len());
        }

        if !self.settings.prune_stale_records {
            return Ok(0);
        }
        let pruned = self.metrics.delete_metrics_except(tag_type, &keys)?;
        if pruned > 0 {
            info!("Pruned {} metrics records of tags no longer in use", pruned);
        }
        Ok(pruned)
    }

    #[cfg(not(feature = "sequential"))]
    fn score_batch(
        &self,
        keys: &[TagKey],
        contexts: &[Vec<EntityContext>],
        total: usize,
        today: NaiveDate,
        calculated_at: DateTime<Utc>,
    ) -> Vec<TagMetrics> {
        keys.par_iter()
            .zip(contexts.par_iter())
            .map(|(key, entities)| self.score_tag(key, entities, total, today, calculated_at))
            .collect()
    }

    #[cfg(feature = "sequential")]
    fn score_batch(
        &self,
        keys: &[TagKey],
        contexts: &[Vec<EntityContext>],
        total: usize,
        today: NaiveDate,
        calculated_at: DateTime<Utc>,
    ) -> Vec<TagMetrics> {
        keys.iter()
            .zip(contexts.iter())
            .map(|(key, entities)| self.score_tag(key, entities, total, today, calculated_at))
            .collect()
    }

    fn score_tag(
        &self,
        key: &TagKey,
        entities: &[EntityContext],
        total: usize,
        today: NaiveDate,
        calculated_at: DateTime<Utc>,
    ) -> TagMetrics {
        let record =
            compute_tag_metrics(key, entities, total, &self.settings, today, calculated_at);
        debug!(
            "{}: {} entities, proficiency {:.2}, relevance {:.2}, trend {}",
            key,
            record.entity_count,
            record.proficiency,
            record.relevance_score,
            record.growth_trend
        );
        record
    }
}
