mod models;
mod schema;
mod sqlite_profile_store;

pub use models::*;
pub use schema::PROFILE_VERSIONED_SCHEMAS;
pub use sqlite_profile_store::SqliteProfileStore;

use anyhow::Result;

/// Read access to the entity/tag data the metrics are derived from.
///
/// Only publicly visible entities exist from the point of view of this trait.
pub trait EntityTagStore: Send + Sync {
    /// Distinct (tag, tag_type) pairs carried by at least one visible entity,
    /// ordered by tag type then tag name.
    fn distinct_tag_keys(&self, tag_type: Option<TagType>) -> Result<Vec<TagKey>>;

    /// Every distinct visible entity carrying exactly this (tag, tag_type).
    fn collect_tag_entities(&self, key: &TagKey) -> Result<Vec<EntityContext>>;

    /// Number of visible entities, the denominator of every tag frequency.
    fn total_visible_entity_count(&self) -> Result<usize>;
}

/// Storage for computed tag metrics and the history of recalculation passes.
pub trait TagMetricsStore: Send + Sync {
    /// Replaces the stored records for every key in `metrics` in one transaction.
    fn upsert_metrics_batch(&self, metrics: &[TagMetrics]) -> Result<()>;

    fn get_tag_metrics(&self, key: &TagKey) -> Result<Option<TagMetrics>>;

    fn list_tag_metrics(
        &self,
        tag_type: Option<TagType>,
        order_by: MetricsOrder,
        limit: usize,
    ) -> Result<Vec<TagMetrics>>;

    fn count_metrics_by_type(&self) -> Result<Vec<(TagType, usize)>>;

    /// Distinct formula versions found on stored records.
    fn stored_metrics_versions(&self) -> Result<Vec<String>>;

    /// Deletes records (of `tag_type`, or of every type) whose key is not in `keep`.
    /// Returns the number of deleted records.
    fn delete_metrics_except(&self, tag_type: Option<TagType>, keep: &[TagKey]) -> Result<usize>;

    // Pass history
    fn record_run_start(&self, tag_type: Option<TagType>, metrics_version: &str) -> Result<i64>;
    fn record_run_finish(
        &self,
        run_id: i64,
        status: RunStatus,
        tags_processed: usize,
        error_message: Option<String>,
    ) -> Result<()>;
    fn last_run(&self) -> Result<Option<MetricsRun>>;
}
