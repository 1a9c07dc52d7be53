use super::models::{
    Distribution, EntityContext, GrowthTrend, MetricsOrder, MetricsRun, RunStatus, TagKey,
    TagMetrics, TagType,
};
use super::schema::PROFILE_VERSIONED_SCHEMAS;
use super::{EntityTagStore, TagMetricsStore};
use crate::sqlite_persistence::{ensure_schema, open_versioned};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{named_params, params, Connection, OptionalExtension};
use rusqlite::types::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const LAST_USED_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteProfileStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        info!("Opening profile database at {:?}", path);
        let conn = open_versioned(path, PROFILE_VERSIONED_SCHEMAS, "profile")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A private, empty database that lives as long as the store.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        ensure_schema(&mut conn, PROFILE_VERSIONED_SCHEMAS, "profile")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<EntityContext> {
        Ok(EntityContext {
            id: row.get("id")?,
            flavor: row.get("flavor")?,
            category: row.get("category")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            date: row.get("date")?,
            is_current: Self::flag_value(row.get("is_current")?),
        })
    }

    /// Hand-edited flags may be stored as numbers or text; anything unreadable is false.
    fn flag_value(value: Value) -> bool {
        match value {
            Value::Integer(i) => i != 0,
            Value::Real(f) => f != 0.0,
            Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"),
            Value::Null | Value::Blob(_) => false,
        }
    }

    fn row_to_metrics(row: &rusqlite::Row) -> rusqlite::Result<TagMetrics> {
        let tag_type_str: String = row.get("tag_type")?;
        let growth_str: Option<String> = row.get("growth_trend")?;
        let last_used_str: Option<String> = row.get("last_used")?;
        let distribution_str: Option<String> = row.get("distribution")?;
        let calculated_at_str: String = row.get("calculated_at")?;
        let entity_count: i64 = row.get::<_, Option<i64>>("entity_count")?.unwrap_or(0);

        Ok(TagMetrics {
            tag_name: row.get("tag_name")?,
            tag_type: TagType::parse(&tag_type_str).unwrap_or(TagType::Generic),
            proficiency: row.get::<_, Option<f64>>("proficiency")?.unwrap_or(0.0),
            experience_years: row.get::<_, Option<f64>>("experience_years")?.unwrap_or(0.0),
            entity_count: entity_count.max(0) as usize,
            frequency: row.get::<_, Option<f64>>("frequency")?.unwrap_or(0.0),
            last_used: last_used_str
                .and_then(|s| NaiveDate::parse_from_str(&s, LAST_USED_FORMAT).ok()),
            diversity_score: row.get::<_, Option<f64>>("diversity_score")?.unwrap_or(0.0),
            growth_trend: growth_str
                .as_deref()
                .and_then(GrowthTrend::parse)
                .unwrap_or(GrowthTrend::Stable),
            distribution: distribution_str
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            relevance_score: row.get::<_, Option<f64>>("relevance_score")?.unwrap_or(0.0),
            calculated_at: Self::parse_datetime(&calculated_at_str)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            metrics_version: row
                .get::<_, Option<String>>("metrics_version")?
                .unwrap_or_default(),
        })
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<MetricsRun> {
        let started_at_str: String = row.get("started_at")?;
        let finished_at_str: Option<String> = row.get("finished_at")?;
        let status_str: String = row.get("status")?;
        let filter_str: Option<String> = row.get("tag_type_filter")?;
        let processed: i64 = row.get("tags_processed")?;

        Ok(MetricsRun {
            id: row.get("id")?,
            started_at: Self::parse_datetime(&started_at_str)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            finished_at: finished_at_str.as_deref().and_then(Self::parse_datetime),
            status: RunStatus::parse(&status_str).unwrap_or(RunStatus::Failed),
            tag_type_filter: filter_str.as_deref().and_then(TagType::parse),
            tags_processed: processed.max(0) as usize,
            error_message: row.get("error_message")?,
            metrics_version: row.get("metrics_version")?,
        })
    }

    fn distribution_json(distribution: &Distribution) -> Result<String> {
        serde_json::to_string(distribution).context("Failed to serialize distribution")
    }
}

impl EntityTagStore for SqliteProfileStore {
    fn distinct_tag_keys(&self, tag_type: Option<TagType>) -> Result<Vec<TagKey>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT t.tag, t.tag_type
             FROM tags t
             JOIN entities e ON e.id = t.entity_id
             WHERE e.visibility = 'public'
               AND (?1 IS NULL OR t.tag_type = ?1)
             ORDER BY t.tag_type, t.tag",
        )?;
        let rows = stmt
            .query_map(params![tag_type.map(|t| t.as_str())], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut keys = Vec::with_capacity(rows.len());
        for (tag_name, tag_type_str) in rows {
            match TagType::parse(&tag_type_str) {
                Some(tag_type) => keys.push(TagKey::new(tag_name, tag_type)),
                None => warn!(
                    "Skipping tag '{}' with unknown tag type '{}'",
                    tag_name, tag_type_str
                ),
            }
        }
        Ok(keys)
    }

    fn collect_tag_entities(&self, key: &TagKey) -> Result<Vec<EntityContext>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT e.id, e.flavor, e.category, e.start_date, e.end_date,
                    e.date, e.is_current
             FROM entities e
             JOIN tags t ON t.entity_id = e.id
             WHERE t.tag = ?1 AND t.tag_type = ?2 AND e.visibility = 'public'
             ORDER BY e.start_date DESC NULLS LAST, e.date DESC NULLS LAST, e.id",
        )?;
        let entities = stmt
            .query_map(
                params![key.tag_name, key.tag_type.as_str()],
                Self::row_to_entity,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to collect entities for tag {}", key))?;
        Ok(entities)
    }

    fn total_visible_entity_count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE visibility = 'public'",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

impl TagMetricsStore for SqliteProfileStore {
    fn upsert_metrics_batch(&self, metrics: &[TagMetrics]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO tag_metrics (
                    tag_name, tag_type, proficiency, experience_years, entity_count,
                    frequency, last_used, diversity_score, growth_trend, distribution,
                    relevance_score, calculated_at, metrics_version
                ) VALUES (
                    :tag_name, :tag_type, :proficiency, :experience_years, :entity_count,
                    :frequency, :last_used, :diversity_score, :growth_trend, :distribution,
                    :relevance_score, :calculated_at, :metrics_version
                )",
            )?;
            for record in metrics {
                let distribution = Self::distribution_json(&record.distribution)?;
                let last_used = record
                    .last_used
                    .map(|d| d.format(LAST_USED_FORMAT).to_string());
                stmt.execute(named_params! {
                    ":tag_name": record.tag_name,
                    ":tag_type": record.tag_type.as_str(),
                    ":proficiency": record.proficiency,
                    ":experience_years": record.experience_years,
                    ":entity_count": record.entity_count as i64,
                    ":frequency": record.frequency,
                    ":last_used": last_used,
                    ":diversity_score": record.diversity_score,
                    ":growth_trend": record.growth_trend.as_str(),
                    ":distribution": distribution,
                    ":relevance_score": record.relevance_score,
                    ":calculated_at": Self::format_datetime(&record.calculated_at),
                    ":metrics_version": record.metrics_version,
                })
                .with_context(|| format!("Failed to store metrics for {}", record.key()))?;
            }
        }
        tx.commit()?;
        debug!("Committed {} metrics records", metrics.len());
        Ok(())
    }

    fn get_tag_metrics(&self, key: &TagKey) -> Result<Option<TagMetrics>> {
        let conn = self.lock();
        let metrics = conn
            .query_row(
                "SELECT * FROM tag_metrics WHERE tag_name = ?1 AND tag_type = ?2",
                params![key.tag_name, key.tag_type.as_str()],
                Self::row_to_metrics,
            )
            .optional()?;
        Ok(metrics)
    }

    fn list_tag_metrics(
        &self,
        tag_type: Option<TagType>,
        order_by: MetricsOrder,
        limit: usize,
    ) -> Result<Vec<TagMetrics>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT * FROM tag_metrics
             WHERE (?1 IS NULL OR tag_type = ?1)
             ORDER BY {} DESC, tag_name ASC
             LIMIT ?2",
            order_by.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let metrics = stmt
            .query_map(
                params![tag_type.map(|t| t.as_str()), limit as i64],
                Self::row_to_metrics,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(metrics)
    }

    fn count_metrics_by_type(&self) -> Result<Vec<(TagType, usize)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT tag_type, COUNT(*) FROM tag_metrics GROUP BY tag_type ORDER BY tag_type",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(t, count)| TagType::parse(&t).map(|t| (t, count.max(0) as usize)))
            .collect())
    }

    fn stored_metrics_versions(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT COALESCE(metrics_version, '') FROM tag_metrics ORDER BY 1",
        )?;
        let versions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(versions)
    }

    fn delete_metrics_except(&self, tag_type: Option<TagType>, keep: &[TagKey]) -> Result<usize> {
        let keep: HashSet<(&str, &str)> = keep
            .iter()
            .map(|k| (k.tag_name.as_str(), k.tag_type.as_str()))
            .collect();

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let stored: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT tag_name, tag_type FROM tag_metrics WHERE (?1 IS NULL OR tag_type = ?1)",
            )?;
            let rows = stmt
                .query_map(params![tag_type.map(|t| t.as_str())], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut deleted = 0;
        for (tag_name, stored_type) in &stored {
            if keep.contains(&(tag_name.as_str(), stored_type.as_str())) {
                continue;
            }
            deleted += tx.execute(
                "DELETE FROM tag_metrics WHERE tag_name = ?1 AND tag_type = ?2",
                params![tag_name, stored_type],
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn record_run_start(&self, tag_type: Option<TagType>, metrics_version: &str) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO metrics_runs (started_at, status, tag_type_filter, metrics_version)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Self::format_datetime(&Utc::now()),
                RunStatus::Running.as_str(),
                tag_type.map(|t| t.as_str()),
                metrics_version
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_run_finish(
        &self,
        run_id: i64,
        status: RunStatus,
        tags_processed: usize,
        error_message: Option<String>,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE metrics_runs
             SET finished_at = ?1, status = ?2, tags_processed = ?3, error_message = ?4
             WHERE id = ?5",
            params![
                Self::format_datetime(&Utc::now()),
                status.as_str(),
                tags_processed as i64,
                error_message,
                run_id
            ],
        )?;
        Ok(())
    }

    fn last_run(&self) -> Result<Option<MetricsRun>> {
        let conn = self.lock();
        let run = conn
            .query_row(
                "SELECT * FROM metrics_runs ORDER BY id DESC LIMIT 1",
                [],
                Self::row_to_run,
            )
            .optional()?;
        Ok(run)
    }
}
