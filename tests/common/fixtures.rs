//! Test fixture creation for the profile database

#![allow(dead_code)]

use chrono::NaiveDate;
use profile_metrics::config::MetricsSettings;
use profile_metrics::metrics::MetricsEngine;
use profile_metrics::profile_store::SqliteProfileStore;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed "today" every test pass is scored against.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

const CREATED_AT: &str = "2025-01-01T00:00:00Z";

/// A profile database in a temporary directory.
pub struct TestProfile {
    pub store: Arc<SqliteProfileStore>,
    pub db_path: PathBuf,
    _dir: TempDir,
}

impl TestProfile {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("profile.db");
        // Opening the store creates the schema
        let store = Arc::new(SqliteProfileStore::new(&db_path).unwrap());
        Self {
            store,
            db_path,
            _dir: dir,
        }
    }

    pub fn engine(&self) -> MetricsEngine {
        self.engine_with(MetricsSettings::default())
    }

    pub fn engine_with(&self, settings: MetricsSettings) -> MetricsEngine {
        MetricsEngine::new(self.store.clone(), self.store.clone(), settings)
    }

    fn conn(&self) -> Connection {
        Connection::open(&self.db_path).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_entity(
        &self,
        id: &str,
        flavor: &str,
        category: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        date: Option<&str>,
        is_current: bool,
        visibility: &str,
    ) {
        self.conn()
            .execute(
                "INSERT INTO entities (id, flavor, category, title, start_date, end_date, date,
                                       is_current, visibility, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    id,
                    flavor,
                    category,
                    format!("Entity {}", id),
                    start_date,
                    end_date,
                    date,
                    is_current as i64,
                    visibility,
                    CREATED_AT
                ],
            )
            .unwrap();
    }

    /// A public span entity, ongoing when `end` is `None`.
    pub fn add_span_entity(
        &self,
        id: &str,
        flavor: &str,
        category: &str,
        start: &str,
        end: Option<&str>,
    ) {
        self.insert_entity(id, flavor, category, Some(start), end, None, false, "public");
    }

    pub fn add_current_entity(&self, id: &str, flavor: &str, category: &str, start: &str) {
        self.insert_entity(id, flavor, category, Some(start), None, None, true, "public");
    }

    /// A public point-in-time entity.
    pub fn add_point_entity(&self, id: &str, flavor: &str, category: &str, date: &str) {
        self.insert_entity(id, flavor, category, None, None, Some(date), false, "public");
    }

    pub fn add_private_entity(&self, id: &str, date: &str) {
        self.insert_entity(id, "oeuvre", "coding", None, None, Some(date), false, "private");
    }

    /// Public entities carrying no tag, padding the frequency denominator.
    pub fn add_filler_entities(&self, count: usize) {
        for i in 0..count {
            self.add_point_entity(&format!("filler-{}", i), "oeuvre", "website", "2022-01-01");
        }
    }

    pub fn tag(&self, entity_id: &str, tag: &str, tag_type: &str) {
        self.conn()
            .execute(
                "INSERT INTO tags (entity_id, tag, tag_type) VALUES (?1, ?2, ?3)",
                params![entity_id, tag, tag_type],
            )
            .unwrap();
    }

    pub fn set_visibility(&self, entity_id: &str, visibility: &str) {
        self.conn()
            .execute(
                "UPDATE entities SET visibility = ?1 WHERE id = ?2",
                params![visibility, entity_id],
            )
            .unwrap();
    }

    pub fn metrics_row_count(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM tag_metrics", [], |row| row.get(0))
            .unwrap()
    }
}
