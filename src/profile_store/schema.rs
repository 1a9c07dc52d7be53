//! SQLite schema definitions for the profile database.
//!
//! The profile database holds the taggable entities, their tag associations
//! and the derived per-tag metrics.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, OnDelete, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Entities, tags and tag metrics
// =============================================================================

/// Career stages (flavor `stages`) and portfolio items (flavor `oeuvre`).
const ENTITIES_TABLE_V1: Table = Table {
    name: "entities",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("flavor", &SqlType::Text, non_null = true),
        sqlite_column!("category", &SqlType::Text),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("start_date", &SqlType::Text), // ISO-8601, possibly partial
        sqlite_column!("end_date", &SqlType::Text),   // null = ongoing
        sqlite_column!("date", &SqlType::Text),       // point-in-time items
        sqlite_column!("is_current", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("visibility", &SqlType::Text, default_value = Some("'public'")),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    primary_key: &[],
    indices: &[
        ("idx_entities_flavor", "flavor"),
        ("idx_entities_category", "category"),
        ("idx_entities_dates", "start_date, end_date"),
    ],
    unique_constraints: &[],
};

const ENTITY_FK: ForeignKey = ForeignKey {
    foreign_table: "entities",
    foreign_column: "id",
    on_delete: OnDelete::Cascade,
};

/// Many-to-many link between entities and (tag, tag_type).
const TAGS_TABLE_V1: Table = Table {
    name: "tags",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!(
            "entity_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ENTITY_FK)
        ),
        sqlite_column!("tag", &SqlType::Text, non_null = true),
        sqlite_column!(
            "tag_type",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'generic'")
        ),
    ],
    primary_key: &[],
    indices: &[
        ("idx_tags_type", "tag_type"),
        ("idx_tags_tag", "tag"),
        ("idx_tags_entity", "entity_id"),
    ],
    unique_constraints: &[&["entity_id", "tag", "tag_type"]],
};

/// One derived metrics record per (tag_name, tag_type).
const TAG_METRICS_TABLE_V1: Table = Table {
    name: "tag_metrics",
    columns: &[
        sqlite_column!("tag_name", &SqlType::Text, non_null = true),
        sqlite_column!("tag_type", &SqlType::Text, non_null = true),
        sqlite_column!("proficiency", &SqlType::Real),
        sqlite_column!("experience_years", &SqlType::Real),
        sqlite_column!("entity_count", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("frequency", &SqlType::Real),
        sqlite_column!("last_used", &SqlType::Text), // YYYY-MM-DD
        sqlite_column!("diversity_score", &SqlType::Real),
        sqlite_column!("growth_trend", &SqlType::Text),
        sqlite_column!("distribution", &SqlType::Text), // JSON
        sqlite_column!("relevance_score", &SqlType::Real),
        sqlite_column!("calculated_at", &SqlType::Text, non_null = true), // RFC 3339
        sqlite_column!("metrics_version", &SqlType::Text, default_value = Some("'1.0'")),
    ],
    primary_key: &["tag_name", "tag_type"],
    indices: &[
        ("idx_metrics_type", "tag_type"),
        ("idx_metrics_relevance", "relevance_score DESC"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Metric pass history
// =============================================================================

const METRICS_RUNS_TABLE_V2: Table = Table {
    name: "metrics_runs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("started_at", &SqlType::Text, non_null = true),
        sqlite_column!("finished_at", &SqlType::Text),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("tag_type_filter", &SqlType::Text),
        sqlite_column!(
            "tags_processed",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("metrics_version", &SqlType::Text, non_null = true),
    ],
    primary_key: &[],
    indices: &[("idx_metrics_runs_started", "started_at DESC")],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE metrics_runs (
            id INTEGER PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            tag_type_filter TEXT,
            tags_processed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            metrics_version TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_metrics_runs_started ON metrics_runs(started_at DESC)",
        [],
    )?;
    Ok(())
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const PROFILE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[ENTITIES_TABLE_V1, TAGS_TABLE_V1, TAG_METRICS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            ENTITIES_TABLE_V1,
            TAGS_TABLE_V1,
            TAG_METRICS_TABLE_V1,
            METRICS_RUNS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
