use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

/// Offset added to every schema version stored in `PRAGMA user_version`, so a
/// database created by some other tool (user_version 0) is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum OnDelete {
    NoAction,
    SetNull,
    Cascade,
}

impl OnDelete {
    fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: OnDelete,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    def.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    def.push_str(&format!(" DEFAULT {}", default_value));
                }
                if let Some(fk) = column.foreign_key {
                    def.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE {}",
                        fk.foreign_table,
                        fk.foreign_column,
                        fk.on_delete.as_sql()
                    ));
                }
                def
            })
            .collect();

        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        for unique in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", unique.join(", ")));
        }
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({})", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        self.validate_columns(conn)?;
        self.validate_indices(conn)?;
        self.validate_foreign_keys(conn)
    }

    fn validate_columns(&self, conn: &Connection) -> Result<()> {
        struct ActualColumn {
            name: String,
            sql_type: String,
            non_null: bool,
            default_value: Option<String>,
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", self.name))?;
        let actual: Vec<ActualColumn> = stmt
            .query_map([], |row| {
                Ok(ActualColumn {
                    name: row.get(1)?,
                    sql_type: row.get(2)?,
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.is_empty() {
            bail!("Table {} is missing", self.name);
        }
        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}",
                self.name,
                actual.len(),
                self.columns.len(),
                actual
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (actual, expected) in actual.iter().zip(self.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            if SqlType::parse(&actual.sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    actual.sql_type
                );
            }
            if actual.non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    actual.non_null
                );
            }
            // SQLite may report the default wrapped in parentheses
            let actual_default = actual.default_value.as_deref().map(strip_parentheses);
            let expected_default = expected.default_value.map(strip_parentheses);
            if actual_default != expected_default {
                bail!(
                    "Table {} column {} default value mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.default_value,
                    actual.default_value
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection) -> Result<()> {
        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", self.name))?;
        // (from, table, to, on_delete)
        let actual: Vec<(String, String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(3)?, row.get(2)?, row.get(4)?, row.get(6)?)))?
            .collect::<rusqlite::Result<_>>()?;

        for column in self.columns {
            let Some(fk) = column.foreign_key else {
                continue;
            };
            let found = actual.iter().any(|(from, table, to, on_delete)| {
                from == column.name
                    && table == fk.foreign_table
                    && to == fk.foreign_column
                    && on_delete == fk.on_delete.as_sql()
            });
            if !found {
                bail!(
                    "Table {} column {} is missing foreign key REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    fk.foreign_table,
                    fk.foreign_column,
                    fk.on_delete.as_sql()
                );
            }
        }
        Ok(())
    }
}

fn strip_parentheses(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s)
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        set_user_version(conn, self.version)
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

fn set_user_version(conn: &Connection, version: usize) -> Result<()> {
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + version),
        [],
    )?;
    Ok(())
}

/// Reads the schema version stored in the database, without the base offset.
pub fn stored_schema_version(conn: &Connection) -> Result<i64> {
    let raw: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(raw - BASE_DB_VERSION as i64)
}

/// Brings `conn` to the latest of `schemas`.
///
/// An empty database gets the latest schema created directly. Otherwise the stored
/// version must be one of `schemas` and must validate against it; later versions
/// are then applied in order inside a single transaction.
pub fn ensure_schema(
    conn: &mut Connection,
    schemas: &'static [VersionedSchema],
    label: &str,
) -> Result<()> {
    let latest = schemas
        .last()
        .with_context(|| format!("No schema versions defined for {} database", label))?;

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    if table_count == 0 {
        info!("Creating {} database schema v{}", label, latest.version);
        return latest.create(conn);
    }

    let db_version = stored_schema_version(conn)?;
    let index = schemas
        .iter()
        .position(|s| s.version as i64 == db_version)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?;
    schemas[index].validate(conn).with_context(|| {
        format!(
            "{} database schema validation failed for version {}",
            label, db_version
        )
    })?;

    if index + 1 == schemas.len() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in &schemas[index + 1..] {
        info!(
            "Migrating {} database to version {}",
            label, schema.version
        );
        if let Some(migration) = schema.migration {
            migration(&tx).with_context(|| {
                format!("Failed to run migration to version {}", schema.version)
            })?;
        }
    }
    set_user_version(&tx, latest.version)?;
    tx.commit()?;
    Ok(())
}

/// Opens (or creates) a SQLite database file and brings it to the latest schema.
pub fn open_versioned<P: AsRef<Path>>(
    path: P,
    schemas: &'static [VersionedSchema],
    label: &str,
) -> Result<Connection> {
    let path = path.as_ref();
    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open {} database at {:?}", label, path))?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;
    ensure_schema(&mut conn, schemas, label)?;
    Ok(conn)
}
