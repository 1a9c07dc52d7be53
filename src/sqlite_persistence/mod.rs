mod versioned_schema;

pub use versioned_schema::{
    ensure_schema, open_versioned, stored_schema_version, Column, ForeignKey, OnDelete, SqlType,
    Table, VersionedSchema, BASE_DB_VERSION,
};
