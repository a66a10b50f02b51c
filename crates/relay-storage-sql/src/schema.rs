// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `relay-storage-sql` has no migration files of its own: it expects
//! whatever deployment provisions the PostgreSQL database to have run
//! [`CREATE_TABLE_SQL`] for each table named by a
//! `relay_storage::StorageEntity::table_name()`, e.g. via `sqlx migrate
//! run` against a directory owned by the deploying service rather than
//! by this crate.

pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS {table}_created_at_id_idx ON {table} (created_at DESC, id ASC);
"#;

pub fn create_table_statement(table: &str) -> String {
    CREATE_TABLE_SQL.replace("{table}", table)
}
