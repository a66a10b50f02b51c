// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Orphan rules keep us from implementing `From<sqlx::Error> for
//! StorageError` here (neither type is local enough... actually both
//! are, but the conversion needs the row-not-found vs. constraint-
//! violation distinction spelled out explicitly, so an extension trait
//! reads clearer at call sites than a blanket `From`).

use relay_storage::StorageError;

const DUPLICATE_KEY_SQLSTATE: &str = "23505";

pub trait SqlxErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            sqlx::Error::RowNotFound => StorageError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(DUPLICATE_KEY_SQLSTATE) {
                    StorageError::Duplicate(db_err.to_string())
                } else {
                    StorageError::service(db_err)
                }
            }
            other => StorageError::service(other),
        }
    }
}
