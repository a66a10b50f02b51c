// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use relay_core::RelayError;
use thiserror::Error;

/// Error kinds from §4.1. Concrete repositories translate their driver's
/// errors into these; `relay-storage-dual` and the dispatcher translate
/// them further into `RelayError`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("bad selector: {0}")]
    ClientError(String),

    #[error("service error: {0}")]
    ServiceError(String),
}

impl StorageError {
    pub fn service(err: impl std::fmt::Display) -> Self {
        StorageError::ServiceError(err.to_string())
    }
}

impl From<StorageError> for RelayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(m) => RelayError::NotFound(m),
            StorageError::Duplicate(m) => RelayError::Duplicate(m),
            StorageError::ClientError(m) => RelayError::ClientError(m),
            StorageError::ServiceError(m) => RelayError::ServiceError(m),
        }
    }
}
