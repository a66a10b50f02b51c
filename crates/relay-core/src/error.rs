// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// The wire error taxonomy from the spec (§7). Every crate in the workspace
/// normalizes its own errors down to one of these variants at its boundary;
/// transport layers (HTTP, JSON-RPC) map them to status codes / RPC codes.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller supplied invalid or conflicting input. HTTP 4xx, JSON-RPC -32602.
    #[error("client error: {0}")]
    ClientError(String),

    /// A specific `ClientError` subtype for a missing entity. HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation. HTTP 409.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Authorization or signature failure. HTTP 401/403.
    #[error("auth error: {0}")]
    AuthError(String),

    /// Unexpected or transient server-side failure after retries. HTTP 500,
    /// JSON-RPC -32603.
    #[error("service error: {0}")]
    ServiceError(String),
}

impl RelayError {
    pub fn service(err: impl std::fmt::Display) -> Self {
        RelayError::ServiceError(err.to_string())
    }

    /// JSON-RPC 2.0 error code for this variant (§7).
    pub fn rpc_code(&self) -> i64 {
        match self {
            RelayError::ClientError(_) | RelayError::NotFound(_) | RelayError::Duplicate(_) => {
                -32602
            }
            RelayError::AuthError(_) => -32600,
            RelayError::ServiceError(_) => -32603,
        }
    }

    /// HTTP status code for this variant (§7).
    pub fn http_status(&self) -> u16 {
        match self {
            RelayError::ClientError(_) => 400,
            RelayError::NotFound(_) => 404,
            RelayError::Duplicate(_) => 409,
            RelayError::AuthError(_) => 401,
            RelayError::ServiceError(_) => 500,
        }
    }
}
