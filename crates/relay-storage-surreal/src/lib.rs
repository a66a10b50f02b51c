// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C2 — concrete `StoragePort` over a document store (SurrealDB). Owns the
//! bidirectional mapping between an entity's opaque `id` string and the
//! store's internal record id, automatic timestamping, and the retry
//! policy for transient write faults (§4.2).

pub mod repository;
pub mod retry;

pub use repository::SurrealRepository;
