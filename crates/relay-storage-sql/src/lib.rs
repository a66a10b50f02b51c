// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C3 — concrete `StoragePort` over PostgreSQL. Each entity table is
//! `(id TEXT PRIMARY KEY, data JSONB, created_at, updated_at)`; predicates
//! are pushed down as JSONB path comparisons so one `SqlRepository<T>`
//! impl serves every entity type, the same way `r2e-data-sqlx`'s
//! `SqlxRepository<T, DB>` wraps a bare pool per entity rather than
//! hand-writing a repository per table.

pub mod error;
pub mod repository;
pub mod schema;

pub use error::SqlxErrorExt;
pub use repository::SqlRepository;
