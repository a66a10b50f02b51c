// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::error::StorageError;
use crate::filter::Filter;
use crate::page::OrderDirection;

/// C1 — the abstract CRUD contract every concrete repository implements,
/// one `impl StoragePort<Entity>` per entity type the repository serves
/// (§4.1). `relay-storage-dual` depends only on this trait, never on an
/// engine-specific feature (§9 "dual-backend without leaky abstractions").
#[async_trait]
pub trait StoragePort<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn create(&self, item: T) -> Result<T, StorageError>;

    async fn batch_create(&self, items: Vec<T>) -> Result<Vec<T>, StorageError>;

    /// Exactly one of `id`/`name` must be supplied; `ClientError` otherwise.
    async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<T, StorageError>;

    async fn get_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<T>, StorageError>;

    #[allow(clippy::too_many_arguments)]
    async fn find_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
        limit: u64,
        page_number: Option<u64>,
        sort_by: Option<&str>,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<T>, StorageError>;

    #[allow(clippy::too_many_arguments)]
    async fn find_by_field_with_cursor(
        &self,
        field: &str,
        value: &serde_json::Value,
        limit: u64,
        sort_by: Option<&str>,
        before_id: Option<&str>,
        after_id: Option<&str>,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<T>, StorageError>;

    /// Preserves `created_at`; refreshes `updated_at`.
    async fn update(&self, item: T) -> Result<T, StorageError>;

    async fn batch_update(&self, items: Vec<T>) -> Result<Vec<T>, StorageError>;

    async fn delete(&self, id: &str) -> Result<u64, StorageError>;

    async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError>;

    async fn delete_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64, StorageError>;

    async fn list(
        &self,
        filters: Option<&[Filter]>,
        limit: Option<u64>,
        page_number: Option<u64>,
        order_by: Option<&str>,
        order_direction: Option<OrderDirection>,
    ) -> Result<Vec<T>, StorageError>;
}
