// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `DualRepository<T, P, S>` wraps a primary `StoragePort<T>` (`P`,
//! normally `relay-storage-surreal`) and a secondary one (`S`, normally
//! `relay-storage-sql`), switching write/read behavior on
//! [`StoragePhase`] (§4.4). `relay-dispatcher` only ever sees the
//! `StoragePort<T>` trait, so swapping engines or adding a phase never
//! leaks into the RPC layer.

use async_trait::async_trait;
use relay_core::StoragePhase;
use relay_storage::{Filter, OrderDirection, StorageEntity, StorageError, StoragePort};

#[derive(Clone)]
pub struct DualRepository<T, P, S> {
    primary: P,
    secondary: S,
    default_phase: StoragePhase,
    _marker: std::marker::PhantomData<T>,
}

impl<T, P, S> DualRepository<T, P, S>
where
    T: StorageEntity,
    P: StoragePort<T>,
    S: StoragePort<T>,
{
    pub fn new(primary: P, secondary: S, default_phase: StoragePhase) -> Self {
        DualRepository {
            primary,
            secondary,
            default_phase,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn default_phase(&self) -> StoragePhase {
        self.default_phase
    }

    /// Entry points for callers that need a per-request phase override
    /// rather than this repository's configured default (§6 `storage_backend`
    /// query override; §9: "phase overrides propagate via an optional
    /// argument threaded from the request surface down"). `None` falls
    /// back to [`Self::default_phase`].
    pub async fn create_with_phase(&self, phase: Option<StoragePhase>, item: T) -> Result<T, StorageError> {
        self.write_create(phase.unwrap_or(self.default_phase), item).await
    }

    pub async fn get_with_phase(
        &self,
        phase: Option<StoragePhase>,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<T, StorageError> {
        self.read_get(phase.unwrap_or(self.default_phase), id, name).await
    }

    pub async fn update_with_phase(&self, phase: Option<StoragePhase>, item: T) -> Result<T, StorageError> {
        self.write_update(phase.unwrap_or(self.default_phase), item).await
    }

    pub async fn delete_with_phase(&self, phase: Option<StoragePhase>, id: &str) -> Result<u64, StorageError> {
        self.write_delete(phase.unwrap_or(self.default_phase), id).await
    }

    /// Strips the fields that legitimately differ across backends
    /// (timestamps) before an equality comparison, per §4.4: "equality
    /// compares the normalized content value only (not timestamps)".
    fn normalize(item: &T) -> serde_json::Value {
        let mut value = serde_json::to_value(item).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("created_at");
            map.remove("updated_at");
        }
        value
    }

    fn record_comparison(operation: &str, primary: Option<&T>, secondary: Option<&T>) {
        let op = operation.to_string();
        match (primary, secondary) {
            (Some(p), Some(s)) => {
                if Self::normalize(p) == Self::normalize(s) {
                    metrics::counter!("dual_repository.match", "operation" => op).increment(1);
                } else {
                    metrics::counter!("dual_repository.mismatch.content", "operation" => op).increment(1);
                }
            }
            (Some(_), None) => {
                metrics::counter!("dual_repository.mismatch.missing_secondary", "operation" => op)
                    .increment(1);
            }
            (None, Some(_)) => {
                metrics::counter!("dual_repository.mismatch.missing_primary", "operation" => op)
                    .increment(1);
            }
            (None, None) => {
                metrics::counter!("dual_repository.match", "operation" => op).increment(1);
            }
        }
    }

    fn record_list_comparison(operation: &str, primary_count: usize, secondary_count: Option<usize>) {
        let op = operation.to_string();
        let Some(secondary_count) = secondary_count else {
            metrics::counter!("dual_repository.mismatch.missing_secondary", "operation" => op)
                .increment(1);
            return;
        };
        if primary_count == secondary_count {
            metrics::counter!("dual_repository.match", "operation" => op).increment(1);
        } else {
            metrics::counter!("dual_repository.list_count_mismatch", "operation" => op.clone())
                .increment(1);
            metrics::gauge!("dual_repository.list_count_abs_diff", "operation" => op)
                .set((primary_count as f64 - secondary_count as f64).abs());
        }
    }

    /// §4.4 write-path table.
    async fn write_create(&self, phase: StoragePhase, item: T) -> Result<T, StorageError> {
        match phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite | StoragePhase::DualReadVerify => {
                let created = self.primary.create(item).await?;
                if phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.create(created.clone()).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary create failed");
                    }
                }
                Ok(created)
            }
            StoragePhase::SecondaryOnly => self.secondary.create(item).await,
        }
    }

    async fn read_get(&self, phase: StoragePhase, id: Option<&str>, name: Option<&str>) -> Result<T, StorageError> {
        match phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite => self.primary.get(id, name).await,
            StoragePhase::SecondaryOnly => self.secondary.get(id, name).await,
            StoragePhase::DualReadVerify => {
                let (primary, secondary) = futures::join!(
                    self.primary.get(id, name),
                    self.secondary.get(id, name)
                );
                Self::record_comparison("get", primary.as_ref().ok(), secondary.as_ref().ok());
                primary
            }
        }
    }

    async fn write_update(&self, phase: StoragePhase, item: T) -> Result<T, StorageError> {
        match phase {
            StoragePhase::SecondaryOnly => self.secondary.update(item).await,
            _ => {
                let updated = self.primary.update(item).await?;
                if phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.update(updated.clone()).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary update failed");
                    }
                }
                Ok(updated)
            }
        }
    }

    async fn write_delete(&self, phase: StoragePhase, id: &str) -> Result<u64, StorageError> {
        match phase {
            StoragePhase::SecondaryOnly => self.secondary.delete(id).await,
            _ => {
                let n = self.primary.delete(id).await?;
                if phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.delete(id).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary delete failed");
                    }
                }
                Ok(n)
            }
        }
    }
}

#[async_trait]
impl<T, P, S> StoragePort<T> for DualRepository<T, P, S>
where
    T: StorageEntity,
    P: StoragePort<T>,
    S: StoragePort<T>,
{
    async fn create(&self, item: T) -> Result<T, StorageError> {
        self.write_create(self.default_phase, item).await
    }

    async fn batch_create(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        match self.default_phase {
            StoragePhase::SecondaryOnly => self.secondary.batch_create(items).await,
            _ => {
                let created = self.primary.batch_create(items).await?;
                if self.default_phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.batch_create(created.clone()).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary batch_create failed");
                    }
                }
                Ok(created)
            }
        }
    }

    async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<T, StorageError> {
        self.read_get(self.default_phase, id, name).await
    }

    async fn get_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<T>, StorageError> {
        match self.default_phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite => {
                self.primary.get_by_field(field, value).await
            }
            StoragePhase::SecondaryOnly => self.secondary.get_by_field(field, value).await,
            StoragePhase::DualReadVerify => {
                let (primary, secondary) = futures::join!(
                    self.primary.get_by_field(field, value),
                    self.secondary.get_by_field(field, value)
                );
                let primary_item = primary.as_ref().ok().and_then(|o| o.as_ref());
                let secondary_item = secondary.as_ref().ok().and_then(|o| o.as_ref());
                Self::record_comparison("get_by_field", primary_item, secondary_item);
                primary
            }
        }
    }

    async fn find_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
        limit: u64,
        page_number: Option<u64>,
        sort_by: Option<&str>,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<T>, StorageError> {
        match self.default_phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite => {
                self.primary
                    .find_by_field(field, value, limit, page_number, sort_by, filters)
                    .await
            }
            StoragePhase::SecondaryOnly => {
                self.secondary
                    .find_by_field(field, value, limit, page_number, sort_by, filters)
                    .await
            }
            StoragePhase::DualReadVerify => {
                let (primary, secondary) = futures::join!(
                    self.primary.find_by_field(field, value, limit, page_number, sort_by, filters),
                    self.secondary.find_by_field(field, value, limit, page_number, sort_by, filters)
                );
                Self::record_list_comparison(
                    "find_by_field",
                    primary.as_ref().map(|r| r.len()).unwrap_or(0),
                    secondary.as_ref().ok().map(|r| r.len()),
                );
                primary
            }
        }
    }

    async fn find_by_field_with_cursor(
        &self,
        field: &str,
        value: &serde_json::Value,
        limit: u64,
        sort_by: Option<&str>,
        before_id: Option<&str>,
        after_id: Option<&str>,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<T>, StorageError> {
        match self.default_phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite => {
                self.primary
                    .find_by_field_with_cursor(field, value, limit, sort_by, before_id, after_id, filters)
                    .await
            }
            StoragePhase::SecondaryOnly => {
                self.secondary
                    .find_by_field_with_cursor(field, value, limit, sort_by, before_id, after_id, filters)
                    .await
            }
            StoragePhase::DualReadVerify => {
                let (primary, secondary) = futures::join!(
                    self.primary
                        .find_by_field_with_cursor(field, value, limit, sort_by, before_id, after_id, filters),
                    self.secondary
                        .find_by_field_with_cursor(field, value, limit, sort_by, before_id, after_id, filters)
                );
                Self::record_list_comparison(
                    "find_by_field_with_cursor",
                    primary.as_ref().map(|r| r.len()).unwrap_or(0),
                    secondary.as_ref().ok().map(|r| r.len()),
                );
                primary
            }
        }
    }

    async fn update(&self, item: T) -> Result<T, StorageError> {
        self.write_update(self.default_phase, item).await
    }

    async fn batch_update(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        match self.default_phase {
            StoragePhase::SecondaryOnly => self.secondary.batch_update(items).await,
            _ => {
                let updated = self.primary.batch_update(items).await?;
                if self.default_phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.batch_update(updated.clone()).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary batch_update failed");
                    }
                }
                Ok(updated)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<u64, StorageError> {
        self.write_delete(self.default_phase, id).await
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
        match self.default_phase {
            StoragePhase::SecondaryOnly => self.secondary.batch_delete(ids).await,
            _ => {
                let n = self.primary.batch_delete(ids).await?;
                if self.default_phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.batch_delete(ids).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary batch_delete failed");
                    }
                }
                Ok(n)
            }
        }
    }

    /// Dual-repo deletes return the primary's affected-row count even
    /// in `dual_write`/`dual_read_verify`: the secondary's count is not
    /// authoritative and the two can differ if it had already drifted.
    async fn delete_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64, StorageError> {
        match self.default_phase {
            StoragePhase::SecondaryOnly => self.secondary.delete_by_field(field, value).await,
            _ => {
                let n = self.primary.delete_by_field(field, value).await?;
                if self.default_phase != StoragePhase::PrimaryOnly {
                    if let Err(err) = self.secondary.delete_by_field(field, value).await {
                        tracing::warn!(error = %err, entity = T::table_name(), "secondary delete_by_field failed");
                    }
                }
                Ok(n)
            }
        }
    }

    async fn list(
        &self,
        filters: Option<&[Filter]>,
        limit: Option<u64>,
        page_number: Option<u64>,
        order_by: Option<&str>,
        order_direction: Option<OrderDirection>,
    ) -> Result<Vec<T>, StorageError> {
        match self.default_phase {
            StoragePhase::PrimaryOnly | StoragePhase::DualWrite => {
                self.primary.list(filters, limit, page_number, order_by, order_direction).await
            }
            StoragePhase::SecondaryOnly => {
                self.secondary.list(filters, limit, page_number, order_by, order_direction).await
            }
            StoragePhase::DualReadVerify => {
                let (primary, secondary) = futures::join!(
                    self.primary.list(filters, limit, page_number, order_by, order_direction),
                    self.secondary.list(filters, limit, page_number, order_by, order_direction)
                );
                Self::record_list_comparison(
                    "list",
                    primary.as_ref().map(|r| r.len()).unwrap_or(0),
                    secondary.as_ref().ok().map(|r| r.len()),
                );
                primary
            }
        }
    }
}
