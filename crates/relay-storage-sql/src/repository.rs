// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `SqlRepository<T>`: a `StoragePort<T>` over a single PostgreSQL table
//! per entity type. Unlike the document store, field predicates are
//! pushed down with JSONB containment (`data @> '{"field": value}'`)
//! rather than dotted-path equality, since containment already handles
//! nested objects without a flatten/unflatten round trip.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use relay_storage::{CursorAnchor, Filter, OrderDirection, StorageEntity, StorageError, StoragePort};
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::SqlxErrorExt;

pub struct SqlRepository<T> {
    pool: PgPool,
    _marker: PhantomData<T>,
}

impl<T> Clone for SqlRepository<T> {
    fn clone(&self) -> Self {
        SqlRepository {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> SqlRepository<T>
where
    T: StorageEntity,
{
    pub fn new(pool: PgPool) -> Self {
        SqlRepository {
            pool,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_entity(row: &sqlx::postgres::PgRow) -> Result<T, StorageError> {
        let data: Value = row.try_get("data").map_err(|e| StorageError::service(e))?;
        serde_json::from_value(data).map_err(StorageError::service)
    }

    fn build_predicate(filters: Option<&[Filter]>, binds: &mut Vec<Value>) -> String {
        let Some(filters) = filters else {
            return String::new();
        };
        if filters.is_empty() {
            return String::new();
        }
        let (include, exclude) = relay_storage::filter::split_filters(filters);
        let mut clauses = Vec::new();

        if !include.is_empty() {
            let rendered: Vec<String> = include
                .iter()
                .map(|f| {
                    binds.push(Value::Object(f.fields.clone().into_iter().collect()));
                    format!("data @> ${}::jsonb", binds.len())
                })
                .collect();
            clauses.push(format!("({})", rendered.join(" OR ")));
        }
        if !exclude.is_empty() {
            let rendered: Vec<String> = exclude
                .iter()
                .map(|f| {
                    binds.push(Value::Object(f.fields.clone().into_iter().collect()));
                    format!("data @> ${}::jsonb", binds.len())
                })
                .collect();
            clauses.push(format!("NOT ({})", rendered.join(" OR ")));
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!(" AND {}", clauses.join(" AND "))
        }
    }

    fn order_column(order_by: Option<&str>) -> &str {
        match order_by {
            Some("created_at") | None => "created_at",
            Some("updated_at") => "updated_at",
            Some("id") => "id",
            // any other requested column falls back to updated_at then
            // created_at per the offset-pagination ordering fallback (§4.1).
            Some(_) => "updated_at",
        }
    }

    /// `ORDER BY <order> <direction>`, then `updated_at`, `created_at`,
    /// `id` in the same direction as determinism tiebreakers (§4.3),
    /// skipping any column already named as the primary sort key.
    fn order_by_clause(order: &str, direction: &str) -> String {
        let mut parts = vec![format!("{order} {direction}")];
        for tiebreaker in ["updated_at", "created_at", "id"] {
            if tiebreaker != order {
                parts.push(format!("{tiebreaker} {direction}"));
            }
        }
        parts.join(", ")
    }
}

#[async_trait]
impl<T> StoragePort<T> for SqlRepository<T>
where
    T: StorageEntity,
{
    async fn create(&self, mut item: T) -> Result<T, StorageError> {
        let now = Utc::now();
        if item.id().is_empty() {
            item.set_id(uuid::Uuid::new_v4().to_string());
        }
        item.set_created_at(now);
        item.set_updated_at(now);

        let data = serde_json::to_value(&item).map_err(StorageError::service)?;
        let sql = format!(
            "INSERT INTO {} (id, data, created_at, updated_at) VALUES ($1, $2, $3, $4)",
            T::table_name()
        );
        sqlx::query(&sql)
            .bind(item.id())
            .bind(&data)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_storage_error())?;
        Ok(item)
    }

    async fn batch_create(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.into_storage_error())?;
        let mut out = Vec::with_capacity(items.len());
        let now = Utc::now();
        for mut item in items {
            if item.id().is_empty() {
                item.set_id(uuid::Uuid::new_v4().to_string());
            }
            item.set_created_at(now);
            item.set_updated_at(now);
            let data = serde_json::to_value(&item).map_err(StorageError::service)?;
            let sql = format!(
                "INSERT INTO {} (id, data, created_at, updated_at) VALUES ($1, $2, $3, $4)",
                T::table_name()
            );
            sqlx::query(&sql)
                .bind(item.id())
                .bind(&data)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.into_storage_error())?;
            out.push(item);
        }
        tx.commit().await.map_err(|e| e.into_storage_error())?;
        Ok(out)
    }

    async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<T, StorageError> {
        match (id, name) {
            (Some(id), None) => {
                let sql = format!("SELECT data FROM {} WHERE id = $1", T::table_name());
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| e.into_storage_error())?;
                match row {
                    Some(row) => Self::row_to_entity(&row),
                    None => Err(StorageError::NotFound(id.to_string())),
                }
            }
            (None, Some(name)) => self
                .get_by_field("name", &Value::String(name.to_string()))
                .await?
                .ok_or_else(|| StorageError::NotFound(name.to_string())),
            _ => Err(StorageError::ClientError(
                "exactly one of id or name must be supplied".to_string(),
            )),
        }
    }

    async fn get_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<T>, StorageError> {
        let sql = format!(
            "SELECT data FROM {} WHERE data @> $1::jsonb LIMIT 1",
            T::table_name()
        );
        let predicate = serde_json::json!({ field: value });
        let row = sqlx::query(&sql)
            .bind(&predicate)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_storage_error())?;
        row.as_ref().map(Self::row_to_entity).transpose()
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
        let mut binds = vec![serde_json::json!({ field: value })];
        let extra_predicate = Self::build_predicate(filters, &mut binds);
        let order = Self::order_column(sort_by);
        let order_by = Self::order_by_clause(order, "ASC");
        let offset = page_number.unwrap_or(0) * limit;

        let sql = format!(
            "SELECT data FROM {} WHERE data @> $1::jsonb{extra_predicate} ORDER BY {order_by} LIMIT {} OFFSET {}",
            T::table_name(),
            limit,
            offset,
        );
        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| e.into_storage_error())?;
        rows.iter().map(Self::row_to_entity).collect()
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
        let mut binds = vec![serde_json::json!({ field: value })];
        let extra_predicate = Self::build_predicate(filters, &mut binds);
        let order = Self::order_column(sort_by);

        let anchor = if let Some(id) = after_id.or(before_id) {
            let sql = format!("SELECT created_at FROM {} WHERE id = $1", T::table_name());
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| e.into_storage_error())?;
            row.map(|r| {
                let created_at: chrono::DateTime<Utc> = r.try_get("created_at").unwrap();
                CursorAnchor {
                    created_at,
                    id: id.to_string(),
                }
            })
        } else {
            None
        };

        let mut sql = format!(
            "SELECT data FROM {} WHERE data @> $1::jsonb{extra_predicate}",
            T::table_name()
        );
        // placeholder indices for the anchor binds, appended after `binds`
        // once the predicate binds above are all accounted for.
        let ts_idx = binds.len() + 1;
        let id_idx = binds.len() + 2;
        if let Some(_anchor) = &anchor {
            if after_id.is_some() {
                sql.push_str(&format!(
                    " AND (created_at > ${ts_idx} OR (created_at = ${ts_idx} AND id < ${id_idx}))"
                ));
            } else {
                sql.push_str(&format!(
                    " AND (created_at < ${ts_idx} OR (created_at = ${ts_idx} AND id > ${id_idx}))"
                ));
            }
        }
        // `id ASC` is the keyset tiebreaker the anchor predicate above is
        // written against and must stay fixed regardless of `order`;
        // `updated_at`/`created_at` are added only for determinism (§4.3)
        // and run in the same direction as the primary sort column.
        let mut determinism = vec![order.to_string()];
        for tiebreaker in ["updated_at", "created_at"] {
            if tiebreaker != order {
                determinism.push(tiebreaker.to_string());
            }
        }
        let determinism = determinism
            .into_iter()
            .map(|col| format!("{col} DESC"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {determinism}, id ASC LIMIT {limit}"));

        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        if let Some(anchor) = &anchor {
            q = q.bind(anchor.created_at).bind(&anchor.id);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(|e| e.into_storage_error())?;
        rows.iter().map(Self::row_to_entity).collect()
    }

    async fn update(&self, mut item: T) -> Result<T, StorageError> {
        let id = item.id().to_string();
        let mut tx = self.pool.begin().await.map_err(|e| e.into_storage_error())?;

        let sql = format!("SELECT created_at FROM {} WHERE id = $1 FOR UPDATE", T::table_name());
        let row = sqlx::query(&sql)
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.into_storage_error())?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        let created_at: chrono::DateTime<Utc> = row.try_get("created_at").map_err(|e| StorageError::service(e))?;
        item.set_created_at(created_at);
        item.set_updated_at(Utc::now());

        let data = serde_json::to_value(&item).map_err(StorageError::service)?;
        let sql = format!(
            "UPDATE {} SET data = $2, updated_at = $3 WHERE id = $1",
            T::table_name()
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&data)
            .bind(item.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| e.into_storage_error())?;
        tx.commit().await.map_err(|e| e.into_storage_error())?;
        Ok(item)
    }

    async fn batch_update(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.update(item).await?);
        }
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<u64, StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::table_name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_storage_error())?;
        Ok(result.rows_affected())
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", T::table_name());
        let result = sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_storage_error())?;
        Ok(result.rows_affected())
    }

    async fn delete_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64, StorageError> {
        let sql = format!("DELETE FROM {} WHERE data @> $1::jsonb", T::table_name());
        let predicate = serde_json::json!({ field: value });
        let result = sqlx::query(&sql)
            .bind(&predicate)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_storage_error())?;
        Ok(result.rows_affected())
    }

    async fn list(
        &self,
        filters: Option<&[Filter]>,
        limit: Option<u64>,
        page_number: Option<u64>,
        order_by: Option<&str>,
        order_direction: Option<OrderDirection>,
    ) -> Result<Vec<T>, StorageError> {
        let mut binds = Vec::new();
        let extra_predicate = Self::build_predicate(filters, &mut binds);
        let where_clause = if extra_predicate.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", extra_predicate.trim_start_matches(" AND "))
        };
        let order = Self::order_column(order_by);
        let direction = match order_direction.unwrap_or_default() {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        let order_by = Self::order_by_clause(order, direction);
        let limit = limit.unwrap_or(100);
        let offset = page_number.unwrap_or(0) * limit;

        let sql = format!(
            "SELECT data FROM {}{where_clause} ORDER BY {order_by} LIMIT {limit} OFFSET {offset}",
            T::table_name(),
        );
        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| e.into_storage_error())?;
        rows.iter().map(Self::row_to_entity).collect()
    }
}
