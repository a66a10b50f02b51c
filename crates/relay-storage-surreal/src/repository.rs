// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `SurrealRepository<T>`: a `StoragePort<T>` over a SurrealDB table, one
//! instance per entity type. The entity's own `id` string doubles as the
//! key component of the record's `Thing` (`table:id`), so the mapping
//! between the two is the identity function in both directions — parsing
//! a `Thing` back to an entity id is just stripping the `table:` prefix.
//! Every write goes through [`crate::retry::with_retry`].

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use relay_storage::{CursorAnchor, Filter, OrderDirection, StorageEntity, StorageError, StoragePort};
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::sql::Thing;
use surrealdb::Surreal;

use crate::retry::with_retry;

#[derive(Clone)]
pub struct SurrealRepository<T> {
    db: Surreal<Any>,
    _marker: PhantomData<T>,
}

impl<T> SurrealRepository<T>
where
    T: StorageEntity,
{
    pub fn new(db: Surreal<Any>) -> Self {
        SurrealRepository {
            db,
            _marker: PhantomData,
        }
    }

    fn thing(&self, id: &str) -> Thing {
        Thing::from((T::table_name(), id))
    }

    fn stamp_for_insert(mut item: T) -> T {
        let now = Utc::now();
        if item.id().is_empty() {
            item.set_id(uuid::Uuid::new_v4().to_string());
        }
        item.set_created_at(now);
        item.set_updated_at(now);
        item
    }

    async fn fetch_existing(&self, id: &str) -> Result<T, StorageError> {
        let record: Option<T> = self
            .db
            .select(self.thing(id))
            .await
            .map_err(StorageError::service)?;
        record.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Translate the filter algebra of §4.3 into a `WHERE`-clause fragment
    /// plus the bound values it references. Inclusionary groups are OR'd
    /// together, exclusionary groups are OR'd then negated, the two
    /// groups AND'd — matching `relay_storage::filter::split_filters`.
    fn build_predicate(filters: Option<&[Filter]>) -> (String, Vec<(String, Value)>) {
        let Some(filters) = filters else {
            return (String::new(), Vec::new());
        };
        if filters.is_empty() {
            return (String::new(), Vec::new());
        }
        let (include, exclude) = relay_storage::filter::split_filters(filters);
        let mut binds = Vec::new();
        let mut clauses = Vec::new();

        let mut render_group = |group: Vec<&Filter>, binds: &mut Vec<(String, Value)>| -> Vec<String> {
            group
                .iter()
                .map(|f| {
                    let flat = f.flatten();
                    let mut field_clauses = Vec::new();
                    for (field, value) in flat {
                        let bind_name = format!("p{}", binds.len());
                        field_clauses.push(format!("{field} = ${bind_name}"));
                        binds.push((bind_name, value));
                    }
                    if field_clauses.is_empty() {
                        "true".to_string()
                    } else {
                        format!("({})", field_clauses.join(" AND "))
                    }
                })
                .collect()
        };

        if !include.is_empty() {
            let rendered = render_group(include, &mut binds);
            clauses.push(format!("({})", rendered.join(" OR ")));
        }
        if !exclude.is_empty() {
            let rendered = render_group(exclude, &mut binds);
            clauses.push(format!("NOT ({})", rendered.join(" OR ")));
        }

        if clauses.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), binds)
        }
    }
}

#[async_trait]
impl<T> StoragePort<T> for SurrealRepository<T>
where
    T: StorageEntity,
{
    async fn create(&self, item: T) -> Result<T, StorageError> {
        let item = Self::stamp_for_insert(item);
        let id = item.id().to_string();
        with_retry(|| async {
            let created: Option<T> = self
                .db
                .create(self.thing(&id))
                .content(item.clone())
                .await?;
            Ok(created)
        })
        .await
        .map_err(|e: surrealdb::Error| {
            if e.to_string().to_lowercase().contains("already exists") {
                StorageError::Duplicate(id.clone())
            } else {
                StorageError::service(e)
            }
        })?
        .ok_or_else(|| StorageError::service("create returned no record"))
    }

    async fn batch_create(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.create(item).await?);
        }
        Ok(out)
    }

    async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<T, StorageError> {
        match (id, name) {
            (Some(id), None) => self.fetch_existing(id).await,
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
            "SELECT * FROM {} WHERE {} = $value LIMIT 1",
            T::table_name(),
            field
        );
        let mut resp = self
            .db
            .query(sql)
            .bind(("value", value.clone()))
            .await
            .map_err(StorageError::service)?;
        let mut rows: Vec<T> = resp.take(0).map_err(StorageError::service)?;
        Ok(rows.pop())
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
        let (predicate, binds) = Self::build_predicate(filters);
        let order = sort_by.unwrap_or("created_at");
        let offset = page_number.unwrap_or(0) * limit;
        let sql = format!(
            "SELECT * FROM {} WHERE {field} = $value{} ORDER BY {order}, id LIMIT $limit START $offset",
            T::table_name(),
            predicate,
        );
        let mut q = self.db.query(sql).bind(("value", value.clone()));
        for (name, v) in binds {
            q = q.bind((name, v));
        }
        q = q.bind(("limit", limit)).bind(("offset", offset));
        let mut resp = q.await.map_err(StorageError::service)?;
        resp.take(0).map_err(StorageError::service)
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
        let (predicate, binds) = Self::build_predicate(filters);
        let order = sort_by.unwrap_or("created_at");

        let anchor = async {
            if let Some(id) = after_id.or(before_id) {
                self.fetch_existing(id)
                    .await
                    .ok()
                    .map(|row| CursorAnchor {
                        created_at: row.created_at(),
                        id: row.id().to_string(),
                    })
            } else {
                None
            }
        }
        .await;

        let mut cursor_clause = String::new();
        if let Some(anchor) = &anchor {
            if after_id.is_some() {
                cursor_clause = format!(
                    " AND (created_at > $anchor_ts OR (created_at = $anchor_ts AND id < $anchor_id))"
                );
            } else if before_id.is_some() {
                cursor_clause = format!(
                    " AND (created_at < $anchor_ts OR (created_at = $anchor_ts AND id > $anchor_id))"
                );
            }
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {field} = $value{}{} ORDER BY {order} DESC, id ASC LIMIT $limit",
            T::table_name(),
            predicate,
            cursor_clause,
        );
        let mut q = self.db.query(sql).bind(("value", value.clone()));
        for (name, v) in binds {
            q = q.bind((name, v));
        }
        if let Some(anchor) = anchor {
            q = q
                .bind(("anchor_ts", anchor.created_at))
                .bind(("anchor_id", anchor.id));
        }
        q = q.bind(("limit", limit));
        let mut resp = q.await.map_err(StorageError::service)?;
        resp.take(0).map_err(StorageError::service)
    }

    async fn update(&self, mut item: T) -> Result<T, StorageError> {
        let id = item.id().to_string();
        let existing = self.fetch_existing(&id).await?;
        item.set_created_at(existing.created_at());
        item.set_updated_at(Utc::now());
        with_retry(|| async {
            let updated: Option<T> = self
                .db
                .update(self.thing(&id))
                .content(item.clone())
                .await?;
            Ok(updated)
        })
        .await
        .map_err(StorageError::service)?
        .ok_or_else(|| StorageError::NotFound(id))
    }

    async fn batch_update(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.update(item).await?);
        }
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<u64, StorageError> {
        let deleted: Option<T> = with_retry(|| async { self.db.delete(self.thing(id)).await })
            .await
            .map_err(StorageError::service)?;
        Ok(if deleted.is_some() { 1 } else { 0 })
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
        let mut n = 0;
        for id in ids {
            n += self.delete(id).await?;
        }
        Ok(n)
    }

    async fn delete_by_field(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<u64, StorageError> {
        let sql = format!("DELETE FROM {} WHERE {field} = $value RETURN BEFORE", T::table_name());
        let mut resp = with_retry(|| async { self.db.query(sql.clone()).bind(("value", value.clone())).await })
            .await
            .map_err(StorageError::service)?;
        let rows: Vec<T> = resp.take(0).map_err(StorageError::service)?;
        Ok(rows.len() as u64)
    }

    async fn list(
        &self,
        filters: Option<&[Filter]>,
        limit: Option<u64>,
        page_number: Option<u64>,
        order_by: Option<&str>,
        order_direction: Option<OrderDirection>,
    ) -> Result<Vec<T>, StorageError> {
        let (predicate, binds) = Self::build_predicate(filters);
        let order = order_by.unwrap_or("created_at");
        let direction = match order_direction.unwrap_or_default() {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        let limit = limit.unwrap_or(100);
        let offset = page_number.unwrap_or(0) * limit;
        let sql = format!(
            "SELECT * FROM {}{predicate} ORDER BY {order} {direction}, id ASC LIMIT $limit START $offset",
            T::table_name(),
        );
        let mut q = self.db.query(sql);
        for (name, v) in binds {
            q = q.bind((name, v));
        }
        q = q.bind(("limit", limit)).bind(("offset", offset));
        let mut resp = q.await.map_err(StorageError::service)?;
        resp.take(0).map_err(StorageError::service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Agent;
    use surrealdb::engine::any::connect;

    async fn memdb() -> Surreal<Any> {
        let db = connect("mem://").await.expect("connect");
        db.use_ns("test").use_db("test").await.expect("use ns/db");
        db
    }

    fn sample_agent() -> Agent {
        Agent {
            id: String::new(),
            name: "scout".to_string(),
            description: None,
            acp_url: "http://localhost:9000".to_string(),
            acp_type: relay_core::AcpType::Agentic,
            status: relay_core::AgentStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let db = memdb().await;
        let repo: SurrealRepository<Agent> = SurrealRepository::new(db);
        let created = repo.create(sample_agent()).await.expect("create");
        assert!(!created.id.is_empty());
        assert_eq!(created.created_at, created.updated_at);
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let db = memdb().await;
        let repo: SurrealRepository<Agent> = SurrealRepository::new(db);
        let created = repo.create(sample_agent()).await.expect("create");
        let original_created_at = created.created_at;
        let mut updated = created.clone();
        updated.status = relay_core::AgentStatus::Inactive;
        let result = repo.update(updated).await.expect("update");
        assert_eq!(result.created_at, original_created_at);
        assert!(result.updated_at >= original_created_at);
    }

    #[tokio::test]
    async fn delete_missing_id_returns_zero() {
        let db = memdb().await;
        let repo: SurrealRepository<Agent> = SurrealRepository::new(db);
        let n = repo.delete("does-not-exist").await.expect("delete");
        assert_eq!(n, 0);
    }
}
