// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Introspection trait concrete repositories use to generically populate
//! ids and timestamps on create/update (§4.1, §4.2). Grounded on
//! `r2e-data::Entity` (table name + id column + columns), generalized
//! beyond SQL: a document-store backend only needs the id/timestamp
//! accessors, not a column list.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait StorageEntity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn table_name() -> &'static str;
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn name(&self) -> Option<&str> {
        None
    }
    fn created_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, ts: DateTime<Utc>);
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_updated_at(&mut self, ts: DateTime<Utc>);
}

mod impls {
    use super::StorageEntity;
    use relay_core::{Agent, Event, StateEntry, Task, TaskMessage};

    impl StorageEntity for Agent {
        fn table_name() -> &'static str {
            "agents"
        }
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn name(&self) -> Option<&str> {
            Some(&self.name)
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.created_at = ts;
        }
        fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.updated_at = ts;
        }
    }

    impl StorageEntity for Task {
        fn table_name() -> &'static str {
            "tasks"
        }
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.created_at = ts;
        }
        fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.updated_at = ts;
        }
    }

    impl StorageEntity for TaskMessage {
        fn table_name() -> &'static str {
            "task_messages"
        }
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.created_at = ts;
        }
        fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.updated_at = ts;
        }
    }

    impl StorageEntity for Event {
        fn table_name() -> &'static str {
            "events"
        }
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.created_at = ts;
        }
        fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.updated_at = ts;
        }
    }

    impl StorageEntity for StateEntry {
        fn table_name() -> &'static str {
            "states"
        }
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn name(&self) -> Option<&str> {
            Some(&self.name)
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.created_at = ts;
        }
        fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, ts: chrono::DateTime<chrono::Utc>) {
            self.updated_at = ts;
        }
    }
}
