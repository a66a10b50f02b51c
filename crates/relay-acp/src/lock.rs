// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Advisory lock around `message/send`, keyed by `hash(agent_id,
//! task_id)` (§4.5). Acquisition never waits: a contended lock is a
//! client-visible error, not a queue.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::envelope::AcpError;

#[derive(Default, Clone)]
pub struct AdvisoryLockRegistry {
    enabled: bool,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

pub struct AdvisoryLockGuard {
    _guard: Option<OwnedMutexGuard<()>>,
}

impl AdvisoryLockRegistry {
    pub fn new(enabled: bool) -> Self {
        AdvisoryLockRegistry {
            enabled,
            locks: DashMap::new(),
        }
    }

    fn key(agent_id: &str, task_id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        agent_id.hash(&mut hasher);
        task_id.hash(&mut hasher);
        hasher.finish()
    }

    /// Try to acquire the lock for `(agent_id, task_id)`. When the
    /// feature is disabled this is a no-op that never holds anything
    /// (§4.5: "when the feature is off, the stream must not hold the
    /// lock").
    pub fn try_acquire(&self, agent_id: &str, task_id: &str) -> Result<AdvisoryLockGuard, AcpError> {
        if !self.enabled {
            return Ok(AdvisoryLockGuard { _guard: None });
        }
        let key = Self::key(agent_id, task_id);
        let mutex = self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        match mutex.try_lock_owned() {
            Ok(guard) => Ok(AdvisoryLockGuard { _guard: Some(guard) }),
            Err(_) => Err(AcpError::LockContended),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_registry_never_contends() {
        let reg = AdvisoryLockRegistry::new(false);
        let _g1 = reg.try_acquire("agent-1", "task-1").unwrap();
        let _g2 = reg.try_acquire("agent-1", "task-1").unwrap();
    }

    #[test]
    fn enabled_registry_rejects_concurrent_acquire() {
        let reg = AdvisoryLockRegistry::new(true);
        let _g1 = reg.try_acquire("agent-1", "task-1").unwrap();
        let err = reg.try_acquire("agent-1", "task-1").unwrap_err();
        assert!(matches!(err, AcpError::LockContended));
    }

    #[test]
    fn enabled_registry_releases_on_drop() {
        let reg = AdvisoryLockRegistry::new(true);
        {
            let _g1 = reg.try_acquire("agent-1", "task-1").unwrap();
        }
        let _g2 = reg.try_acquire("agent-1", "task-1").unwrap();
    }

    #[test]
    fn different_tasks_do_not_contend() {
        let reg = AdvisoryLockRegistry::new(true);
        let _g1 = reg.try_acquire("agent-1", "task-1").unwrap();
        let _g2 = reg.try_acquire("agent-1", "task-2").unwrap();
    }
}
