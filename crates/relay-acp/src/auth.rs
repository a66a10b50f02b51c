// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Concrete [`AgentApiKeyStore`] backings. The original's
//! `DAgentAPIKeyRepository` seam is a plain key/value lookup keyed by
//! agent id, so both implementations here are deliberately thin —
//! there is no rotation or expiry model to carry over.

use dashmap::DashMap;
use sqlx::PgPool;

use crate::client::AgentApiKeyStore;

/// `(agent_id, external_id, provider)` — the scoping key a webhook
/// signing secret is looked up under (§4.5): `external_id` is a GitHub
/// `repository.full_name` or a Slack `api_app_id`, `provider` is
/// `"GITHUB"` or `"SLACK"`.
type WebhookKey = (String, String, String);

fn webhook_key(agent_id: &str, external_id: &str, provider: &str) -> WebhookKey {
    (agent_id.to_string(), external_id.to_string(), provider.to_string())
}

/// Dev/test backing: keys live only as long as the process.
#[derive(Default, Clone)]
pub struct InMemoryApiKeyStore {
    keys: DashMap<String, String>,
    webhook_secrets: DashMap<WebhookKey, Vec<u8>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        InMemoryApiKeyStore::default()
    }

    pub fn set(&self, agent_id: impl Into<String>, api_key: impl Into<String>) {
        self.keys.insert(agent_id.into(), api_key.into());
    }

    pub fn set_webhook_secret(
        &self,
        agent_id: impl Into<String>,
        external_id: impl Into<String>,
        provider: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) {
        let agent_id = agent_id.into();
        let external_id = external_id.into();
        let provider = provider.into();
        self.webhook_secrets.insert(webhook_key(&agent_id, &external_id, &provider), secret.into());
    }
}

#[async_trait::async_trait]
impl AgentApiKeyStore for InMemoryApiKeyStore {
    async fn lookup(&self, agent_id: &str) -> Option<String> {
        self.keys.get(agent_id).map(|v| v.clone())
    }

    async fn lookup_webhook_secret(&self, agent_id: &str, external_id: &str, provider: &str) -> Option<Vec<u8>> {
        self.webhook_secrets.get(&webhook_key(agent_id, external_id, provider)).map(|v| v.clone())
    }
}

/// Production backing: one row per agent in `agent_api_keys(agent_id,
/// api_key)`, queried directly rather than through a `StoragePort<T>`
/// since a bare credential lookup has no timestamps or cursoring to
/// share with the entity repositories.
#[derive(Clone)]
pub struct SqlApiKeyStore {
    pool: PgPool,
}

impl SqlApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        SqlApiKeyStore { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_api_keys (
                agent_id TEXT PRIMARY KEY,
                api_key TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_webhook_secrets (
                agent_id TEXT NOT NULL,
                external_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                secret BYTEA NOT NULL,
                PRIMARY KEY (agent_id, external_id, provider)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AgentApiKeyStore for SqlApiKeyStore {
    async fn lookup(&self, agent_id: &str) -> Option<String> {
        sqlx::query_scalar::<_, String>("SELECT api_key FROM agent_api_keys WHERE agent_id = $1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, agent_id, "agent api key lookup failed");
                None
            })
    }

    async fn lookup_webhook_secret(&self, agent_id: &str, external_id: &str, provider: &str) -> Option<Vec<u8>> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT secret FROM agent_webhook_secrets WHERE agent_id = $1 AND external_id = $2 AND provider = $3",
        )
        .bind(agent_id)
        .bind(external_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, agent_id, external_id, provider, "webhook secret lookup failed");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_returns_none_for_unknown_agent() {
        let store = InMemoryApiKeyStore::new();
        assert_eq!(store.lookup("agent-1").await, None);
    }

    #[tokio::test]
    async fn in_memory_store_returns_set_key() {
        let store = InMemoryApiKeyStore::new();
        store.set("agent-1", "secret-key");
        assert_eq!(store.lookup("agent-1").await, Some("secret-key".to_string()));
    }

    #[tokio::test]
    async fn in_memory_store_returns_none_for_unconfigured_webhook_secret() {
        let store = InMemoryApiKeyStore::new();
        assert_eq!(store.lookup_webhook_secret("agent-1", "octo/repo", "GITHUB").await, None);
    }

    #[tokio::test]
    async fn in_memory_store_returns_set_webhook_secret_scoped_by_provider() {
        let store = InMemoryApiKeyStore::new();
        store.set_webhook_secret("agent-1", "octo/repo", "GITHUB", b"gh-secret".to_vec());
        store.set_webhook_secret("agent-1", "A123", "SLACK", b"slack-secret".to_vec());

        assert_eq!(
            store.lookup_webhook_secret("agent-1", "octo/repo", "GITHUB").await,
            Some(b"gh-secret".to_vec())
        );
        assert_eq!(
            store.lookup_webhook_secret("agent-1", "A123", "SLACK").await,
            Some(b"slack-secret".to_vec())
        );
        assert_eq!(store.lookup_webhook_secret("agent-1", "octo/repo", "SLACK").await, None);
    }
}
