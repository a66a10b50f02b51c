// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `relayd` — the agent control-plane binary. Assembles the dual-backend
//! repositories, the ACP proxy client, and the RPC dispatcher, then
//! serves the HTTP surface. A plain twelve-factor service: configuration
//! comes entirely from the environment (`RelayConfig::from_env`), there
//! is no config file and no subcommand surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use relay_acp::{AcpClient, AdvisoryLockRegistry, AgentApiKeyStore, InMemoryApiKeyStore, SqlApiKeyStore};
use relay_core::{Agent, Event, RelayConfig, StateEntry, Task, TaskMessage};
use relay_dispatcher::{AllowAllAuthorization, RpcDispatcher};
use relay_server::AppState;
use relay_storage_dual::DualRepository;
use relay_storage_sql::SqlRepository;
use relay_storage_surreal::SurrealRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = RelayConfig::from_env().context("loading relay configuration")?;
    info!(
        bind = %config.bind_addr,
        phase = ?config.storage_phase,
        "starting relayd",
    );

    // ── Storage backends ──────────────────────────────────────────────
    let surreal = surrealdb::engine::any::connect(&config.primary_store_url)
        .await
        .context("connecting to primary (document) store")?;
    surreal
        .use_ns("relay")
        .use_db("relay")
        .await
        .context("selecting primary store namespace/database")?;

    let pg = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.secondary_store_url)
        .await
        .context("connecting to secondary (relational) store")?;

    for table in ["agents", "tasks", "task_messages", "events", "states"] {
        sqlx::query(&relay_storage_sql::schema::create_table_statement(table))
            .execute(&pg)
            .await
            .with_context(|| format!("provisioning secondary store table {table}"))?;
    }

    let agents = DualRepository::new(
        SurrealRepository::<Agent>::new(surreal.clone()),
        SqlRepository::<Agent>::new(pg.clone()),
        config.storage_phase,
    );
    let tasks = DualRepository::new(
        SurrealRepository::<Task>::new(surreal.clone()),
        SqlRepository::<Task>::new(pg.clone()),
        config.storage_phase,
    );
    let messages = DualRepository::new(
        SurrealRepository::<TaskMessage>::new(surreal.clone()),
        SqlRepository::<TaskMessage>::new(pg.clone()),
        config.storage_phase,
    );
    let events = DualRepository::new(
        SurrealRepository::<Event>::new(surreal.clone()),
        SqlRepository::<Event>::new(pg.clone()),
        config.storage_phase,
    );
    let states = DualRepository::new(
        SurrealRepository::<StateEntry>::new(surreal.clone()),
        SqlRepository::<StateEntry>::new(pg.clone()),
        config.storage_phase,
    );

    // ── Agent API keys ────────────────────────────────────────────────
    let api_keys: Arc<dyn AgentApiKeyStore> = if std::env::var("AGENT_API_KEYS_SQL")
        .map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
    {
        let store = SqlApiKeyStore::new(pg.clone());
        store.ensure_schema().await.context("provisioning agent_api_keys table")?;
        Arc::new(store)
    } else {
        Arc::new(InMemoryApiKeyStore::new())
    };

    // ── ACP client, locks, authorization, dispatcher ─────────────────
    let acp = AcpClient::new(config.acp_connect_timeout, config.acp_request_timeout)
        .context("building ACP HTTP client")?;
    let locks = AdvisoryLockRegistry::new(config.advisory_lock_enabled);
    let authz = AllowAllAuthorization;

    let dispatcher = Arc::new(RpcDispatcher::new(
        agents.clone(),
        tasks.clone(),
        messages,
        events,
        authz,
        acp,
        locks,
        api_keys.clone(),
    ));

    let forward_http = reqwest::Client::builder()
        .connect_timeout(config.acp_connect_timeout)
        .timeout(config.acp_request_timeout)
        .build()
        .context("building forwarding HTTP client")?;

    let state = AppState::new(
        dispatcher,
        agents,
        tasks,
        states,
        api_keys,
        forward_http,
        config.correlation_header.clone(),
    );

    let router = relay_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining connections");
    // Give in-flight streaming responses a moment to flush before axum
    // stops accepting new work.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
