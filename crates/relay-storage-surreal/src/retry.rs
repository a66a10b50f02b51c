// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Retry policy for write operations against the document store (§4.2):
//! up to 3 retries (4 attempts total), exponential backoff
//! `base * 2^attempt` with uniform jitter in `[0, 0.1]` seconds,
//! `base = 0.1s`. Only a defined set of transient fault signals is
//! retried; everything else surfaces immediately. Retries live in C2
//! only — C3's relational engine already provides transactional retry
//! semantics, and C4 never retries (§9).

use std::time::Duration;

use rand::Rng;

pub const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);

/// The fault signals considered transient, matching §4.2's
/// "auto-reconnect, network timeout, server-selection timeout" list.
/// The driver doesn't expose a typed variant for these, so the
/// classification inspects the error's rendered message the same way a
/// driver's own "is transient" helper would inspect an inner errno.
pub fn is_transient<E: std::fmt::Display>(err: &E) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("broken pipe")
        || msg.contains("server selection")
        || msg.contains("not connected")
}

pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY * 2u32.pow(attempt);
    let jitter_ms = rand::thread_rng().gen_range(0..=100);
    exp + Duration::from_millis(jitter_ms)
}

/// Run `op` with the retry policy above. `op` is invoked fresh on every
/// attempt since the underlying future can't be replayed.
pub async fn with_retry<F, Fut, T, E>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                tracing::warn!(attempt, error = %e, "transient storage fault, retrying");
                tokio::time::sleep(backoff_delay(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
