// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! GitHub- and Slack-style webhook signature validation for the
//! forwarding path (§4.5). The Slack half mirrors `sven-node`'s
//! `verify_slack_signature` (HMAC-SHA256 over `"v0:<ts>:<body>"`, 5
//! minute replay window); the GitHub half is the same constant-time
//! HMAC check applied to GitHub's `sha256=<hex>` convention instead.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing or malformed signature header")]
    MalformedSignature,
    #[error("signature timestamp missing or unparsable")]
    InvalidTimestamp,
    #[error("signature timestamp is outside the replay window")]
    StaleTimestamp,
    #[error("signature does not match")]
    InvalidSignature,
    #[error("request body is empty or not valid JSON")]
    InvalidBody,
}

/// Verify `X-Hub-Signature-256: sha256=<hex>` against `secret`.
pub fn verify_github_signature(secret: &[u8], body: &[u8], header: &str) -> Result<(), WebhookError> {
    let provided_hex = header
        .strip_prefix("sha256=")
        .ok_or(WebhookError::MalformedSignature)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| WebhookError::MalformedSignature)?;
    mac.update(body);
    let expected_hex = hex::encode(mac.finalize().into_bytes());

    if expected_hex.as_bytes().ct_eq(provided_hex.as_bytes()).unwrap_u8() != 1 {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(())
}

/// Verify `X-Slack-Signature: v0=<hex>` together with
/// `X-Slack-Request-Timestamp` against `secret`.
pub fn verify_slack_signature(
    secret: &[u8],
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), WebhookError> {
    let ts: i64 = timestamp.parse().map_err(|_| WebhookError::InvalidTimestamp)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    if (now - ts).unsigned_abs() as i64 > REPLAY_WINDOW_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| WebhookError::MalformedSignature)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    if expected.as_bytes().ct_eq(signature.as_bytes()).unwrap_u8() != 1 {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"shared-secret";

    fn github_sig(secret: &[u8], body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn slack_sig(secret: &[u8], ts: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(b"v0:");
        mac.update(ts.as_bytes());
        mac.update(b":");
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn now_ts() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    #[test]
    fn github_valid_signature_accepted() {
        let body = b"payload";
        let sig = github_sig(SECRET, body);
        assert!(verify_github_signature(SECRET, body, &sig).is_ok());
    }

    #[test]
    fn github_tampered_body_rejected() {
        let sig = github_sig(SECRET, b"original");
        assert_eq!(
            verify_github_signature(SECRET, b"tampered", &sig),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn github_missing_prefix_rejected() {
        assert_eq!(
            verify_github_signature(SECRET, b"x", "deadbeef"),
            Err(WebhookError::MalformedSignature)
        );
    }

    #[test]
    fn slack_valid_signature_accepted() {
        let ts = now_ts();
        let body = b"payload";
        let sig = slack_sig(SECRET, &ts, body);
        assert!(verify_slack_signature(SECRET, &ts, body, &sig).is_ok());
    }

    #[test]
    fn slack_stale_timestamp_rejected() {
        let ts = (SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 400).to_string();
        let body = b"payload";
        let sig = slack_sig(SECRET, &ts, body);
        assert_eq!(
            verify_slack_signature(SECRET, &ts, body, &sig),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn slack_wrong_secret_rejected() {
        let ts = now_ts();
        let body = b"payload";
        let sig = slack_sig(b"other-secret", &ts, body);
        assert_eq!(
            verify_slack_signature(SECRET, &ts, body, &sig),
            Err(WebhookError::InvalidSignature)
        );
    }
}
