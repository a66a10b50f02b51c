// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Header hygiene for inbound-forwarded requests (§4.5). Framework
//! agnostic on purpose — `relay-server` converts an axum `HeaderMap` to
//! the `(name, value)` pairs this module expects and back, so the rule
//! itself has no HTTP-framework dependency.

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "host",
];

const BLOCKED: &[&str] = &["authorization", "cookie", "x-agent-api-key"];

/// `true` if `name` (assumed already lowercase) is safe to forward
/// unmodified to the downstream agent.
pub fn is_forwardable(name: &str) -> bool {
    name.starts_with("x-") && !HOP_BY_HOP.contains(&name) && !BLOCKED.contains(&name)
}

/// Filter an inbound header list down to what's safe to forward, then
/// overlay the downstream agent's own auth headers last so client
/// input can never displace them (§4.5).
pub fn filter_for_forwarding<'a>(
    inbound: impl IntoIterator<Item = (&'a str, &'a str)>,
    overlay: impl IntoIterator<Item = (&'a str, String)>,
) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = inbound
        .into_iter()
        .filter(|(name, _)| is_forwardable(&name.to_ascii_lowercase()))
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect();

    for (name, value) in overlay {
        let name = name.to_ascii_lowercase();
        out.retain(|(existing, _)| existing != &name);
        out.push((name, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_x_prefixed_non_blocked_headers() {
        assert!(is_forwardable("x-github-event"));
        assert!(!is_forwardable("content-length"));
        assert!(!is_forwardable("authorization"));
        assert!(!is_forwardable("x-agent-api-key"));
    }

    #[test]
    fn rejects_non_x_prefixed_headers() {
        assert!(!is_forwardable("accept"));
    }

    #[test]
    fn overlay_displaces_client_supplied_value() {
        let inbound = vec![("X-Agent-Api-Key", "client-supplied"), ("X-Request-Id", "abc")];
        let overlay = vec![("x-agent-api-key", "server-owned".to_string())];
        let out = filter_for_forwarding(inbound, overlay);
        // client's x-agent-api-key was blocked on the way in, so the
        // overlay adds it fresh rather than displacing anything.
        assert!(out.contains(&("x-agent-api-key".to_string(), "server-owned".to_string())));
        assert!(out.contains(&("x-request-id".to_string(), "abc".to_string())));
        assert_eq!(out.iter().filter(|(n, _)| n == "x-agent-api-key").count(), 1);
    }
}
