// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Shared cursor-pagination semantics (§4.1). Primary sort is
//! `created_at DESC`, tiebreaker `id ASC`. Both concrete repositories
//! translate `CursorAnchor` into a native query predicate
//! (`$gt`/`$lt`-style for the document store, `(created_at, id)` compound
//! comparisons for SQL); this module defines the shared, backend-agnostic
//! semantics so both translations — and the dual wrapper's tests — agree
//! on what "after" and "before" mean, and gives backends a pure in-memory
//! fallback for fixture-driven tests.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct CursorAnchor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

/// Direction requested by the caller: `after_id` walks toward newer rows,
/// `before_id` toward older rows. At most one should be set; if both are
/// `None` the window is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorRequest<'a> {
    pub after: Option<&'a CursorAnchor>,
    pub before: Option<&'a CursorAnchor>,
}

/// `true` if `candidate` is strictly newer than `anchor` per §4.1:
/// `created_at > anchor.created_at` OR (`created_at == anchor.created_at`
/// AND `id < anchor.id`).
pub fn is_after(candidate_created_at: DateTime<Utc>, candidate_id: &str, anchor: &CursorAnchor) -> bool {
    candidate_created_at > anchor.created_at
        || (candidate_created_at == anchor.created_at && candidate_id < anchor.id.as_str())
}

/// Mirror of [`is_after`]: `true` if `candidate` is strictly older than
/// `anchor`.
pub fn is_before(candidate_created_at: DateTime<Utc>, candidate_id: &str, anchor: &CursorAnchor) -> bool {
    candidate_created_at < anchor.created_at
        || (candidate_created_at == anchor.created_at && candidate_id > anchor.id.as_str())
}

/// Apply a cursor window to an already `(created_at DESC, id ASC)`-sorted
/// slice. When the cursor id does not resolve to a known anchor, the
/// caller passes `None` and the window is unbounded (§4.1: "the query
/// proceeds without the cursor predicate").
pub fn resolve_cursor_window<'a, T>(
    items: &'a [T],
    created_at: impl Fn(&T) -> DateTime<Utc>,
    id: impl Fn(&T) -> &str,
    request: CursorRequest,
) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| {
            let ca = created_at(item);
            let iid = id(item);
            let after_ok = request.after.map(|a| is_after(ca, iid, a)).unwrap_or(true);
            let before_ok = request.before.map(|a| is_before(ca, iid, a)).unwrap_or(true);
            after_ok && before_ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Row {
        created_at: DateTime<Utc>,
        id: String,
    }

    fn row(offset_secs: i64, id: &str) -> Row {
        Row {
            created_at: Utc::now() + Duration::seconds(offset_secs),
            id: id.to_string(),
        }
    }

    #[test]
    fn after_excludes_anchor_and_older_rows() {
        let anchor = CursorAnchor {
            created_at: Utc::now(),
            id: "m".to_string(),
        };
        let rows = vec![row(-10, "a"), row(10, "z"), row(0, "a")];
        let req = CursorRequest {
            after: Some(&anchor),
            before: None,
        };
        let window = resolve_cursor_window(&rows, |r| r.created_at, |r| r.id.as_str(), req);
        // only the strictly-newer row (offset +10) and the tie-broken
        // same-instant row with id < "m" should pass.
        assert!(window.iter().any(|r| r.id == "z"));
        assert!(!window.iter().any(|r| r.id == "a" && r.created_at < anchor.created_at));
    }

    #[test]
    fn unknown_cursor_is_unbounded() {
        let rows = vec![row(-10, "a"), row(10, "z")];
        let req = CursorRequest::default();
        let window = resolve_cursor_window(&rows, |r| r.created_at, |r| r.id.as_str(), req);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn before_excludes_anchor_and_newer_rows() {
        let anchor = CursorAnchor {
            created_at: Utc::now(),
            id: "m".to_string(),
        };
        let rows = vec![row(-10, "a"), row(10, "z")];
        let req = CursorRequest {
            after: None,
            before: Some(&anchor),
        };
        let window = resolve_cursor_window(&rows, |r| r.created_at, |r| r.id.as_str(), req);
        assert!(window.iter().any(|r| r.id == "a"));
        assert!(!window.iter().any(|r| r.id == "z"));
    }
}
