//! Canonical post shape and the tolerant JSON canonicalizer.
//!
//! Upstream families disagree on field names (`id` vs `id_str`, `text` vs
//! `full_text`, `createdAt` vs `created_at`, ...). The canonicalizer probes
//! the known spellings in order and defaults absent metrics to zero, so one
//! logical payload always lands in the same [`CanonicalPost`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::ProviderError;

/// Engagement counters; any counter the upstream omits is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub views: u64,
}

/// The provider-agnostic representation of one ingested post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPost {
    /// Provider item id, globally unique; the dedup key for storage.
    pub item_id: String,
    pub text: String,
    pub author_handle: String,
    pub published_at: DateTime<Utc>,
    pub metrics: PostMetrics,
}

/// Inclusive publication-time bounds for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Map one upstream record into the canonical shape.
///
/// `fallback_handle` covers payloads that do not embed the author (e.g. a
/// per-user timeline where the caller already knows whose posts these are).
pub fn canonicalize(value: &Value, fallback_handle: &str) -> Result<CanonicalPost, ProviderError> {
    let item_id = first_string(value, &["id", "id_str"])
        .ok_or_else(|| ProviderError::Malformed("record has no id/id_str".into()))?;

    let text = first_string(value, &["text", "full_text"])
        .ok_or_else(|| ProviderError::Malformed(format!("record {item_id} has no text")))?;

    let raw_date = first_string(value, &["createdAt", "created_at"])
        .ok_or_else(|| ProviderError::Malformed(format!("record {item_id} has no timestamp")))?;
    let published_at = parse_published(&raw_date).ok_or_else(|| {
        ProviderError::Malformed(format!("record {item_id} timestamp unparseable: {raw_date}"))
    })?;

    let author_handle = author_of(value)
        .unwrap_or_else(|| fallback_handle.to_string());

    Ok(CanonicalPost {
        item_id,
        text,
        author_handle,
        published_at,
        metrics: PostMetrics {
            likes: first_u64(value, &["likes", "favorite_count", "like_count"]),
            retweets: first_u64(value, &["retweets", "retweet_count", "repost_count"]),
            replies: first_u64(value, &["replies", "reply_count"]),
            views: first_u64(value, &["views", "viewCount", "view_count"]),
        },
    })
}

/// Publication timestamps arrive either as RFC 3339 or in the legacy
/// `Wed Oct 10 20:19:24 +0000 2018` form.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn author_of(value: &Value) -> Option<String> {
    for path in [
        &["user", "screen_name"][..],
        &["user", "username"][..],
        &["author", "handle"][..],
    ] {
        let mut cur = value;
        let mut found = true;
        for key in path {
            match cur.get(key) {
                Some(next) => cur = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(s) = cur.as_str() {
                return Some(s.to_string());
            }
        }
    }
    first_string(value, &["screen_name", "username"])
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            // Some providers serialize ids as bare numbers.
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn first_u64(value: &Value, keys: &[&str]) -> u64 {
    for key in keys {
        if let Some(n) = value.get(key).and_then(Value::as_u64) {
            return n;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_naming_conventions_normalize_identically() {
        let modern = json!({
            "id": "123",
            "text": "hello",
            "createdAt": "2025-09-01T12:00:00Z",
            "likes": 5,
            "retweets": 2,
            "replies": 1,
            "views": 900,
            "user": { "screen_name": "alice" }
        });
        let legacy = json!({
            "id_str": "123",
            "full_text": "hello",
            "created_at": "Mon Sep 01 12:00:00 +0000 2025",
            "favorite_count": 5,
            "retweet_count": 2,
            "reply_count": 1,
            "viewCount": 900,
            "user": { "screen_name": "alice" }
        });

        let a = canonicalize(&modern, "fallback").unwrap();
        let b = canonicalize(&legacy, "fallback").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.item_id, "123");
        assert_eq!(a.author_handle, "alice");
        assert_eq!(a.metrics.views, 900);
    }

    #[test]
    fn absent_metrics_default_to_zero() {
        let v = json!({
            "id": "9",
            "text": "bare",
            "created_at": "2025-09-01T00:00:00Z"
        });
        let post = canonicalize(&v, "bob").unwrap();
        assert_eq!(post.metrics, PostMetrics::default());
        assert_eq!(post.author_handle, "bob");
    }

    #[test]
    fn numeric_id_is_stringified() {
        let v = json!({
            "id": 4242,
            "text": "n",
            "createdAt": "2025-09-01T00:00:00Z"
        });
        assert_eq!(canonicalize(&v, "x").unwrap().item_id, "4242");
    }

    #[test]
    fn missing_or_bad_timestamp_is_rejected() {
        let missing = json!({ "id": "1", "text": "t" });
        assert!(canonicalize(&missing, "x").is_err());

        let garbage = json!({ "id": "1", "text": "t", "created_at": "not a date" });
        assert!(matches!(
            canonicalize(&garbage, "x"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let from = parse_published("2025-01-01T00:00:00Z").unwrap();
        let to = parse_published("2025-01-08T00:00:00Z").unwrap();
        let w = DateWindow { from, to };
        assert!(w.contains(from));
        assert!(w.contains(to));
        assert!(!w.contains(to + chrono::Duration::seconds(1)));
    }
}
