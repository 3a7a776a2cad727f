//! Adapter for the unauthenticated syndication/embed JSON family.
//!
//! This upstream predates the v2 API and keeps the legacy field names
//! (`id_str`, `full_text`, `favorite_count`, `viewCount`), so every record
//! goes through the shared canonicalizer instead of typed models.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::adapter::{
    handle_is_well_formed, normalize_handle, HandleCheck, ProviderAdapter, ProviderError,
};
use crate::normalize::{canonicalize, CanonicalPost, DateWindow};
use plume_http::{HttpClient, HttpError, RequestOpts};

pub struct SyndicationAdapter {
    http: HttpClient,
}

impl SyndicationAdapter {
    pub fn new(endpoint: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::new(endpoint)?,
        })
    }

    async fn profile_timeline(&self, handle: &str, count: u32) -> Result<Value, HttpError> {
        let count = count.to_string();
        self.http
            .get_json(
                "timeline/profile.json",
                RequestOpts {
                    query: Some(vec![
                        ("screen_name", handle.into()),
                        ("count", count.as_str().into()),
                    ]),
                    ..Default::default()
                },
            )
            .await
    }

    /// The timeline arrives either as a bare array or wrapped in
    /// `timeline.entries[].content.tweet`; accept both.
    fn tweet_records(payload: &Value) -> Vec<&Value> {
        if let Some(items) = payload.as_array() {
            return items.iter().collect();
        }
        payload
            .pointer("/timeline/entries")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.pointer("/content/tweet").or_else(|| e.get("tweet")))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn profile_user_id(payload: &Value) -> Option<String> {
        for ptr in [
            "/headerProps/userId",
            "/timeline/entries/0/content/tweet/user/id_str",
        ] {
            if let Some(id) = payload.pointer(ptr).and_then(Value::as_str) {
                return Some(id.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl ProviderAdapter for SyndicationAdapter {
    async fn fetch_items(
        &self,
        handle: &str,
        max_items: u32,
        window: Option<DateWindow>,
    ) -> Result<Vec<CanonicalPost>, ProviderError> {
        let handle = normalize_handle(handle);
        let payload = self.profile_timeline(handle, max_items).await?;

        let mut posts = Vec::new();
        for record in Self::tweet_records(&payload) {
            match canonicalize(record, handle) {
                Ok(post) => {
                    if let Some(w) = &window {
                        if !w.contains(post.published_at) {
                            continue;
                        }
                    }
                    posts.push(post);
                }
                // One mangled record must not sink the batch.
                Err(err) => warn!(handle, %err, "syndication.skip_record"),
            }
            if posts.len() as u32 >= max_items {
                break;
            }
        }
        Ok(posts)
    }

    async fn validate_handle(&self, handle: &str) -> HandleCheck {
        if !handle_is_well_formed(handle) {
            return HandleCheck::malformed(format!("{handle:?} outside [A-Za-z0-9_]"));
        }
        let handle = normalize_handle(handle);

        match self.profile_timeline(handle, 1).await {
            Ok(payload) => match Self::profile_user_id(&payload) {
                Some(id) => HandleCheck::valid(id),
                // Reachable profile but no id surfaced anywhere in the
                // payload; the id gets backfilled on a later fetch.
                None => HandleCheck::valid_without_id(),
            },
            Err(err) if err.is_not_found() => HandleCheck::not_found(handle),
            Err(err) => HandleCheck::upstream_failed(err),
        }
    }

    fn provider_name(&self) -> &'static str {
        "syndication"
    }
}
