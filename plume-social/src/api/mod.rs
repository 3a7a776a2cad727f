//! Adapter for the official v2-style API family.
//!
//! Typed responses, bearer auth, two-step fetch (resolve the user id, then
//! pull the timeline). Submodules provide the HTTP wrapper and the response
//! models.
pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{
    handle_is_well_formed, normalize_handle, HandleCheck, ProviderAdapter, ProviderError,
};
use crate::normalize::{parse_published, CanonicalPost, DateWindow, PostMetrics};
use self::client::TimelineApi;
use self::types::ApiTweet;

pub struct ApiAdapter {
    api: TimelineApi,
}

impl ApiAdapter {
    pub fn new(api: TimelineApi) -> Self {
        Self { api }
    }

    fn to_canonical(tweet: &ApiTweet, handle: &str) -> Option<CanonicalPost> {
        let raw = tweet.created_at.as_deref()?;
        let published_at = match parse_published(raw) {
            Some(at) => at,
            None => {
                warn!(item_id = %tweet.id, raw, "api.skip_unparseable_timestamp");
                return None;
            }
        };
        let m = tweet.public_metrics.clone().unwrap_or_default();
        Some(CanonicalPost {
            item_id: tweet.id.clone(),
            text: tweet.text.clone(),
            author_handle: handle.to_string(),
            published_at,
            metrics: PostMetrics {
                likes: m.like_count.unwrap_or(0),
                retweets: m.retweet_count.unwrap_or(0),
                replies: m.reply_count.unwrap_or(0),
                views: m.impression_count.unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl ProviderAdapter for ApiAdapter {
    async fn fetch_items(
        &self,
        handle: &str,
        max_items: u32,
        window: Option<DateWindow>,
    ) -> Result<Vec<CanonicalPost>, ProviderError> {
        let handle = normalize_handle(handle);

        let lookup = self.api.user_by_username(handle).await?;
        let user = match lookup.data {
            Some(user) => user,
            // The v2 family reports a missing account as a 200 with an
            // `errors` array rather than a 404.
            None => {
                let detail = lookup
                    .errors
                    .and_then(|errs| errs.into_iter().next())
                    .and_then(|e| e.detail.or(e.title))
                    .unwrap_or_else(|| handle.to_string());
                return Err(ProviderError::NotFound(detail));
            }
        };

        let resp = self.api.user_timeline(&user.id, max_items, window).await?;

        let mut posts = Vec::new();
        if let Some(tweets) = resp.data {
            for tw in &tweets {
                if let Some(post) = Self::to_canonical(tw, handle) {
                    if let Some(w) = &window {
                        if !w.contains(post.published_at) {
                            continue;
                        }
                    }
                    posts.push(post);
                }
            }
        }
        posts.truncate(max_items as usize);
        Ok(posts)
    }

    async fn validate_handle(&self, handle: &str) -> HandleCheck {
        if !handle_is_well_formed(handle) {
            return HandleCheck::malformed(format!("{handle:?} outside [A-Za-z0-9_]"));
        }
        let handle = normalize_handle(handle);

        match self.api.user_by_username(handle).await {
            Ok(resp) => match resp.data {
                Some(user) => HandleCheck::valid(user.id),
                None => {
                    let detail = resp
                        .errors
                        .and_then(|errs| errs.into_iter().next())
                        .and_then(|e| e.detail.or(e.title))
                        .unwrap_or_else(|| handle.to_string());
                    HandleCheck::not_found(detail)
                }
            },
            Err(err) if err.is_not_found() => HandleCheck::not_found(handle),
            Err(err) => HandleCheck::upstream_failed(err),
        }
    }

    fn provider_name(&self) -> &'static str {
        "api"
    }
}
