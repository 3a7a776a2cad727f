//! The provider contract: fetch, validate, identify.
//!
//! `fetch_items` propagates typed errors so the scheduler can isolate them
//! per creator; `validate_handle` never errors because it sits on a
//! synchronous user-facing path and must always return a decision.

use async_trait::async_trait;
use plume_http::HttpError;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::normalize::{CanonicalPost, DateWindow};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream authentication rejected: {0}")]
    Auth(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("upstream payload malformed: {0}")]
    Malformed(String),
}

impl From<HttpError> for ProviderError {
    fn from(err: HttpError) -> Self {
        match &err {
            HttpError::Api { status, message, .. } => {
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    ProviderError::Auth(message.clone())
                } else if err.is_not_found() {
                    ProviderError::NotFound(message.clone())
                } else {
                    ProviderError::Transport(err.to_string())
                }
            }
            HttpError::Decode(..) => ProviderError::Malformed(err.to_string()),
            _ => ProviderError::Transport(err.to_string()),
        }
    }
}

/// Decision produced by [`ProviderAdapter::validate_handle`].
///
/// Non-valid reasons carry distinct prefixes so callers can tell a local
/// syntax rejection apart from an upstream miss or an upstream outage by
/// inspecting the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleCheck {
    pub valid: bool,
    /// Upstream-assigned user id, present only when `valid`.
    pub provider_user_id: Option<String>,
    pub reason: Option<String>,
}

impl HandleCheck {
    pub fn valid(user_id: impl Into<String>) -> Self {
        Self {
            valid: true,
            provider_user_id: Some(user_id.into()),
            reason: None,
        }
    }

    pub fn valid_without_id() -> Self {
        Self {
            valid: true,
            provider_user_id: None,
            reason: None,
        }
    }

    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::invalid(format!("malformed handle: {detail}"))
    }

    pub fn not_found(detail: impl std::fmt::Display) -> Self {
        Self::invalid(format!("account not found: {detail}"))
    }

    pub fn upstream_failed(detail: impl std::fmt::Display) -> Self {
        Self::invalid(format!("upstream check failed: {detail}"))
    }

    fn invalid(reason: String) -> Self {
        Self {
            valid: false,
            provider_user_id: None,
            reason: Some(reason),
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Fetch up to `max_items` recent posts for `handle`, newest first.
    ///
    /// Accepts the handle with or without a leading `@`. An account with no
    /// posts in range yields an empty vec, not an error.
    async fn fetch_items(
        &self,
        handle: &str,
        max_items: u32,
        window: Option<DateWindow>,
    ) -> Result<Vec<CanonicalPost>, ProviderError>;

    /// Decide whether `handle` names a real upstream account.
    ///
    /// Fails closed on the local character-set check before any network
    /// call; upstream failures are folded into a non-valid decision.
    async fn validate_handle(&self, handle: &str) -> HandleCheck;

    /// Constant identity string, used only for logging.
    fn provider_name(&self) -> &'static str;
}

static HANDLE_RE: OnceLock<Regex> = OnceLock::new();

/// Permitted handle shape: letters, digits, underscore, one optional
/// leading `@`, at most 15 characters after the prefix.
pub fn handle_is_well_formed(handle: &str) -> bool {
    let re = HANDLE_RE.get_or_init(|| Regex::new(r"^@?[A-Za-z0-9_]{1,15}$").expect("handle regex"));
    re.is_match(handle)
}

/// Strip a single leading `@` before talking to the upstream.
pub fn normalize_handle(handle: &str) -> &str {
    handle.strip_prefix('@').unwrap_or(handle)
}
