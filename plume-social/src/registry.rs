//! Name-keyed adapter factory.
//!
//! Adapters share no behavior beyond the [`ProviderAdapter`] contract, so
//! selection is a flat match on the configured name rather than any deeper
//! machinery.

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::adapter::ProviderAdapter;
use crate::api::{client::TimelineApi, ApiAdapter};
use crate::syndication::SyndicationAdapter;

/// Connection settings for whichever adapter the name selects. Fields the
/// named adapter does not use are ignored.
#[derive(Debug, Clone, Default)]
pub struct AdapterSettings {
    pub endpoint: Option<String>,
    pub bearer_token: Option<String>,
}

/// Instantiate the active adapter by name (`"api"` or `"syndication"`).
pub fn build_adapter(name: &str, settings: &AdapterSettings) -> Result<Arc<dyn ProviderAdapter>> {
    match name {
        "api" => {
            let bearer = settings
                .bearer_token
                .clone()
                .context("api adapter requires a bearer token")?;
            let endpoint = settings
                .endpoint
                .as_deref()
                .unwrap_or("https://api.twitter.com");
            let api = TimelineApi::new(endpoint, bearer)
                .with_context(|| format!("api adapter endpoint {endpoint}"))?;
            Ok(Arc::new(ApiAdapter::new(api)))
        }
        "syndication" => {
            let endpoint = settings
                .endpoint
                .as_deref()
                .unwrap_or("https://cdn.syndication.twimg.com");
            let adapter = SyndicationAdapter::new(endpoint)
                .with_context(|| format!("syndication adapter endpoint {endpoint}"))?;
            Ok(Arc::new(adapter))
        }
        other => bail!("unknown provider adapter: {other}"),
    }
}
