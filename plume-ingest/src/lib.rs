//! The creator ingestion pipeline: quota allocation, staleness scheduling,
//! idempotent storage, and the retention sweep.
//!
//! Control flow per run: the scheduler asks the store which creators are
//! stale, the allocator how many items each should receive under the user's
//! budget, then drives the active provider adapter sequentially with paced
//! calls and per-creator failure isolation, feeding each batch back to the
//! store. The retention sweep is an independent periodic job.
pub mod allocate;
pub mod schedule;
pub mod store;
pub mod usage;
pub mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One tracked upstream account, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    pub id: Uuid,
    /// Key of the owning user (opaque to the pipeline).
    pub user_id: String,
    pub handle: String,
    pub active: bool,
    /// Operator-configured items per run, 1..=100.
    pub requested_per_run: u32,
    /// Learned from the provider on first successful validation.
    pub provider_user_id: Option<String>,
    /// Updated only on successful fetch completion, never on failure.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Operator-facing summary of one scheduling run. A logging contract, not a
/// persisted entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total_scraped: u64,
    pub per_user: HashMap<String, u64>,
    pub errors: Vec<CreatorFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorFailure {
    pub creator: String,
    pub reason: String,
}

impl RunReport {
    pub fn record_stored(&mut self, user_id: &str, count: u64) {
        self.total_scraped += count;
        *self.per_user.entry(user_id.to_string()).or_default() += count;
    }

    pub fn record_failure(&mut self, handle: &str, reason: impl std::fmt::Display) {
        self.errors.push(CreatorFailure {
            creator: handle.to_string(),
            reason: reason.to_string(),
        });
    }
}
