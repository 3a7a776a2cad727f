//! Staleness-driven scheduling: select, allocate, fetch-and-store, report.
//!
//! Runs are sequential across creators with a fixed pacing delay between
//! upstream calls; that delay is scheduling policy and lives here, not in
//! the adapters. One bad creator must never prevent the others from
//! refreshing, so every per-creator error is caught and recorded in the run
//! report instead of aborting the run.

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

use plume_social::{DateWindow, ProviderAdapter};

use crate::allocate::{allocate, Allocation, AllocationInput};
use crate::store::TweetStore;
use crate::usage::UsageStore;
use crate::{Creator, RunReport};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Creators whose last fetch is older than this are due for a refresh.
    pub staleness: Duration,
    /// Minimum delay between successive upstream calls within a run.
    pub pacing: std::time::Duration,
    /// How far back fetches reach; items past retention would be swept
    /// immediately, so there is no point requesting them.
    pub fetch_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::hours(24),
            pacing: std::time::Duration::from_secs(1),
            fetch_window: Duration::days(7),
        }
    }
}

#[derive(Clone)]
pub struct IngestScheduler {
    store: TweetStore,
    adapter: Arc<dyn ProviderAdapter>,
    usage: Arc<dyn UsageStore>,
    config: SchedulerConfig,
}

impl IngestScheduler {
    pub fn new(
        store: TweetStore,
        adapter: Arc<dyn ProviderAdapter>,
        usage: Arc<dyn UsageStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            adapter,
            usage,
            config,
        }
    }

    /// One full scheduling pass for a user.
    ///
    /// Failing to select creators at all is fatal to the run and propagates
    /// with context; everything after that point is isolated per creator.
    pub async fn run_for_user(&self, user_id: &str, daily_budget: u32) -> Result<RunReport> {
        let now = Utc::now();
        let stale = self
            .store
            .stale_creators(user_id, now - self.config.staleness)
            .await
            .with_context(|| format!("select stale creators for user {user_id}"))?;

        if stale.is_empty() {
            info!(user_id, "ingest.run.nothing_stale");
            return Ok(RunReport::default());
        }

        let remaining = self.remaining_budget(user_id, daily_budget);
        if remaining == 0 {
            warn!(user_id, daily_budget, "ingest.run.budget_exhausted");
            return Ok(RunReport::default());
        }

        let allocations = allocate(&allocation_inputs(&stale), remaining);
        info!(
            user_id,
            stale = stale.len(),
            budget = remaining,
            scaled = allocations.first().map(|a| a.scaled).unwrap_or(false),
            provider = self.adapter.provider_name(),
            "ingest.run.start"
        );

        let mut report = RunReport::default();
        for (i, alloc) in allocations.iter().enumerate() {
            if i > 0 {
                sleep(self.config.pacing).await;
            }
            // Stale creators and their allocations line up one-to-one; the
            // allocator only drops inactive entries and Select returns none.
            let Some(creator) = stale.iter().find(|c| c.id == alloc.creator_id) else {
                continue;
            };
            self.fetch_one(creator, alloc, &mut report).await;
        }

        info!(
            user_id,
            total = report.total_scraped,
            failed = report.errors.len(),
            "ingest.run.done"
        );
        Ok(report)
    }

    /// On-demand refresh of a single creator. Bypasses Select, but the
    /// allocation still runs against the user's full active set so the
    /// refresh is scaled fairly against the others' standing requests.
    pub async fn refresh_creator(&self, creator_id: uuid::Uuid, daily_budget: u32) -> Result<RunReport> {
        let creator = self
            .store
            .creator(creator_id)
            .await?
            .with_context(|| format!("creator {creator_id} does not exist"))?;
        if !creator.active {
            bail!("creator {} ({}) is deactivated", creator.handle, creator_id);
        }

        let active = self
            .store
            .active_creators(&creator.user_id)
            .await
            .context("load active creators for allocation")?;

        let remaining = self.remaining_budget(&creator.user_id, daily_budget);
        if remaining == 0 {
            warn!(user_id = %creator.user_id, "ingest.refresh.budget_exhausted");
            return Ok(RunReport::default());
        }

        let allocations = allocate(&allocation_inputs(&active), remaining);
        let Some(alloc) = allocations.iter().find(|a| a.creator_id == creator_id) else {
            bail!("no allocation produced for creator {creator_id}");
        };

        let mut report = RunReport::default();
        self.fetch_one(&creator, alloc, &mut report).await;
        Ok(report)
    }

    fn remaining_budget(&self, user_id: &str, daily_budget: u32) -> u32 {
        let today = Utc::now().date_naive();
        daily_budget.saturating_sub(self.usage.used(user_id, today))
    }

    /// Fetch-and-store for one creator; failures land in the report.
    async fn fetch_one(&self, creator: &Creator, alloc: &Allocation, report: &mut RunReport) {
        self.usage
            .charge(&creator.user_id, Utc::now().date_naive(), alloc.granted);

        match self.fetch_and_store(creator, alloc.granted).await {
            Ok(stored) => report.record_stored(&creator.user_id, stored),
            Err(err) => {
                warn!(
                    handle = %creator.handle,
                    granted = alloc.granted,
                    error = %format!("{err:#}"),
                    "ingest.creator_failed"
                );
                report.record_failure(&creator.handle, format!("{err:#}"));
            }
        }
    }

    async fn fetch_and_store(&self, creator: &Creator, granted: u32) -> Result<u64> {
        let now = Utc::now();
        let window = DateWindow {
            from: now - self.config.fetch_window,
            to: now,
        };

        let posts = self
            .adapter
            .fetch_items(&creator.handle, granted, Some(window))
            .await
            .with_context(|| format!("fetch {} items for {}", granted, creator.handle))?;

        let stored = self
            .store
            .upsert_batch(creator.id, &posts, Utc::now())
            .await
            .with_context(|| format!("store batch for {}", creator.handle))?;

        // Only a fully successful fetch+store moves the staleness clock.
        self.store.mark_fetched(creator.id, Utc::now()).await?;
        Ok(stored)
    }
}

fn allocation_inputs(creators: &[Creator]) -> Vec<AllocationInput> {
    creators
        .iter()
        .map(|c| AllocationInput {
            creator_id: c.id,
            active: c.active,
            requested: c.requested_per_run,
        })
        .collect()
}
