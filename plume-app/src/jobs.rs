//! Wiring from loaded config to running jobs.
//!
//! Builds the pool, store, adapter, and scheduler once, then feeds scrape
//! jobs through the worker mailbox and logs one summary line per outcome.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use plume_config::{PlumeConfig, ProviderDetails};
use plume_ingest::schedule::{IngestScheduler, SchedulerConfig};
use plume_ingest::store::TweetStore;
use plume_ingest::usage::MemoryUsage;
use plume_ingest::worker::{spawn_worker, ScrapeJob};
use plume_social::registry::{build_adapter, AdapterSettings};
use plume_social::ProviderAdapter;

pub struct Pipeline {
    pub store: TweetStore,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub scheduler: IngestScheduler,
    pub daily_budget: u32,
    pub retention: chrono::Duration,
}

pub async fn build_pipeline(cfg: &PlumeConfig) -> Result<Pipeline> {
    if !cfg.provider.enabled.unwrap_or(true) {
        anyhow::bail!("provider {} is disabled in config", cfg.provider.id);
    }

    let options = SqliteConnectOptions::from_str(&cfg.database.url)
        .with_context(|| format!("parse database url {}", cfg.database.url))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("open database {}", cfg.database.url))?;

    let store = TweetStore::new(pool);
    store.init_schema().await.context("initialise schema")?;

    let (name, settings) = adapter_settings(cfg);
    let adapter = build_adapter(name, &settings).context("build provider adapter")?;

    let scheduler = IngestScheduler::new(
        store.clone(),
        adapter.clone(),
        Arc::new(MemoryUsage::new()),
        SchedulerConfig {
            staleness: chrono::Duration::hours(cfg.ingest.staleness_hours),
            pacing: std::time::Duration::from_millis(cfg.ingest.pacing_ms),
            fetch_window: chrono::Duration::days(cfg.ingest.retention_days),
        },
    );

    Ok(Pipeline {
        store,
        adapter,
        scheduler,
        daily_budget: cfg.ingest.daily_budget,
        retention: chrono::Duration::days(cfg.ingest.retention_days),
    })
}

fn adapter_settings(cfg: &PlumeConfig) -> (&'static str, AdapterSettings) {
    match &cfg.provider.details {
        ProviderDetails::Api { config } => (
            "api",
            AdapterSettings {
                endpoint: Some(config.endpoint.clone()),
                bearer_token: Some(config.bearer_token.clone()),
            },
        ),
        ProviderDetails::Syndication { config } => (
            "syndication",
            AdapterSettings {
                endpoint: Some(config.endpoint.clone()),
                bearer_token: None,
            },
        ),
    }
}

/// Run scheduling passes: one user if given, otherwise everyone with active
/// creators. Per-job failures are logged and reported, never fatal to the
/// remaining jobs.
pub async fn run_ingest(pipeline: Pipeline, only_user: Option<String>) -> Result<()> {
    let users = match only_user {
        Some(user) => vec![user],
        None => pipeline
            .store
            .users_with_active_creators()
            .await
            .context("list users with active creators")?,
    };
    if users.is_empty() {
        info!("ingest.no_users");
        return Ok(());
    }

    let budget = pipeline.daily_budget;
    let mut handle = spawn_worker(pipeline.scheduler, users.len().max(1), None);
    for user_id in users {
        handle
            .jobs
            .send(ScrapeJob::User { user_id, budget })
            .await
            .map_err(|_| anyhow::anyhow!("scrape worker stopped early"))?;
    }
    drop(handle.jobs);

    while let Some(outcome) = handle.outcomes.recv().await {
        match outcome.result {
            Ok(report) => info!(
                job = %outcome.label,
                report = %serde_json::to_string(&report)?,
                "ingest.report"
            ),
            Err(e) => error!(job = %outcome.label, error = %format!("{e:#}"), "ingest.failed"),
        }
    }
    handle.task.await??;
    Ok(())
}

/// On-demand single-creator refresh.
pub async fn run_refresh(pipeline: Pipeline, creator_id: Uuid) -> Result<()> {
    let report = pipeline
        .scheduler
        .refresh_creator(creator_id, pipeline.daily_budget)
        .await?;
    info!(
        creator = %creator_id,
        report = %serde_json::to_string(&report)?,
        "refresh.report"
    );
    Ok(())
}

/// Retention sweep; independent of ingestion.
pub async fn run_sweep(pipeline: Pipeline) -> Result<()> {
    let cutoff = chrono::Utc::now() - pipeline.retention;
    let deleted = pipeline.store.retention_sweep(cutoff).await?;
    info!(deleted, %cutoff, "sweep.report");
    Ok(())
}

/// Validate a handle and, when it checks out, start tracking it.
pub async fn run_track(
    pipeline: Pipeline,
    user_id: &str,
    handle: &str,
    requested_per_run: u32,
) -> Result<()> {
    let check = pipeline.adapter.validate_handle(handle).await;
    if !check.valid {
        error!(
            handle,
            reason = check.reason.as_deref().unwrap_or("unknown"),
            "track.rejected"
        );
        return Ok(());
    }

    let normalized = plume_social::adapter::normalize_handle(handle);
    if let Some(existing) = pipeline.store.find_creator(user_id, normalized).await? {
        // Re-validating a tracked handle only backfills the provider id.
        if let Some(pid) = check.provider_user_id.as_deref() {
            pipeline.store.set_provider_user_id(existing.id, pid).await?;
        }
        info!(creator_id = %existing.id, handle = %existing.handle, "track.already_tracked");
        return Ok(());
    }

    let creator = pipeline
        .store
        .create_creator(
            user_id,
            normalized,
            requested_per_run,
            check.provider_user_id.as_deref(),
        )
        .await?;
    info!(
        creator_id = %creator.id,
        handle = %creator.handle,
        provider_user_id = ?creator.provider_user_id,
        "track.created"
    );
    Ok(())
}

/// Operator deactivation; the creator and its items stay in place.
pub async fn run_deactivate(pipeline: Pipeline, creator_id: Uuid) -> Result<()> {
    pipeline.store.deactivate_creator(creator_id).await?;
    Ok(())
}
