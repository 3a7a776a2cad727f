use async_trait::async_trait;
use chrono::{Duration, Utc};
use plume_ingest::schedule::{IngestScheduler, SchedulerConfig};
use plume_ingest::store::TweetStore;
use plume_ingest::usage::MemoryUsage;
use plume_ingest::worker::{spawn_worker, ScrapeJob};
use plume_social::{
    CanonicalPost, DateWindow, HandleCheck, PostMetrics, ProviderAdapter, ProviderError,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

struct FixedAdapter;

#[async_trait]
impl ProviderAdapter for FixedAdapter {
    async fn fetch_items(
        &self,
        handle: &str,
        max_items: u32,
        _window: Option<DateWindow>,
    ) -> Result<Vec<CanonicalPost>, ProviderError> {
        Ok((0..max_items)
            .map(|i| CanonicalPost {
                item_id: format!("{handle}-{i}"),
                text: "x".into(),
                author_handle: handle.to_string(),
                published_at: Utc::now() - Duration::minutes(i64::from(i)),
                metrics: PostMetrics::default(),
            })
            .collect())
    }

    async fn validate_handle(&self, _handle: &str) -> HandleCheck {
        HandleCheck::valid_without_id()
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

#[tokio::test]
async fn queued_jobs_come_back_on_the_outcome_channel() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = TweetStore::new(pool);
    store.init_schema().await.unwrap();
    store.create_creator("u1", "alice", 5, None).await.unwrap();

    let scheduler = IngestScheduler::new(
        store,
        Arc::new(FixedAdapter),
        Arc::new(MemoryUsage::new()),
        SchedulerConfig {
            pacing: std::time::Duration::from_millis(0),
            ..Default::default()
        },
    );

    let mut handle = spawn_worker(scheduler, 4, None);
    handle
        .jobs
        .send(ScrapeJob::User {
            user_id: "u1".into(),
            budget: 100,
        })
        .await
        .unwrap();

    let outcome = handle.outcomes.recv().await.expect("one outcome");
    assert_eq!(outcome.label, "user:u1");
    let report = outcome.result.expect("run succeeds");
    assert_eq!(report.total_scraped, 5);

    // Dropping the job sender drains the worker cleanly.
    drop(handle.jobs);
    handle.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn fatal_setup_errors_are_reported_not_swallowed() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = TweetStore::new(pool);
    store.init_schema().await.unwrap();

    let scheduler = IngestScheduler::new(
        store,
        Arc::new(FixedAdapter),
        Arc::new(MemoryUsage::new()),
        SchedulerConfig::default(),
    );

    let mut handle = spawn_worker(scheduler, 4, None);
    // Refreshing a creator that does not exist fails during setup; the
    // error must surface on the channel rather than killing the worker.
    handle
        .jobs
        .send(ScrapeJob::Creator {
            creator_id: uuid::Uuid::new_v4(),
            budget: 10,
        })
        .await
        .unwrap();

    let outcome = handle.outcomes.recv().await.expect("one outcome");
    assert!(outcome.result.is_err());

    drop(handle.jobs);
    handle.task.await.unwrap().unwrap();
}
