//! SQLite-backed persistence for creators and fetched items.
//!
//! Upserts are single `INSERT .. ON CONFLICT` statements so concurrent
//! re-fetches of the same item converge last-writer-wins without a
//! read-modify-write from the pipeline. The retention sweep and the
//! balanced read hold no state beyond their own queries.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use plume_social::{CanonicalPost, PostMetrics};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::Creator;

/// One stored item as read back out of the store.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub item_id: String,
    pub creator_id: Uuid,
    pub content: String,
    pub author_handle: String,
    pub published_at: DateTime<Utc>,
    pub metrics: PostMetrics,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TweetStore {
    pool: SqlitePool,
}

impl TweetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS creator (
                 id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 handle TEXT NOT NULL,
                 active INTEGER NOT NULL DEFAULT 1,
                 requested_per_run INTEGER NOT NULL,
                 provider_user_id TEXT,
                 last_fetched_at TEXT,
                 created_at TEXT NOT NULL,
                 UNIQUE(user_id, handle)
               )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS fetched_item (
                 item_id TEXT PRIMARY KEY,
                 creator_id TEXT NOT NULL REFERENCES creator(id) ON DELETE CASCADE,
                 content TEXT NOT NULL,
                 author_handle TEXT NOT NULL,
                 published_at TEXT NOT NULL,
                 likes INTEGER NOT NULL DEFAULT 0,
                 retweets INTEGER NOT NULL DEFAULT 0,
                 replies INTEGER NOT NULL DEFAULT 0,
                 views INTEGER NOT NULL DEFAULT 0,
                 fetched_at TEXT NOT NULL
               )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_item_creator_published
               ON fetched_item(creator_id, published_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_published ON fetched_item(published_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ------------------------------
    // Creators
    // ------------------------------

    /// Register a creator after its handle passed validation. Handle is
    /// unique per owning user; a duplicate surfaces as a constraint error.
    pub async fn create_creator(
        &self,
        user_id: &str,
        handle: &str,
        requested_per_run: u32,
        provider_user_id: Option<&str>,
    ) -> Result<Creator> {
        let creator = Creator {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            handle: handle.to_string(),
            active: true,
            requested_per_run,
            provider_user_id: provider_user_id.map(str::to_string),
            last_fetched_at: None,
        };

        sqlx::query(
            r#"INSERT INTO creator
                 (id, user_id, handle, active, requested_per_run, provider_user_id, created_at)
               VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)"#,
        )
        .bind(creator.id.to_string())
        .bind(&creator.user_id)
        .bind(&creator.handle)
        .bind(creator.requested_per_run)
        .bind(creator.provider_user_id.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert creator {handle} for user {user_id}"))?;

        info!(creator_id = %creator.id, handle, user_id, "store.creator_created");
        Ok(creator)
    }

    /// Operator deactivation. Creators are never deleted by the pipeline.
    pub async fn deactivate_creator(&self, id: Uuid) -> Result<()> {
        let res = sqlx::query("UPDATE creator SET active = 0 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        info!(creator_id = %id, rows = res.rows_affected(), "store.creator_deactivated");
        Ok(())
    }

    /// Backfill the provider-assigned user id learned on first validation.
    pub async fn set_provider_user_id(&self, id: Uuid, provider_user_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE creator SET provider_user_id = ?2 WHERE id = ?1 AND provider_user_id IS NULL",
        )
        .bind(id.to_string())
        .bind(provider_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a successful fetch. Never called on failure paths.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE creator SET last_fetched_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look a creator up by its per-user unique handle.
    pub async fn find_creator(&self, user_id: &str, handle: &str) -> Result<Option<Creator>> {
        let row = sqlx::query(
            r#"SELECT id, user_id, handle, active, requested_per_run,
                      provider_user_id, last_fetched_at
               FROM creator WHERE user_id = ?1 AND handle = ?2"#,
        )
        .bind(user_id)
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;
        row.map(creator_from_row).transpose()
    }

    pub async fn creator(&self, id: Uuid) -> Result<Option<Creator>> {
        let row = sqlx::query(
            r#"SELECT id, user_id, handle, active, requested_per_run,
                      provider_user_id, last_fetched_at
               FROM creator WHERE id = ?1"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(creator_from_row).transpose()
    }

    /// All active creators for a user, in handle order.
    pub async fn active_creators(&self, user_id: &str) -> Result<Vec<Creator>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, handle, active, requested_per_run,
                      provider_user_id, last_fetched_at
               FROM creator
               WHERE user_id = ?1 AND active = 1
               ORDER BY handle ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(creator_from_row).collect()
    }

    /// Users that currently track at least one active creator; drives the
    /// all-users ingest trigger.
    pub async fn users_with_active_creators(&self) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT DISTINCT user_id FROM creator WHERE active = 1 ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("user_id").map_err(Into::into))
            .collect()
    }

    /// Active creators due for a refresh: never fetched, or last fetched
    /// before `threshold`. Most-overdue first (never-fetched sorts ahead),
    /// so an interrupted run leaves the least-stale tail behind.
    pub async fn stale_creators(
        &self,
        user_id: &str,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Creator>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, handle, active, requested_per_run,
                      provider_user_id, last_fetched_at
               FROM creator
               WHERE user_id = ?1 AND active = 1
                 AND (last_fetched_at IS NULL OR last_fetched_at < ?2)
               ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC"#,
        )
        .bind(user_id)
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(creator_from_row).collect()
    }

    // ------------------------------
    // Items
    // ------------------------------

    /// Idempotent batch upsert keyed by provider item id.
    ///
    /// New ids insert with creator ownership; existing ids refresh content,
    /// metrics, and fetch timestamp only. Publication timestamp and owning
    /// creator are immutable post-creation, so a batch of N items never
    /// produces more than N rows however often it is re-ingested.
    pub async fn upsert_batch(
        &self,
        creator_id: Uuid,
        posts: &[CanonicalPost],
        fetched_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for post in posts {
            let res = sqlx::query(
                r#"INSERT INTO fetched_item
                     (item_id, creator_id, content, author_handle, published_at,
                      likes, retweets, replies, views, fetched_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                   ON CONFLICT(item_id) DO UPDATE SET
                     content=excluded.content,
                     likes=excluded.likes,
                     retweets=excluded.retweets,
                     replies=excluded.replies,
                     views=excluded.views,
                     fetched_at=excluded.fetched_at"#,
            )
            .bind(&post.item_id)
            .bind(creator_id.to_string())
            .bind(&post.text)
            .bind(&post.author_handle)
            .bind(post.published_at)
            .bind(post.metrics.likes as i64)
            .bind(post.metrics.retweets as i64)
            .bind(post.metrics.replies as i64)
            .bind(post.metrics.views as i64)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await?;
            written += res.rows_affected();
        }

        tx.commit().await?;
        info!(
            creator_id = %creator_id,
            batch = posts.len(),
            rows_written = written,
            "store.upsert_batch"
        );
        Ok(written)
    }

    /// Delete everything published before `cutoff`, creator and fetch
    /// recency notwithstanding. Returns the deleted row count. Cost control,
    /// not correctness: nothing downstream depends on old items existing.
    pub async fn retention_sweep(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query("DELETE FROM fetched_item WHERE published_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let deleted = res.rows_affected();
        info!(%cutoff, deleted, "store.retention_sweep");
        Ok(deleted)
    }

    /// Assemble up to `total` recent items spread evenly across the user's
    /// active creators: ceiling-divide the total by creator count, pull up
    /// to that many per creator within the lookback window, then interleave
    /// round-robin by creator so no single prolific account crowds the rest
    /// out of downstream context.
    pub async fn balanced_recent(
        &self,
        user_id: &str,
        total: u32,
        lookback: Duration,
    ) -> Result<Vec<StoredItem>> {
        let creators = self.active_creators(user_id).await?;
        if creators.is_empty() || total == 0 {
            return Ok(Vec::new());
        }

        let per_creator = total.div_ceil(creators.len() as u32);
        let since = Utc::now() - lookback;

        let mut per_creator_items: Vec<Vec<StoredItem>> = Vec::with_capacity(creators.len());
        for creator in &creators {
            let rows = sqlx::query(
                r#"SELECT item_id, creator_id, content, author_handle, published_at,
                          likes, retweets, replies, views, fetched_at
                   FROM fetched_item
                   WHERE creator_id = ?1 AND published_at >= ?2
                   ORDER BY published_at DESC
                   LIMIT ?3"#,
            )
            .bind(creator.id.to_string())
            .bind(since)
            .bind(i64::from(per_creator))
            .fetch_all(&self.pool)
            .await?;
            per_creator_items.push(rows.into_iter().map(item_from_row).collect::<Result<_>>()?);
        }

        // Round-robin interleave keeps the merge deterministic.
        let mut merged = Vec::new();
        let mut round = 0usize;
        loop {
            let mut took_any = false;
            for items in &mut per_creator_items {
                if let Some(item) = items.get(round) {
                    merged.push(item.clone());
                    took_any = true;
                }
            }
            if !took_any || merged.len() >= total as usize {
                break;
            }
            round += 1;
        }
        merged.truncate(total as usize);

        debug!(
            user_id,
            creators = creators.len(),
            per_creator,
            merged = merged.len(),
            "store.balanced_recent"
        );
        Ok(merged)
    }

    /// Total stored items for a user, test/observability helper.
    pub async fn item_count(&self, user_id: &str) -> Result<u64> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS n
               FROM fetched_item i JOIN creator c ON c.id = i.creator_id
               WHERE c.user_id = ?1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    /// All stored items for one creator, newest first.
    pub async fn items_for_creator(&self, creator_id: Uuid) -> Result<Vec<StoredItem>> {
        let rows = sqlx::query(
            r#"SELECT item_id, creator_id, content, author_handle, published_at,
                      likes, retweets, replies, views, fetched_at
               FROM fetched_item
               WHERE creator_id = ?1
               ORDER BY published_at DESC"#,
        )
        .bind(creator_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(item_from_row).collect()
    }
}

fn creator_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Creator> {
    Ok(Creator {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        user_id: row.try_get("user_id")?,
        handle: row.try_get("handle")?,
        active: row.try_get::<i64, _>("active")? != 0,
        requested_per_run: row.try_get::<i64, _>("requested_per_run")? as u32,
        provider_user_id: row.try_get("provider_user_id")?,
        last_fetched_at: row.try_get("last_fetched_at")?,
    })
}

fn item_from_row(row: sqlx::sqlite::SqliteRow) -> Result<StoredItem> {
    Ok(StoredItem {
        item_id: row.try_get("item_id")?,
        creator_id: Uuid::parse_str(&row.try_get::<String, _>("creator_id")?)?,
        content: row.try_get("content")?,
        author_handle: row.try_get("author_handle")?,
        published_at: row.try_get("published_at")?,
        metrics: PostMetrics {
            likes: row.try_get::<i64, _>("likes")? as u64,
            retweets: row.try_get::<i64, _>("retweets")? as u64,
            replies: row.try_get::<i64, _>("replies")? as u64,
            views: row.try_get::<i64, _>("views")? as u64,
        },
        fetched_at: row.try_get("fetched_at")?,
    })
}
