use chrono::{Duration, Utc};
use plume_ingest::store::TweetStore;
use plume_social::{CanonicalPost, PostMetrics};
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory SQLite shares nothing between connections, so the pool is
/// pinned to a single one.
async fn test_store() -> TweetStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    let store = TweetStore::new(pool);
    store.init_schema().await.expect("init schema");
    store
}

fn post(id: &str, text: &str, age: Duration, likes: u64) -> CanonicalPost {
    CanonicalPost {
        item_id: id.to_string(),
        text: text.to_string(),
        author_handle: "alice".to_string(),
        published_at: Utc::now() - age,
        metrics: PostMetrics {
            likes,
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn reingesting_a_batch_is_idempotent() {
    let store = test_store().await;
    let creator = store
        .create_creator("u1", "alice", 10, None)
        .await
        .unwrap();

    let batch = vec![
        post("t1", "first", Duration::hours(1), 3),
        post("t2", "second", Duration::hours(2), 7),
        post("t3", "third", Duration::hours(3), 0),
    ];
    store
        .upsert_batch(creator.id, &batch, Utc::now())
        .await
        .unwrap();
    assert_eq!(store.item_count("u1").await.unwrap(), 3);

    // Second pass with refreshed metrics: row count unchanged, metrics
    // updated, publication timestamp untouched.
    let before = store.items_for_creator(creator.id).await.unwrap();
    let refreshed: Vec<_> = batch
        .iter()
        .map(|p| CanonicalPost {
            metrics: PostMetrics {
                likes: p.metrics.likes + 100,
                ..p.metrics
            },
            ..p.clone()
        })
        .collect();
    store
        .upsert_batch(creator.id, &refreshed, Utc::now())
        .await
        .unwrap();

    assert_eq!(store.item_count("u1").await.unwrap(), 3);
    let after = store.items_for_creator(creator.id).await.unwrap();
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(a.item_id, b.item_id);
        assert_eq!(a.published_at, b.published_at);
        assert_eq!(a.metrics.likes, b.metrics.likes + 100);
    }
}

#[tokio::test]
async fn upsert_never_moves_an_item_between_creators() {
    let store = test_store().await;
    let alice = store.create_creator("u1", "alice", 10, None).await.unwrap();
    let bob = store.create_creator("u1", "bob", 10, None).await.unwrap();

    let original = post("shared", "hello", Duration::hours(1), 1);
    store
        .upsert_batch(alice.id, &[original.clone()], Utc::now())
        .await
        .unwrap();

    // Same provider item id arriving under another creator with a different
    // publication timestamp: content refreshes, ownership and timestamp stay.
    let mut imposter = original.clone();
    imposter.text = "changed".to_string();
    imposter.published_at = Utc::now() - Duration::days(2);
    store
        .upsert_batch(bob.id, &[imposter], Utc::now())
        .await
        .unwrap();

    let alices = store.items_for_creator(alice.id).await.unwrap();
    assert_eq!(alices.len(), 1);
    assert_eq!(alices[0].content, "changed");
    assert_eq!(alices[0].published_at, original.published_at);
    assert!(store.items_for_creator(bob.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn retention_sweep_respects_the_window_boundary() {
    let store = test_store().await;
    let creator = store.create_creator("u1", "alice", 10, None).await.unwrap();

    let batch = vec![
        post("old", "eight days", Duration::days(8), 0),
        post("fresh", "six days", Duration::days(6), 0),
    ];
    store
        .upsert_batch(creator.id, &batch, Utc::now())
        .await
        .unwrap();

    let deleted = store
        .retention_sweep(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining = store.items_for_creator(creator.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].item_id, "fresh");
}

#[tokio::test]
async fn balanced_read_caps_each_creator_and_interleaves() {
    let store = test_store().await;
    let alice = store.create_creator("u1", "alice", 10, None).await.unwrap();
    let bob = store.create_creator("u1", "bob", 10, None).await.unwrap();

    // Alice is prolific, Bob is not.
    let alice_batch: Vec<_> = (0..10)
        .map(|i| post(&format!("a{i}"), "a", Duration::minutes(i), 0))
        .collect();
    let bob_batch: Vec<_> = (0..2)
        .map(|i| post(&format!("b{i}"), "b", Duration::minutes(i), 0))
        .collect();
    store
        .upsert_batch(alice.id, &alice_batch, Utc::now())
        .await
        .unwrap();
    store
        .upsert_batch(bob.id, &bob_batch, Utc::now())
        .await
        .unwrap();

    let merged = store
        .balanced_recent("u1", 6, Duration::days(7))
        .await
        .unwrap();

    // ceil(6/2) = 3 per creator; Bob only has 2, so 5 come back, and Alice
    // never exceeds her cap no matter how many items she has.
    assert_eq!(merged.len(), 5);
    let from_alice = merged.iter().filter(|i| i.creator_id == alice.id).count();
    let from_bob = merged.iter().filter(|i| i.creator_id == bob.id).count();
    assert_eq!(from_alice, 3);
    assert_eq!(from_bob, 2);

    // Round-robin: creators alternate while both still have items.
    let owners: Vec<_> = merged.iter().map(|i| i.creator_id).collect();
    assert_eq!(
        owners,
        vec![alice.id, bob.id, alice.id, bob.id, alice.id]
    );
}

#[tokio::test]
async fn balanced_read_ignores_items_outside_lookback() {
    let store = test_store().await;
    let creator = store.create_creator("u1", "alice", 10, None).await.unwrap();
    store
        .upsert_batch(
            creator.id,
            &[
                post("recent", "in window", Duration::days(1), 0),
                post("ancient", "out of window", Duration::days(30), 0),
            ],
            Utc::now(),
        )
        .await
        .unwrap();

    let merged = store
        .balanced_recent("u1", 10, Duration::days(7))
        .await
        .unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].item_id, "recent");
}

#[tokio::test]
async fn stale_creators_orders_never_fetched_first_then_most_overdue() {
    let store = test_store().await;
    let fresh = store.create_creator("u1", "fresh", 10, None).await.unwrap();
    let overdue = store.create_creator("u1", "overdue", 10, None).await.unwrap();
    let very_overdue = store
        .create_creator("u1", "very_overdue", 10, None)
        .await
        .unwrap();
    let never = store.create_creator("u1", "never", 10, None).await.unwrap();

    let now = Utc::now();
    store.mark_fetched(fresh.id, now - Duration::hours(1)).await.unwrap();
    store
        .mark_fetched(overdue.id, now - Duration::hours(30))
        .await
        .unwrap();
    store
        .mark_fetched(very_overdue.id, now - Duration::days(3))
        .await
        .unwrap();

    let stale = store
        .stale_creators("u1", now - Duration::hours(24))
        .await
        .unwrap();
    let ids: Vec<_> = stale.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![never.id, very_overdue.id, overdue.id]);
}

#[tokio::test]
async fn deactivated_creators_never_come_back_stale() {
    let store = test_store().await;
    let creator = store.create_creator("u1", "alice", 10, None).await.unwrap();
    store.deactivate_creator(creator.id).await.unwrap();

    let stale = store
        .stale_creators("u1", Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert!(stale.is_empty());
    assert!(store.active_creators("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn handle_is_unique_per_user_only() {
    let store = test_store().await;
    store.create_creator("u1", "alice", 10, None).await.unwrap();
    assert!(store.create_creator("u1", "alice", 10, None).await.is_err());
    // Another user may track the same upstream account.
    assert!(store.create_creator("u2", "alice", 10, None).await.is_ok());
}

#[tokio::test]
async fn find_creator_is_scoped_to_the_owning_user() {
    let store = test_store().await;
    let created = store.create_creator("u1", "alice", 10, None).await.unwrap();

    let found = store.find_creator("u1", "alice").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert!(store.find_creator("u2", "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn provider_user_id_backfills_once() {
    let store = test_store().await;
    let creator = store.create_creator("u1", "alice", 10, None).await.unwrap();

    store.set_provider_user_id(creator.id, "42").await.unwrap();
    // A later differing answer does not overwrite the learned id.
    store.set_provider_user_id(creator.id, "43").await.unwrap();

    let loaded = store.creator(creator.id).await.unwrap().unwrap();
    assert_eq!(loaded.provider_user_id.as_deref(), Some("42"));
}
