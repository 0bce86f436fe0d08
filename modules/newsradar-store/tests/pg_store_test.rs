//! Integration tests for the Postgres store.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{Duration, Utc};
use uuid::Uuid;

use newsradar_common::Article;
use newsradar_store::{ArticleRepo, PgStore, SourceRepo, StoreError};

async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = PgStore::connect(&url).await.ok()?;
    store.migrate().await.ok()?;
    Some(store)
}

fn article(source_id: i32, url: &str, cluster_id: Uuid) -> Article {
    Article {
        id: Uuid::new_v4(),
        source_id,
        url: url.to_string(),
        title: "Fed signals rate cut".to_string(),
        content: "Officials indicated a cut may come next quarter.".to_string(),
        published_at: Utc::now() - Duration::minutes(30),
        created_at: Utc::now(),
        cluster_id: Some(cluster_id),
        companies: vec!["Fed".to_string()],
        people: vec![],
    }
}

#[tokio::test]
async fn insert_then_duplicate_url() {
    let Some(store) = test_store().await else {
        eprintln!("DATABASE_TEST_URL not set; skipping");
        return;
    };

    let run = Uuid::new_v4();
    let source_id = store
        .get_or_create(&format!("test-src-{run}"), "https://example.com")
        .await
        .unwrap();

    let cluster = Uuid::new_v4();
    let url = format!("https://example.com/{run}");
    let first = article(source_id, &url, cluster);
    store.insert(&first).await.unwrap();

    let mut second = article(source_id, &url, cluster);
    second.content = "a different body".to_string();
    let err = store.insert(&second).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUrl(_)));

    let members = store.by_cluster(cluster).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, first.id);
}

#[tokio::test]
async fn cluster_reads_are_time_ordered() {
    let Some(store) = test_store().await else {
        eprintln!("DATABASE_TEST_URL not set; skipping");
        return;
    };

    let run = Uuid::new_v4();
    let source_id = store
        .get_or_create(&format!("test-src-{run}"), "https://example.com")
        .await
        .unwrap();

    let cluster = Uuid::new_v4();
    for (i, minutes_ago) in [90i64, 10, 50].iter().enumerate() {
        let mut a = article(source_id, &format!("https://example.com/{run}/{i}"), cluster);
        a.published_at = Utc::now() - Duration::minutes(*minutes_ago);
        store.insert(&a).await.unwrap();
    }

    let members = store.by_cluster(cluster).await.unwrap();
    assert_eq!(members.len(), 3);
    assert!(members.windows(2).all(|w| w[0].published_at <= w[1].published_at));

    assert_eq!(store.count_in_cluster(cluster, 24).await.unwrap(), 3);
    // The 90-minute-old article falls outside a 1-hour window.
    assert_eq!(store.count_in_cluster(cluster, 1).await.unwrap(), 2);
}
