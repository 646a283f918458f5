mod common;

use chrono::{TimeDelta, TimeZone, Utc};
use common::CountingStore;
use course_video_bot::catalog::Catalog;
use course_video_bot::resolver::{
    ManualClock, UrlResolver, UrlSource, SAFETY_MARGIN_SECS, SIGNED_URL_TTL_SECS,
};
use std::sync::Arc;

fn clock() -> Arc<ManualClock> {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    Arc::new(ManualClock::new(start))
}

#[tokio::test]
async fn repeated_resolution_within_window_reuses_url() {
    let store = Arc::new(CountingStore::default());
    let clock = clock();
    let resolver = UrlResolver::with_clock(store.clone(), clock.clone());
    let catalog = Catalog::builtin();
    let descriptor = catalog.lookup("learn_vps").expect("builtin entry");

    let first = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
    clock.advance(TimeDelta::seconds(i64::from(SIGNED_URL_TTL_SECS - SAFETY_MARGIN_SECS - 1)));
    let second = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");

    assert_eq!(first.url, second.url);
    assert_eq!(second.source, UrlSource::Cache);
    assert_eq!(store.sign_calls(), 1);
}

#[tokio::test]
async fn expired_entry_triggers_exactly_one_fetch() {
    let store = Arc::new(CountingStore::default());
    let clock = clock();
    let resolver = UrlResolver::with_clock(store.clone(), clock.clone());
    let catalog = Catalog::builtin();
    let descriptor = catalog.lookup("learn_ssh").expect("builtin entry");

    resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
    clock.advance(TimeDelta::seconds(i64::from(SIGNED_URL_TTL_SECS)));

    let refreshed = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
    let reused = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");

    assert_eq!(refreshed.source, UrlSource::Signed);
    assert_eq!(reused.source, UrlSource::Cache);
    assert_eq!(refreshed.url, reused.url);
    assert_eq!(store.sign_calls(), 2);
}

#[tokio::test]
async fn entries_are_per_storage_path() {
    let store = Arc::new(CountingStore::default());
    let resolver = UrlResolver::with_clock(store.clone(), clock());
    let catalog = Catalog::builtin();

    for descriptor in catalog.list_all() {
        resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
    }
    for descriptor in catalog.list_all() {
        let again = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
        assert_eq!(again.source, UrlSource::Cache);
        assert!(again.url.contains(&descriptor.storage_path));
    }
    assert_eq!(store.sign_calls(), catalog.len());
}

#[tokio::test]
async fn concurrent_misses_all_get_valid_urls() {
    let store = Arc::new(CountingStore::default());
    let resolver = Arc::new(UrlResolver::with_clock(store.clone(), clock()));
    let catalog = Arc::new(Catalog::builtin());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let resolver = Arc::clone(&resolver);
        let catalog = Arc::clone(&catalog);
        handles.push(tokio::spawn(async move {
            let descriptor = catalog.lookup("learn_docker").expect("builtin entry");
            resolver.resolve(Some("courses"), descriptor).await
        }));
    }

    for handle in handles {
        let resolved = handle.await.expect("task completes").expect("resolved");
        assert!(resolved.url.starts_with("https://cdn.example/courses/videos/learn-docker.mp4"));
    }
    assert!(store.sign_calls() >= 1);

    let settled = resolver
        .resolve(Some("courses"), catalog.lookup("learn_docker").expect("builtin entry"))
        .await
        .expect("resolved");
    assert_eq!(settled.source, UrlSource::Cache);
}

#[tokio::test]
async fn signing_failure_degrades_to_public_url() {
    let store = Arc::new(CountingStore {
        fail_signing: true,
        public_base: Some("https://pub.example".to_string()),
        ..CountingStore::default()
    });
    let resolver = UrlResolver::with_clock(store, clock());
    let catalog = Catalog::builtin();
    let descriptor = catalog.lookup("learn_vps").expect("builtin entry");

    let resolved = resolver.resolve(Some("courses"), descriptor).await.expect("resolved");
    assert_eq!(resolved.source, UrlSource::Public);
    assert_eq!(resolved.url, "https://pub.example/videos/learn-vps.mp4");
}
