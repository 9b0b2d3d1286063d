//! Single-flight behaviour of the schema cache

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use xmlpack::cache::TaskCache;
use xmlpack::schema::{self, SchemaCacheEntry, SchemaKind, SchemaState};
use xmlpack::{Loader, Location};

const SCHEMA: &str = r#"<element name="a" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_load_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.rng");
    fs::write(&path, SCHEMA).unwrap();
    let location = Location::Path(path);

    let cache: Arc<TaskCache<Location, SchemaCacheEntry>> = Arc::new(TaskCache::new("schemas"));
    let loads = Arc::new(AtomicUsize::new(0));

    let request = |cache: Arc<TaskCache<Location, SchemaCacheEntry>>, loads: Arc<AtomicUsize>| {
        let location = location.clone();
        async move {
            let token = CancellationToken::new();
            let key = location.clone();
            cache
                .get_or_build(key, &token, move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(schema::fetch(&Loader::new(), &location, SchemaKind::Rng).await)
                })
                .await
        }
    };

    let (first, second) = tokio::join!(
        tokio::spawn(request(cache.clone(), loads.clone())),
        tokio::spawn(request(cache.clone(), loads.clone())),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.state, SchemaState::Parsed);
    assert!(first.is_parsed());
}

#[tokio::test]
async fn missing_schema_is_cached_as_unloadable() {
    let dir = TempDir::new().unwrap();
    let location = Location::Path(dir.path().join("missing.rng"));
    let cache: TaskCache<Location, SchemaCacheEntry> = TaskCache::new("schemas");
    let token = CancellationToken::new();

    let fetch_location = location.clone();
    let entry = cache
        .get_or_build(location.clone(), &token, move || async move {
            Ok(schema::fetch(&Loader::new(), &fetch_location, SchemaKind::Rng).await)
        })
        .await
        .unwrap();

    assert_eq!(entry.state, SchemaState::CantLoad);
    assert!(entry.error_message.is_some());
    assert!(cache.peek(&location).is_some());
}
