//! Content cache with single-flight population.
//!
//! Backed by moka: concurrent lookups of a missing video collapse into one
//! fetch and all observe its record. Failed records expire after the
//! failure TTL; successful ones after the success TTL, if any.

use super::{ContentRecord, ContentSource};
use crate::config::CacheSettings;
use crate::credential::Credential;
use crate::video::VideoReference;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Per-entry lifetime chosen by acquisition outcome.
struct RecordExpiry {
    failure_ttl: Duration,
    success_ttl: Option<Duration>,
}

impl Expiry<VideoReference, Arc<ContentRecord>> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &VideoReference,
        record: &Arc<ContentRecord>,
        _created_at: Instant,
    ) -> Option<Duration> {
        if record.is_success() {
            self.success_ttl
        } else {
            Some(self.failure_ttl)
        }
    }
}

/// In-memory cache of acquired video content, keyed by normalized reference.
pub struct ContentCache {
    entries: Cache<VideoReference, Arc<ContentRecord>>,
}

impl ContentCache {
    /// Create an empty cache with the default capacity.
    pub fn new(failure_ttl: Duration, success_ttl: Option<Duration>) -> Self {
        Self::build(failure_ttl, success_ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::build(
            settings.failure_ttl(),
            settings.success_ttl(),
            settings.max_entries,
        )
    }

    fn build(failure_ttl: Duration, success_ttl: Option<Duration>, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(RecordExpiry {
                failure_ttl,
                success_ttl,
            })
            .build();
        Self { entries }
    }

    /// Return the cached record for `reference`, fetching it on a miss.
    ///
    /// At most one fetch per reference runs at a time. If the fetching
    /// caller is dropped, a waiting caller takes over and nothing is stored.
    #[instrument(skip(self, credential, source), fields(video = %reference))]
    pub async fn get_or_fetch(
        &self,
        reference: &VideoReference,
        credential: &Credential,
        source: &dyn ContentSource,
    ) -> Arc<ContentRecord> {
        self.entries
            .get_with(reference.clone(), async {
                info!("Cache miss, acquiring content");
                Arc::new(source.fetch(reference, credential).await)
            })
            .await
    }

    /// The live record for `reference`, if any. Never fetches.
    pub async fn peek(&self, reference: &VideoReference) -> Option<Arc<ContentRecord>> {
        self.entries.get(reference).await
    }

    /// Drop the record for `reference`. Returns whether one existed.
    pub async fn invalidate(&self, reference: &VideoReference) -> bool {
        let removed = self.entries.remove(reference).await.is_some();
        if removed {
            info!("Invalidated cached content for {}", reference);
        }
        removed
    }

    /// Drop every record.
    pub fn clear(&self) {
        debug!("Clearing content cache");
        self.entries.invalidate_all();
    }

    /// References with a live record, sorted.
    pub fn list_cached_references(&self) -> Vec<VideoReference> {
        let mut references: Vec<VideoReference> = self
            .entries
            .iter()
            .map(|(reference, _)| reference.as_ref().clone())
            .collect();
        references.sort();
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        succeed: bool,
        delay: Duration,
    }

    impl CountingSource {
        fn new(succeed: bool) -> Self {
            Self::with_delay(succeed, Duration::from_millis(50))
        }

        fn with_delay(succeed: bool, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed,
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for CountingSource {
        async fn fetch(&self, reference: &VideoReference, _credential: &Credential) -> ContentRecord {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.succeed {
                ContentRecord::success(
                    reference.clone(),
                    format!("content #{}", n),
                    crate::content::AcquisitionStrategy::Transcription,
                )
            } else {
                ContentRecord::failed(reference.clone(), vec![format!("failure #{}", n)])
            }
        }
    }

    fn reference(id: &str) -> VideoReference {
        VideoReference::parse(id).unwrap()
    }

    fn credential() -> Credential {
        Credential::new("k").unwrap()
    }

    fn cache() -> ContentCache {
        ContentCache::new(Duration::from_secs(300), None)
    }

    #[tokio::test]
    async fn test_hit_after_populate() {
        let cache = cache();
        let source = CountingSource::new(true);
        let r = reference("abc12345678");

        let first = cache.get_or_fetch(&r, &credential(), &source).await;
        let second = cache.get_or_fetch(&r, &credential(), &source).await;

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.list_cached_references(), vec![r]);
    }

    #[tokio::test]
    async fn test_equivalent_urls_share_an_entry() {
        let cache = cache();
        let source = CountingSource::new(true);

        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&utm_source=x",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "dQw4w9WgXcQ",
        ] {
            cache.get_or_fetch(&reference(url), &credential(), &source).await;
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(cache.list_cached_references().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_under_concurrency() {
        let cache = Arc::new(cache());
        let source = Arc::new(CountingSource::new(true));
        let r = reference("abc12345678");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                let source = source.clone();
                let r = r.clone();
                tokio::spawn(async move { cache.get_or_fetch(&r, &credential(), source.as_ref()).await })
            })
            .collect();

        let records: Vec<Arc<ContentRecord>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|h| h.unwrap())
            .collect();

        assert_eq!(source.calls(), 1);
        assert!(records.iter().all(|rec| Arc::ptr_eq(rec, &records[0])));
        assert_eq!(records[0].content, "content #1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contended_references_each_fetch_once() {
        let cache = Arc::new(cache());
        let source = Arc::new(CountingSource::with_delay(true, Duration::from_millis(20)));
        let ids: Vec<String> = (0..50).map(|i| format!("video{:06}", i)).collect();

        let handles: Vec<_> = ids
            .iter()
            .flat_map(|id| std::iter::repeat(id.clone()).take(4))
            .map(|id| {
                let cache = cache.clone();
                let source = source.clone();
                tokio::spawn(async move {
                    cache.get_or_fetch(&reference(&id), &credential(), source.as_ref()).await
                })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.unwrap();
        }

        assert_eq!(source.calls(), 50);
        assert_eq!(cache.list_cached_references().len(), 50);

        cache.clear();
        assert!(cache.list_cached_references().is_empty());
        cache
            .get_or_fetch(&reference(&ids[0]), &credential(), source.as_ref())
            .await;
        assert_eq!(source.calls(), 51);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_references_fetch_in_parallel() {
        let cache = Arc::new(cache());
        let source = Arc::new(CountingSource::new(true));

        let started = std::time::Instant::now();
        let ids = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd"];
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let cache = cache.clone();
                let source = source.clone();
                let r = reference(id);
                tokio::spawn(async move { cache.get_or_fetch(&r, &credential(), source.as_ref()).await })
            })
            .collect();
        futures::future::join_all(handles).await;

        assert_eq!(source.calls(), 4);
        // Four serialized 50ms fetches would take at least 200ms.
        assert!(started.elapsed() < Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_failed_record_expires_after_ttl() {
        let cache = ContentCache::new(Duration::from_millis(300), None);
        let source = CountingSource::with_delay(false, Duration::ZERO);
        let r = reference("abc12345678");

        let first = cache.get_or_fetch(&r, &credential(), &source).await;
        assert!(!first.is_success());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let cached = cache.get_or_fetch(&r, &credential(), &source).await;
        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&first, &cached));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(cache.peek(&r).await.is_none());
        let refetched = cache.get_or_fetch(&r, &credential(), &source).await;
        assert_eq!(source.calls(), 2);
        assert!(!Arc::ptr_eq(&first, &refetched));
    }

    #[tokio::test]
    async fn test_success_outlives_failure_ttl() {
        let cache = ContentCache::new(Duration::from_millis(10), None);
        let source = CountingSource::with_delay(true, Duration::ZERO);
        let r = reference("abc12345678");

        cache.get_or_fetch(&r, &credential(), &source).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.get_or_fetch(&r, &credential(), &source).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_success_ttl_when_configured() {
        let cache = ContentCache::new(Duration::from_secs(300), Some(Duration::from_millis(100)));
        let source = CountingSource::with_delay(true, Duration::ZERO);
        let r = reference("abc12345678");

        cache.get_or_fetch(&r, &credential(), &source).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        cache.get_or_fetch(&r, &credential(), &source).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = cache();
        let source = CountingSource::new(true);
        let a = reference("aaaaaaaaaaa");
        let b = reference("bbbbbbbbbbb");

        cache.get_or_fetch(&a, &credential(), &source).await;
        cache.get_or_fetch(&b, &credential(), &source).await;
        assert_eq!(cache.list_cached_references(), vec![a.clone(), b.clone()]);

        assert!(cache.invalidate(&a).await);
        assert!(!cache.invalidate(&a).await);
        assert_eq!(cache.list_cached_references(), vec![b.clone()]);

        let refetched = cache.get_or_fetch(&a, &credential(), &source).await;
        assert_eq!(refetched.content, "content #3");

        cache.clear();
        assert!(cache.list_cached_references().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_stores_nothing_and_unblocks() {
        let cache = Arc::new(cache());
        let slow = CountingSource::with_delay(true, Duration::from_secs(30));
        let r = reference("abc12345678");

        let aborted = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_fetch(&r, &credential(), &slow),
        )
        .await;
        assert!(aborted.is_err());
        assert!(cache.peek(&r).await.is_none());

        let fast = CountingSource::with_delay(true, Duration::ZERO);
        let record = tokio::time::timeout(
            Duration::from_secs(5),
            cache.get_or_fetch(&r, &credential(), &fast),
        )
        .await
        .expect("a cancelled fetch must not block later callers");
        assert!(record.is_success());
        assert_eq!(fast.calls(), 1);
    }
}
