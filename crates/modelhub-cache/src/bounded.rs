use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use crate::time::Instant;

/// A single cached value together with its bookkeeping data.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    /// Monotonic insertion number, used for eviction ordering.
    ///
    /// Timestamps alone cannot order evictions, as two insertions can share
    /// an [`Instant`] when the test clock is paused.
    sequence: u64,
}

/// A size-bounded, time-bounded cache with caller-defined refresh.
///
/// Entries are refreshed through the retrieval function passed to
/// [`get_with`](Self::get_with) whenever they are absent or older than the
/// TTL. Staleness is only ever checked lazily at lookup time; there is no
/// background sweep. When an insertion pushes the cache over capacity, the
/// oldest-inserted entry other than the one just written is evicted.
///
/// The cache takes `&mut self` and has no interior locking. Callers that
/// share one instance across tasks are expected to wrap the owning structure
/// in a single coarse-grained mutex.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    capacity: usize,
    ttl: Duration,
    sequence: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a new cache holding at most `capacity` entries, each valid
    /// for `ttl` after insertion.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1");
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            ttl,
            sequence: 0,
        }
    }

    /// Returns the cached value for `key`, refreshing it if needed.
    ///
    /// A fresh entry is returned as-is. Otherwise `retrieve` is invoked with
    /// the key and the previously cached value (if any, even an expired one),
    /// and its result is stored with a new timestamp before being returned.
    ///
    /// Retrieval errors propagate to the caller and leave the cache
    /// unchanged; an expired previous entry remains in place but will never
    /// be served.
    pub async fn get_with<F, Fut, E>(&mut self, key: K, retrieve: F) -> Result<V, E>
    where
        F: FnOnce(K, Option<V>) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(entry) = self.entries.get(&key) {
            if entry.created_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let previous = self.entries.get(&key).map(|entry| entry.value.clone());
        let value = retrieve(key.clone(), previous).await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn insert(&mut self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.entries.insert(key.clone(), entry);

        if self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|(candidate, _)| **candidate != key)
                .min_by_key(|(_, entry)| entry.sequence)
                .map(|(candidate, _)| candidate.clone());
            if let Some(oldest) = oldest {
                tracing::debug!("evicting oldest cache entry to stay within capacity");
                self.entries.remove(&oldest);
            }
        }
    }

    /// Removes all entries. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The number of currently cached entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry for `key` exists, expired or not.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::{self, Duration};

    use super::*;

    /// A retrieval function that counts its invocations and returns the
    /// invocation number.
    struct Counter {
        calls: AtomicUsize,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }

        async fn retrieve(&self, _key: String, _previous: Option<usize>) -> Result<usize, Infallible> {
            Ok(self.calls.fetch_add(1, Ordering::Relaxed))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_are_served_without_retrieval() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(10, Duration::from_secs(60));

        let first = cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();
        time::advance(Duration::from_secs(30)).await;
        let second = cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();

        assert_eq!((first, second), (0, 0));
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_trigger_a_refresh() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(10, Duration::from_secs(60));

        cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();
        time::advance(Duration::from_secs(60)).await;
        let refreshed = cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();

        assert_eq!(refreshed, 1);
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_sees_the_previous_value() {
        let mut cache: BoundedCache<&str, usize> = BoundedCache::new(10, Duration::from_secs(1));

        cache
            .get_with("a", |_, _| async { Ok::<_, Infallible>(7) })
            .await
            .unwrap();
        time::advance(Duration::from_secs(2)).await;

        let mut seen = None;
        cache
            .get_with("a", |_, previous| {
                seen = previous;
                async { Ok::<_, Infallible>(8) }
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_is_never_exceeded() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(3, Duration::from_secs(60));

        for i in 0..10 {
            cache
                .get_with(format!("key-{i}"), |k, p| counter.retrieve(k, p))
                .await
                .unwrap();
            assert!(cache.len() <= 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_follows_insertion_order() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(2, Duration::from_secs(60));

        for key in ["a", "b", "c"] {
            cache
                .get_with(key.to_owned(), |k, p| counter.retrieve(k, p))
                .await
                .unwrap();
        }

        assert!(!cache.contains(&"a".to_owned()));
        assert!(cache.contains(&"b".to_owned()));
        assert!(cache.contains(&"c".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn the_entry_just_written_is_never_evicted() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(1, Duration::from_secs(60));

        cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();
        cache
            .get_with("b".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"b".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn retrieval_errors_propagate_and_are_not_cached() {
        let counter = Counter::new();
        let mut cache: BoundedCache<&str, usize> = BoundedCache::new(10, Duration::from_secs(60));

        let result = cache
            .get_with("a", |_, _| async { Err::<usize, _>("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());

        // The next lookup tries again instead of caching the failure.
        let value = cache
            .get_with("a", |k, p| async move {
                counter.retrieve(k.to_owned(), p).await.map_err(|_| "boom")
            })
            .await
            .unwrap();
        assert_eq!(value, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent() {
        let counter = Counter::new();
        let mut cache = BoundedCache::new(10, Duration::from_secs(60));

        cache.clear();
        cache
            .get_with("a".to_owned(), |k, p| counter.retrieve(k, p))
            .await
            .unwrap();
        cache.clear();
        cache.clear();

        assert!(cache.is_empty());
    }
}
