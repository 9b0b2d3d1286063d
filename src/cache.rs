//! Single-flight task cache
//!
//! [`TaskCache::get_or_build`] runs at most one build per key. The build is
//! spawned on the runtime so it outlives the caller that started it:
//! every caller waits on the shared result and may give up through its own
//! cancellation token without stopping the build for the others.
//!
//! Failed builds are not kept; the next request for the key starts over.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Outcome<V> = Option<Result<Arc<V>>>;

struct Slot<V> {
    result: watch::Sender<Outcome<V>>,
    // set when the build finishes
    finished: Mutex<Option<Instant>>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        let (result, _) = watch::channel(None);
        Self {
            result,
            finished: Mutex::new(None),
        }
    }

    fn value(&self) -> Option<Arc<V>> {
        match &*self.result.borrow() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.finished.lock().is_some_and(|at| at.elapsed() >= ttl)
    }
}

type Slots<K, V> = Arc<Mutex<HashMap<K, Arc<Slot<V>>>>>;

/// Cache of values built by async tasks, one build per key
pub struct TaskCache<K, V> {
    name: &'static str,
    slots: Slots<K, V>,
}

impl<K, V> std::fmt::Debug for TaskCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCache")
            .field("name", &self.name)
            .field("len", &self.slots.lock().len())
            .finish()
    }
}

impl<K, V> TaskCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Empty cache; `name` shows up in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cached value for `key`, or the result of a build
    ///
    /// `builder` is only called when no build for `key` is cached or in
    /// flight. Cancelling `token` returns [`Error::Cancelled`] to this
    /// caller only.
    pub async fn get_or_build<F, Fut>(
        &self,
        key: K,
        token: &CancellationToken,
        builder: F,
    ) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (slot, is_new) = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = Arc::new(Slot::new());
                    slots.insert(key.clone(), slot.clone());
                    (slot, true)
                }
            }
        };

        if is_new {
            tracing::debug!(cache = self.name, ?key, "cache miss, building");
            self.spawn_build(key, slot.clone(), builder());
        } else {
            tracing::trace!(cache = self.name, ?key, "cache hit");
        }

        let mut rx = slot.result.subscribe();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            outcome = rx.wait_for(Option::is_some) => match outcome {
                Ok(outcome) => match &*outcome {
                    Some(result) => result.clone(),
                    None => Err(Error::Other("build finished without a result".to_string())),
                },
                Err(_) => Err(Error::Other("build abandoned".to_string())),
            },
        }
    }

    fn spawn_build<Fut>(&self, key: K, slot: Arc<Slot<V>>, build: Fut)
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let slots = self.slots.clone();
        let name = self.name;
        tokio::spawn(async move {
            // a panicking build must still wake its waiters
            let result = match tokio::spawn(build).await {
                Ok(result) => result.map(Arc::new),
                Err(e) => Err(Error::Other(format!("build task failed: {}", e))),
            };

            if let Err(e) = &result {
                tracing::debug!(cache = name, ?key, error = %e, "build failed, dropping slot");
                let mut slots = slots.lock();
                if slots.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    slots.remove(&key);
                }
            }
            *slot.finished.lock() = Some(Instant::now());
            slot.result.send_replace(Some(result));
        });
    }

    /// Finished value for `key`, without building
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.slots.lock().get(key).and_then(|slot| slot.value())
    }

    /// Whether a build for `key` is cached or in flight
    pub fn contains(&self, key: &K) -> bool {
        self.slots.lock().contains_key(key)
    }

    /// Forget `key`; waiters of an in-flight build still get its result
    pub fn evict(&self, key: &K) -> bool {
        let removed = self.slots.lock().remove(key).is_some();
        if removed {
            tracing::debug!(cache = self.name, ?key, "evicted");
        }
        removed
    }

    /// Forget entries finished more than `ttl` ago, returning how many went
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_expired(ttl));
        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::debug!(cache = self.name, evicted, "expired entries evicted");
        }
        evicted
    }

    /// Number of cached or in-flight keys
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
