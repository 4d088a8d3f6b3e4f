use std::sync::{
    Arc,
    Condvar,
    Mutex,
};
use std::time::Duration;

use log::{
    error,
    info,
};
use moka::sync::Cache;

use crate::pool::Workers;
use crate::record::Record;
use crate::store::{
    ContentStore,
    StoreError,
};

/// A shared handle for a record that may still be loading or saving.
///
/// Every concurrent requester for one key holds the same promise, so at
/// most one load is in flight per key. The upload path installs an
/// unresolved promise in the cache before the disk write is queued, which
/// is what makes a key readable the moment its 201 goes out.
pub struct Promise {
    value: Mutex<Option<Result<Arc<Record>, StoreError>>>,
    cond: Condvar,
}

impl Promise {
    pub fn new() -> Promise {
        Promise {
            value: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Resolve the promise and wake all waiters. Later resolutions of an
    /// already resolved promise are ignored.
    pub fn resolve(&self, v: Result<Arc<Record>, StoreError>) {
        let mut state = self.value.lock().unwrap();
        if state.is_none() {
            *state = Some(v);
            self.cond.notify_all();
        }
    }

    /// Block until resolution.
    pub fn wait(&self) -> Result<Arc<Record>, StoreError> {
        let mut state = self.value.lock().unwrap();
        while state.is_none() {
            state = self.cond.wait(state).unwrap();
        }
        state.as_ref().unwrap().clone()
    }

    /// Cache weight of the entry: the stored body length once resolved,
    /// nothing while pending.
    pub fn weight(&self) -> u32 {
        match &*self.value.lock().unwrap() {
            Some(Ok(v)) => v.body.len() as u32,
            _ => 0,
        }
    }
}

/// In-memory cache over the content store.
///
/// Total weight is bounded by the configured byte budget, entries idle out
/// after the cache TTL, and a miss triggers exactly one disk load however
/// many requests pile up on the key. A key resolved to the empty sentinel
/// stays cached, so repeated requests for an unknown key short-circuit
/// without disk reads until the entry idles out.
#[derive(Clone)]
pub struct ContentCache {
    inner: Cache<String, Arc<Promise>>,
    store: Arc<ContentStore>,
    pool: Arc<Workers>,
}

impl ContentCache {
    /// # Arguments
    ///
    /// * `store` - Backing store for misses.
    /// * `pool` - Pool the loads run on.
    /// * `max_bytes` - Total weight bound over cached body lengths.
    /// * `idle` - Idle expiry for entries.
    pub fn new(store: Arc<ContentStore>, pool: Arc<Workers>, max_bytes: u64, idle: Duration) -> ContentCache {
        let inner = Cache::builder()
            .max_capacity(max_bytes)
            .weigher(|_key: &String, promise: &Arc<Promise>| promise.weight())
            .time_to_idle(idle)
            .build();
        ContentCache {
            inner: inner,
            store: store,
            pool: pool,
        }
    }

    /// Look up a key, scheduling a store load on miss and blocking until
    /// the entry resolves.
    pub fn get(&self, key: &str) -> Result<Arc<Record>, StoreError> {
        let promise = self.inner.get_with(String::from(key), || self.load(key));
        promise.wait()
    }

    /// Install an entry for a key directly, bypassing the loader.
    pub fn put(&self, key: &str, promise: Arc<Promise>) {
        self.inner.insert(String::from(key), promise);
    }

    fn load(&self, key: &str) -> Arc<Promise> {
        let promise = Arc::new(Promise::new());
        let handle = promise.clone();
        let store = self.store.clone();
        let inner = self.inner.clone();
        let key = String::from(key);
        self.pool.execute(move || {
            info!("loading {} from disk", &key);
            match store.load(&key) {
                Ok(v) => {
                    handle.resolve(Ok(Arc::new(v)));
                    // reinsert so the weigher sees the resolved size
                    inner.insert(key, handle);
                },
                Err(e) => {
                    error!("load {} failed: {}", &key, e);
                    handle.resolve(Err(e));
                    inner.invalidate(&key);
                },
            };
        });
        promise
    }
}
