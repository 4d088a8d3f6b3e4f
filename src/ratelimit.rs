use std::sync::atomic::{
    AtomicU32,
    Ordering,
};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

/// Allow a client key a fixed number of requests inside a fixed window.
///
/// Counters live in a cache whose entries expire `period` after first
/// write, so each client gets its own window starting at its first request
/// and reset on first use after expiry. One instance covers one scope; the
/// service keeps separate instances for uploads and reads.
pub struct RateLimiter {
    hits: Cache<String, Arc<AtomicU32>>,
    capacity: u32,
}

impl RateLimiter {
    pub fn new(period: Duration, capacity: u32) -> RateLimiter {
        RateLimiter {
            hits: Cache::builder()
                .time_to_live(period)
                .build(),
            capacity: capacity,
        }
    }

    /// Count one request for the client. Returns true if the request must
    /// be rejected.
    pub fn check(&self, client: &str) -> bool {
        let counter = self.hits.get_with(String::from(client), || {
            Arc::new(AtomicU32::new(0))
        });
        counter.fetch_add(1, Ordering::SeqCst) + 1 > self.capacity
    }
}
