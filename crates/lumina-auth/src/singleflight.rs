//! Single-flight request manager.
//!
//! Deduplicates concurrent identical fetches and caches successful results
//! for a short time-to-live. For a given key there is at most one in-flight
//! producer; concurrent callers await the same pending result. Failed
//! attempts are never cached, so the next caller retries the producer rather
//! than observing a stale error.
//!
//! Readers never touch the cache except through [`SingleFlight::execute`];
//! mutators announce themselves through [`SingleFlight::invalidate`]. That
//! keeps the one-outstanding-request invariant intact no matter how many
//! components ask for the same data at once.
//!
//! # Example
//!
//! ```ignore
//! use lumina_auth::singleflight::SingleFlight;
//! use std::time::Duration;
//!
//! let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(5));
//! let value = flights.execute("profile:u1", || async { Ok(42) }).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;

use crate::error::FetchError;

// =============================================================================
// Slots
// =============================================================================

/// One cache slot per key.
enum Slot<T> {
    /// A producer is running; followers subscribe to its result.
    InFlight {
        tx: broadcast::Sender<Result<T, FetchError>>,
        flight_id: u64,
    },

    /// A successful result, fresh until `stored_at + ttl`.
    Cached { value: T, stored_at: Instant },
}

// =============================================================================
// Single Flight
// =============================================================================

/// Deduplicating, short-TTL cache for one result type.
///
/// The profile fetch and the role fetch each get their own `SingleFlight`
/// instance; keys are strings such as `profile:<user-id>`.
pub struct SingleFlight<T> {
    slots: Arc<Mutex<HashMap<String, Slot<T>>>>,
    ttl: Duration,
    next_flight_id: AtomicU64,
    hits: AtomicU64,
    leaders: AtomicU64,
    followers: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a new manager whose successful results stay fresh for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            next_flight_id: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            leaders: AtomicU64::new(0),
            followers: AtomicU64::new(0),
        }
    }

    /// Produce or join the value for `key`.
    ///
    /// Exactly one of the concurrent callers runs `producer`; the rest await
    /// its result. The producer is driven by a spawned task, so cancelling a
    /// caller (component unmount) never strands the others.
    ///
    /// # Errors
    ///
    /// Returns the producer's error. Errors are delivered to every waiting
    /// caller but never cached.
    pub async fn execute<F, Fut>(&self, key: &str, producer: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (mut rx, flight_id) = {
            let mut slots = self.slots.lock().await;

            if let Some(Slot::Cached { value, stored_at }) = slots.get(key) {
                if stored_at.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value.clone());
                }
            }

            if let Some(Slot::InFlight { tx, flight_id }) = slots.get(key) {
                self.followers.fetch_add(1, Ordering::Relaxed);
                (tx.subscribe(), *flight_id)
            } else {
                let flight_id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = broadcast::channel(1);
                slots.insert(
                    key.to_string(),
                    Slot::InFlight {
                        tx: tx.clone(),
                        flight_id,
                    },
                );
                self.leaders.fetch_add(1, Ordering::Relaxed);

                let slots_handle = Arc::clone(&self.slots);
                let key_owned = key.to_string();
                let fut = producer();
                tokio::spawn(async move {
                    let result = fut.await;
                    let mut slots = slots_handle.lock().await;
                    // Only publish into a slot this flight still owns; an
                    // invalidate during the flight discards the result.
                    let owns_slot = matches!(
                        slots.get(&key_owned),
                        Some(Slot::InFlight { flight_id: current, .. }) if *current == flight_id
                    );
                    if owns_slot {
                        match &result {
                            Ok(value) => {
                                slots.insert(
                                    key_owned,
                                    Slot::Cached {
                                        value: value.clone(),
                                        stored_at: Instant::now(),
                                    },
                                );
                            }
                            Err(error) => {
                                tracing::debug!(error = %error, "flight failed, not caching");
                                slots.remove(&key_owned);
                            }
                        }
                    }
                    drop(slots);
                    let _ = tx.send(result);
                });
                (rx, flight_id)
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => {
                // The producer task died without publishing. Clear the slot
                // so the next caller starts a fresh flight.
                self.abandon(key, flight_id).await;
                Err(FetchError::internal("request producer dropped"))
            }
        }
    }

    /// Force a miss for `key`.
    ///
    /// Call after a known mutation (e.g. onboarding completion) so the next
    /// read observes fresh data. An in-flight request for the key keeps
    /// serving its waiters but its result is not cached.
    pub async fn invalidate(&self, key: &str) {
        let mut slots = self.slots.lock().await;
        if slots.remove(key).is_some() {
            tracing::debug!(key, "cache key invalidated");
        }
    }

    /// Drop every cached and in-flight slot.
    pub async fn invalidate_all(&self) {
        let mut slots = self.slots.lock().await;
        let dropped = slots.len();
        slots.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "cache cleared");
        }
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> SingleFlightStats {
        SingleFlightStats {
            hits: self.hits.load(Ordering::Relaxed),
            leaders: self.leaders.load(Ordering::Relaxed),
            followers: self.followers.load(Ordering::Relaxed),
        }
    }

    /// Remove a dead in-flight slot left behind by a crashed producer.
    async fn abandon(&self, key: &str, flight_id: u64) {
        let mut slots = self.slots.lock().await;
        let is_same_flight = matches!(
            slots.get(key),
            Some(Slot::InFlight { flight_id: current, .. }) if *current == flight_id
        );
        if is_same_flight {
            slots.remove(key);
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Statistics about a single-flight manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleFlightStats {
    /// Calls served from the fresh cache.
    pub hits: u64,

    /// Calls that ran a producer.
    pub leaders: u64,

    /// Calls that joined an existing flight.
    pub followers: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_producer(
        calls: Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32, FetchError>> + Send + 'static {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_producer() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new(Duration::from_secs(5)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .execute("profile:u1", || counting_producer(calls, 7))
                    .await
            }));
        }

        for result in futures_util::future::join_all(handles).await {
            assert_eq!(result.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = flights.stats();
        assert_eq!(stats.leaders, 1);
        assert_eq!(stats.hits + stats.followers, 9);
    }

    #[tokio::test]
    async fn test_fresh_result_is_cached() {
        let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let value = flights
                .execute("profile:u1", || counting_producer(Arc::clone(&calls), 7))
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.stats().hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_reruns_producer() {
        let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 7))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 8))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_first = Arc::clone(&calls);
        let err = flights
            .execute("profile:u1", move || async move {
                calls_first.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::network("connection reset"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));

        // The error was not cached; the next call runs the producer again.
        let value = flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 7))
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_miss() {
        let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 7))
            .await
            .unwrap();
        flights.invalidate("profile:u1").await;

        let value = flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 8))
            .await
            .unwrap();
        assert_eq!(value, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_during_flight_discards_result() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let flights_bg = Arc::clone(&flights);
        let calls_bg = Arc::clone(&calls);
        let flight = tokio::spawn(async move {
            flights_bg
                .execute("profile:u1", || counting_producer(calls_bg, 7))
                .await
        });

        // Let the flight start, then invalidate underneath it.
        tokio::time::sleep(Duration::from_millis(10)).await;
        flights.invalidate("profile:u1").await;

        // Waiters still get the in-flight result.
        assert_eq!(flight.await.unwrap().unwrap(), 7);

        // But the result was not cached: the next call is a fresh flight.
        flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 9))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let flights: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        flights
            .execute("profile:u1", || counting_producer(Arc::clone(&calls), 1))
            .await
            .unwrap();
        flights
            .execute("profile:u2", || counting_producer(Arc::clone(&calls), 2))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
