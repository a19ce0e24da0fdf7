use std::{sync::Arc, time::Duration};

use consumption_client::domain::Address;

use super::{AddressLookup, Sleeper, TokioSleeper};
use crate::cache::RecencyCache;

pub const DEFAULT_ADDRESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed-delay retry policy for the remote lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

pub fn cache_key(meter_id: i64) -> String {
    format!("address-{meter_id}")
}

/// Cache-aside address resolution that never fails.
///
/// A miss goes to the remote lookup under [`RetryPolicy`]. Successful answers
/// are cached for `ttl`; when every attempt fails the shared fallback address
/// is returned and nothing is cached.
pub struct AddressResolver {
    lookup: Arc<dyn AddressLookup>,
    cache: Arc<RecencyCache<Arc<Address>>>,
    retry: RetryPolicy,
    ttl: Duration,
    sleeper: Arc<dyn Sleeper>,
    fallback: Arc<Address>,
}

impl AddressResolver {
    pub fn new(
        lookup: Arc<dyn AddressLookup>,
        cache: Arc<RecencyCache<Arc<Address>>>,
        retry: RetryPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            lookup,
            cache,
            retry,
            ttl,
            sleeper: Arc::new(TokioSleeper),
            fallback: Arc::new(Address::fallback()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache(&self) -> &Arc<RecencyCache<Arc<Address>>> {
        &self.cache
    }

    pub async fn resolve_address(&self, meter_id: i64) -> Arc<Address> {
        let key = cache_key(meter_id);

        if let Some(address) = self.cache.get(&key) {
            metrics::counter!("address_cache_hits_total").increment(1);
            return address;
        }
        metrics::counter!("address_cache_misses_total").increment(1);

        match self.lookup_with_retry(meter_id).await {
            Some(address) => {
                let address = Arc::new(address);
                self.cache.set(&key, address.clone(), self.ttl);
                address
            }
            None => {
                tracing::warn!(meter_id, "address lookup exhausted retries, using fallback address");
                metrics::counter!("address_lookup_fallback_total").increment(1);
                self.fallback.clone()
            }
        }
    }

    async fn lookup_with_retry(&self, meter_id: i64) -> Option<Address> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.lookup.lookup(meter_id).await {
                Ok(address) => return Some(address),
                Err(e) if attempt < attempts => {
                    tracing::warn!(error = %e, meter_id, attempt, "address lookup failed, retrying");
                    metrics::counter!("address_lookup_retry_total").increment(1);
                    self.sleeper.sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, meter_id, attempt, "address lookup failed, giving up");
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::LookupError;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Fails the first `failures` calls, then answers.
    struct FlakyLookup {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyLookup {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AddressLookup for FlakyLookup {
        async fn lookup(&self, meter_id: i64) -> Result<Address, LookupError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(LookupError::Status(503));
            }
            Ok(Address {
                meter_id,
                address: format!("{meter_id} Main St"),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().expect("sleeper lock").push(duration);
        }
    }

    fn resolver(lookup: Arc<FlakyLookup>, sleeper: Arc<RecordingSleeper>) -> AddressResolver {
        AddressResolver::new(
            lookup,
            Arc::new(RecencyCache::default()),
            RetryPolicy::default(),
            DEFAULT_ADDRESS_TTL,
        )
        .with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn cache_hit_skips_remote_lookup() {
        let lookup = FlakyLookup::new(0);
        let sleeper = Arc::new(RecordingSleeper::default());
        let resolver = resolver(lookup.clone(), sleeper);
        resolver.cache().set(
            &cache_key(1),
            Arc::new(Address {
                meter_id: 1,
                address: "Cached Rd".to_string(),
            }),
            DEFAULT_ADDRESS_TTL,
        );

        let addr = resolver.resolve_address(1).await;

        assert_eq!(addr.address, "Cached Rd");
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn successful_lookup_is_cached() {
        let lookup = FlakyLookup::new(0);
        let resolver = resolver(lookup.clone(), Arc::new(RecordingSleeper::default()));

        let first = resolver.resolve_address(2).await;
        let second = resolver.resolve_address(2).await;

        assert_eq!(first.address, "2 Main St");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lookup.calls(), 1);
        assert!(resolver.cache().get(&cache_key(2)).is_some());
    }

    #[tokio::test]
    async fn single_failure_is_retried_after_backoff() {
        let lookup = FlakyLookup::new(1);
        let sleeper = Arc::new(RecordingSleeper::default());
        let resolver = resolver(lookup.clone(), sleeper.clone());

        let addr = resolver.resolve_address(3).await;

        assert_eq!(addr.address, "3 Main St");
        assert_eq!(lookup.calls(), 2);
        assert_eq!(*sleeper.slept.lock().expect("lock"), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn two_failures_fall_back_without_caching() {
        let lookup = FlakyLookup::new(2);
        let resolver = resolver(lookup.clone(), Arc::new(RecordingSleeper::default()));

        let addr = resolver.resolve_address(4).await;

        assert_eq!(*addr, Address::fallback());
        assert_eq!(lookup.calls(), 2);
        assert!(resolver.cache().get(&cache_key(4)).is_none());
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn attempt_count_is_configurable() {
        let lookup = FlakyLookup::new(3);
        let sleeper = Arc::new(RecordingSleeper::default());
        let resolver = AddressResolver::new(
            lookup.clone(),
            Arc::new(RecencyCache::default()),
            RetryPolicy {
                max_attempts: 4,
                backoff: Duration::from_millis(10),
            },
            DEFAULT_ADDRESS_TTL,
        )
        .with_sleeper(sleeper.clone());

        let addr = resolver.resolve_address(5).await;

        assert_eq!(addr.address, "5 Main St");
        assert_eq!(lookup.calls(), 4);
        assert_eq!(sleeper.slept.lock().expect("lock").len(), 3);
    }
}
