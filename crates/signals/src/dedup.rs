use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Set of tokens already picked up for validation. A claim is the only way
/// in, so two concurrent deliveries of the same token cannot both proceed.
#[derive(Debug)]
pub struct DedupCache {
    claims: Mutex<HashMap<String, Instant>>,
    retention: Option<Duration>,
}

impl DedupCache {
    /// `retention == None` keeps claims for the life of the process.
    pub fn new(retention: Option<Duration>) -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn try_claim(&self, token: &str) -> bool {
        self.try_claim_at(token, Instant::now())
    }

    pub fn try_claim_at(&self, token: &str, now: Instant) -> bool {
        let mut claims = self.lock();
        if claims.contains_key(token) {
            return false;
        }
        claims.insert(token.to_string(), now);
        true
    }

    pub fn release(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// Drops claims older than the retention window. Returns how many were
    /// removed.
    pub fn prune(&self, now: Instant) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let mut claims = self.lock();
        let before = claims.len();
        claims.retain(|_, claimed_at| now.saturating_duration_since(*claimed_at) < retention);
        before - claims.len()
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn second_claim_is_refused() {
        let cache = DedupCache::new(None);
        assert!(cache.try_claim("Mint"));
        assert!(!cache.try_claim("Mint"));
        assert!(cache.try_claim("Other"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_claims_admit_exactly_one() {
        let cache = Arc::new(DedupCache::new(None));
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if cache.try_claim("Mint") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("claimer");
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_allows_a_retry() {
        let cache = DedupCache::new(None);
        assert!(cache.try_claim("Mint"));
        assert!(cache.release("Mint"));
        assert!(!cache.release("Mint"));
        assert!(cache.try_claim("Mint"));
    }

    #[test]
    fn prune_respects_retention() {
        let cache = DedupCache::new(Some(Duration::from_secs(60)));
        let start = Instant::now();
        assert!(cache.try_claim_at("Old", start));
        assert!(cache.try_claim_at("Fresh", start + Duration::from_secs(50)));
        assert_eq!(cache.prune(start + Duration::from_secs(70)), 1);
        assert!(cache.try_claim("Old"));
        assert!(!cache.try_claim("Fresh"));
    }

    #[test]
    fn unbounded_retention_never_prunes() {
        let cache = DedupCache::new(None);
        let start = Instant::now();
        assert!(cache.try_claim_at("Mint", start));
        assert_eq!(cache.prune(start + Duration::from_secs(86_400)), 0);
        assert_eq!(cache.len(), 1);
    }
}
