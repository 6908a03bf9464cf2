//! Time-indexed set of outstanding nonces with per-nonce payloads and
//! TTLs (spec §4.7). Generalizes the teacher's `PacketCache`
//! (`styrene-rns-transport/src/transport/packet_cache.rs`: a hash-keyed
//! map with an `elapsed()`-driven `release(duration)` sweep) by threading
//! an explicit `now` through every call instead of calling `Instant::now()`
//! internally, so the simulator's virtual clock can drive it identically
//! to the production timer.
//!
//! Not thread-safe by design (spec §5: "The NonceManager is NOT
//! thread-safe; it lives inside exactly one actor").

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NonceManagerError {
    #[error("nonce already present")]
    AlreadyPresent,
    #[error("no such nonce")]
    NoSuchNonce,
}

struct Entry<V> {
    value: Option<V>,
    expires_at: Instant,
}

/// Maps nonce → (optional payload, expiry). All operations take an
/// explicit `now` rather than sampling the clock themselves.
pub struct NonceManager<N, V> {
    entries: HashMap<N, Entry<V>>,
}

impl<N: Eq + Hash + Clone, V> Default for NonceManager<N, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Eq + Hash + Clone, V> NonceManager<N, V> {
    pub fn new() -> Self {
        NonceManager {
            entries: HashMap::new(),
        }
    }

    /// Registers `nonce`, expiring at `now + ttl`. Fails if `nonce` is
    /// already present.
    pub fn add_nonce(
        &mut self,
        now: Instant,
        ttl: Duration,
        nonce: N,
        payload: Option<V>,
    ) -> Result<(), NonceManagerError> {
        if self.entries.contains_key(&nonce) {
            return Err(NonceManagerError::AlreadyPresent);
        }
        self.entries.insert(
            nonce,
            Entry {
                value: payload,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    pub fn assign_value(&mut self, nonce: &N, payload: V) -> Result<(), NonceManagerError> {
        let entry = self
            .entries
            .get_mut(nonce)
            .ok_or(NonceManagerError::NoSuchNonce)?;
        entry.value = Some(payload);
        Ok(())
    }

    pub fn nonce_value(&self, nonce: &N) -> Option<&V> {
        self.entries.get(nonce).and_then(|e| e.value.as_ref())
    }

    pub fn is_nonce_present(&self, nonce: &N) -> bool {
        self.entries.contains_key(nonce)
    }

    pub fn remove_nonce(&mut self, nonce: &N) -> Result<(), NonceManagerError> {
        self.entries
            .remove(nonce)
            .map(|_| ())
            .ok_or(NonceManagerError::NoSuchNonce)
    }

    /// Removes every entry with `expires_at <= now`, returning the
    /// duration until the next expiry, or `None` if nothing remains.
    pub fn process(&mut self, now: Instant) -> Option<Duration> {
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries
            .values()
            .map(|entry| entry.expires_at.saturating_duration_since(now))
            .min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_round_trips() {
        let mut mgr: NonceManager<u64, &'static str> = NonceManager::new();
        let now = Instant::now();
        mgr.add_nonce(now, Duration::from_secs(1), 1, Some("hi")).unwrap();
        assert!(mgr.is_nonce_present(&1));
        assert_eq!(mgr.nonce_value(&1), Some(&"hi"));
        mgr.remove_nonce(&1).unwrap();
        assert!(!mgr.is_nonce_present(&1));
    }

    #[test]
    fn adding_the_same_nonce_twice_fails() {
        let mut mgr: NonceManager<u64, ()> = NonceManager::new();
        let now = Instant::now();
        mgr.add_nonce(now, Duration::from_secs(1), 1, None).unwrap();
        assert_eq!(
            mgr.add_nonce(now, Duration::from_secs(1), 1, None).unwrap_err(),
            NonceManagerError::AlreadyPresent
        );
    }

    /// NonceManager TTL (spec testable property 7): for any nonce added at
    /// t with ttl τ, `is_nonce_present` is true at every `process(s)` with
    /// s < t + τ, and false after `process(s)` with s >= t + τ.
    #[test]
    fn ttl_governs_presence_exactly_at_the_boundary() {
        let mut mgr: NonceManager<u64, ()> = NonceManager::new();
        let t = Instant::now();
        let ttl = Duration::from_millis(100);
        mgr.add_nonce(t, ttl, 1, None).unwrap();

        mgr.process(t + Duration::from_millis(99));
        assert!(mgr.is_nonce_present(&1));

        mgr.process(t + ttl);
        assert!(!mgr.is_nonce_present(&1));
    }

    #[test]
    fn process_returns_time_until_next_expiry() {
        let mut mgr: NonceManager<u64, ()> = NonceManager::new();
        let t = Instant::now();
        mgr.add_nonce(t, Duration::from_millis(50), 1, None).unwrap();
        mgr.add_nonce(t, Duration::from_millis(200), 2, None).unwrap();
        let next = mgr.process(t).unwrap();
        assert_eq!(next, Duration::from_millis(50));
    }

    #[test]
    fn process_returns_none_when_empty() {
        let mut mgr: NonceManager<u64, ()> = NonceManager::new();
        assert_eq!(mgr.process(Instant::now()), None);
    }
}
