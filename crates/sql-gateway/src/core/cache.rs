use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::core::types::ResultSet;

/// Deterministic key over (query text, parameter sequence). Identical text
/// and identical parameter order always collide; any difference in value or
/// order produces a different key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

pub fn fingerprint(query: &str, params: &[serde_json::Value]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    // NUL separators keep (text, params) unambiguous under concatenation.
    hasher.update([0u8]);
    for p in params {
        hasher.update(p.to_string().as_bytes());
        hasher.update([0u8]);
    }
    Fingerprint(hasher.finalize().into())
}

#[derive(Debug)]
struct Entry {
    value: ResultSet,
    expires_at: Instant,
}

/// TTL-bounded memoization of materialized result sets.
///
/// Entries are evicted lazily: the first lookup at or past `expires_at`
/// removes the entry and reports a miss. There is no background sweep and
/// no entry bound. Cached data is advisory and re-derivable, so concurrent
/// stores to the same key racing last-write-wins is fine.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<HashMap<Fingerprint, Entry>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, key: Fingerprint) -> Option<ResultSet> {
        self.lookup_at(key, Instant::now())
    }

    pub fn store(&self, key: Fingerprint, value: ResultSet) {
        self.store_at(key, value, Instant::now());
    }

    /// Lookup with an explicit clock so tests can observe eviction
    /// deterministically.
    pub fn lookup_at(&self, key: Fingerprint, now: Instant) -> Option<ResultSet> {
        let mut guard = self.lock();
        match guard.get(&key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                guard.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn store_at(&self, key: Fingerprint, value: ResultSet, now: Instant) {
        let mut guard = self.lock();
        guard.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Remove every entry and return how many were removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.lock();
        let count = guard.len();
        guard.clear();
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Entry>> {
        // Cached data is advisory; a poisoned lock is still a usable map.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DbRow;
    use serde_json::json;

    fn set_of(n: i64) -> ResultSet {
        let mut row = DbRow::new();
        row.insert("n".into(), json!(n));
        ResultSet::new(vec![row])
    }

    #[test]
    fn round_trip_within_ttl() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = fingerprint("SELECT 1", &[]);
        cache.store(key, set_of(1));
        let hit = cache.lookup(key).expect("expected hit");
        assert_eq!(hit.row_count, 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let cache = QueryCache::new(Duration::from_secs(10));
        let key = fingerprint("SELECT 1", &[]);
        let t0 = Instant::now();
        cache.store_at(key, set_of(1), t0);

        assert!(cache.lookup_at(key, t0 + Duration::from_secs(9)).is_some());
        assert!(cache.lookup_at(key, t0 + Duration::from_secs(10)).is_none());
        // Entry was removed, not just skipped.
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn store_overwrites_existing_entry() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = fingerprint("SELECT 1", &[]);
        cache.store(key, set_of(1));
        cache.store(key, set_of(2));
        let hit = cache.lookup(key).expect("expected hit");
        assert_eq!(hit.rows[0]["n"], 2);
    }

    #[test]
    fn clear_reports_removed_count() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.store(fingerprint("SELECT 1", &[]), set_of(1));
        cache.store(fingerprint("SELECT 2", &[]), set_of(2));
        assert_eq!(cache.clear(), 2);
        assert!(cache.lookup(fingerprint("SELECT 1", &[])).is_none());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("SELECT * FROM T WHERE ID = ?", &[json!(1)]);
        let b = fingerprint("SELECT * FROM T WHERE ID = ?", &[json!(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_text_param_value_and_order() {
        let base = fingerprint("SELECT * FROM T WHERE A = ? AND B = ?", &[json!(1), json!(2)]);
        assert_ne!(
            base,
            fingerprint("SELECT * FROM U WHERE A = ? AND B = ?", &[json!(1), json!(2)])
        );
        assert_ne!(
            base,
            fingerprint("SELECT * FROM T WHERE A = ? AND B = ?", &[json!(1), json!(3)])
        );
        assert_ne!(
            base,
            fingerprint("SELECT * FROM T WHERE A = ? AND B = ?", &[json!(2), json!(1)])
        );
    }

    #[test]
    fn fingerprint_distinguishes_param_types() {
        let s = fingerprint("SELECT ?", &[json!("1")]);
        let n = fingerprint("SELECT ?", &[json!(1)]);
        assert_ne!(s, n);
    }
}
