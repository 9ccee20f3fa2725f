//! Opportunity cache.
//!
//! Memoizes evaluated paths keyed by token set and strategy so a repeat
//! scan over the same universe can skip a cold search. Entries expire
//! lazily on read; there is no background sweep to wake an idle cache.
//! Over capacity, the lowest-scored entry goes first, oldest insertion
//! breaking ties.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::search::{ArbitragePath, ResolvedStrategy};

#[derive(Debug)]
struct CacheEntry {
    path: ArbitragePath,
    score: f64,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

pub struct OpportunityCache {
    enabled: bool,
    max_entries: usize,
    ttl: Duration,
    /// Entries scoring below this are not worth remembering.
    min_score: f64,
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl OpportunityCache {
    pub fn new(enabled: bool, max_entries: usize, ttl: Duration, min_score: f64) -> Self {
        Self {
            enabled,
            max_entries,
            ttl,
            min_score,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache key: the sorted token universe plus the strategy that searched
    /// it. Different strategies may surface different cycles over the same
    /// tokens.
    pub fn key(tokens: &[Address], strategy: ResolvedStrategy) -> String {
        let mut sorted: Vec<String> = tokens.iter().map(|t| format!("{t:?}")).collect();
        sorted.sort();
        format!("{strategy}:{}", sorted.join(","))
    }

    /// Live entry for the key, or nothing. Expired entries are removed on
    /// the spot.
    pub fn get(&mut self, key: &str) -> Option<ArbitragePath> {
        if !self.enabled {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits += 1;
                Some(entry.path.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert and, while over capacity, evict the lowest-scored entry
    /// (oldest insertion on ties).
    pub fn put(&mut self, key: String, path: ArbitragePath, score: f64) {
        if !self.enabled || self.max_entries == 0 {
            return;
        }
        if score < self.min_score {
            debug!(score, floor = self.min_score, "cache skip: score below floor");
            return;
        }

        self.entries.insert(
            key,
            CacheEntry {
                path,
                score,
                inserted_at: Instant::now(),
                ttl: self.ttl,
            },
        );

        while self.entries.len() > self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by(|(_, a), (_, b)| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.inserted_at.cmp(&b.inserted_at))
                })
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    debug!(key = %k, "cache eviction");
                    self.entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn hit_rate(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Dex;
    use crate::search::Hop;
    use alloy_primitives::U256;

    fn path(tag: u8) -> ArbitragePath {
        let hops = vec![
            Hop {
                pool: Address::repeat_byte(tag),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(2),
                amount_in: U256::from(100u64),
                amount_out: U256::from(100u64),
                price_impact: 0.0,
                gas_estimate: 150_000,
            },
            Hop {
                pool: Address::repeat_byte(tag + 1),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(2),
                token_out: Address::repeat_byte(1),
                amount_in: U256::from(100u64),
                amount_out: U256::from(102u64),
                price_impact: 0.0,
                gas_estimate: 150_000,
            },
        ];
        ArbitragePath::new(hops, U256::from(100u64), 0.0, false)
    }

    fn cache(max_entries: usize, ttl: Duration) -> OpportunityCache {
        OpportunityCache::new(true, max_entries, ttl, 0.0)
    }

    #[test]
    fn put_then_get_roundtrip() {
        let mut cache = cache(4, Duration::from_secs(60));
        cache.put("k1".into(), path(10), 0.5);
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k2").is_none());
    }

    #[test]
    fn capacity_bound_holds_under_any_put_sequence() {
        let mut cache = cache(3, Duration::from_secs(60));
        for i in 0..20u8 {
            cache.put(format!("k{i}"), path(i), (i as f64) / 20.0);
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn eviction_removes_lowest_score() {
        let mut cache = cache(2, Duration::from_secs(60));
        cache.put("a".into(), path(10), 0.9);
        cache.put("b".into(), path(20), 0.3);
        cache.put("c".into(), path(30), 0.6);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none(), "lowest score must be evicted");
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn eviction_ties_break_to_oldest() {
        let mut cache = cache(2, Duration::from_secs(60));
        cache.put("old".into(), path(10), 0.5);
        std::thread::sleep(Duration::from_millis(5));
        cache.put("new".into(), path(20), 0.5);
        cache.put("top".into(), path(30), 0.9);

        assert!(cache.get("old").is_none(), "oldest tie must go first");
        assert!(cache.get("new").is_some());
        assert!(cache.get("top").is_some());
    }

    #[test]
    fn expired_entries_never_returned() {
        let mut cache = cache(4, Duration::ZERO);
        cache.put("k".into(), path(10), 0.8);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0, "expired entry removed on read");
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let mut cache = OpportunityCache::new(false, 4, Duration::from_secs(60), 0.0);
        cache.put("k".into(), path(10), 0.9);
        assert_eq!(cache.len(), 0);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn score_floor_filters_inserts() {
        let mut cache = OpportunityCache::new(true, 4, Duration::from_secs(60), 0.5);
        cache.put("low".into(), path(10), 0.2);
        cache.put("high".into(), path(20), 0.7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn key_is_order_insensitive() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let k1 = OpportunityCache::key(&[a, b], ResolvedStrategy::Bfs);
        let k2 = OpportunityCache::key(&[b, a], ResolvedStrategy::Bfs);
        assert_eq!(k1, k2);
        let k3 = OpportunityCache::key(&[a, b], ResolvedStrategy::Dfs);
        assert_ne!(k1, k3);
    }
}
