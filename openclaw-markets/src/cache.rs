use parking_lot::RwLock;
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Time a cached quote stays valid for.
pub const QUOTE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Process-local quote cache keyed by normalized (upper-case) symbol.
///
/// Entries expire after the configured TTL and are replaced on the next
/// successful fetch. The lock is never held across an await point.
#[derive(Debug)]
pub struct QuoteCache {
    ttl: Duration,
    entries: RwLock<HashMap<SmolStr, CachedPrice>>,
}

#[derive(Debug, Copy, Clone)]
struct CachedPrice {
    price: f64,
    fetched_at: Instant,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(QUOTE_CACHE_TTL)
    }
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached price for a normalized symbol, if still fresh.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        let entries = self.entries.read();
        entries
            .get(symbol)
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.price)
    }

    pub fn insert(&self, symbol: SmolStr, price: f64) {
        self.entries.write().insert(
            symbol,
            CachedPrice {
                price,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
