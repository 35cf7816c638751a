// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! First-page cache for customer history.
//!
//! Page one is what the dashboard asks for on every load, so it is kept in an
//! LRU keyed by customer. Each customer also has a generation that a committed
//! transfer bumps. A reader takes the generation before scanning redb and the
//! page it built is only cached if no transfer landed in between.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use super::repository::transactions::HistoryPage;

/// Snapshot of a customer's history generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

struct CachedPage {
    page: HistoryPage,
    stored_at: Instant,
}

struct Inner {
    pages: LruCache<String, CachedPage>,
    generations: HashMap<String, u64>,
}

pub struct HistoryCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl HistoryCache {
    /// `capacity` bounds the number of customers with a cached page.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                pages: LruCache::new(capacity),
                generations: HashMap::new(),
            }),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation for `customer_id`. Read before loading a page.
    pub fn generation(&self, customer_id: &str) -> Generation {
        Generation(self.lock().generations.get(customer_id).copied().unwrap_or(0))
    }

    /// Cached first page, unless missing or older than the TTL.
    pub fn get_first_page(&self, customer_id: &str) -> Option<HistoryPage> {
        let mut inner = self.lock();
        match inner.pages.get(customer_id) {
            Some(cached) if cached.stored_at.elapsed() < self.ttl => Some(cached.page.clone()),
            Some(_) => {
                inner.pages.pop(customer_id);
                None
            }
            None => None,
        }
    }

    /// Cache `page` if `seen` is still the customer's generation.
    ///
    /// Returns whether the page was stored.
    pub fn put_first_page(&self, customer_id: &str, seen: Generation, page: HistoryPage) -> bool {
        let mut inner = self.lock();
        let current = inner.generations.get(customer_id).copied().unwrap_or(0);
        if current != seen.0 {
            return false;
        }
        inner.pages.put(
            customer_id.to_string(),
            CachedPage {
                page,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drop the cached page and bump the generation.
    pub fn invalidate(&self, customer_id: &str) {
        let mut inner = self.lock();
        let counter = inner.generations.entry(customer_id.to_string()).or_insert(0);
        *counter = counter.wrapping_add(1);
        inner.pages.pop(customer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;
    use crate::storage::repository::transactions::{Direction, StoredTransaction, TransferStatus};
    use chrono::Utc;

    fn page_with(id: &str) -> HistoryPage {
        let tx = StoredTransaction {
            id: id.to_string(),
            source_id: "cus_a".to_string(),
            destination_id: "cus_b".to_string(),
            amount: Money::from_major(5),
            description: None,
            status: TransferStatus::Captured,
            created_at: Utc::now(),
        };
        HistoryPage {
            items: vec![(tx, Direction::Debit)],
            total: 1,
        }
    }

    #[test]
    fn stores_and_returns_first_page() {
        let cache = HistoryCache::new(10, Duration::from_secs(300));
        assert!(cache.get_first_page("cus_a").is_none());

        let seen = cache.generation("cus_a");
        assert!(cache.put_first_page("cus_a", seen, page_with("txn_abc")));

        let page = cache.get_first_page("cus_a").unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].0.id, "txn_abc");
    }

    #[test]
    fn invalidate_drops_page_and_bumps_generation() {
        let cache = HistoryCache::new(10, Duration::from_secs(300));
        let before = cache.generation("cus_a");
        cache.put_first_page("cus_a", before, page_with("txn_abc"));

        cache.invalidate("cus_a");
        assert!(cache.get_first_page("cus_a").is_none());
        assert_ne!(cache.generation("cus_a"), before);
        assert_eq!(cache.generation("cus_b"), before);
    }

    #[test]
    fn page_loaded_before_invalidate_is_not_cached() {
        let cache = HistoryCache::new(10, Duration::from_secs(300));

        // Reader snapshots, then a transfer commits before it stores.
        let seen = cache.generation("cus_a");
        cache.invalidate("cus_a");
        assert!(!cache.put_first_page("cus_a", seen, page_with("txn_stale")));
        assert!(cache.get_first_page("cus_a").is_none());

        // The next reader sees the new generation and may cache.
        let fresh = cache.generation("cus_a");
        assert!(cache.put_first_page("cus_a", fresh, page_with("txn_new")));
        assert_eq!(cache.get_first_page("cus_a").unwrap().items[0].0.id, "txn_new");
    }

    #[test]
    fn invalidating_one_customer_keeps_the_other_storable() {
        let cache = HistoryCache::new(10, Duration::from_secs(300));
        let seen_b = cache.generation("cus_b");
        cache.invalidate("cus_a");
        assert!(cache.put_first_page("cus_b", seen_b, page_with("txn_b")));
    }

    #[test]
    fn expired_page_is_not_returned() {
        let cache = HistoryCache::new(10, Duration::from_millis(1));
        let seen = cache.generation("cus_a");
        cache.put_first_page("cus_a", seen, page_with("txn_abc"));

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get_first_page("cus_a").is_none());
    }

    #[test]
    fn least_recently_used_customer_is_evicted() {
        let cache = HistoryCache::new(1, Duration::from_secs(300));
        cache.put_first_page("cus_a", cache.generation("cus_a"), page_with("txn_a"));
        cache.put_first_page("cus_b", cache.generation("cus_b"), page_with("txn_b"));

        assert!(cache.get_first_page("cus_a").is_none());
        assert!(cache.get_first_page("cus_b").is_some());
    }
}
