use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Mutex;

use log::debug;

use crate::error::StoreError;
use crate::geometry::Point3;
use crate::store::{Locator, NearbySystem, PointStore, RegionCell, SystemRef};

/// Size-bounded map evicting the least recently used entry.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, (V, u64)>,
    recency: BTreeMap<u64, K>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        match self.entries.get_mut(key) {
            Some((value, last_used)) => {
                self.recency.remove(last_used);
                *last_used = tick;
                self.recency.insert(tick, key.clone());
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.tick += 1;
        if let Some((_, last_used)) = self.entries.remove(&key) {
            self.recency.remove(&last_used);
        }
        while self.entries.len() >= self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.recency.insert(self.tick, key.clone());
        self.entries.insert(key, (value, self.tick));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum LocatorKey {
    Name(String),
    Coordinates([u64; 3]),
}

impl From<&Locator> for LocatorKey {
    fn from(locator: &Locator) -> Self {
        match locator {
            Locator::Name(name) => LocatorKey::Name(name.clone()),
            Locator::Coordinates(p) => LocatorKey::Coordinates(point_bits(*p)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct NearbyKey {
    center: [u64; 3],
    radius: u64,
    limit: usize,
}

fn point_bits(p: Point3) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Memoizing decorator around another store.
///
/// Resolutions and radius queries are cached in bounded LRU caches owned by
/// this instance. Region aggregates always go to the wrapped store. Failed
/// lookups are not cached.
pub struct CachedStore<S> {
    inner: S,
    resolved: Mutex<BoundedCache<LocatorKey, SystemRef>>,
    nearby: Mutex<BoundedCache<NearbyKey, Vec<NearbySystem>>>,
}

impl<S: PointStore> CachedStore<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        CachedStore {
            inner,
            resolved: Mutex::new(BoundedCache::new(capacity)),
            nearby: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Combined (hits, misses) of both caches.
    pub fn stats(&self) -> Result<(u64, u64), StoreError> {
        let (rh, rm) = self.resolved.lock().map_err(|_| StoreError::Poisoned)?.stats();
        let (nh, nm) = self.nearby.lock().map_err(|_| StoreError::Poisoned)?.stats();
        Ok((rh + nh, rm + nm))
    }
}

impl<S: PointStore> PointStore for CachedStore<S> {
    fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError> {
        let key = LocatorKey::from(locator);
        if let Some(hit) = self.resolved.lock().map_err(|_| StoreError::Poisoned)?.get(&key) {
            return Ok(hit);
        }
        let resolved = self.inner.resolve_point(locator)?;
        debug!("cached resolution of {locator} -> {}", resolved.name);
        self.resolved
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key, resolved.clone());
        Ok(resolved)
    }

    fn aggregate_region(
        &self,
        min: Point3,
        max: Point3,
        cube_side: f64,
        target: Point3,
    ) -> Result<Vec<RegionCell>, StoreError> {
        self.inner.aggregate_region(min, max, cube_side, target)
    }

    fn nearest_points(
        &self,
        center: Point3,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<NearbySystem>, StoreError> {
        let key = NearbyKey {
            center: point_bits(center),
            radius: radius.to_bits(),
            limit,
        };
        if let Some(hit) = self.nearby.lock().map_err(|_| StoreError::Poisoned)?.get(&key) {
            return Ok(hit);
        }
        let found = self.inner.nearest_points(center, radius, limit)?;
        self.nearby
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key, found.clone());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::System;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = BoundedCache::new(0);
        cache.insert(1, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn cached_store_serves_repeats_from_cache() {
        let inner = InMemoryStore::from_systems(vec![
            System::new(1, "Sol", Point3::ORIGIN),
            System::new(2, "Ross 154", Point3::new(1.88, -9.45, 0.35)),
        ]);
        let store = CachedStore::new(inner, 8);

        let first = store.nearest_points(Point3::ORIGIN, 20.0, 5).expect("query");
        let second = store.nearest_points(Point3::ORIGIN, 20.0, 5).expect("query");
        assert_eq!(first, second);
        store.resolve_point(&"Sol".into()).expect("resolve");
        store.resolve_point(&"Sol".into()).expect("resolve");
        assert!(store.resolve_point(&"Vega".into()).is_err());

        assert_eq!(store.stats().expect("stats"), (2, 3));
    }
}
