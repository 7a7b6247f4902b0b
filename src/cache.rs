//! A memo cache keyed by fixed-length argument tuples.
//!
//! Entries live in nested maps, one level per key position, so a probe costs O(arity)
//! regardless of how many entries the cache holds.

use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroUsize,
};

use crate::{
    equality::KeyEquality,
    error::{BoxError, Error, Result},
    key::{IntoKey, KeyValue},
};

/// Construction parameters for a [`MemoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CacheConfig {
    /// Number of elements in every key.
    pub arity: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub equality: KeyEquality,
    /// Upper bound on live entries. The least recently used entry is evicted past it.
    /// `None` never evicts.
    #[cfg_attr(feature = "serde", serde(default))]
    pub capacity: Option<NonZeroUsize>,
}

impl CacheConfig {
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            equality: KeyEquality::default(),
            capacity: None,
        }
    }

    pub fn with_equality(mut self, equality: KeyEquality) -> Self {
        self.equality = equality;
        self
    }

    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Access statistics of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: Option<NonZeroUsize>,
}

impl CacheInfo {
    /// Fraction of lookups that were hits, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry<R> {
    value: R,
    last_access: u64,
}

struct Level<R> {
    children: HashMap<KeyValue, Level<R>>,
    // Only set at depth == arity.
    entry: Option<CacheEntry<R>>,
}

impl<R> Default for Level<R> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            entry: None,
        }
    }
}

impl<R> Level<R> {
    fn find(&self, key: &[KeyValue]) -> Option<&CacheEntry<R>> {
        let mut level = self;
        for part in key {
            level = level.children.get(part)?;
        }
        level.entry.as_ref()
    }

    fn find_mut(&mut self, key: &[KeyValue]) -> Option<&mut CacheEntry<R>> {
        let mut level = self;
        for part in key {
            level = level.children.get_mut(part)?;
        }
        level.entry.as_mut()
    }

    fn slot(&mut self, key: &[KeyValue]) -> &mut Option<CacheEntry<R>> {
        let mut level = self;
        for part in key {
            level = level.children.entry(part.clone()).or_default();
        }
        &mut level.entry
    }

    /// Removes the entry and prunes branches left without entries.
    fn remove(&mut self, key: &[KeyValue]) -> Option<CacheEntry<R>> {
        match key.split_first() {
            None => self.entry.take(),
            Some((head, rest)) => {
                let child = self.children.get_mut(head)?;
                let removed = child.remove(rest);
                if child.is_vacant() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    fn is_vacant(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }
}

/// Caches the result of a producer per argument tuple.
///
/// The arity and the [`KeyEquality`] are fixed at construction. Every key passed in must
/// have exactly `arity` elements; other lengths fail with [`Error::ArityMismatch`]
/// without touching the cache.
///
/// The cache is not synchronized. Share it between threads behind a lock.
pub struct MemoCache<R> {
    arity: usize,
    equality: KeyEquality,
    capacity: Option<NonZeroUsize>,
    root: Level<R>,
    len: usize,
    clock: u64,
    // last_access -> key, maintained only when `capacity` is set.
    recency: BTreeMap<u64, Vec<KeyValue>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Create an unbounded cache for keys of `arity` elements.
pub fn create_cache<R>(arity: usize, equality: KeyEquality) -> MemoCache<R> {
    MemoCache::with_config(CacheConfig::new(arity).with_equality(equality))
}

impl<R> MemoCache<R> {
    pub fn new(arity: usize) -> Self {
        Self::with_config(CacheConfig::new(arity))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            arity: config.arity,
            equality: config.equality,
            capacity: config.capacity,
            root: Level::default(),
            len: 0,
            clock: 0,
            recency: BTreeMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn equality(&self) -> KeyEquality {
        self.equality
    }

    #[inline]
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            len: self.len,
            capacity: self.capacity,
        }
    }

    /// Return the value stored under `key`, or run `compute`, store its result and
    /// return it. `compute` runs at most once per live key.
    ///
    /// If `compute` panics nothing is stored.
    pub fn get_or_compute(&mut self, key: impl IntoKey, compute: impl FnOnce() -> R) -> Result<R>
    where
        R: Clone,
    {
        self.try_get_or_compute(key, || Ok::<_, std::convert::Infallible>(compute()))
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with a fallible producer. A producer
    /// error is returned as [`Error::ComputeFailure`] and leaves no entry behind, so the
    /// next call with the same key runs a producer again.
    pub fn try_get_or_compute<E>(
        &mut self,
        key: impl IntoKey,
        compute: impl FnOnce() -> std::result::Result<R, E>,
    ) -> Result<R>
    where
        R: Clone,
        E: Into<BoxError>,
    {
        let key = self.canonical_key(key)?;
        self.clock += 1;
        let now = self.clock;
        if let Some(entry) = self.root.find_mut(&key) {
            let previous = std::mem::replace(&mut entry.last_access, now);
            let value = entry.value.clone();
            if self.capacity.is_some() {
                if let Some(path) = self.recency.remove(&previous) {
                    self.recency.insert(now, path);
                }
            }
            self.hits += 1;
            tracing::trace!(?key, "memo cache hit");
            return Ok(value);
        }

        self.misses += 1;
        tracing::trace!(?key, "memo cache miss");
        let value = compute().map_err(|err| Error::ComputeFailure(err.into()))?;
        *self.root.slot(&key) = Some(CacheEntry {
            value: value.clone(),
            last_access: now,
        });
        self.len += 1;
        if let Some(capacity) = self.capacity {
            self.recency.insert(now, key);
            while self.len > capacity.get() {
                self.evict_least_recent();
            }
        }
        Ok(value)
    }

    /// Look up `key` without computing, and without counting the access or refreshing
    /// its recency.
    pub fn peek(&self, key: impl IntoKey) -> Result<Option<&R>> {
        let key = self.canonical_key(key)?;
        Ok(self.root.find(&key).map(|entry| &entry.value))
    }

    pub fn contains_key(&self, key: impl IntoKey) -> Result<bool> {
        self.peek(key).map(|value| value.is_some())
    }

    /// Drop the entry under `key`, returning its value.
    pub fn remove(&mut self, key: impl IntoKey) -> Result<Option<R>> {
        let key = self.canonical_key(key)?;
        let Some(entry) = self.root.remove(&key) else {
            return Ok(None);
        };
        self.len -= 1;
        if self.capacity.is_some() {
            self.recency.remove(&entry.last_access);
        }
        Ok(Some(entry.value))
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.root = Level::default();
        self.recency.clear();
        self.len = 0;
    }

    fn evict_least_recent(&mut self) {
        let Some((_, key)) = self.recency.pop_first() else {
            return;
        };
        if self.root.remove(&key).is_some() {
            self.len -= 1;
            self.evictions += 1;
            tracing::debug!(?key, len = self.len, "evicted least recently used memo entry");
        }
    }

    fn canonical_key(&self, key: impl IntoKey) -> Result<Vec<KeyValue>> {
        let key = key.into_key();
        if key.len() != self.arity {
            tracing::debug!(
                expected = self.arity,
                actual = key.len(),
                "memo cache key arity mismatch"
            );
            return Err(Error::ArityMismatch {
                expected: self.arity,
                actual: key.len(),
            });
        }
        Ok(key
            .into_iter()
            .map(|part| self.equality.canonicalize(part))
            .collect())
    }
}

impl<R> std::fmt::Debug for MemoCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("arity", &self.arity)
            .field("equality", &self.equality)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[test]
fn memo_cache_is_send_and_sync() {
    fn assert_send_and_sync<T: Send + Sync>() {}
    assert_send_and_sync::<MemoCache<std::sync::Arc<str>>>();
}

#[test]
fn test_two_element_keys() {
    let mut cache = create_cache(2, KeyEquality::default());
    assert_eq!(cache.get_or_compute(("a", 1), || 10).unwrap(), 10);
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache
            .get_or_compute(("a", 1), || panic!("producer must not run on a hit"))
            .unwrap(),
        10
    );
    assert_eq!(cache.get_or_compute(("a", 2), || 20).unwrap(), 20);
    assert_eq!(cache.len(), 2);
    let info = cache.info();
    assert_eq!((info.hits, info.misses), (1, 2));
}

#[test]
fn test_hit_returns_same_arc() {
    let mut cache = MemoCache::new(1);
    let first = cache
        .get_or_compute(("k",), || std::sync::Arc::new(vec![1, 2, 3]))
        .unwrap();
    let second = cache
        .get_or_compute(("k",), || std::sync::Arc::new(vec![1, 2, 3]))
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn test_arity_mismatch_leaves_cache_untouched() {
    let mut cache = MemoCache::new(2);
    let err = cache.get_or_compute(("a",), || 1).unwrap_err();
    assert!(matches!(
        err,
        Error::ArityMismatch {
            expected: 2,
            actual: 1
        }
    ));
    assert!(cache.is_empty());
    assert_eq!(cache.info(), CacheInfo::default());
}

#[test]
fn test_failed_compute_is_not_cached() {
    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    let mut cache = MemoCache::new(1);
    let err = cache
        .try_get_or_compute(("k",), || Err::<i32, _>(Boom))
        .unwrap_err();
    assert!(err.compute_error::<Boom>().is_some());
    assert!(cache.is_empty());
    assert!(cache.root.is_vacant());
    assert_eq!(cache.get_or_compute(("k",), || 7).unwrap(), 7);
    assert_eq!(cache.peek(("k",)).unwrap(), Some(&7));
}

#[test]
fn test_panicking_compute_is_not_cached() {
    let mut cache = MemoCache::new(1);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.get_or_compute(("k",), || panic!("producer panicked"))
    }));
    assert!(result.is_err());
    assert!(cache.is_empty());
    assert_eq!(cache.get_or_compute(("k",), || 3).unwrap(), 3);
}

#[test]
fn test_zero_arity_is_a_single_cell() {
    let mut cache = MemoCache::new(0);
    let mut calls = 0;
    for _ in 0..5 {
        let value = cache
            .get_or_compute((), || {
                calls += 1;
                "only"
            })
            .unwrap();
        assert_eq!(value, "only");
    }
    assert_eq!(calls, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_absent_is_its_own_key() {
    let mut cache = MemoCache::new(1);
    cache.get_or_compute((None::<i32>,), || "absent").unwrap();
    cache.get_or_compute((0,), || "zero").unwrap();
    assert_eq!(cache.peek((None::<i32>,)).unwrap(), Some(&"absent"));
    assert_eq!(cache.peek((0,)).unwrap(), Some(&"zero"));
}

#[test]
fn test_same_value_zero_keys() {
    let mut cache = MemoCache::new(1);
    cache.get_or_compute((f64::NAN,), || 1).unwrap();
    cache.get_or_compute((0.0,), || 2).unwrap();
    assert_eq!(cache.get_or_compute((f64::NAN,), || 99).unwrap(), 1);
    assert_eq!(cache.get_or_compute((-0.0,), || 99).unwrap(), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_reference_keys() {
    let a = std::sync::Arc::new(5);
    let b = std::sync::Arc::new(5);
    let mut cache = MemoCache::new(1);
    cache.get_or_compute([KeyValue::by_ref(&a)], || "a").unwrap();
    assert_eq!(cache.get_or_compute([KeyValue::by_ref(&b)], || "b").unwrap(), "b");
    assert_eq!(cache.get_or_compute([KeyValue::by_ref(&a)], || "x").unwrap(), "a");
}

#[test]
fn test_remove_prunes_branches() {
    let mut cache = MemoCache::new(3);
    cache.get_or_compute(("a", "b", "c"), || 1).unwrap();
    cache.get_or_compute(("a", "b", "d"), || 2).unwrap();
    assert_eq!(cache.remove(("a", "b", "c")).unwrap(), Some(1));
    assert_eq!(cache.remove(("a", "b", "c")).unwrap(), None);
    assert!(!cache.root.is_vacant());
    assert_eq!(cache.remove(("a", "b", "d")).unwrap(), Some(2));
    assert!(cache.root.is_vacant());
    assert!(cache.is_empty());
}

#[test]
fn test_capacity_evicts_least_recently_used() {
    let config = CacheConfig::new(1).with_capacity(NonZeroUsize::new(2).unwrap());
    let mut cache = MemoCache::with_config(config);
    cache.get_or_compute((1,), || "one").unwrap();
    cache.get_or_compute((2,), || "two").unwrap();
    // touch 1 so that 2 becomes the eviction candidate
    cache.get_or_compute((1,), || "unused").unwrap();
    cache.get_or_compute((3,), || "three").unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains_key((1,)).unwrap());
    assert!(!cache.contains_key((2,)).unwrap());
    assert!(cache.contains_key((3,)).unwrap());
    assert_eq!(cache.info().evictions, 1);
    assert_eq!(cache.recency.len(), 2);
}

#[test]
fn test_clear() {
    let mut cache = MemoCache::new(1);
    cache.get_or_compute(("a",), || 1).unwrap();
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get_or_compute(("a",), || 2).unwrap(), 2);
}
