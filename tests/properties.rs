use std::cell::Cell;

use egui_list_callbacks::{CacheConfig, Error, KeyEquality, KeyValue, MemoCache};
use proptest::prelude::*;

fn key_value_strategy() -> impl Strategy<Value = KeyValue> {
    prop_oneof![
        Just(KeyValue::Absent),
        any::<bool>().prop_map(KeyValue::from),
        (-5i64..5).prop_map(KeyValue::from),
        prop_oneof![Just(0.0), Just(-0.0), Just(f64::NAN), Just(1.5)].prop_map(KeyValue::from),
        "[ab]{0,2}".prop_map(KeyValue::from),
    ]
}

fn key_strategy(arity: usize) -> impl Strategy<Value = Vec<KeyValue>> {
    prop::collection::vec(key_value_strategy(), arity)
}

fn canonical(key: &[KeyValue]) -> Vec<KeyValue> {
    key.iter()
        .cloned()
        .map(|part| KeyEquality::SameValueZero.canonicalize(part))
        .collect()
}

#[derive(Debug, thiserror::Error)]
#[error("producer failed")]
struct ProducerFailed;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Equal keys run the producer once and return the stored value afterwards.
    #[test]
    fn prop_idempotent(key in key_strategy(3), first in any::<u32>(), second in any::<u32>()) {
        let mut cache = MemoCache::new(3);
        let calls = Cell::new(0);
        let a = cache.get_or_compute(key.clone(), || { calls.set(calls.get() + 1); first }).unwrap();
        let b = cache.get_or_compute(key, || { calls.set(calls.get() + 1); second }).unwrap();
        prop_assert_eq!(calls.get(), 1);
        prop_assert_eq!(a, first);
        prop_assert_eq!(b, first);
    }

    /// Entries under different keys never see each other.
    #[test]
    fn prop_key_discrimination(k1 in key_strategy(2), k2 in key_strategy(2)) {
        prop_assume!(canonical(&k1) != canonical(&k2));
        let mut cache = MemoCache::new(2);
        cache.get_or_compute(k1.clone(), || "first").unwrap();
        prop_assert_eq!(cache.get_or_compute(k2.clone(), || "second").unwrap(), "second");
        prop_assert_eq!(cache.peek(k1).unwrap(), Some(&"first"));
        prop_assert_eq!(cache.peek(k2).unwrap(), Some(&"second"));
        prop_assert_eq!(cache.len(), 2);
    }

    /// Keys of the wrong length fail and leave the cache as it was.
    #[test]
    fn prop_arity_enforced(arity in 0usize..4, key in prop::collection::vec(key_value_strategy(), 0..6)) {
        prop_assume!(key.len() != arity);
        let mut cache = MemoCache::new(arity);
        let result = cache.get_or_compute(key.clone(), || 1);
        let is_arity_mismatch = matches!(
            result,
            Err(Error::ArityMismatch { expected, actual }) if expected == arity && actual == key.len()
        );
        prop_assert!(is_arity_mismatch);
        prop_assert!(cache.is_empty());
        prop_assert_eq!(cache.info().misses, 0);
    }

    /// A failed producer leaves nothing behind, so the next producer runs and is stored.
    #[test]
    fn prop_failure_not_cached(key in key_strategy(2), value in any::<i64>()) {
        let mut cache = MemoCache::new(2);
        let failed = cache.try_get_or_compute(key.clone(), || Err::<i64, _>(ProducerFailed));
        prop_assert!(failed.is_err());
        prop_assert!(failed.unwrap_err().compute_error::<ProducerFailed>().is_some());
        prop_assert!(cache.is_empty());
        prop_assert_eq!(cache.get_or_compute(key.clone(), || value).unwrap(), value);
        prop_assert_eq!(cache.peek(key).unwrap(), Some(&value));
    }

    /// A zero-arity cache runs its producer once no matter how often it is asked.
    #[test]
    fn prop_zero_arity(calls in 1usize..20) {
        let mut cache = MemoCache::new(0);
        let runs = Cell::new(0);
        for i in 0..calls {
            let value = cache.get_or_compute((), || { runs.set(runs.get() + 1); i }).unwrap();
            prop_assert_eq!(value, 0);
        }
        prop_assert_eq!(runs.get(), 1);
    }

    /// A bounded cache never holds more than its capacity.
    #[test]
    fn prop_capacity_bound(keys in prop::collection::vec(0i32..16, 0..64), capacity in 1usize..5) {
        let config = CacheConfig::new(1).with_capacity(std::num::NonZeroUsize::new(capacity).unwrap());
        let mut cache = MemoCache::with_config(config);
        for key in keys {
            prop_assert_eq!(cache.get_or_compute((key,), || key * 2).unwrap(), key * 2);
            prop_assert!(cache.len() <= capacity);
        }
    }
}
