use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::{
    cache::{CacheConfig, MemoCache},
    equality::KeyEquality,
    error::Result,
    key::IntoKey,
};

type DynCallback<A, C, R> = Box<dyn Fn(&A, C) -> R + Send + Sync>;

/// A callback bound to one set of factory arguments. Clone is cheap and keeps identity,
/// so [`Callback::ptr_eq`] tells whether two callbacks came from the same cache entry.
pub struct Callback<C, R> {
    inner: Arc<dyn Fn(C) -> R + Send + Sync>,
}

impl<C, R> Callback<C, R> {
    #[inline]
    pub fn call(&self, args: C) -> R {
        (self.inner)(args)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C, R> Clone for Callback<C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C, R> std::fmt::Debug for Callback<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Callback")
            .field(&(Arc::as_ptr(&self.inner) as *const ()))
            .finish()
    }
}

/// Hands out one stable [`Callback`] per distinct set of factory arguments, while every
/// callback dispatches to whatever closure was registered last with
/// [`set_callback`](Self::set_callback).
///
/// The closure itself is not part of the key. Update it on every pass (the egui hook does
/// this for you) so that the handed-out callbacks never run a stale closure.
///
/// Every handed-out callback keeps the closure slot alive. Don't capture the factory in its
/// own closure, see [`set_callback`](Self::set_callback).
///
/// The memo cache is created on the first [`make`](Self::make) and takes its arity from
/// that call. Later factory arguments of a different length fail with
/// [`Error::ArityMismatch`](crate::Error::ArityMismatch).
///
/// # Example
/// ```
/// use egui_list_callbacks::CallbackFactory;
///
/// let factory = CallbackFactory::new(|(row,): &(usize,), delta: i32| *row as i32 + delta);
/// let on_click = factory.make((3,)).unwrap();
/// assert_eq!(on_click.call(1), 4);
/// assert!(on_click.ptr_eq(&factory.make((3,)).unwrap()));
/// ```
pub struct CallbackFactory<A, C, R> {
    current: Arc<ArcSwap<DynCallback<A, C, R>>>,
    memo: Arc<Mutex<Option<MemoCache<Callback<C, R>>>>>,
    equality: KeyEquality,
}

impl<A, C, R> Clone for CallbackFactory<A, C, R> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            memo: self.memo.clone(),
            equality: self.equality,
        }
    }
}

#[test]
fn callback_factory_is_send_and_sync() {
    fn assert_send_and_sync<T: Send + Sync>() {}
    assert_send_and_sync::<CallbackFactory<(String,), (), ()>>();
    assert_send_and_sync::<Callback<std::rc::Rc<()>, ()>>();
}

impl<A, C, R> CallbackFactory<A, C, R>
where
    A: IntoKey + Clone + Send + Sync + 'static,
    C: 'static,
    R: 'static,
{
    pub fn new(callback: impl Fn(&A, C) -> R + Send + Sync + 'static) -> Self {
        Self::with_equality(KeyEquality::default(), callback)
    }

    pub fn with_equality(
        equality: KeyEquality,
        callback: impl Fn(&A, C) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Box::new(callback) as DynCallback<A, C, R>)),
            memo: Arc::new(Mutex::new(None)),
            equality,
        }
    }

    /// Replace the closure every handed-out callback dispatches to.
    ///
    /// Handed-out callbacks hold the slot strongly, so they keep working after the factory
    /// is dropped. A closure that captures its own factory (or one of its callbacks) forms
    /// a reference cycle through the slot and is never freed; capture data, not the factory.
    pub fn set_callback(&self, callback: impl Fn(&A, C) -> R + Send + Sync + 'static) {
        tracing::trace!("callback factory slot updated");
        self.current
            .store(Arc::new(Box::new(callback) as DynCallback<A, C, R>));
    }

    /// Get the callback for `args`. Equal `args` give the same callback.
    pub fn make(&self, args: A) -> Result<Callback<C, R>> {
        let key = args.clone().into_key();
        let mut memo = self.memo.lock();
        let cache = memo.get_or_insert_with(|| {
            tracing::debug!(arity = key.len(), "creating memo cache for callback factory");
            MemoCache::with_config(CacheConfig::new(key.len()).with_equality(self.equality))
        });
        let current = self.current.clone();
        cache.get_or_compute(key, move || Callback {
            inner: Arc::new(move |call_args: C| {
                let callback = current.load();
                let callback: &DynCallback<A, C, R> = &callback;
                callback(&args, call_args)
            }),
        })
    }

    /// Arity captured from the first `make`, if any.
    pub fn arity(&self) -> Option<usize> {
        self.memo.lock().as_ref().map(MemoCache::arity)
    }

    /// Number of distinct callbacks handed out and still cached.
    pub fn len(&self) -> usize {
        self.memo.lock().as_ref().map_or(0, MemoCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached callback. The arity is captured again on the next `make`.
    pub fn clear(&self) {
        *self.memo.lock() = None;
    }
}

impl<A, C, R> std::fmt::Debug for CallbackFactory<A, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackFactory")
            .field("memo", &*self.memo.lock())
            .field("equality", &self.equality)
            .finish_non_exhaustive()
    }
}

#[test]
fn test_same_args_same_callback() {
    let factory = CallbackFactory::new(|(key,): &(&'static str,), suffix: &'static str| {
        format!("{key}{suffix}")
    });
    let a = factory.make(("x",)).unwrap();
    let b = factory.make(("x",)).unwrap();
    let c = factory.make(("z",)).unwrap();
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
    assert_eq!(a.call("y"), "xy");
    assert_eq!(c.call("y"), "zy");
    assert_eq!(factory.len(), 2);
    assert_eq!(factory.arity(), Some(1));
}

#[test]
fn test_dispatches_to_latest_callback() {
    let factory = CallbackFactory::new(|(key,): &(&'static str,), arg: &'static str| {
        format!("cb1:{key}:{arg}")
    });
    let first = factory.make(("x",)).unwrap();
    assert_eq!(first.call("y"), "cb1:x:y");

    factory.set_callback(|(key,): &(&'static str,), arg: &'static str| format!("cb2:{key}:{arg}"));
    let second = factory.make(("x",)).unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(second.call("y"), "cb2:x:y");
    // callbacks handed out before the update see it too
    assert_eq!(first.call("y"), "cb2:x:y");
}

#[test]
fn test_arity_is_captured_lazily() {
    let factory = CallbackFactory::new(|args: &Vec<i32>, (): ()| args.len());
    assert_eq!(factory.arity(), None);
    assert!(factory.is_empty());
    factory.make(vec![1, 2]).unwrap();
    assert_eq!(factory.arity(), Some(2));
    let err = factory.make(vec![1]).unwrap_err();
    assert!(matches!(
        err,
        crate::Error::ArityMismatch {
            expected: 2,
            actual: 1
        }
    ));
    assert_eq!(factory.len(), 1);

    factory.clear();
    assert_eq!(factory.arity(), None);
    assert_eq!(factory.make(vec![1]).unwrap().call(()), 1);
    assert_eq!(factory.arity(), Some(1));
}

#[test]
fn test_clones_share_state() {
    let factory = CallbackFactory::new(|(n,): &(i32,), (): ()| *n);
    let cloned = factory.clone();
    let a = factory.make((1,)).unwrap();
    cloned.set_callback(|(n,): &(i32,), (): ()| n * 10);
    assert!(a.ptr_eq(&cloned.make((1,)).unwrap()));
    assert_eq!(a.call(()), 10);
}

#[test]
fn test_zero_factory_args() {
    let factory = CallbackFactory::new(|(): &(), n: i32| n + 1);
    let a = factory.make(()).unwrap();
    let b = factory.make(()).unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(b.call(1), 2);
    assert_eq!(factory.arity(), Some(0));
}

#[test]
fn test_callback_outlives_factory() {
    let factory = CallbackFactory::new(|(n,): &(i32,), (): ()| n + 1);
    let callback = factory.make((1,)).unwrap();
    factory.set_callback(|(n,): &(i32,), (): ()| n + 2);
    let slot = std::sync::Arc::downgrade(&factory.current);
    drop(factory);
    // the slot lives on through the callback and still holds the latest closure
    assert!(slot.upgrade().is_some());
    assert_eq!(callback.call(()), 3);
    drop(callback);
    assert!(slot.upgrade().is_none());
}
