//! Stable per-item callbacks for egui lists.
//!
//! [`UseListCallbacksExt::use_list_callbacks`] gives a widget a [`CallbackFactory`]: for
//! each distinct tuple of factory arguments (a row key, an index, ...) it hands out one
//! callback whose identity never changes, while always running the closure of the latest
//! frame. Underneath is [`MemoCache`], a memo cache keyed by fixed-length argument tuples,
//! which is usable on its own.

pub mod cache;
pub mod equality;
pub mod error;
pub mod ext;
pub mod factory;
pub mod key;

pub use cache::{create_cache, CacheConfig, CacheInfo, MemoCache};
pub use equality::KeyEquality;
pub use error::{BoxError, Error, Result};
pub use ext::UseListCallbacksExt;
pub use factory::{Callback, CallbackFactory};
pub use key::{Identity, IntoKey, KeyValue};
