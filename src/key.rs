use std::{
    any::Any,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// One element of a cache key.
///
/// `PartialEq` and `Hash` on `KeyValue` itself are exact: floats compare by their bit
/// pattern and references by address. The cache applies its [`KeyEquality`] before
/// comparing, which is where `NaN == NaN` and `+0 == -0` come from.
///
/// [`KeyEquality`]: crate::KeyEquality
#[derive(Debug, Clone)]
pub enum KeyValue {
    /// A missing argument. Distinct from every present value.
    Absent,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(Arc<str>),
    Ref(Identity),
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyValue::Absent, KeyValue::Absent) => true,
            (KeyValue::Bool(a), KeyValue::Bool(b)) => a == b,
            (KeyValue::Int(a), KeyValue::Int(b)) => a == b,
            (KeyValue::Float(a), KeyValue::Float(b)) => a.to_bits() == b.to_bits(),
            (KeyValue::Str(a), KeyValue::Str(b)) => a == b,
            (KeyValue::Ref(a), KeyValue::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for KeyValue {}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            KeyValue::Absent => {}
            KeyValue::Bool(b) => b.hash(state),
            KeyValue::Int(i) => i.hash(state),
            KeyValue::Float(f) => f.to_bits().hash(state),
            KeyValue::Str(s) => s.hash(state),
            KeyValue::Ref(r) => r.hash(state),
        }
    }
}

impl KeyValue {
    /// Key element compared by the identity of `value`, not its contents.
    pub fn by_ref<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        KeyValue::Ref(Identity::new(value.clone()))
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, KeyValue::Absent)
    }
}

/// A shared object used as a key element by reference.
///
/// Keeps the object alive, so its address can't be reused by another object while a
/// cache entry refers to it.
#[derive(Clone)]
pub struct Identity(Arc<dyn Any + Send + Sync>);

impl Identity {
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    #[inline]
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    /// Borrow the referenced object if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Identity").field(&self.addr()).finish()
    }
}

impl From<Identity> for KeyValue {
    #[inline]
    fn from(value: Identity) -> Self {
        KeyValue::Ref(value)
    }
}

impl From<bool> for KeyValue {
    #[inline]
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyValue {
                #[inline]
                fn from(value: $ty) -> Self {
                    KeyValue::Int(value as i128)
                }
            }
        )*
    };
}
impl_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for KeyValue {
    #[inline]
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<f32> for KeyValue {
    #[inline]
    fn from(value: f32) -> Self {
        KeyValue::Float(value as f64)
    }
}

impl From<&str> for KeyValue {
    #[inline]
    fn from(value: &str) -> Self {
        KeyValue::Str(Arc::from(value))
    }
}

impl From<String> for KeyValue {
    #[inline]
    fn from(value: String) -> Self {
        KeyValue::Str(Arc::from(value))
    }
}

impl From<&String> for KeyValue {
    #[inline]
    fn from(value: &String) -> Self {
        KeyValue::Str(Arc::from(value.as_str()))
    }
}

impl From<Arc<str>> for KeyValue {
    #[inline]
    fn from(value: Arc<str>) -> Self {
        KeyValue::Str(value)
    }
}

impl From<char> for KeyValue {
    #[inline]
    fn from(value: char) -> Self {
        KeyValue::Str(Arc::from(value.to_string()))
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyValue::Absent, Into::into)
    }
}

/// Argument tuples usable as a cache key.
pub trait IntoKey {
    fn into_key(self) -> Vec<KeyValue>;
}

impl IntoKey for () {
    #[inline]
    fn into_key(self) -> Vec<KeyValue> {
        Vec::new()
    }
}

macro_rules! impl_into_key {
    ($($name:ident),*) => {
        impl<$($name: Into<KeyValue>),*> IntoKey for ($($name,)*) {
            #[inline]
            #[allow(non_snake_case)]
            fn into_key(self) -> Vec<KeyValue> {
                let ($($name,)*) = self;
                vec![$($name.into()),*]
            }
        }
    };
}
impl_into_key!(A);
impl_into_key!(A, B);
impl_into_key!(A, B, C);
impl_into_key!(A, B, C, D);
impl_into_key!(A, B, C, D, E);
impl_into_key!(A, B, C, D, E, F);
impl_into_key!(A, B, C, D, E, F, G);
impl_into_key!(A, B, C, D, E, F, G, H);
impl_into_key!(A, B, C, D, E, F, G, H, I);
impl_into_key!(A, B, C, D, E, F, G, H, I, J);
impl_into_key!(A, B, C, D, E, F, G, H, I, J, K);
impl_into_key!(A, B, C, D, E, F, G, H, I, J, K, L);

impl<T: Into<KeyValue>, const N: usize> IntoKey for [T; N] {
    #[inline]
    fn into_key(self) -> Vec<KeyValue> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<KeyValue>> IntoKey for Vec<T> {
    #[inline]
    fn into_key(self) -> Vec<KeyValue> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<KeyValue> + Clone> IntoKey for &[T] {
    #[inline]
    fn into_key(self) -> Vec<KeyValue> {
        self.iter().cloned().map(Into::into).collect()
    }
}

#[test]
fn tuple_into_key() {
    let key = ("a", 1, None::<i32>, 2.5).into_key();
    assert_eq!(
        key,
        vec![
            KeyValue::from("a"),
            KeyValue::Int(1),
            KeyValue::Absent,
            KeyValue::Float(2.5)
        ]
    );
}

#[test]
fn absent_is_distinct_from_present_values() {
    assert_ne!(KeyValue::Absent, KeyValue::Bool(false));
    assert_ne!(KeyValue::Absent, KeyValue::Int(0));
    assert_ne!(KeyValue::Absent, KeyValue::from(""));
}

#[test]
fn refs_compare_by_identity() {
    let a = Arc::new(String::from("same"));
    let b = Arc::new(String::from("same"));
    assert_eq!(KeyValue::by_ref(&a), KeyValue::by_ref(&a.clone()));
    assert_ne!(KeyValue::by_ref(&a), KeyValue::by_ref(&b));
}

#[test]
fn identity_downcast() {
    let value = Arc::new(42u32);
    let KeyValue::Ref(identity) = KeyValue::by_ref(&value) else {
        panic!("expected a reference key");
    };
    assert_eq!(identity.downcast_ref::<u32>(), Some(&42));
    assert_eq!(identity.downcast_ref::<i32>(), None);
}
