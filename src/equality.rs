use crate::key::KeyValue;

/// How key elements are compared. Chosen when a cache is created and fixed for its lifetime.
///
/// References are always compared by identity and strings by content. The variants only
/// differ in how numbers are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum KeyEquality {
    /// `NaN` equals `NaN`, `+0.0` equals `-0.0`.
    ///
    /// Integers and floats stay distinct: `1` and `1.0` are different keys. Use
    /// [`KeyEquality::Numeric`] to treat them as one number.
    #[default]
    SameValueZero,
    /// `NaN` equals `NaN`, `+0.0` and `-0.0` are distinct.
    SameValue,
    /// As `SameValueZero`, and an integral float equals the same integer.
    Numeric,
}

// 2^127. i128::MAX rounds up to this as f64, so the range end must be exclusive.
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl KeyEquality {
    /// Map a key element to the representative of its equivalence class, so that the
    /// exact `Eq`/`Hash` of [`KeyValue`] implement this policy.
    pub fn canonicalize(self, value: KeyValue) -> KeyValue {
        match value {
            KeyValue::Float(f) if f.is_nan() => KeyValue::Float(f64::NAN),
            KeyValue::Float(f) => match self {
                KeyEquality::SameValue => KeyValue::Float(f),
                KeyEquality::SameValueZero if f == 0.0 => KeyValue::Float(0.0),
                KeyEquality::SameValueZero => KeyValue::Float(f),
                KeyEquality::Numeric
                    if f.fract() == 0.0 && (-I128_BOUND..I128_BOUND).contains(&f) =>
                {
                    KeyValue::Int(f as i128)
                }
                KeyEquality::Numeric => KeyValue::Float(f),
            },
            other => other,
        }
    }
}

#[cfg(test)]
fn same(equality: KeyEquality, a: impl Into<KeyValue>, b: impl Into<KeyValue>) -> bool {
    equality.canonicalize(a.into()) == equality.canonicalize(b.into())
}

#[test]
fn same_value_zero() {
    let eq = KeyEquality::SameValueZero;
    assert!(same(eq, f64::NAN, -f64::NAN));
    assert!(same(eq, 0.0, -0.0));
    assert!(!same(eq, 1.0, 1));
    assert!(same(eq, "a", String::from("a")));
}

#[test]
fn same_value_keeps_signed_zero() {
    let eq = KeyEquality::SameValue;
    assert!(same(eq, f64::NAN, f64::NAN));
    assert!(!same(eq, 0.0, -0.0));
    assert!(same(eq, -0.0, -0.0));
}

#[test]
fn numeric_unifies_integral_floats() {
    let eq = KeyEquality::Numeric;
    assert!(same(eq, 1.0, 1u8));
    assert!(same(eq, -0.0, 0));
    assert!(!same(eq, 1.5, 1));
    assert!(same(eq, f64::NAN, f64::NAN));
    assert!(!same(eq, f64::INFINITY, i64::MAX));
    assert!(!same(eq, true, 1));
}

#[test]
fn same_value_zero_keeps_ints_and_floats_apart() {
    let mut cache = crate::MemoCache::new(1);
    assert_eq!(cache.get_or_compute((1,), || "int").unwrap(), "int");
    assert_eq!(cache.get_or_compute((1.0,), || "float").unwrap(), "float");
    assert_eq!(cache.len(), 2);

    let config = crate::CacheConfig::new(1).with_equality(KeyEquality::Numeric);
    let mut numeric = crate::MemoCache::with_config(config);
    assert_eq!(numeric.get_or_compute((1,), || "int").unwrap(), "int");
    assert_eq!(numeric.get_or_compute((1.0,), || "float").unwrap(), "int");
    assert_eq!(numeric.len(), 1);
}
