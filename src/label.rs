// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Label sets and their canonical grouping key.
//!
//! Probes are grouped by a [`LabelSet`]. Two label sets belong to the same
//! group when their canonical keys are equal, regardless of the order in which
//! their attributes were supplied. The key is built by stably sorting the
//! attributes by name and concatenating `name=value,` for each one, so the
//! empty label set maps to the empty key.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Label name for the actor system address.
pub const ADDRESS_LABEL: &str = "address";

/// Label name for the actor type.
pub const ACTOR_TYPE_LABEL: &str = "actortype";

/// A primitive attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Cow<'static, str>),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl Value {
    /// Renders the value in its canonical string form.
    ///
    /// Strings render verbatim, numbers through their `Display` form and
    /// booleans as `true`/`false`.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::String(s) => Cow::Borrowed(s.as_ref()),
            Value::I64(v) => Cow::Owned(v.to_string()),
            Value::F64(v) => Cow::Owned(v.to_string()),
            Value::Bool(v) => Cow::Borrowed(if *v { "true" } else { "false" }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::String(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(value: Cow<'static, str>) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F64(value.into())
    }
}

macro_rules! impl_value_from_int {
    ($($int:ty),* $(,)?) => {
        $(
            impl From<$int> for Value {
                fn from(value: $int) -> Self {
                    Value::I64(value.into())
                }
            }
        )*
    };
}

impl_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_value_from_wide_int {
    ($($int:ty),* $(,)?) => {
        $(
            /// Stored as `I64` when it fits, otherwise as its decimal string,
            /// which renders identically.
            impl From<$int> for Value {
                fn from(value: $int) -> Self {
                    match i64::try_from(value) {
                        Ok(v) => Value::I64(v),
                        Err(_) => Value::String(Cow::Owned(value.to_string())),
                    }
                }
            }
        )*
    };
}

impl_value_from_wide_int!(u64, usize, isize, i128, u128);

/// An immutable `(name, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: Cow<'static, str>,
    value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Builds the canonical key for a slice of attributes.
///
/// The attributes are stably sorted by name, so attributes sharing a name keep
/// their relative order, and each contributes `name=value,` to the key.
///
/// Values are not escaped. A string value containing `,` or `=` can produce the
/// same key as a different label set (`{a="x,b=y"}` and `{a="x",b="y"}` both
/// give `a=x,b=y,`), and such sets share one group whose [`LabelSet`] is the
/// one registered first. Label values are expected to be identifiers such as
/// addresses and type names.
pub fn canonicalize(attributes: &[Attribute]) -> String {
    let mut sorted: Vec<&Attribute> = attributes.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut key = String::new();
    for attribute in sorted {
        key.push_str(&attribute.name);
        key.push('=');
        key.push_str(&attribute.value.render());
        key.push(',');
    }
    key
}

/// An ordered set of attributes identifying one sample group.
///
/// The attributes are stored in canonical order and the canonical key is
/// computed once at construction. Equality, ordering and hashing use only
/// the key.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    attributes: Vec<Attribute>,
    key: String,
}

impl LabelSet {
    pub fn new(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        let mut attributes: Vec<Attribute> = attributes.into_iter().collect();
        let key = canonicalize(&attributes);
        // sort_by is stable, matching canonicalize
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        Self { attributes, key }
    }

    /// The label set with no attributes. All unlabeled probes share its group.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the canonical key used to group probes.
    pub fn canonical_key(&self) -> &str {
        &self.key
    }

    /// Returns the attributes in canonical order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up the first attribute with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name)
            .map(Attribute::value)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for LabelSet {}

impl PartialOrd for LabelSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelSet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for LabelSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl FromIterator<Attribute> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<const N: usize> From<[Attribute; N]> for LabelSet {
    fn from(attributes: [Attribute; N]) -> Self {
        Self::new(attributes)
    }
}

impl From<Vec<Attribute>> for LabelSet {
    fn from(attributes: Vec<Attribute>) -> Self {
        Self::new(attributes)
    }
}

/// Formats as `{name="value",...}` in canonical order.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, attribute) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match attribute.value() {
                Value::String(s) => write!(f, "{}={:?}", attribute.name(), s)?,
                other => write!(f, "{}={}", attribute.name(), other)?,
            }
        }
        f.write_str("}")
    }
}

/// Types that describe the label set of the probes they register.
///
/// Usually implemented with `#[derive(Labels)]`.
pub trait Labels {
    fn labels(&self) -> LabelSet;
}

impl Labels for LabelSet {
    fn labels(&self) -> LabelSet {
        self.clone()
    }
}

/// Returns the short name of `A`: the last path segment of
/// [`std::any::type_name`], with any generic arguments kept as written.
pub fn actor_type_name<A: ?Sized>() -> String {
    let full = std::any::type_name::<A>();
    let (base, generics) = match full.find('<') {
        Some(idx) => full.split_at(idx),
        None => (full, ""),
    };
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{short}{generics}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn worker_labels() -> Vec<Attribute> {
        vec![
            Attribute::new("type", "Worker"),
            Attribute::new("address", "node-1:8090"),
            Attribute::new("shard", 3i64),
            Attribute::new("pinned", false),
        ]
    }

    #[test]
    fn test_empty_label_set_has_empty_key() {
        assert_eq!(canonicalize(&[]), "");
        assert_eq!(LabelSet::empty().canonical_key(), "");
        assert_eq!(LabelSet::new(Vec::new()), LabelSet::empty());
    }

    #[test]
    fn test_key_sorts_by_name() {
        let key = canonicalize(&worker_labels());
        assert_eq!(key, "address=node-1:8090,pinned=false,shard=3,type=Worker,");
    }

    #[test]
    fn test_key_is_stable_across_permutations() {
        let expected = canonicalize(&worker_labels());
        let mut rng = rand::rng();

        for _ in 0..64 {
            let mut shuffled = worker_labels();
            shuffled.shuffle(&mut rng);
            assert_eq!(canonicalize(&shuffled), expected);
            assert_eq!(LabelSet::new(shuffled).canonical_key(), expected);
        }
    }

    #[test]
    fn test_duplicate_names_keep_relative_order() {
        let key = canonicalize(&[
            Attribute::new("b", 1i64),
            Attribute::new("a", "x"),
            Attribute::new("a", "y"),
        ]);
        assert_eq!(key, "a=x,a=y,b=1,");
    }

    #[test]
    fn test_label_set_equality_ignores_order() {
        let a = LabelSet::from([Attribute::new("type", "Worker"), Attribute::new("address", "local")]);
        let b = LabelSet::from([Attribute::new("address", "local"), Attribute::new("type", "Worker")]);
        let c = LabelSet::from([Attribute::new("address", "remote"), Attribute::new("type", "Worker")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.attributes()[0].name(), "address");
        assert_eq!(a.get("type"), Some(&Value::from("Worker")));
        assert_eq!(a.get("missing"), None);
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(Value::from("abc").render(), "abc");
        assert_eq!(Value::from(-42i32).render(), "-42");
        assert_eq!(Value::from(1.5f64).render(), "1.5");
        assert_eq!(Value::from(true).render(), "true");
    }

    #[test]
    fn test_wide_integers_convert() {
        assert_eq!(Value::from(7usize), Value::I64(7));
        assert_eq!(Value::from(42u64), Value::I64(42));
        assert_eq!(Value::from(u64::MAX).render(), "18446744073709551615");
        assert_eq!(Value::from(-3isize).render(), "-3");
    }

    #[test]
    fn test_label_set_ordering_follows_key() {
        let mut sets = vec![
            LabelSet::from([Attribute::new("type", "Worker")]),
            LabelSet::from([Attribute::new("address", "b"), Attribute::new("type", "Router")]),
            LabelSet::empty(),
            LabelSet::from([Attribute::new("type", "Router"), Attribute::new("address", "a")]),
        ];
        sets.sort();

        let keys: Vec<&str> = sets.iter().map(LabelSet::canonical_key).collect();
        assert_eq!(
            keys,
            vec!["", "address=a,type=Router,", "address=b,type=Router,", "type=Worker,"]
        );
        assert_eq!(
            LabelSet::from([Attribute::new("a", 1i64), Attribute::new("b", 2i64)])
                .cmp(&LabelSet::from([Attribute::new("b", 2i64), Attribute::new("a", 1i64)])),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn test_unescaped_separators_share_a_key() {
        let embedded = LabelSet::from([Attribute::new("a", "x,b=y")]);
        let split = LabelSet::from([Attribute::new("a", "x"), Attribute::new("b", "y")]);

        assert_eq!(embedded.canonical_key(), "a=x,b=y,");
        assert_eq!(embedded, split);
    }

    #[test]
    fn test_label_set_display() {
        let labels = LabelSet::from([Attribute::new("type", "Worker"), Attribute::new("shard", 2i64)]);
        assert_eq!(labels.to_string(), "{shard=2,type=\"Worker\"}");
        assert_eq!(LabelSet::empty().to_string(), "{}");
    }

    #[allow(dead_code)]
    mod inner {
        pub struct Pinger;
        pub struct Holder<T>(pub T);
    }

    #[test]
    fn test_actor_type_name_strips_module_path() {
        assert_eq!(actor_type_name::<inner::Pinger>(), "Pinger");
        assert_eq!(actor_type_name::<u32>(), "u32");
        assert!(actor_type_name::<inner::Holder<u8>>().starts_with("Holder<"));
    }
}
