//! `NavigationParams` - Ordered parameter store for navigation states
//!
//! A small string-keyed map preserving insertion order. Values are either
//! plain strings or calculated: a deferred derivation from another key,
//! evaluated on access. Calculated values make it possible to expose a
//! parameter (say, a display slug) that tracks another parameter (an id)
//! without eagerly computing it for every navigation.

use std::fmt;
use std::sync::Arc;

use log::warn;

/// Derivation function for a calculated parameter value.
///
/// Receives the resolved string form of the source key and produces the
/// derived value.
pub type DeriveFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A stored parameter value.
///
/// # Variants
///
/// - `Plain` - an eagerly stored string
/// - `Calculated` - derived on access from another key's resolved value
#[derive(Clone)]
pub enum ParamValue {
    /// An eagerly stored string value.
    Plain(String),

    /// A value derived on access from another key.
    Calculated {
        /// The key this value is derived from.
        source: String,
        /// The derivation applied to the source's resolved string form.
        derive: DeriveFn,
    },
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(v) => f.debug_tuple("Plain").field(v).finish(),
            Self::Calculated { source, .. } => f
                .debug_struct("Calculated")
                .field("source", source)
                .finish_non_exhaustive(),
        }
    }
}

/// Ordered string key to value map carried by a navigation state.
///
/// Insertion order is preserved and drives iteration. Stores are built
/// fresh per navigation request, are cheap, and are treated as immutable
/// once attached to a [`NavigationState`](crate::NavigationState).
///
/// # Calculated values
///
/// [`as_string`](Self::as_string) resolves calculated values on demand.
/// [`contains`](Self::contains) reports `false` for a calculated value
/// whose source key is absent, so "is this parameter usable" and "fetch
/// it" always agree.
///
/// # Cycle refusal
///
/// While a calculated value for key `K` is being resolved, any nested
/// attempt to resolve `K` again refuses (returns `None`) instead of
/// looping. The refusal is logged at `warn` level.
///
/// # Example
///
/// ```
/// use waymark::NavigationParams;
///
/// let params = NavigationParams::new()
///     .with("id", "42")
///     .with_calculated("badge", "id", |id| format!("user-{id}"));
///
/// assert_eq!(params.as_string("id").as_deref(), Some("42"));
/// assert_eq!(params.as_string("badge").as_deref(), Some("user-42"));
/// assert!(params.contains("badge"));
/// assert!(!params.contains("missing"));
/// ```
#[derive(Clone, Default)]
pub struct NavigationParams {
    entries: Vec<(String, ParamValue)>,
}

impl NavigationParams {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a plain value. Replaces an existing entry for the same key
    /// in place, keeping its position in the order.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), ParamValue::Plain(value.into()));
    }

    /// Store a calculated value derived from `source`.
    pub fn set_calculated(
        &mut self,
        key: impl Into<String>,
        source: impl Into<String>,
        derive: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        self.insert(
            key.into(),
            ParamValue::Calculated {
                source: source.into(),
                derive: Arc::new(derive),
            },
        );
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style [`set_calculated`](Self::set_calculated).
    #[must_use]
    pub fn with_calculated(
        mut self,
        key: impl Into<String>,
        source: impl Into<String>,
        derive: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.set_calculated(key, source, derive);
        self
    }

    /// Resolve a key to its string form.
    ///
    /// Plain values are returned as stored. Calculated values resolve
    /// their source first, then apply the derivation. Returns `None` for
    /// an absent key, an absent source, or a derivation cycle.
    #[must_use]
    pub fn as_string(&self, key: &str) -> Option<String> {
        self.resolve(key, &mut Vec::new())
    }

    /// Returns `true` if `key` resolves to a usable value.
    ///
    /// A calculated value whose source key is absent (directly or through
    /// a chain of calculated values) reports `false`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key, &mut Vec::new()).is_some()
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, key: String, value: ParamValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    fn find(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn resolve(&self, key: &str, visiting: &mut Vec<String>) -> Option<String> {
        match self.find(key)? {
            ParamValue::Plain(v) => Some(v.clone()),
            ParamValue::Calculated { source, derive } => {
                if visiting.iter().any(|k| k == key) {
                    warn!(
                        "calculated parameter \"{key}\" depends on itself (chain: {}); refusing to resolve",
                        visiting.join(" -> ")
                    );
                    return None;
                }
                visiting.push(key.to_string());
                let resolved = self.resolve(source, visiting).map(|v| derive(&v));
                visiting.pop();
                resolved
            }
        }
    }
}

impl fmt::Debug for NavigationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NavigationParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}
