//! Event argument capture
//!
//! Arguments are opaque ordered values. Each event occurrence overwrites
//! the stored entry for its event name ("latest wins"), and a barrier that
//! completes later sees the most recent occurrence of every dependency.
//! When parameter names are registered for an event, the stored entry also
//! exposes each positional value under its declared name; both views
//! coexist and naming never changes firing semantics.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque argument value captured from an event occurrence.
///
/// Cheap to clone; typed access goes through [`Value::downcast_ref`].
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Value {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the value as `T`, if that is what was captured
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Name of the captured type, for diagnostics
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// One event occurrence's captured arguments: positional values plus an
/// optional name -> position index built at capture time.
#[derive(Clone, Debug, Default)]
pub struct CapturedArgs {
    values: Vec<Value>,
    names: HashMap<String, usize>,
}

impl CapturedArgs {
    /// Capture positional arguments with no registered names
    pub fn positional(values: Vec<Value>) -> Self {
        CapturedArgs {
            values,
            names: HashMap::new(),
        }
    }

    /// Capture positional arguments under a registered name list.
    ///
    /// Names beyond the positional arity index nothing; extra positional
    /// values simply stay unnamed.
    pub fn named(values: Vec<Value>, names: &[String]) -> Self {
        let names = names
            .iter()
            .take(values.len())
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        CapturedArgs { values, names }
    }

    /// Positional access
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Access by registered parameter name
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        self.names.get(name).and_then(|&i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Argument bundle delivered to a satisfied barrier: event name ->
/// that event's most recent captured arguments.
#[derive(Clone, Debug, Default)]
pub struct ArgBundle {
    entries: HashMap<String, CapturedArgs>,
}

impl ArgBundle {
    pub fn new(entries: HashMap<String, CapturedArgs>) -> Self {
        ArgBundle { entries }
    }

    pub fn get(&self, event: &str) -> Option<&CapturedArgs> {
        self.entries.get(event)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_value_downcast() {
        let v = Value::new(42u32);
        assert_eq!(v.downcast_ref::<u32>(), Some(&42));
        assert!(v.downcast_ref::<String>().is_none());
        assert!(v.is::<u32>());
    }

    #[test]
    fn test_named_and_positional_coexist() {
        let args = CapturedArgs::named(vec![Value::new(42i64)], &["x".to_string()]);
        assert_eq!(args.get(0).unwrap().downcast_ref::<i64>(), Some(&42));
        assert_eq!(args.by_name("x").unwrap().downcast_ref::<i64>(), Some(&42));
        assert!(args.by_name("y").is_none());
    }

    #[test]
    fn test_excess_names_index_nothing() {
        let args = CapturedArgs::named(
            vec![Value::new(1u8)],
            &["a".to_string(), "b".to_string()],
        );
        assert!(args.by_name("a").is_some());
        assert!(args.by_name("b").is_none());
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_bundle_lookup() {
        let mut entries = HashMap::new();
        entries.insert(
            "ready".to_string(),
            CapturedArgs::positional(vec![Value::new("ok")]),
        );
        let bundle = ArgBundle::new(entries);

        assert_eq!(bundle.len(), 1);
        assert!(bundle.get("ready").is_some());
        assert!(bundle.get("missing").is_none());
    }

    proptest! {
        /// With distinct names, every named lookup resolves to the value at
        /// its position, and names past the positional arity resolve to nothing.
        #[test]
        fn prop_named_view_matches_positional(
            vals in proptest::collection::vec(0i64..1000, 0..8),
            name_set in proptest::collection::hash_set("[a-z]{1,6}", 0..8),
        ) {
            let names: Vec<String> = name_set.into_iter().collect();
            let values: Vec<Value> = vals.iter().map(|v| Value::new(*v)).collect();
            let args = CapturedArgs::named(values, &names);

            for (i, name) in names.iter().enumerate() {
                if i < vals.len() {
                    let named = args.by_name(name).and_then(|v| v.downcast_ref::<i64>());
                    prop_assert_eq!(named, Some(&vals[i]));
                } else {
                    prop_assert!(args.by_name(name).is_none());
                }
            }
        }
    }
}
