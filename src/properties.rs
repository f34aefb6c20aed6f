use std::collections::BTreeMap;
use std::str::FromStr;

/// String-to-string metadata attached to maps, layers, tiles and objects.
///
/// Keys are kept in byte-wise lexicographic order, so iteration yields
/// uppercase ASCII before lowercase (`"Mu"` sorts before `"alpha"`). The
/// writer relies on this order for deterministic output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// True when `key` is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pairs in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Replaces every entry with the contents of `other`.
    pub fn replace_with(&mut self, other: &Properties) {
        self.entries.clone_from(&other.entries);
    }

    /// Parses the value as `T`, returning `None` when absent or malformed.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Accepts `true`/`false` and `1`/`0`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Value of `key` as an `i32`.
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get_parsed(key)
    }

    /// Value of `key` as an `f32`.
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get_parsed(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_iterate_in_byte_order() {
        let props: Properties = [("zeta", "1"), ("alpha", "2"), ("Mu", "3")]
            .into_iter()
            .collect();
        let keys: Vec<_> = props.keys().collect();
        assert_eq!(keys, vec!["Mu", "alpha", "zeta"]);
    }

    #[test]
    fn typed_getters() {
        let mut props = Properties::new();
        props.insert("solid", "true");
        props.insert("damage", " 12 ");
        props.insert("speed", "1.5");
        props.insert("broken", "maybe");

        assert_eq!(props.get_bool("solid"), Some(true));
        assert_eq!(props.get_i32("damage"), Some(12));
        assert_eq!(props.get_f32("speed"), Some(1.5));
        assert_eq!(props.get_bool("broken"), None);
        assert_eq!(props.get_i32("missing"), None);
    }

    #[test]
    fn insert_returns_previous_value() {
        let mut props = Properties::new();
        assert_eq!(props.insert("k", "a"), None);
        assert_eq!(props.insert("k", "b"), Some("a".to_string()));
        assert_eq!(props.len(), 1);
        assert_eq!(props.remove("k"), Some("b".to_string()));
        assert!(props.is_empty());
    }
}
