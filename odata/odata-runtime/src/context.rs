use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered string map with case-insensitive keys.
///
/// The original spelling of each key is retained.
/// Equality is dictionary equality, independent of insertion order.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct CaseInsensitiveMap {
    /// lowercase key => (key, value)
    entries: IndexMap<String, (String, String)>,
}

impl CaseInsensitiveMap {
    /// Insert a value, returning the previous value of an equal key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        self.entries
            .insert(key.to_lowercase(), (key, value.into()))
            .map(|(_, value)| value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// The first inserted entry
    pub fn first(&self) -> Option<(&str, &str)> {
        self.entries
            .first()
            .map(|(_, (key, value))| (key.as_str(), value.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaseInsensitiveMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Request-scoped parameters made available to repository methods.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ContextParameters(CaseInsensitiveMap);

impl ContextParameters {
    /// Merge the non-reserved query parameters of a request with its headers.
    ///
    /// Query parameters starting with `$` are protocol options and are left out.
    /// A header does not replace a query parameter of the same name.
    pub fn from_request<'a>(
        query: impl IntoIterator<Item = (&'a str, &'a str)>,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut map: CaseInsensitiveMap = query
            .into_iter()
            .filter(|(name, _)| !name.starts_with('$'))
            .collect();

        for (name, value) in headers {
            if !map.contains_key(name) {
                map.insert(name, value);
            }
        }

        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
