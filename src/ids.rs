//! Identifier collections with constant-time membership.
//!
//! Persisted as a plain JSON array (insertion order preserved) and rebuilt into
//! a hashed set on load. Malformed persisted values degrade to an empty set.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was not present before.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        self.order.retain(|existing| existing != id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Lenient rebuild from an arbitrary JSON value.
    ///
    /// Anything that is not an array yields an empty set; non-string entries
    /// inside an array are skipped.
    pub fn from_json_lenient(value: Option<&Value>) -> Self {
        let mut set = Self::new();
        if let Some(Value::Array(items)) = value {
            for item in items {
                if let Value::String(id) = item {
                    set.insert(id.as_str());
                }
            }
        }
        set
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl Serialize for IdentifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.order.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IdentifierSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json_lenient(Some(&value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_is_idempotent_and_ordered() {
        let mut set = IdentifierSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        assert_eq!(set.to_vec(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut set: IdentifierSet = ["x", "y", "z"].into_iter().collect();
        assert!(set.remove("y"));
        assert!(!set.remove("y"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["x", "z"]);
        assert!(!set.contains("y"));
    }

    #[test]
    fn lenient_rebuild_ignores_garbage() {
        assert!(IdentifierSet::from_json_lenient(None).is_empty());
        assert!(IdentifierSet::from_json_lenient(Some(&json!({"a": 1}))).is_empty());
        assert!(IdentifierSet::from_json_lenient(Some(&json!("i1"))).is_empty());

        let set = IdentifierSet::from_json_lenient(Some(&json!(["i1", 7, null, "i2", "i1"])));
        assert_eq!(set.to_vec(), vec!["i1".to_string(), "i2".to_string()]);
    }

    #[test]
    fn serializes_as_array() {
        let set: IdentifierSet = ["r1", "r2"].into_iter().collect();
        assert_eq!(serde_json::to_value(&set).unwrap(), json!(["r1", "r2"]));

        let back: IdentifierSet = serde_json::from_value(json!(["r2", "r1"])).unwrap();
        assert!(back.contains("r1") && back.contains("r2"));

        let tolerant: IdentifierSet = serde_json::from_value(json!(42)).unwrap();
        assert!(tolerant.is_empty());
    }
}
