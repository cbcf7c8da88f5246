//! Session-scoped reference table: display name to synthesized schema.

use indexmap::IndexMap;
use serde_json::Value;

use crate::schema::Schema;

/// Threaded by `&mut` through every synthesis call of one document. Entries
/// are never removed; re-synthesizing a name overwrites it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTable {
    entries: IndexMap<String, Schema>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Hold `name` before its schema is known so a self-reference met while
    /// synthesizing it resolves. Returns `true` if the name was free.
    pub fn reserve(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), Schema::Any);
        true
    }

    /// Last write wins; the name keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) -> Option<Schema> {
        self.entries.insert(name.into(), schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> IndexMap<String, Schema> {
        self.entries
    }

    /// Render as a `components.schemas`-style map.
    pub fn to_json(&self, ref_prefix: &str) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, schema)| (name.clone(), schema.to_json(ref_prefix)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_insert_keeps_order() {
        let mut table = ReferenceTable::new();
        assert!(table.reserve("ListResponse"));
        assert!(!table.reserve("ListResponse"));
        table.insert("Tag", Schema::string());
        table.insert("ListResponse", Schema::Boolean);
        assert_eq!(table.names().collect::<Vec<_>>(), ["ListResponse", "Tag"]);
        assert_eq!(table.get("ListResponse"), Some(&Schema::Boolean));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn last_write_wins() {
        let mut table = ReferenceTable::new();
        table.insert("Tag", Schema::string());
        let previous = table.insert("Tag", Schema::Boolean);
        assert_eq!(previous, Some(Schema::string()));
        assert_eq!(table.to_json("#/"), serde_json::json!({ "Tag": { "type": "boolean" } }));
    }
}
