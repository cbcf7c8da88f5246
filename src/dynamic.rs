//! Generic dynamic value used to capture literal examples next to schemas.
//!
//! There is no null: absence is expressed by leaving an entry out of its
//! container.
pub mod ser;

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DynamicError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DynamicValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(OrderedFloat<f64>),
    Object(IndexMap<String, DynamicValue>),
    Array(Vec<DynamicValue>),
}

impl DynamicValue {
    /// Capture any serializable instance. Returns `Ok(None)` when the instance
    /// itself is absent (`None`, unit).
    pub fn from_serialize<T: ?Sized + Serialize>(value: &T) -> Result<Option<Self>, DynamicError> {
        value.serialize(ser::DynamicSerializer)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DynamicValue::String(_) => "string",
            DynamicValue::Bool(_) => "bool",
            DynamicValue::Int(_) => "int",
            DynamicValue::Double(_) => "double",
            DynamicValue::Object(_) => "object",
            DynamicValue::Array(_) => "array",
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, DynamicValue>> {
        match self {
            DynamicValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            DynamicValue::String(s) => Value::from(s.as_str()),
            DynamicValue::Bool(b) => Value::from(*b),
            DynamicValue::Int(i) => Value::from(*i),
            // non-finite doubles have no JSON form
            DynamicValue::Double(d) => serde_json::Number::from_f64(d.0).map_or(Value::Null, Value::Number),
            DynamicValue::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            DynamicValue::Array(items) => Value::Array(items.iter().map(DynamicValue::to_json).collect()),
        }
    }
}

// Object equality ignores entry order, so the hash must too.
impl Hash for DynamicValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            DynamicValue::String(s) => s.hash(state),
            DynamicValue::Bool(b) => b.hash(state),
            DynamicValue::Int(i) => i.hash(state),
            DynamicValue::Double(d) => d.hash(state),
            DynamicValue::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries.len().hash(state);
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
            DynamicValue::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ------------------------------ Conversions ------------------------------- //

impl From<String> for DynamicValue {
    fn from(v: String) -> Self {
        DynamicValue::String(v)
    }
}

impl From<&str> for DynamicValue {
    fn from(v: &str) -> Self {
        DynamicValue::String(v.to_string())
    }
}

impl From<bool> for DynamicValue {
    fn from(v: bool) -> Self {
        DynamicValue::Bool(v)
    }
}

impl From<i64> for DynamicValue {
    fn from(v: i64) -> Self {
        DynamicValue::Int(v)
    }
}

impl From<i32> for DynamicValue {
    fn from(v: i32) -> Self {
        DynamicValue::Int(i64::from(v))
    }
}

impl From<f64> for DynamicValue {
    fn from(v: f64) -> Self {
        DynamicValue::Double(OrderedFloat(v))
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(v: Vec<DynamicValue>) -> Self {
        DynamicValue::Array(v)
    }
}

impl From<IndexMap<String, DynamicValue>> for DynamicValue {
    fn from(v: IndexMap<String, DynamicValue>) -> Self {
        DynamicValue::Object(v)
    }
}

// --------------------------------- Serde ---------------------------------- //

impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DynamicValue::String(s) => serializer.serialize_str(s),
            DynamicValue::Bool(b) => serializer.serialize_bool(*b),
            DynamicValue::Int(i) => serializer.serialize_i64(*i),
            DynamicValue::Double(d) => serializer.serialize_f64(d.0),
            DynamicValue::Object(map) => serializer.collect_map(map),
            DynamicValue::Array(items) => serializer.collect_seq(items),
        }
    }
}

struct DynamicVisitor;

impl<'de> Visitor<'de> for DynamicVisitor {
    type Value = DynamicValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, bool, number, object or array")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DynamicValue, E> {
        Ok(DynamicValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DynamicValue, E> {
        Ok(DynamicValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DynamicValue, E> {
        Ok(i64::try_from(v).map_or(DynamicValue::Double(OrderedFloat(v as f64)), DynamicValue::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DynamicValue, E> {
        Ok(DynamicValue::Double(OrderedFloat(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DynamicValue, E> {
        Ok(DynamicValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<DynamicValue, E> {
        Ok(DynamicValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DynamicValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Option<DynamicValue>>()? {
            items.extend(item);
        }
        Ok(DynamicValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DynamicValue, A::Error> {
        let mut out = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Option<DynamicValue>>()? {
            if let Some(value) = value {
                out.insert(key, value);
            }
        }
        Ok(DynamicValue::Object(out))
    }
}

impl<'de> Deserialize<'de> for DynamicValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DynamicVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn nulls_vanish_inside_containers() {
        let v: DynamicValue = serde_json::from_str(r#"{"a": 1, "b": null, "c": [true, null, "x"]}"#).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(
            obj["c"],
            DynamicValue::Array(vec![DynamicValue::Bool(true), DynamicValue::from("x")])
        );
    }

    #[test]
    fn root_null_is_rejected() {
        assert!(serde_json::from_str::<DynamicValue>("null").is_err());
    }

    #[test]
    fn large_unsigned_becomes_double() {
        let v: DynamicValue = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(v.kind_name(), "double");
        let v: DynamicValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, DynamicValue::Int(42));
    }

    #[test]
    fn hash_agrees_with_order_free_equality() {
        let a: DynamicValue = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: DynamicValue = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn renders_back_to_json() {
        let v = DynamicValue::Array(vec![DynamicValue::from(1.5), DynamicValue::from(f64::NAN)]);
        assert_eq!(v.to_json(), serde_json::json!([1.5, null]));
        assert_eq!(v.to_string(), "[1.5,null]");
    }
}
