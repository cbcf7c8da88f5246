//! Schema document model populated by the synthesizer.
//!
//! A passive tree. [`Schema::to_json`] renders it as an OpenAPI 3.1 style
//! schema object; references are rendered against a caller-provided prefix.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::dynamic::DynamicValue;
use crate::shape::Format;

#[derive(Clone, Debug, PartialEq)]
pub enum Schema {
    /// Named entry in the reference table.
    Reference(String),
    Object(ObjectSchema),
    Array(ArraySchema),
    /// Fixed-arity array with one schema per position.
    Tuple(Vec<Schema>),
    String(StringSchema),
    Integer(IntegerSchema),
    Number(NumberSchema),
    Boolean,
    Null,
    /// No constraint; what degraded or untyped positions synthesize to.
    Any,
    OneOf(Vec<Schema>),
    Nullable(Box<Schema>),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    /// Value schema of a dictionary-shaped object.
    pub additional_properties: Option<Box<Schema>>,
    pub example: Option<DynamicValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
    pub example: Option<DynamicValue>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct StringSchema {
    pub format: Option<Format>,
    pub enumeration: Vec<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub example: Option<DynamicValue>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct IntegerSchema {
    /// `int32` or `int64`.
    pub format: Option<&'static str>,
    pub minimum: Option<i64>,
    pub example: Option<DynamicValue>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct NumberSchema {
    /// `float` or `double`.
    pub format: Option<&'static str>,
    pub example: Option<DynamicValue>,
}

impl Schema {
    pub fn reference(name: impl Into<String>) -> Self {
        Schema::Reference(name.into())
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema { items: Box::new(items), example: None })
    }

    pub fn string() -> Self {
        Schema::String(StringSchema::default())
    }

    pub fn string_enum<I, S>(cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::String(StringSchema {
            enumeration: cases.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    pub fn dictionary(values: Schema) -> Self {
        Schema::Object(ObjectSchema {
            additional_properties: Some(Box::new(values)),
            ..Default::default()
        })
    }

    pub fn nullable(self) -> Self {
        match self {
            Schema::Nullable(_) | Schema::Null | Schema::Any => self,
            other => Schema::Nullable(Box::new(other)),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Schema::Reference(_))
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Schema::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Attach an example. Nodes without an example slot (references,
    /// compositions, `Boolean`, `Null`, `Any`) are returned unchanged.
    pub fn with_example(mut self, example: DynamicValue) -> Self {
        match &mut self {
            Schema::Object(o) => o.example = Some(example),
            Schema::Array(a) => a.example = Some(example),
            Schema::String(s) => s.example = Some(example),
            Schema::Integer(i) => i.example = Some(example),
            Schema::Number(n) => n.example = Some(example),
            Schema::Nullable(inner) => {
                let taken = std::mem::replace(inner.as_mut(), Schema::Any);
                **inner = taken.with_example(example);
            }
            _ => {}
        }
        self
    }

    pub fn to_json(&self, ref_prefix: &str) -> Value {
        fn with_example(mut o: Value, example: &Option<DynamicValue>) -> Value {
            if let Some(ex) = example {
                o["example"] = ex.to_json();
            }
            o
        }

        match self {
            Schema::Reference(name) => json!({ "$ref": format!("{ref_prefix}{name}") }),

            Schema::Object(obj) => {
                let mut map = serde_json::Map::new();
                map.insert("type".into(), Value::from("object"));
                if !obj.properties.is_empty() || obj.additional_properties.is_none() {
                    let props = obj
                        .properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json(ref_prefix)))
                        .collect();
                    map.insert("properties".into(), Value::Object(props));
                }
                if !obj.required.is_empty() {
                    map.insert(
                        "required".into(),
                        Value::Array(obj.required.iter().cloned().map(Value::from).collect()),
                    );
                }
                if let Some(extra) = &obj.additional_properties {
                    map.insert("additionalProperties".into(), extra.to_json(ref_prefix));
                }
                with_example(Value::Object(map), &obj.example)
            }

            Schema::Array(arr) => with_example(
                json!({
                    "type": "array",
                    "items": arr.items.to_json(ref_prefix),
                }),
                &arr.example,
            ),

            Schema::Tuple(items) => json!({
                "type": "array",
                "prefixItems": items.iter().map(|s| s.to_json(ref_prefix)).collect::<Vec<_>>(),
                "minItems": items.len(),
                "maxItems": items.len()
            }),

            Schema::String(s) => {
                let mut o = json!({ "type": "string" });
                if let Some(f) = s.format {
                    o["format"] = Value::from(f.as_str());
                }
                if !s.enumeration.is_empty() {
                    o["enum"] = Value::Array(s.enumeration.iter().cloned().map(Value::from).collect());
                }
                if let Some(n) = s.min_length { o["minLength"] = Value::from(n); }
                if let Some(n) = s.max_length { o["maxLength"] = Value::from(n); }
                with_example(o, &s.example)
            }

            Schema::Integer(i) => {
                let mut o = json!({ "type": "integer" });
                if let Some(f) = i.format { o["format"] = Value::from(f); }
                if let Some(m) = i.minimum { o["minimum"] = Value::from(m); }
                with_example(o, &i.example)
            }

            Schema::Number(n) => {
                let mut o = json!({ "type": "number" });
                if let Some(f) = n.format { o["format"] = Value::from(f); }
                with_example(o, &n.example)
            }

            Schema::Boolean => json!({ "type": "boolean" }),
            Schema::Null => json!({ "type": "null" }),
            Schema::Any => json!({}),

            Schema::OneOf(arms) => {
                json!({ "oneOf": arms.iter().map(|s| s.to_json(ref_prefix)).collect::<Vec<_>>() })
            }

            Schema::Nullable(inner) => {
                json!({ "oneOf": [inner.to_json(ref_prefix), { "type": "null" }] })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "#/components/schemas/";

    #[test]
    fn object_renders_required_and_refs() {
        let mut properties = IndexMap::new();
        properties.insert("tags".to_string(), Schema::array(Schema::reference("Tag")));
        let obj = Schema::Object(ObjectSchema {
            properties,
            required: vec!["tags".into()],
            ..Default::default()
        });
        assert_eq!(
            obj.to_json(PREFIX),
            json!({
                "type": "object",
                "properties": {
                    "tags": { "type": "array", "items": { "$ref": "#/components/schemas/Tag" } }
                },
                "required": ["tags"]
            })
        );
    }

    #[test]
    fn dictionary_has_no_properties() {
        let dict = Schema::dictionary(Schema::Integer(IntegerSchema {
            format: Some("int32"),
            ..Default::default()
        }));
        assert_eq!(
            dict.to_json(PREFIX),
            json!({ "type": "object", "additionalProperties": { "type": "integer", "format": "int32" } })
        );
    }

    #[test]
    fn nullable_wraps_once() {
        let s = Schema::string().nullable().nullable();
        assert_eq!(s, Schema::Nullable(Box::new(Schema::string())));
        assert_eq!(Schema::Any.nullable(), Schema::Any);
        assert_eq!(
            s.to_json(PREFIX),
            json!({ "oneOf": [{ "type": "string" }, { "type": "null" }] })
        );
    }

    #[test]
    fn examples_land_on_the_node() {
        let s = Schema::string_enum(["first", "second"]).with_example(DynamicValue::from("first"));
        assert_eq!(
            s.to_json(PREFIX),
            json!({ "type": "string", "enum": ["first", "second"], "example": "first" })
        );
        let n = Schema::Nullable(Box::new(Schema::string())).with_example(DynamicValue::from("x"));
        let Schema::Nullable(inner) = &n else { panic!("nullable expected") };
        assert_eq!(inner.to_json(PREFIX)["example"], json!("x"));
        assert_eq!(Schema::Boolean.with_example(DynamicValue::from(true)), Schema::Boolean);
    }

    #[test]
    fn tuples_use_prefix_items() {
        let t = Schema::Tuple(vec![Schema::Boolean, Schema::string()]);
        assert_eq!(
            t.to_json(PREFIX),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "boolean" }, { "type": "string" }],
                "minItems": 2,
                "maxItems": 2
            })
        );
    }
}
