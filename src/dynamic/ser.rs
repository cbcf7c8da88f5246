//! Serializer that captures an instance as a [`DynamicValue`].
//!
//! `Ok = Option<DynamicValue>`: `None` means the value was absent and its
//! container should leave it out.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::ser::{self, Impossible, Serialize, Serializer};

use crate::dynamic::DynamicValue;
use crate::error::DynamicError;

type Captured = Result<Option<DynamicValue>, DynamicError>;

pub struct DynamicSerializer;

fn wide(n: i128) -> Option<DynamicValue> {
    Some(match i64::try_from(n) {
        Ok(i) => DynamicValue::Int(i),
        Err(_) => DynamicValue::Double(OrderedFloat(n as f64)),
    })
}

fn tagged(variant: &'static str, payload: DynamicValue) -> Option<DynamicValue> {
    let mut map = IndexMap::with_capacity(1);
    map.insert(variant.to_string(), payload);
    Some(DynamicValue::Object(map))
}

impl Serializer for DynamicSerializer {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;
    type SerializeSeq = SeqCapture;
    type SerializeTuple = SeqCapture;
    type SerializeTupleStruct = SeqCapture;
    type SerializeTupleVariant = SeqCapture;
    type SerializeMap = MapCapture;
    type SerializeStruct = MapCapture;
    type SerializeStructVariant = MapCapture;

    fn serialize_bool(self, v: bool) -> Captured {
        Ok(Some(DynamicValue::Bool(v)))
    }

    fn serialize_i8(self, v: i8) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_i16(self, v: i16) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_i32(self, v: i32) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_i64(self, v: i64) -> Captured {
        Ok(Some(DynamicValue::Int(v)))
    }

    fn serialize_i128(self, v: i128) -> Captured {
        Ok(wide(v))
    }

    fn serialize_u8(self, v: u8) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_u16(self, v: u16) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_u32(self, v: u32) -> Captured {
        Ok(Some(DynamicValue::Int(i64::from(v))))
    }

    fn serialize_u64(self, v: u64) -> Captured {
        Ok(wide(i128::from(v)))
    }

    fn serialize_u128(self, v: u128) -> Captured {
        Ok(Some(match i64::try_from(v) {
            Ok(i) => DynamicValue::Int(i),
            Err(_) => DynamicValue::Double(OrderedFloat(v as f64)),
        }))
    }

    fn serialize_f32(self, v: f32) -> Captured {
        Ok(Some(DynamicValue::Double(OrderedFloat(f64::from(v)))))
    }

    fn serialize_f64(self, v: f64) -> Captured {
        Ok(Some(DynamicValue::Double(OrderedFloat(v))))
    }

    fn serialize_char(self, v: char) -> Captured {
        Ok(Some(DynamicValue::String(v.to_string())))
    }

    fn serialize_str(self, v: &str) -> Captured {
        Ok(Some(DynamicValue::String(v.to_string())))
    }

    fn serialize_bytes(self, v: &[u8]) -> Captured {
        Ok(Some(DynamicValue::Array(
            v.iter().map(|b| DynamicValue::Int(i64::from(*b))).collect(),
        )))
    }

    fn serialize_none(self) -> Captured {
        Ok(None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Captured {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Captured {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Captured {
        Ok(None)
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Captured {
        Ok(Some(DynamicValue::String(variant.to_string())))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Captured {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Captured {
        // an absent payload keeps only the case name
        Ok(match value.serialize(self)? {
            Some(payload) => tagged(variant, payload),
            None => Some(DynamicValue::String(variant.to_string())),
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCapture, DynamicError> {
        Ok(SeqCapture { items: Vec::with_capacity(len.unwrap_or(0)), variant: None })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCapture, DynamicError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqCapture, DynamicError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqCapture, DynamicError> {
        Ok(SeqCapture { items: Vec::with_capacity(len), variant: Some(variant) })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCapture, DynamicError> {
        Ok(MapCapture { map: IndexMap::with_capacity(len.unwrap_or(0)), key: None, variant: None })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapCapture, DynamicError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<MapCapture, DynamicError> {
        Ok(MapCapture { map: IndexMap::with_capacity(len), key: None, variant: Some(variant) })
    }
}

pub struct SeqCapture {
    items: Vec<DynamicValue>,
    variant: Option<&'static str>,
}

impl SeqCapture {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        self.items.extend(value.serialize(DynamicSerializer)?);
        Ok(())
    }

    fn finish(self) -> Captured {
        let array = DynamicValue::Array(self.items);
        Ok(match self.variant {
            Some(v) => tagged(v, array),
            None => Some(array),
        })
    }
}

impl ser::SerializeSeq for SeqCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        self.push(value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        self.push(value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        self.push(value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        self.push(value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

pub struct MapCapture {
    map: IndexMap<String, DynamicValue>,
    key: Option<String>,
    variant: Option<&'static str>,
}

impl MapCapture {
    fn insert<T: ?Sized + Serialize>(&mut self, key: String, value: &T) -> Result<(), DynamicError> {
        if let Some(v) = value.serialize(DynamicSerializer)? {
            self.map.insert(key, v);
        }
        Ok(())
    }

    fn finish(self) -> Captured {
        let object = DynamicValue::Object(self.map);
        Ok(match self.variant {
            Some(v) => tagged(v, object),
            None => Some(object),
        })
    }
}

impl ser::SerializeMap for MapCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), DynamicError> {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), DynamicError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| <DynamicError as ser::Error>::custom("map value without a key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

impl ser::SerializeStruct for MapCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), DynamicError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

impl ser::SerializeStructVariant for MapCapture {
    type Ok = Option<DynamicValue>;
    type Error = DynamicError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), DynamicError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Captured {
        self.finish()
    }
}

// --------------------------------- Keys ----------------------------------- //

/// Renders scalar map keys as strings.
struct KeySerializer;

type Key = Result<String, DynamicError>;

impl Serializer for KeySerializer {
    type Ok = String;
    type Error = DynamicError;
    type SerializeSeq = Impossible<String, DynamicError>;
    type SerializeTuple = Impossible<String, DynamicError>;
    type SerializeTupleStruct = Impossible<String, DynamicError>;
    type SerializeTupleVariant = Impossible<String, DynamicError>;
    type SerializeMap = Impossible<String, DynamicError>;
    type SerializeStruct = Impossible<String, DynamicError>;
    type SerializeStructVariant = Impossible<String, DynamicError>;

    fn serialize_bool(self, v: bool) -> Key {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Key {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Key {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Key {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Key {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Key {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Key {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Key {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Key {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Key {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Key {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Key {
        Ok(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Key {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Key {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Key {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Key {
        Err(DynamicError::UnsupportedKey("bytes"))
    }

    fn serialize_none(self) -> Key {
        Err(DynamicError::UnsupportedKey("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Key {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Key {
        Err(DynamicError::UnsupportedKey("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Key {
        Err(DynamicError::UnsupportedKey("unit struct"))
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Key {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Key {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Key {
        Err(DynamicError::UnsupportedKey("newtype variant"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, DynamicError> {
        Err(DynamicError::UnsupportedKey("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, DynamicError> {
        Err(DynamicError::UnsupportedKey("tuple"))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct, DynamicError> {
        Err(DynamicError::UnsupportedKey("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, DynamicError> {
        Err(DynamicError::UnsupportedKey("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, DynamicError> {
        Err(DynamicError::UnsupportedKey("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, DynamicError> {
        Err(DynamicError::UnsupportedKey("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, DynamicError> {
        Err(DynamicError::UnsupportedKey("struct variant"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Tag {
        id: i64,
        value: String,
        note: Option<String>,
    }

    #[derive(Serialize)]
    enum Event {
        Ping,
        Moved { x: i32, y: i32 },
        Renamed(String),
    }

    fn capture<T: Serialize>(value: &T) -> DynamicValue {
        DynamicValue::from_serialize(value).unwrap().unwrap()
    }

    #[test]
    fn structs_skip_absent_fields() {
        let v = capture(&Tag { id: 7, value: "x".into(), note: None });
        let obj = v.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), ["id", "value"]);
        assert_eq!(obj["id"], DynamicValue::Int(7));
    }

    #[test]
    fn root_absence_is_none() {
        assert_eq!(DynamicValue::from_serialize(&Option::<u8>::None).unwrap(), None);
        assert_eq!(DynamicValue::from_serialize(&()).unwrap(), None);
    }

    #[test]
    fn enums_are_externally_tagged() {
        assert_eq!(capture(&Event::Ping), DynamicValue::from("Ping"));
        assert_eq!(capture(&Event::Renamed("a".into())).to_json(), serde_json::json!({"Renamed": "a"}));
        assert_eq!(
            capture(&Event::Moved { x: 1, y: 2 }).to_json(),
            serde_json::json!({"Moved": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn wide_integers_fall_back_to_double() {
        assert_eq!(capture(&u64::MAX).kind_name(), "double");
        assert_eq!(capture(&5u64), DynamicValue::Int(5));
        assert_eq!(capture(&-3i128), DynamicValue::Int(-3));
    }

    #[test]
    fn scalar_keys_are_stringified() {
        let mut m = BTreeMap::new();
        m.insert(1u8, "one");
        m.insert(2u8, "two");
        assert_eq!(capture(&m).to_json(), serde_json::json!({"1": "one", "2": "two"}));

        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1);
        assert_eq!(
            DynamicValue::from_serialize(&bad),
            Err(DynamicError::UnsupportedKey("sequence"))
        );
    }

    #[test]
    fn bytes_and_chars() {
        assert_eq!(capture(&'z'), DynamicValue::from("z"));
        let bytes = DynamicSerializer.serialize_bytes(&[1, 2]).unwrap();
        assert_eq!(bytes, Some(DynamicValue::Array(vec![DynamicValue::Int(1), DynamicValue::Int(2)])));
    }
}
