//! Value-driven prober: a `Serializer` whose output is the shape of what was
//! serialized.
//!
//! The instance's own `Serialize` impl runs unmodified; every capability it
//! requests becomes a shape node instead of bytes.

use indexmap::IndexMap;
use serde::ser::{self, Serialize, Serializer};
use tracing::debug;

use crate::error::ProbeError;
use crate::probe::ProbeSession;
use crate::probe::path::{Entry, Mark, PathKey};
use crate::probe::protocol::{EntryOrder, RecordRequest};
use crate::shape::{self, Container, EnumShape, Format, PrimitiveKind, RecordShape, TypeIdentity, TypeShape};

pub struct ValueProber<'s, 'p> {
    session: &'s mut ProbeSession<'p>,
}

/// Probe one nested value. A failure degrades that value to the placeholder
/// and leaves the path where it was.
pub(crate) fn probe_child<T>(session: &mut ProbeSession<'_>, value: &T) -> TypeShape
where
    T: ?Sized + Serialize,
{
    let mark = session.path.mark();
    match value.serialize(ValueProber { session: &mut *session }) {
        Ok(shape) => shape,
        Err(err) => {
            debug!(path = %session.path, error = %err, "value probe failed; degrading subtree");
            session.path.truncate(mark);
            TypeShape::null()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Walk {
    Active,
    Reentrant,
    TooDeep,
}

fn open(session: &mut ProbeSession<'_>, identity: TypeIdentity) -> (Walk, Mark) {
    let mark = session.path.mark();
    let too_deep = session.too_deep();
    let entry = session.path.enter(identity);
    let walk = match (too_deep, entry) {
        (true, _) => Walk::TooDeep,
        (false, Entry::Reentrant) => Walk::Reentrant,
        (false, Entry::Fresh) => Walk::Active,
    };
    (walk, mark)
}

fn close(session: &mut ProbeSession<'_>, walk: Walk, mark: Mark, identity: &TypeIdentity, shape: impl FnOnce() -> TypeShape) -> TypeShape {
    let out = match walk {
        Walk::Active => shape(),
        Walk::Reentrant => {
            debug!(path = %session.path, type_name = %identity, "cycle break");
            TypeShape::recursive(identity.clone())
        }
        Walk::TooDeep => {
            debug!(path = %session.path, max = session.config.max_depth, "depth limit; degrading subtree");
            TypeShape::null()
        }
    };
    session.path.truncate(mark);
    out
}

fn variant_shape(enum_identity: TypeIdentity, variant: &'static str, payload: Option<TypeShape>) -> TypeShape {
    let mut payloads = IndexMap::new();
    if let Some(p) = payload {
        payloads.insert(variant.to_string(), p);
    }
    TypeShape::new(
        enum_identity,
        Container::Enum(EnumShape { cases: vec![variant.to_string()], payloads }),
    )
}

fn insert_field(record: &mut RecordShape, key: &str, shape: TypeShape) {
    let merged = match record.fields.get(key) {
        Some(existing) => {
            debug!(field = key, "field written twice; joining observations");
            shape::join(existing, &shape)
        }
        None => shape,
    };
    record.fields.insert(key.to_string(), merged);
}

impl<'s, 'p> ValueProber<'s, 'p> {
    fn leaf(kind: PrimitiveKind) -> Result<TypeShape, ProbeError> {
        Ok(TypeShape::leaf(kind))
    }
}

impl<'s, 'p> Serializer for ValueProber<'s, 'p> {
    type Ok = TypeShape;
    type Error = ProbeError;
    type SerializeSeq = SeqProber<'s, 'p>;
    type SerializeTuple = TupleProber<'s, 'p>;
    type SerializeTupleStruct = TupleProber<'s, 'p>;
    type SerializeTupleVariant = TupleProber<'s, 'p>;
    type SerializeMap = MapProber<'s, 'p>;
    type SerializeStruct = StructProber<'s, 'p>;
    type SerializeStructVariant = StructProber<'s, 'p>;

    fn serialize_bool(self, _: bool) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::Bool)
    }

    fn serialize_i8(self, _: i8) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::I8)
    }

    fn serialize_i16(self, _: i16) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::I16)
    }

    fn serialize_i32(self, _: i32) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::I32)
    }

    fn serialize_i64(self, _: i64) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::I64)
    }

    fn serialize_i128(self, _: i128) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::I128)
    }

    fn serialize_u8(self, _: u8) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::U8)
    }

    fn serialize_u16(self, _: u16) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::U16)
    }

    fn serialize_u32(self, _: u32) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::U32)
    }

    fn serialize_u64(self, _: u64) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::U64)
    }

    fn serialize_u128(self, _: u128) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::U128)
    }

    fn serialize_f32(self, _: f32) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::F32)
    }

    fn serialize_f64(self, _: f64) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::F64)
    }

    fn serialize_char(self, _: char) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::Char)
    }

    fn serialize_str(self, v: &str) -> Result<TypeShape, ProbeError> {
        let format = if self.session.config.detect_formats {
            self.session.policy.detect_sample(v)
        } else {
            None
        };
        Ok(TypeShape::leaf(PrimitiveKind::String).with_format(format))
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<TypeShape, ProbeError> {
        Ok(TypeShape::leaf(PrimitiveKind::Bytes).with_format(Some(Format::Binary)))
    }

    fn serialize_none(self) -> Result<TypeShape, ProbeError> {
        Ok(TypeShape::null().optional())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<TypeShape, ProbeError> {
        value.serialize(self).map(TypeShape::optional)
    }

    fn serialize_unit(self) -> Result<TypeShape, ProbeError> {
        Self::leaf(PrimitiveKind::Unit)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<TypeShape, ProbeError> {
        Ok(TypeShape::leaf(PrimitiveKind::Unit).with_identity(TypeIdentity::named(name)))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<TypeShape, ProbeError> {
        Ok(variant_shape(TypeIdentity::named(name), variant, None))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<TypeShape, ProbeError> {
        let identity = TypeIdentity::named(name);
        let (walk, mark) = open(self.session, identity.clone());
        let inner = match walk {
            Walk::Active => Some(probe_child(self.session, value)),
            _ => None,
        };
        Ok(close(self.session, walk, mark, &identity, || {
            TypeShape::newtype(identity.clone(), inner.unwrap_or_else(TypeShape::null))
        }))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<TypeShape, ProbeError> {
        let identity = TypeIdentity::named(name);
        let (walk, mark) = open(self.session, identity.clone());
        let payload = match walk {
            Walk::Active => {
                self.session.path.set_key(PathKey::Variant(variant));
                Some(probe_child(self.session, value))
            }
            _ => None,
        };
        Ok(close(self.session, walk, mark, &identity, || {
            variant_shape(identity.clone(), variant, payload)
        }))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqProber<'s, 'p>, ProbeError> {
        let (walk, mark) = open(self.session, TypeIdentity::anonymous("Vec"));
        Ok(SeqProber { session: self.session, walk, mark, element: None, index: 0 })
    }

    fn serialize_tuple(self, len: usize) -> Result<TupleProber<'s, 'p>, ProbeError> {
        TupleProber::open(self.session, TypeIdentity::anonymous("Tuple"), None, len)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<TupleProber<'s, 'p>, ProbeError> {
        TupleProber::open(self.session, TypeIdentity::named(name), None, len)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TupleProber<'s, 'p>, ProbeError> {
        TupleProber::open(self.session, TypeIdentity::named(name), Some(variant), len)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapProber<'s, 'p>, ProbeError> {
        let (walk, mark) = open(self.session, TypeIdentity::anonymous("Map"));
        Ok(MapProber {
            session: self.session,
            walk,
            mark,
            record: RecordRequest::FullKeyEnumeration.empty_record(),
            order: EntryOrder::default(),
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<StructProber<'s, 'p>, ProbeError> {
        Ok(StructProber::open(self.session, TypeIdentity::named(name), None))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<StructProber<'s, 'p>, ProbeError> {
        Ok(StructProber::open(self.session, TypeIdentity::named(name), Some(variant)))
    }
}

// ------------------------------- Lists ------------------------------------ //

pub struct SeqProber<'s, 'p> {
    session: &'s mut ProbeSession<'p>,
    walk: Walk,
    mark: Mark,
    /// Join of every element seen so far.
    element: Option<TypeShape>,
    index: usize,
}

impl ser::SerializeSeq for SeqProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        if self.walk != Walk::Active {
            return Ok(());
        }
        self.session.path.set_key(PathKey::Index(self.index));
        let observed = probe_child(self.session, value);
        self.element = Some(match self.element.take() {
            None => observed,
            Some(prev) => shape::join(&prev, &observed),
        });
        self.index += 1;
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        let identity = TypeIdentity::anonymous("Vec");
        let element = self.element;
        Ok(close(self.session, self.walk, self.mark, &identity, || {
            TypeShape::list(element.unwrap_or_else(TypeShape::null))
        }))
    }
}

pub struct TupleProber<'s, 'p> {
    session: &'s mut ProbeSession<'p>,
    walk: Walk,
    mark: Mark,
    identity: TypeIdentity,
    variant: Option<&'static str>,
    items: Vec<TypeShape>,
}

impl<'s, 'p> TupleProber<'s, 'p> {
    fn open(
        session: &'s mut ProbeSession<'p>,
        identity: TypeIdentity,
        variant: Option<&'static str>,
        len: usize,
    ) -> Result<Self, ProbeError> {
        let (walk, mark) = open(session, identity.clone());
        Ok(Self { session, walk, mark, identity, variant, items: Vec::with_capacity(len) })
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) {
        if self.walk != Walk::Active {
            return;
        }
        self.session.path.set_key(PathKey::Index(self.items.len()));
        let observed = probe_child(self.session, value);
        self.items.push(observed);
    }

    fn finish(self) -> TypeShape {
        let Self { session, walk, mark, identity, variant, items } = self;
        close(session, walk, mark, &identity, || match variant {
            None => TypeShape::new(identity.clone(), Container::Tuple(items)),
            Some(v) => {
                let payload = TypeShape::new(TypeIdentity::anonymous(v), Container::Tuple(items));
                variant_shape(identity.clone(), v, Some(payload))
            }
        })
    }
}

impl ser::SerializeTuple for TupleProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for TupleProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for TupleProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        Ok(self.finish())
    }
}

// ------------------------------- Records ---------------------------------- //

/// Open record: every value joins into the single representative entry.
pub struct MapProber<'s, 'p> {
    session: &'s mut ProbeSession<'p>,
    walk: Walk,
    mark: Mark,
    record: RecordShape,
    order: EntryOrder,
}

impl ser::SerializeMap for MapProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), ProbeError> {
        if self.walk != Walk::Active {
            return Ok(());
        }
        self.order.key()
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        if self.walk != Walk::Active {
            return Ok(());
        }
        self.order.value()?;
        self.session.path.set_key(PathKey::MapValue);
        let observed = probe_child(self.session, value);
        if let Some(rep) = self.record.fields.get_mut(RecordShape::ANY_KEY) {
            *rep = shape::join(rep, &observed);
        }
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        let identity = TypeIdentity::anonymous("Map");
        let record = self.record;
        Ok(close(self.session, self.walk, self.mark, &identity, || {
            TypeShape::new(identity.clone(), Container::Record(record))
        }))
    }
}

/// Fixed record: fields are recorded in the order the instance writes them.
pub struct StructProber<'s, 'p> {
    session: &'s mut ProbeSession<'p>,
    walk: Walk,
    mark: Mark,
    identity: TypeIdentity,
    variant: Option<&'static str>,
    record: RecordShape,
}

impl<'s, 'p> StructProber<'s, 'p> {
    fn open(session: &'s mut ProbeSession<'p>, identity: TypeIdentity, variant: Option<&'static str>) -> Self {
        let (walk, mark) = open(session, identity.clone());
        Self {
            session,
            walk,
            mark,
            identity,
            variant,
            record: RecordRequest::Declared(&[]).empty_record(),
        }
    }

    fn field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) {
        if self.walk != Walk::Active {
            return;
        }
        self.session.path.set_key(PathKey::Field(key.to_string()));
        let observed = probe_child(self.session, value);
        insert_field(&mut self.record, key, observed);
    }

    /// A field the instance chose not to write is known to exist but is absent.
    fn skipped(&mut self, key: &'static str) {
        if self.walk == Walk::Active && !self.record.fields.contains_key(key) {
            self.record.fields.insert(key.to_string(), TypeShape::null().optional());
        }
    }

    fn finish(self) -> TypeShape {
        let Self { session, walk, mark, identity, variant, record } = self;
        close(session, walk, mark, &identity, || match variant {
            None => TypeShape::new(identity.clone(), Container::Record(record)),
            Some(v) => {
                let payload = TypeShape::new(TypeIdentity::anonymous(v), Container::Record(record));
                variant_shape(identity.clone(), v, Some(payload))
            }
        })
    }
}

impl ser::SerializeStruct for StructProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), ProbeError> {
        self.field(key, value);
        Ok(())
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), ProbeError> {
        self.skipped(key);
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for StructProber<'_, '_> {
    type Ok = TypeShape;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), ProbeError> {
        self.field(key, value);
        Ok(())
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), ProbeError> {
        self.skipped(key);
        Ok(())
    }

    fn end(self) -> Result<TypeShape, ProbeError> {
        Ok(self.finish())
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;
    use crate::config::SynthesisConfig;
    use crate::probe::probe_value;
    use crate::shape::WellKnownFormats;

    fn shape_of<T: Serialize>(value: &T) -> TypeShape {
        probe_value(value, &SynthesisConfig::default(), &WellKnownFormats)
    }

    fn record(shape: &TypeShape) -> &RecordShape {
        match &shape.container {
            Container::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[derive(Serialize)]
    struct Tag {
        id: i64,
        value: String,
    }

    #[test]
    fn struct_fields_in_write_order() {
        let shape = shape_of(&Tag { id: 1, value: "a".into() });
        assert_eq!(shape.type_identity, TypeIdentity::named("Tag"));
        let r = record(&shape);
        assert!(r.is_fixed);
        assert_eq!(r.fields.keys().collect::<Vec<_>>(), ["id", "value"]);
        assert_eq!(r.fields["id"].container, Container::Leaf(PrimitiveKind::I64));
    }

    #[derive(Serialize)]
    struct Sparse {
        present: Option<u8>,
        absent: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        skipped: Option<u8>,
    }

    #[test]
    fn absence_marks_edges_optional() {
        let shape = shape_of(&Sparse { present: Some(1), absent: None, skipped: None });
        let r = record(&shape);
        assert!(r.fields["present"].is_optional);
        assert_eq!(r.fields["present"].container, Container::Leaf(PrimitiveKind::U8));
        assert!(r.fields["absent"].is_optional && r.fields["absent"].is_placeholder());
        assert!(r.fields["skipped"].is_optional && r.fields["skipped"].is_placeholder());
    }

    #[test]
    fn maps_are_open_with_joined_values() {
        let mut m = BTreeMap::new();
        m.insert("a", 1i32);
        m.insert("b", 2i32);
        let shape = shape_of(&m);
        let r = record(&shape);
        assert!(!r.is_fixed);
        assert_eq!(
            r.any_key_value().map(|v| &v.container),
            Some(&Container::Leaf(PrimitiveKind::I32))
        );
    }

    #[test]
    fn empty_list_keeps_placeholder_element() {
        let shape = shape_of(&Vec::<Tag>::new());
        let Container::List(item) = &shape.container else { panic!("list expected") };
        assert!(item.is_placeholder());
    }

    #[derive(Serialize)]
    struct Node {
        name: String,
        children: Vec<Node>,
    }

    #[test]
    fn live_cycles_are_cut_at_reentrance() {
        let tree = Node {
            name: "root".into(),
            children: vec![Node { name: "leaf".into(), children: vec![] }],
        };
        let shape = shape_of(&tree);
        let r = record(&shape);
        let Container::List(item) = &r.fields["children"].container else { panic!("list expected") };
        assert!(item.is_recursive());
        assert_eq!(item.type_identity, TypeIdentity::named("Node"));
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: f64, h: f64 },
    }

    #[test]
    fn variants_record_the_case_taken() {
        let unit = shape_of(&Shape::Empty);
        let Container::Enum(e) = &unit.container else { panic!("enum expected") };
        assert_eq!(e.cases, ["Empty"]);
        assert!(e.is_unit_only());

        let rect = shape_of(&Shape::Rect { w: 1.0, h: 2.0 });
        let Container::Enum(e) = &rect.container else { panic!("enum expected") };
        assert_eq!(record(&e.payloads["Rect"]).fields.len(), 2);

        let circle = shape_of(&Shape::Circle(1.0));
        let Container::Enum(e) = &circle.container else { panic!("enum expected") };
        assert_eq!(e.payloads["Circle"].container, Container::Leaf(PrimitiveKind::F64));
    }

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("cannot serialize"))
        }
    }

    #[derive(Serialize)]
    struct Holder {
        ok: bool,
        broken: Broken,
        after: u32,
    }

    #[test]
    fn failing_field_degrades_locally() {
        let shape = shape_of(&Holder { ok: true, broken: Broken, after: 3 });
        let r = record(&shape);
        assert!(r.fields["broken"].is_placeholder());
        assert_eq!(r.fields["after"].container, Container::Leaf(PrimitiveKind::U32));
    }

    #[test]
    fn string_samples_carry_formats() {
        let shape = shape_of(&"https://example.com");
        assert_eq!(shape.format, Some(Format::Uri));
        let off = SynthesisConfig::builder().detect_formats(false).build();
        assert_eq!(probe_value(&"https://example.com", &off, &WellKnownFormats).format, None);
    }

    #[test]
    fn depth_limit_degrades() {
        let config = SynthesisConfig::builder().max_depth(1).build();
        let shape = probe_value(&vec![vec![1u8]], &config, &WellKnownFormats);
        let Container::List(item) = &shape.container else { panic!("list expected") };
        assert!(item.is_placeholder());
    }
}
