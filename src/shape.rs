//! Shape model: what a probe observed about a value or type.
//!
//! A [`TypeShape`] is recorded as a byproduct of walking a value (or a type, with
//! dummy data) through serde. Shapes from different walks of the same type are
//! combined with [`join`], a least-upper-bound merge in the spirit of a sample
//! joiner: optionality ORs, the null placeholder is the identity element, and a
//! field seen on only one side becomes optional.
pub mod format;
pub mod identity;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

pub use format::{Format, FormatPolicy, WellKnownFormats};
pub use identity::TypeIdentity;

/// Primitive leaf kinds.
///
/// `Null` is the null placeholder: an absent value, or a subtree whose probe
/// degraded. It is not the unit type, which is `Unit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Bool,
    Char,
    String,
    Bytes,
    Unit,
    Null,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::I128 => "i128",
            PrimitiveKind::Isize => "isize",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::U128 => "u128",
            PrimitiveKind::Usize => "usize",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "String",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::Unit => "()",
            PrimitiveKind::Null => "null",
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
                | PrimitiveKind::Isize
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
                | PrimitiveKind::Usize
        )
    }
}

/// Observed shape of one position: the type it holds, whether the edge leading
/// to it is optional, and its container kind.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeShape {
    pub type_identity: TypeIdentity,
    /// Property of the edge (field, element, map value), not of the type.
    pub is_optional: bool,
    pub container: Container,
    /// Format hint for string-like leaves.
    pub format: Option<Format>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Container {
    Leaf(PrimitiveKind),
    Record(RecordShape),
    List(Box<TypeShape>),
    /// Fixed-arity list with per-position shapes.
    Tuple(Vec<TypeShape>),
    Enum(EnumShape),
    /// Re-entrance of a type already being probed higher up the path.
    Recursive,
}

impl Container {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Container::Leaf(_) => "leaf",
            Container::Record(_) => "record",
            Container::List(_) => "list",
            Container::Tuple(_) => "tuple",
            Container::Enum(_) => "enum",
            Container::Recursive => "recursive",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct RecordShape {
    pub fields: IndexMap<String, TypeShape>,
    /// `false` for dictionary-shaped records with arbitrary keys.
    pub is_fixed: bool,
}

impl RecordShape {
    /// Key of the single representative entry of an open record.
    pub const ANY_KEY: &'static str = "*";

    pub fn fixed() -> Self {
        Self { fields: IndexMap::new(), is_fixed: true }
    }

    pub fn open(value: TypeShape) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(Self::ANY_KEY.to_string(), value);
        Self { fields, is_fixed: false }
    }

    /// Shape shared by every value of an open record.
    pub fn any_key_value(&self) -> Option<&TypeShape> {
        if self.is_fixed { None } else { self.fields.get(Self::ANY_KEY) }
    }
}

/// Enumerable cases in declaration order, with payload shapes for the cases
/// that carry data.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EnumShape {
    pub cases: Vec<String>,
    pub payloads: IndexMap<String, TypeShape>,
}

impl EnumShape {
    pub fn is_unit_only(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn unit_cases(&self) -> impl Iterator<Item = &str> {
        self.cases
            .iter()
            .filter(|c| !self.payloads.contains_key(c.as_str()))
            .map(String::as_str)
    }
}

impl TypeShape {
    pub fn new(type_identity: TypeIdentity, container: Container) -> Self {
        Self { type_identity, is_optional: false, container, format: None }
    }

    pub fn leaf(kind: PrimitiveKind) -> Self {
        Self::new(TypeIdentity::anonymous(kind.name()), Container::Leaf(kind))
    }

    /// The null placeholder.
    pub fn null() -> Self {
        Self::leaf(PrimitiveKind::Null)
    }

    pub fn recursive(type_identity: TypeIdentity) -> Self {
        Self::new(type_identity, Container::Recursive)
    }

    pub fn list(element: TypeShape) -> Self {
        Self::new(TypeIdentity::anonymous("Vec"), Container::List(Box::new(element)))
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn with_identity(mut self, type_identity: TypeIdentity) -> Self {
        self.type_identity = type_identity;
        self
    }

    /// Shape of the newtype struct `type_identity` around `inner`.
    ///
    /// A named inner shape keeps its own name. A newtype wrapping a marker back
    /// to itself has no structure of its own: behind an option the only value
    /// that ends the chain is the absent one, so it records as a named unit;
    /// without one it cannot be built and degrades to the placeholder.
    pub fn newtype(type_identity: TypeIdentity, inner: TypeShape) -> Self {
        if inner.is_recursive() && inner.type_identity == type_identity {
            return if inner.is_optional {
                Self::leaf(PrimitiveKind::Unit).with_identity(type_identity).optional()
            } else {
                Self::null().with_identity(type_identity)
            };
        }
        if inner.type_identity.is_named() { inner } else { inner.with_identity(type_identity) }
    }

    pub fn with_format(mut self, format: Option<Format>) -> Self {
        self.format = format;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.container, Container::Leaf(PrimitiveKind::Null))
    }

    pub fn is_recursive(&self) -> bool {
        matches!(self.container, Container::Recursive)
    }

    pub fn contains_recursive(&self) -> bool {
        match &self.container {
            Container::Recursive => true,
            Container::Leaf(_) => false,
            Container::Record(r) => r.fields.values().any(TypeShape::contains_recursive),
            Container::List(item) => item.contains_recursive(),
            Container::Tuple(items) => items.iter().any(TypeShape::contains_recursive),
            Container::Enum(e) => e.payloads.values().any(TypeShape::contains_recursive),
        }
    }

    /// Display names of every type a `Recursive` marker below points back to.
    pub fn recursive_targets(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_recursive_targets(&mut out);
        out
    }

    fn collect_recursive_targets(&self, out: &mut BTreeSet<String>) {
        match &self.container {
            Container::Recursive => {
                out.insert(self.type_identity.display_name());
            }
            Container::Leaf(_) => {}
            Container::Record(r) => r.fields.values().for_each(|f| f.collect_recursive_targets(out)),
            Container::List(item) => item.collect_recursive_targets(out),
            Container::Tuple(items) => items.iter().for_each(|i| i.collect_recursive_targets(out)),
            Container::Enum(e) => e.payloads.values().for_each(|p| p.collect_recursive_targets(out)),
        }
    }
}

// -------------------------------- Join (⊔) -------------------------------- //

/// Least upper bound of two observations of the same position.
///
/// Mismatched containers mean the traversal used different capabilities at one
/// position; the result degrades to the null placeholder.
pub fn join(a: &TypeShape, b: &TypeShape) -> TypeShape {
    let is_optional = a.is_optional || b.is_optional;

    let mut out = match (&a.container, &b.container) {
        (_, _) if a.is_placeholder() => b.clone(),
        (_, _) if b.is_placeholder() => a.clone(),

        (Container::Leaf(x), Container::Leaf(y)) if x == y => TypeShape {
            format: join_format(a.format, b.format),
            ..a.clone()
        },

        (Container::Record(x), Container::Record(y)) if x.is_fixed == y.is_fixed => TypeShape {
            type_identity: pick_identity(a, b),
            is_optional,
            container: Container::Record(join_record(x, y)),
            format: None,
        },

        (Container::List(x), Container::List(y)) => TypeShape {
            type_identity: pick_identity(a, b),
            is_optional,
            container: Container::List(Box::new(join(x, y))),
            format: None,
        },

        (Container::Tuple(x), Container::Tuple(y)) if x.len() == y.len() => TypeShape {
            type_identity: pick_identity(a, b),
            is_optional,
            container: Container::Tuple(x.iter().zip(y).map(|(l, r)| join(l, r)).collect()),
            format: None,
        },

        (Container::Enum(x), Container::Enum(y)) => TypeShape {
            type_identity: pick_identity(a, b),
            is_optional,
            container: Container::Enum(join_enum(x, y)),
            format: None,
        },

        (Container::Recursive, _) => a.clone(),
        (_, Container::Recursive) => b.clone(),

        (x, y) => {
            debug!(
                left = %a.type_identity,
                right = %b.type_identity,
                "conflicting capabilities ({} vs {}); degrading to placeholder",
                x.kind_name(),
                y.kind_name(),
            );
            TypeShape::null()
        }
    };

    out.is_optional = is_optional;
    out
}

fn pick_identity(a: &TypeShape, b: &TypeShape) -> TypeIdentity {
    if a.type_identity.is_named() || !b.type_identity.is_named() {
        a.type_identity.clone()
    } else {
        b.type_identity.clone()
    }
}

fn join_format(a: Option<Format>, b: Option<Format>) -> Option<Format> {
    match (a, b) {
        (Some(x), Some(y)) if x == y => Some(x),
        (Some(_), Some(_)) => None,
        (x, None) => x,
        (None, y) => y,
    }
}

fn join_record(a: &RecordShape, b: &RecordShape) -> RecordShape {
    let mut out = RecordShape { fields: IndexMap::new(), is_fixed: a.is_fixed };

    // merge keys from a
    for (k, fa) in &a.fields {
        match b.fields.get(k) {
            None => {
                out.fields.insert(k.clone(), fa.clone().optional());
            }
            Some(fb) => {
                out.fields.insert(k.clone(), join(fa, fb));
            }
        }
    }
    // add keys only in b
    for (k, fb) in &b.fields {
        if !out.fields.contains_key(k) {
            out.fields.insert(k.clone(), fb.clone().optional());
        }
    }

    out
}

fn join_enum(a: &EnumShape, b: &EnumShape) -> EnumShape {
    let mut out = a.clone();
    for case in &b.cases {
        if !out.cases.contains(case) {
            out.cases.push(case.clone());
        }
    }
    for (case, pb) in &b.payloads {
        let merged = match out.payloads.get(case) {
            Some(pa) => join(pa, pb),
            None => pb.clone(),
        };
        out.payloads.insert(case.clone(), merged);
    }
    out
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_record(fields: &[(&str, PrimitiveKind)]) -> TypeShape {
        let mut r = RecordShape::fixed();
        for (name, kind) in fields {
            r.fields.insert((*name).to_string(), TypeShape::leaf(*kind));
        }
        TypeShape::new(TypeIdentity::named("Tag"), Container::Record(r))
    }

    #[test]
    fn placeholder_is_identity_and_keeps_optionality() {
        let absent = TypeShape::null().optional();
        let known = tag_record(&[("id", PrimitiveKind::I64)]);
        let joined = join(&absent, &known);
        assert!(joined.is_optional);
        assert_eq!(joined.container, known.container);
        assert_eq!(joined.type_identity, TypeIdentity::named("Tag"));

        let flipped = join(&known, &absent);
        assert_eq!(joined, flipped);
    }

    #[test]
    fn fields_seen_on_one_side_become_optional() {
        let a = tag_record(&[("id", PrimitiveKind::I64), ("value", PrimitiveKind::String)]);
        let b = tag_record(&[("id", PrimitiveKind::I64)]);
        let joined = join(&a, &b);
        let Container::Record(r) = &joined.container else { panic!("record expected") };
        assert!(!r.fields["id"].is_optional);
        assert!(r.fields["value"].is_optional);
        assert_eq!(r.fields.keys().collect::<Vec<_>>(), ["id", "value"]);
    }

    #[test]
    fn join_is_idempotent() {
        let a = tag_record(&[("id", PrimitiveKind::I64)]);
        assert_eq!(join(&a, &a), a);
    }

    #[test]
    fn enums_union_cases_in_first_seen_order() {
        let a = TypeShape::new(
            TypeIdentity::named("Mode"),
            Container::Enum(EnumShape { cases: vec!["first".into(), "second".into()], ..Default::default() }),
        );
        let mut payloads = IndexMap::new();
        payloads.insert("third".to_string(), TypeShape::leaf(PrimitiveKind::I32));
        let b = TypeShape::new(
            TypeIdentity::named("Mode"),
            Container::Enum(EnumShape { cases: vec!["second".into(), "third".into()], payloads }),
        );
        let Container::Enum(e) = join(&a, &b).container else { panic!("enum expected") };
        assert_eq!(e.cases, ["first", "second", "third"]);
        assert_eq!(e.unit_cases().collect::<Vec<_>>(), ["first", "second"]);
    }

    #[test]
    fn mismatched_capabilities_degrade() {
        let a = TypeShape::leaf(PrimitiveKind::I32);
        let b = TypeShape::list(TypeShape::leaf(PrimitiveKind::I32)).optional();
        let joined = join(&a, &b);
        assert!(joined.is_placeholder());
        assert!(joined.is_optional);
    }

    #[test]
    fn conflicting_formats_are_dropped() {
        let a = TypeShape::leaf(PrimitiveKind::String).with_format(Some(Format::Uuid));
        let b = TypeShape::leaf(PrimitiveKind::String).with_format(Some(Format::Uri));
        let c = TypeShape::leaf(PrimitiveKind::String);
        assert_eq!(join(&a, &b).format, None);
        assert_eq!(join(&a, &c).format, Some(Format::Uuid));
    }

    #[test]
    fn recursive_targets_are_collected() {
        let mut r = RecordShape::fixed();
        r.fields.insert(
            "children".into(),
            TypeShape::list(TypeShape::recursive(TypeIdentity::named("Node"))).optional(),
        );
        let node = TypeShape::new(TypeIdentity::named("Node"), Container::Record(r));
        assert!(node.contains_recursive());
        assert_eq!(node.recursive_targets().into_iter().collect::<Vec<_>>(), ["Node"]);
    }

    #[test]
    fn open_record_exposes_representative() {
        let r = RecordShape::open(TypeShape::leaf(PrimitiveKind::I64));
        assert_eq!(r.any_key_value(), Some(&TypeShape::leaf(PrimitiveKind::I64)));
        assert_eq!(RecordShape::fixed().any_key_value(), None);
    }
}
