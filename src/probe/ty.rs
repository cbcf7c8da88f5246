//! Type-only prober: a `Deserializer` that invents data.
//!
//! The type's own `Deserialize` impl drives the walk. Every capability it asks
//! for is recorded into a shape slot and answered with a dummy value: one
//! element per list, one entry per map, `Some` for options, an RFC 3339 string
//! for a visitor that expects a date-time, and so on.
//!
//! An enum can only take one variant per walk, so the walk is repeated. Each
//! pass picks variants not yet explored and the shapes of all passes are
//! joined. When a named type re-enters itself the position is recorded as
//! `Recursive` and the rest of that value is completed minimally (no optionals,
//! empty collections, a variant known to terminate) so the visitor can finish.
//!
//! A field whose dummy the visitor rejects aborts its record. The field is
//! remembered and handed out last in the following passes, so the record's
//! other fields, and those of every enclosing record, still get recorded.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, Expected, MapAccess, SeqAccess, VariantAccess, Visitor};
use tracing::{debug, trace, warn};

use crate::config::SynthesisConfig;
use crate::error::ProbeError;
use crate::probe::ProbeSession;
use crate::probe::path::{Entry, Mark, PathKey};
use crate::probe::protocol::{EntryOrder, RecordRequest};
use crate::shape::{self, Container, EnumShape, Format, FormatPolicy, PrimitiveKind, RecordShape, TypeIdentity, TypeShape};

// ------------------------------ Exploration ------------------------------- //

/// Variant bookkeeping carried across passes.
#[derive(Debug, Default)]
pub(crate) struct Exploration {
    enums: HashMap<&'static str, EnumProgress>,
    /// Bumped whenever a new terminal variant is found; variants that failed
    /// under an older generation become eligible again.
    generation: u64,
    /// `(record, field)` pairs whose value failed; handed out last.
    deferred: HashSet<(&'static str, &'static str)>,
    fresh_deferrals: bool,
}

#[derive(Debug)]
struct EnumProgress {
    variant_count: usize,
    explored: BTreeSet<usize>,
    failed_at: HashMap<usize, u64>,
    /// A variant whose payload completed without re-entering any type.
    terminal: Option<usize>,
    /// Variant taken in the current pass and the generation it was taken under.
    chosen: Option<(usize, u64)>,
    completed: Option<bool>,
    revisit: usize,
}

impl EnumProgress {
    fn new(variant_count: usize) -> Self {
        Self {
            variant_count,
            explored: BTreeSet::new(),
            failed_at: HashMap::new(),
            terminal: None,
            chosen: None,
            completed: None,
            revisit: 0,
        }
    }

    fn eligible(&self, variant: usize, generation: u64) -> bool {
        self.failed_at.get(&variant) != Some(&generation)
    }

    fn has_candidates(&self, generation: u64) -> bool {
        (0..self.variant_count).any(|v| !self.explored.contains(&v) && self.eligible(v, generation))
    }

    /// Every variant was seen; cycle through them so enums nested in their
    /// payloads still get visited.
    fn next_revisit(&mut self, generation: u64) -> usize {
        for step in 0..self.variant_count {
            let v = (self.revisit + step) % self.variant_count;
            if self.eligible(v, generation) {
                self.revisit = v + 1;
                return v;
            }
        }
        0
    }
}

impl Exploration {
    /// Variant to take for `name` in this pass. The choice is fixed for the
    /// whole pass.
    fn choose(&mut self, name: &'static str, variant_count: usize) -> usize {
        let generation = self.generation;
        let progress = self
            .enums
            .entry(name)
            .or_insert_with(|| EnumProgress::new(variant_count));
        if let Some((v, _)) = progress.chosen {
            return v;
        }
        let pick = (0..variant_count)
            .find(|v| !progress.explored.contains(v) && progress.eligible(*v, generation))
            .unwrap_or_else(|| progress.next_revisit(generation));
        progress.chosen = Some((pick, generation));
        pick
    }

    /// Variant used to complete a value minimally.
    fn fallback(&self, name: &str) -> usize {
        self.enums.get(name).and_then(|p| p.terminal).unwrap_or(0)
    }

    fn record_outcome(&mut self, name: &'static str, variant: usize, completed: bool, recursed: bool) {
        let Some(progress) = self.enums.get_mut(name) else { return };
        progress.completed = Some(completed && progress.completed != Some(false));
        if completed && !recursed && progress.terminal.is_none() {
            progress.terminal = Some(variant);
            self.generation += 1;
            debug!(enum_name = name, variant, "terminal variant found");
        }
    }

    /// Remember that `field` of `record` failed. Returns `true` the first time.
    fn defer_field(&mut self, record: &'static str, field: &'static str) -> bool {
        let fresh = self.deferred.insert((record, field));
        if fresh {
            debug!(record, field, "field failed; deferring it in later passes");
            self.fresh_deferrals = true;
        }
        fresh
    }

    /// Declared fields with the deferred ones moved to the end.
    fn field_order(&self, record: &'static str, fields: &'static [&'static str]) -> Vec<&'static str> {
        let (late, mut order): (Vec<_>, Vec<_>) = fields
            .iter()
            .copied()
            .partition(|f| self.deferred.contains(&(record, *f)));
        order.extend(late);
        order
    }

    /// Settle the current pass. Returns whether another pass could explore
    /// something new.
    pub(crate) fn finish_pass(&mut self) -> bool {
        let deferred = std::mem::take(&mut self.fresh_deferrals);
        for progress in self.enums.values_mut() {
            if let Some((v, generation)) = progress.chosen.take() {
                match progress.completed.take() {
                    Some(true) => {
                        progress.explored.insert(v);
                    }
                    _ => {
                        progress.failed_at.insert(v, generation);
                    }
                }
            }
        }
        let generation = self.generation;
        deferred || self.enums.values().any(|p| p.has_candidates(generation))
    }
}

// -------------------------------- Entry ----------------------------------- //

struct TypePass<'p> {
    session: ProbeSession<'p>,
    exploration: Exploration,
    recursion_hits: usize,
}

pub(crate) fn probe<T>(config: &SynthesisConfig, policy: &dyn FormatPolicy) -> TypeShape
where
    T: Deserialize<'static>,
{
    let budget = config.max_passes.max(1);
    let mut exploration = Exploration::default();
    let mut joined: Option<TypeShape> = None;

    for pass in 1..=budget {
        trace!(pass, type_name = std::any::type_name::<T>(), "type probe pass");
        let mut state = TypePass {
            session: ProbeSession::new(config, policy),
            exploration,
            recursion_hits: 0,
        };
        let mut slot = TypeShape::null();
        let prober = TypeProber { pass: &mut state, slot: &mut slot, minimal: false };
        if let Err(err) = serde_path_to_error::deserialize::<_, T>(prober) {
            debug!(
                pass,
                path = %err.path(),
                error = %err.inner(),
                "type probe pass ended early; keeping partial shape"
            );
        }
        exploration = state.exploration;

        joined = Some(match joined {
            None => slot,
            Some(prev) => shape::join(&prev, &slot),
        });

        if !exploration.finish_pass() {
            break;
        }
        if pass == budget {
            warn!(
                type_name = std::any::type_name::<T>(),
                passes = budget,
                "exploration budget exhausted; some cases or fields may lack shapes"
            );
        }
    }

    joined.unwrap_or_else(TypeShape::null)
}

// ------------------------------- Prober ----------------------------------- //

pub(crate) struct TypeProber<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    slot: &'a mut TypeShape,
    /// Completing a value whose shape is already known; nothing is recorded.
    minimal: bool,
}

macro_rules! dummy_leaves {
    ($($method:ident => $visit:ident($value:expr) as $kind:ident;)*) => {$(
        fn $method<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
            self.write(TypeShape::leaf(PrimitiveKind::$kind));
            visitor.$visit($value)
        }
    )*};
}

impl<'a, 'p> TypeProber<'a, 'p> {
    fn write(&mut self, shape: TypeShape) {
        if !self.minimal {
            *self.slot = shape;
        }
    }

    fn child<'b>(&'b mut self, slot: &'b mut TypeShape) -> TypeProber<'b, 'p> {
        TypeProber { pass: &mut *self.pass, slot, minimal: self.minimal }
    }

    /// Push a frame for `identity`. Re-entrance records the marker and
    /// switches this value to minimal completion.
    fn open(&mut self, identity: TypeIdentity) -> Result<Mark, ProbeError> {
        let session = &mut self.pass.session;
        let mark = session.path.mark();
        if session.too_deep() {
            return Err(ProbeError::DepthExceeded {
                depth: session.path.depth() + 1,
                max: session.config.max_depth,
            });
        }
        if session.path.enter(identity.clone()) == Entry::Reentrant && !self.minimal {
            debug!(path = %session.path, type_name = %identity, "cycle break; completing minimally");
            *self.slot = TypeShape::recursive(identity);
            self.pass.recursion_hits += 1;
            self.minimal = true;
        }
        Ok(mark)
    }

    fn close(&mut self, mark: Mark) {
        self.pass.session.path.truncate(mark);
    }

    /// Record a string leaf and pick a dummy the visitor will accept.
    fn string_leaf(&mut self, expecting: &dyn Expected) -> &'static str {
        let session = &self.pass.session;
        let format = session.policy.recognize_expectation(&expecting.to_string());
        let dummy = format.map_or("", |f| session.policy.dummy(f));
        let hint = format.filter(|_| session.config.detect_formats);
        self.write(TypeShape::leaf(PrimitiveKind::String).with_format(hint));
        dummy
    }

    fn probe_tuple<V>(mut self, identity: TypeIdentity, len: usize, visitor: V) -> Result<V::Value, ProbeError>
    where
        V: Visitor<'static>,
    {
        let mark = self.open(identity.clone())?;
        let mut items = Vec::with_capacity(len);
        let out = visitor.visit_seq(TupleAccess {
            pass: &mut *self.pass,
            items: &mut items,
            len,
            minimal: self.minimal,
        });
        items.resize(len, TypeShape::null());
        self.write(TypeShape::new(identity, Container::Tuple(items)));
        self.close(mark);
        out
    }

    fn probe_record<V>(
        mut self,
        owner: &'static str,
        identity: TypeIdentity,
        request: RecordRequest,
        visitor: V,
    ) -> Result<V::Value, ProbeError>
    where
        V: Visitor<'static>,
    {
        let mark = self.open(identity.clone())?;
        let fields = request.declared_fields();
        let mut record = request.empty_record();
        let keys = self.pass.exploration.field_order(owner, fields);
        let out = visitor.visit_map(FieldAccess {
            pass: &mut *self.pass,
            record: &mut record,
            owner,
            keys,
            index: 0,
            order: EntryOrder::default(),
            minimal: self.minimal,
        });
        if out.is_err() {
            // keep what was learned; fields never reached become placeholders
            for name in fields {
                record.fields.entry((*name).to_string()).or_insert_with(TypeShape::null);
            }
        }
        if record.is_fixed {
            // declaration order, whatever order the keys were handed out in
            let position = |name: &str| fields.iter().position(|f| *f == name);
            record.fields.sort_by(|a, _, b, _| position(a.as_str()).cmp(&position(b.as_str())));
        }
        self.write(TypeShape::new(identity, Container::Record(record)));
        self.close(mark);
        out
    }
}

impl<'a, 'p> Deserializer<'static> for TypeProber<'a, 'p> {
    type Error = ProbeError;

    dummy_leaves! {
        deserialize_bool => visit_bool(false) as Bool;
        deserialize_i8 => visit_i8(1) as I8;
        deserialize_i16 => visit_i16(1) as I16;
        deserialize_i32 => visit_i32(1) as I32;
        deserialize_i64 => visit_i64(1) as I64;
        deserialize_i128 => visit_i128(1) as I128;
        deserialize_u8 => visit_u8(1) as U8;
        deserialize_u16 => visit_u16(1) as U16;
        deserialize_u32 => visit_u32(1) as U32;
        deserialize_u64 => visit_u64(1) as U64;
        deserialize_u128 => visit_u128(1) as U128;
        deserialize_f32 => visit_f32(0.0) as F32;
        deserialize_f64 => visit_f64(0.0) as F64;
        deserialize_char => visit_char('a') as Char;
    }

    fn deserialize_unit<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        self.write(TypeShape::leaf(PrimitiveKind::Unit));
        visitor.visit_unit()
    }

    fn deserialize_any<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        self.write(TypeShape::null());
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V: Visitor<'static>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        self.deserialize_any(visitor)
    }

    fn deserialize_str<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        let dummy = self.string_leaf(&visitor);
        visitor.visit_borrowed_str(dummy)
    }

    fn deserialize_string<V: Visitor<'static>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        self.write(TypeShape::leaf(PrimitiveKind::String));
        visitor.visit_borrowed_str("")
    }

    fn deserialize_bytes<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        self.write(TypeShape::leaf(PrimitiveKind::Bytes).with_format(Some(Format::Binary)));
        visitor.visit_borrowed_bytes(&[])
    }

    fn deserialize_byte_buf<V: Visitor<'static>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        if self.minimal {
            return visitor.visit_none();
        }
        let mut inner = TypeShape::null();
        let out = visitor.visit_some(self.child(&mut inner));
        self.write(inner.optional());
        out
    }

    fn deserialize_unit_struct<V: Visitor<'static>>(mut self, name: &'static str, visitor: V) -> Result<V::Value, ProbeError> {
        self.write(TypeShape::leaf(PrimitiveKind::Unit).with_identity(TypeIdentity::named(name)));
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'static>>(mut self, name: &'static str, visitor: V) -> Result<V::Value, ProbeError> {
        let identity = TypeIdentity::named(name);
        let mark = self.open(identity.clone())?;
        let mut inner = TypeShape::null();
        let out = visitor.visit_newtype_struct(self.child(&mut inner));
        self.write(TypeShape::newtype(identity, inner));
        self.close(mark);
        out
    }

    fn deserialize_seq<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        let mark = self.open(TypeIdentity::anonymous("Vec"))?;
        let mut element = TypeShape::null();
        let out = visitor.visit_seq(ListAccess {
            pass: &mut *self.pass,
            element: &mut element,
            remaining: usize::from(!self.minimal),
            minimal: self.minimal,
        });
        self.write(TypeShape::list(element));
        self.close(mark);
        out
    }

    fn deserialize_tuple<V: Visitor<'static>>(self, len: usize, visitor: V) -> Result<V::Value, ProbeError> {
        self.probe_tuple(TypeIdentity::anonymous("Tuple"), len, visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'static>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        self.probe_tuple(TypeIdentity::named(name), len, visitor)
    }

    fn deserialize_map<V: Visitor<'static>>(mut self, visitor: V) -> Result<V::Value, ProbeError> {
        let mark = self.open(TypeIdentity::anonymous("Map"))?;
        let mut value = TypeShape::null();
        let out = visitor.visit_map(OpenMapAccess {
            pass: &mut *self.pass,
            value: &mut value,
            remaining: usize::from(!self.minimal),
            order: EntryOrder::default(),
            minimal: self.minimal,
        });
        self.write(TypeShape::new(TypeIdentity::anonymous("Map"), Container::Record(RecordShape::open(value))));
        self.close(mark);
        out
    }

    fn deserialize_struct<V: Visitor<'static>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        self.probe_record(name, TypeIdentity::named(name), RecordRequest::Declared(fields), visitor)
    }

    fn deserialize_enum<V: Visitor<'static>>(
        mut self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        if variants.is_empty() {
            return Err(de::Error::custom(format_args!("enum `{name}` has no variants")));
        }
        let identity = TypeIdentity::named(name);
        let mark = self.open(identity.clone())?;

        let chosen = if self.minimal {
            self.pass.exploration.fallback(name)
        } else {
            self.pass.exploration.choose(name, variants.len())
        };
        let variant = chosen.min(variants.len() - 1);
        self.pass.session.path.set_key(PathKey::Variant(variants[variant]));

        let mut payload = None;
        let out = visitor.visit_enum(VariantPick {
            pass: &mut *self.pass,
            enum_name: name,
            variants,
            variant,
            payload: &mut payload,
            minimal: self.minimal,
        });

        let mut shape = EnumShape {
            cases: variants.iter().map(|v| (*v).to_string()).collect(),
            payloads: IndexMap::new(),
        };
        if let Some(p) = payload {
            shape.payloads.insert(variants[variant].to_string(), p);
        }
        self.write(TypeShape::new(identity, Container::Enum(shape)));
        self.close(mark);
        out
    }
}

// ------------------------------- Access ----------------------------------- //

struct ListAccess<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    element: &'a mut TypeShape,
    remaining: usize,
    minimal: bool,
}

impl SeqAccess<'static> for ListAccess<'_, '_> {
    type Error = ProbeError;

    fn next_element_seed<S: DeserializeSeed<'static>>(&mut self, seed: S) -> Result<Option<S::Value>, ProbeError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.pass.session.path.set_key(PathKey::Index(0));
        seed.deserialize(TypeProber {
            pass: &mut *self.pass,
            slot: &mut *self.element,
            minimal: self.minimal,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct TupleAccess<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    items: &'a mut Vec<TypeShape>,
    len: usize,
    minimal: bool,
}

impl SeqAccess<'static> for TupleAccess<'_, '_> {
    type Error = ProbeError;

    fn next_element_seed<S: DeserializeSeed<'static>>(&mut self, seed: S) -> Result<Option<S::Value>, ProbeError> {
        let index = self.items.len();
        if index >= self.len {
            return Ok(None);
        }
        self.pass.session.path.set_key(PathKey::Index(index));
        let mut item = TypeShape::null();
        let out = seed.deserialize(TypeProber {
            pass: &mut *self.pass,
            slot: &mut item,
            minimal: self.minimal,
        });
        self.items.push(item);
        out.map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len - self.items.len())
    }
}

/// Declared fields, handed out in declaration order except for the deferred
/// ones, which come last.
struct FieldAccess<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    record: &'a mut RecordShape,
    owner: &'static str,
    keys: Vec<&'static str>,
    index: usize,
    order: EntryOrder,
    minimal: bool,
}

impl MapAccess<'static> for FieldAccess<'_, '_> {
    type Error = ProbeError;

    fn next_key_seed<K: DeserializeSeed<'static>>(&mut self, seed: K) -> Result<Option<K::Value>, ProbeError> {
        let Some(&name) = self.keys.get(self.index) else {
            return Ok(None);
        };
        self.order.key()?;
        self.index += 1;
        self.pass.session.path.set_key(PathKey::Field(name.to_string()));
        seed.deserialize(BorrowedStrDeserializer::<ProbeError>::new(name)).map(Some)
    }

    fn next_value_seed<S: DeserializeSeed<'static>>(&mut self, seed: S) -> Result<S::Value, ProbeError> {
        self.order.value()?;
        let name = self.keys[self.index - 1];
        let mut field = TypeShape::null();
        let out = seed.deserialize(TypeProber {
            pass: &mut *self.pass,
            slot: &mut field,
            minimal: self.minimal,
        });
        if out.is_err() {
            if !self.minimal {
                self.pass.exploration.defer_field(self.owner, name);
            }
            // failed leaves become the placeholder; containers keep their partial shape
            if let Container::Leaf(_) = field.container {
                let is_optional = field.is_optional;
                field = TypeShape::null();
                field.is_optional = is_optional;
            }
        }
        self.record.fields.insert(name.to_string(), field);
        out
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len() - self.index)
    }
}

/// A map with a single invented entry. The key is completed minimally and
/// not recorded; only the value shape matters.
struct OpenMapAccess<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    value: &'a mut TypeShape,
    remaining: usize,
    order: EntryOrder,
    minimal: bool,
}

impl MapAccess<'static> for OpenMapAccess<'_, '_> {
    type Error = ProbeError;

    fn next_key_seed<K: DeserializeSeed<'static>>(&mut self, seed: K) -> Result<Option<K::Value>, ProbeError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.order.key()?;
        let mut scratch = TypeShape::null();
        seed.deserialize(TypeProber { pass: &mut *self.pass, slot: &mut scratch, minimal: true })
            .map(Some)
    }

    fn next_value_seed<S: DeserializeSeed<'static>>(&mut self, seed: S) -> Result<S::Value, ProbeError> {
        self.order.value()?;
        self.remaining -= 1;
        self.pass.session.path.set_key(PathKey::MapValue);
        seed.deserialize(TypeProber {
            pass: &mut *self.pass,
            slot: &mut *self.value,
            minimal: self.minimal,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct VariantPick<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    enum_name: &'static str,
    variants: &'static [&'static str],
    variant: usize,
    payload: &'a mut Option<TypeShape>,
    minimal: bool,
}

impl<'a, 'p> EnumAccess<'static> for VariantPick<'a, 'p> {
    type Error = ProbeError;
    type Variant = VariantPayload<'a, 'p>;

    fn variant_seed<S: DeserializeSeed<'static>>(self, seed: S) -> Result<(S::Value, Self::Variant), ProbeError> {
        let name = self.variants[self.variant];
        let value = seed.deserialize(BorrowedStrDeserializer::<ProbeError>::new(name))?;
        let hits_before = self.pass.recursion_hits;
        Ok((
            value,
            VariantPayload {
                pass: self.pass,
                enum_name: self.enum_name,
                name,
                variant: self.variant,
                payload: self.payload,
                minimal: self.minimal,
                hits_before,
            },
        ))
    }
}

struct VariantPayload<'a, 'p> {
    pass: &'a mut TypePass<'p>,
    enum_name: &'static str,
    name: &'static str,
    variant: usize,
    payload: &'a mut Option<TypeShape>,
    minimal: bool,
    hits_before: usize,
}

impl VariantPayload<'_, '_> {
    fn settle<T>(mut self, payload: Option<TypeShape>, out: Result<T, ProbeError>) -> Result<T, ProbeError> {
        *self.payload = payload;
        if !self.minimal {
            let recursed = self.pass.recursion_hits > self.hits_before;
            self.pass
                .exploration
                .record_outcome(self.enum_name, self.variant, out.is_ok(), recursed);
        }
        out
    }
}

impl VariantAccess<'static> for VariantPayload<'_, '_> {
    type Error = ProbeError;

    fn unit_variant(self) -> Result<(), ProbeError> {
        self.settle(None, Ok(()))
    }

    fn newtype_variant_seed<S: DeserializeSeed<'static>>(mut self, seed: S) -> Result<S::Value, ProbeError> {
        let mut shape = TypeShape::null();
        let out = seed.deserialize(TypeProber {
            pass: &mut *self.pass,
            slot: &mut shape,
            minimal: self.minimal,
        });
        self.settle(Some(shape), out)
    }

    fn tuple_variant<V: Visitor<'static>>(mut self, len: usize, visitor: V) -> Result<V::Value, ProbeError> {
        let mut shape = TypeShape::null();
        let out = TypeProber { pass: &mut *self.pass, slot: &mut shape, minimal: self.minimal }
            .probe_tuple(TypeIdentity::anonymous(self.name), len, visitor);
        self.settle(Some(shape), out)
    }

    fn struct_variant<V: Visitor<'static>>(
        mut self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        let mut shape = TypeShape::null();
        let out = TypeProber { pass: &mut *self.pass, slot: &mut shape, minimal: self.minimal }
            .probe_record(self.name, TypeIdentity::anonymous(self.name), RecordRequest::Declared(fields), visitor);
        self.settle(Some(shape), out)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;
    use crate::shape::WellKnownFormats;

    fn shape_of<T: Deserialize<'static>>() -> TypeShape {
        probe::<T>(&SynthesisConfig::default(), &WellKnownFormats)
    }

    fn record(shape: &TypeShape) -> &RecordShape {
        match &shape.container {
            Container::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    fn enumeration(shape: &TypeShape) -> &EnumShape {
        match &shape.container {
            Container::Enum(e) => e,
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Node {
        name: String,
        children: Option<Vec<Node>>,
    }

    #[test]
    fn self_reference_is_cut_and_completed() {
        let shape = shape_of::<Node>();
        let r = record(&shape);
        assert_eq!(r.fields.keys().collect::<Vec<_>>(), ["name", "children"]);
        let children = &r.fields["children"];
        assert!(children.is_optional);
        let Container::List(item) = &children.container else { panic!("list expected") };
        assert!(item.is_recursive());
        assert_eq!(item.type_identity, TypeIdentity::named("Node"));
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    enum Mode {
        #[serde(rename = "first")]
        First,
        #[serde(rename = "second")]
        Second,
    }

    #[test]
    fn unit_enums_list_every_case() {
        let shape = shape_of::<Mode>();
        let e = enumeration(&shape);
        assert_eq!(e.cases, ["first", "second"]);
        assert!(e.is_unit_only());
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    enum Expr {
        Add(Box<Expr>, Box<Expr>),
        Neg { inner: Box<Expr> },
        Lit(i64),
    }

    #[test]
    fn recursive_variants_are_explored_after_a_terminal_one() {
        let shape = shape_of::<Expr>();
        let e = enumeration(&shape);
        assert_eq!(e.cases, ["Add", "Neg", "Lit"]);
        assert_eq!(e.payloads["Lit"].container, Container::Leaf(PrimitiveKind::I64));

        let Container::Tuple(items) = &e.payloads["Add"].container else { panic!("tuple expected") };
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(TypeShape::is_recursive));

        assert!(record(&e.payloads["Neg"]).fields["inner"].is_recursive());
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Stamped {
        id: uuid::Uuid,
        at: chrono::DateTime<chrono::Utc>,
        day: chrono::NaiveDate,
        note: String,
    }

    #[test]
    fn well_known_strings_get_parseable_dummies() {
        let shape = shape_of::<Stamped>();
        let r = record(&shape);
        assert_eq!(r.fields["id"].format, Some(Format::Uuid));
        assert_eq!(r.fields["at"].format, Some(Format::DateTime));
        assert_eq!(r.fields["day"].format, Some(Format::Date));
        assert_eq!(r.fields["note"].format, None);
        assert_eq!(r.fields["note"].container, Container::Leaf(PrimitiveKind::String));
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Index {
        by_name: HashMap<String, Vec<u32>>,
        pair: (bool, f64),
    }

    #[test]
    fn maps_are_open_and_tuples_positional() {
        let shape = shape_of::<Index>();
        let r = record(&shape);
        let by_name = record(&r.fields["by_name"]);
        assert!(!by_name.is_fixed);
        let Some(TypeShape { container: Container::List(item), .. }) = by_name.any_key_value() else {
            panic!("list representative expected")
        };
        assert_eq!(item.container, Container::Leaf(PrimitiveKind::U32));

        let Container::Tuple(items) = &r.fields["pair"].container else { panic!("tuple expected") };
        assert_eq!(items[0].container, Container::Leaf(PrimitiveKind::Bool));
        assert_eq!(items[1].container, Container::Leaf(PrimitiveKind::F64));
    }

    #[allow(dead_code)]
    #[derive(Debug)]
    struct Picky;

    impl<'de> Deserialize<'de> for Picky {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Err(de::Error::custom(format_args!("rejected `{s}`")))
        }
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct WithPicky {
        before: u8,
        picky: Picky,
        after: u8,
    }

    #[test]
    fn failing_field_degrades_alone() {
        let shape = shape_of::<WithPicky>();
        let r = record(&shape);
        assert_eq!(r.fields.keys().collect::<Vec<_>>(), ["before", "picky", "after"]);
        assert_eq!(r.fields["before"].container, Container::Leaf(PrimitiveKind::U8));
        assert!(r.fields["picky"].is_placeholder());
        assert_eq!(r.fields["after"].container, Container::Leaf(PrimitiveKind::U8));
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Host {
        addr: std::net::IpAddr,
        port: u16,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Server {
        host: Host,
        name: String,
        replicas: u32,
    }

    #[test]
    fn nested_failure_keeps_enclosing_records() {
        let shape = shape_of::<Server>();
        let server = record(&shape);
        assert_eq!(server.fields.keys().collect::<Vec<_>>(), ["host", "name", "replicas"]);
        assert_eq!(server.fields["name"].container, Container::Leaf(PrimitiveKind::String));
        assert_eq!(server.fields["replicas"].container, Container::Leaf(PrimitiveKind::U32));

        let host = &server.fields["host"];
        assert_eq!(host.type_identity, TypeIdentity::named("Host"));
        let host = record(host);
        assert_eq!(host.fields.keys().collect::<Vec<_>>(), ["addr", "port"]);
        assert!(host.fields["addr"].is_placeholder());
        assert_eq!(host.fields["port"].container, Container::Leaf(PrimitiveKind::U16));
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Outer {
        middle: Middle,
        flag: bool,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Middle {
        inner: Inner,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Inner {
        x: u8,
    }

    #[test]
    fn depth_limit_degrades_the_deep_subtree() {
        let config = SynthesisConfig::builder().max_depth(2).build();
        let shape = probe::<Outer>(&config, &WellKnownFormats);
        let outer = record(&shape);
        assert_eq!(outer.fields["flag"].container, Container::Leaf(PrimitiveKind::Bool));
        let middle = record(&outer.fields["middle"]);
        assert!(middle.fields["inner"].is_placeholder());
    }

    #[test]
    fn pass_budget_bounds_exploration() {
        let config = SynthesisConfig::builder().max_passes(1).build();
        let shape = probe::<Expr>(&config, &WellKnownFormats);
        let e = enumeration(&shape);
        assert_eq!(e.cases, ["Add", "Neg", "Lit"]);
        assert!(e.payloads.contains_key("Add"));
        assert!(!e.payloads.contains_key("Lit"));
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Forest(Vec<Forest>);

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Chain(Option<Box<Chain>>);

    #[test]
    fn newtypes_around_themselves_keep_their_name() {
        let forest = shape_of::<Forest>();
        assert_eq!(forest.type_identity, TypeIdentity::named("Forest"));
        let Container::List(item) = &forest.container else { panic!("list expected") };
        assert!(item.is_recursive());
        assert_eq!(item.type_identity, TypeIdentity::named("Forest"));

        let chain = shape_of::<Chain>();
        assert_eq!(chain.type_identity, TypeIdentity::named("Chain"));
        assert_eq!(chain.container, Container::Leaf(PrimitiveKind::Unit));
        assert!(chain.is_optional);
    }

    #[test]
    fn exploration_stops_once_every_variant_is_seen() {
        let mut exploration = Exploration::default();
        assert_eq!(exploration.choose("Mode", 2), 0);
        assert_eq!(exploration.choose("Mode", 2), 0);
        exploration.record_outcome("Mode", 0, true, false);
        assert!(exploration.finish_pass());
        assert_eq!(exploration.choose("Mode", 2), 1);
        exploration.record_outcome("Mode", 1, true, false);
        assert!(!exploration.finish_pass());
    }

    #[test]
    fn failed_fields_are_handed_out_last() {
        let mut exploration = Exploration::default();
        assert_eq!(exploration.field_order("Host", &["addr", "port"]), ["addr", "port"]);
        assert!(exploration.defer_field("Host", "addr"));
        assert!(!exploration.defer_field("Host", "addr"));
        assert_eq!(exploration.field_order("Host", &["addr", "port"]), ["port", "addr"]);
        assert_eq!(exploration.field_order("Other", &["addr"]), ["addr"]);
        assert!(exploration.finish_pass());
        assert!(!exploration.finish_pass());
    }

    #[test]
    fn failed_variants_wait_for_a_new_generation() {
        let mut exploration = Exploration::default();
        assert_eq!(exploration.choose("Expr", 2), 0);
        exploration.record_outcome("Expr", 0, false, true);
        assert!(exploration.finish_pass());
        assert_eq!(exploration.choose("Expr", 2), 1);
        exploration.record_outcome("Expr", 1, true, false);
        assert_eq!(exploration.fallback("Expr"), 1);
        assert!(exploration.finish_pass());
        assert_eq!(exploration.choose("Expr", 2), 0);
    }
}
