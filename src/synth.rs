//! Schema synthesis: lower a [`TypeShape`] into [`Schema`] nodes, extracting
//! named types into a [`ReferenceTable`].
//!
//! Records with at least one field, enums and every type a recursion marker
//! points at become reference-table entries and are replaced at the use site by
//! a reference. Other lists, primitives and dictionaries are inlined. A name is
//! reserved before its body is lowered, so a self-reference met on the way
//! resolves to the reservation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::SynthesisConfig;
use crate::dynamic::DynamicValue;
use crate::error::{Result, SynthesisError};
use crate::probe;
use crate::references::ReferenceTable;
use crate::schema::{IntegerSchema, NumberSchema, ObjectSchema, Schema, StringSchema};
use crate::shape::{Container, EnumShape, Format, FormatPolicy, PrimitiveKind, RecordShape, TypeShape, WellKnownFormats};

pub struct Synthesizer {
    config: SynthesisConfig,
    policy: Box<dyn FormatPolicy>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(SynthesisConfig::default())
    }
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config: config.clamped(), policy: Box::new(WellKnownFormats) }
    }

    /// Replace the format policy.
    pub fn with_policy(mut self, policy: impl FormatPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Render `schema` with references against the configured prefix.
    pub fn render(&self, schema: &Schema) -> serde_json::Value {
        schema.to_json(&self.config.reference_prefix)
    }

    pub fn render_table(&self, table: &ReferenceTable) -> serde_json::Value {
        table.to_json(&self.config.reference_prefix)
    }

    /// Schema for a live instance, with gaps the instance does not show
    /// (absent optionals, empty containers, cases not taken) filled from its
    /// type.
    pub fn synthesize_from_value<T>(&self, value: &T, table: &mut ReferenceTable) -> Result<Schema>
    where
        T: Serialize + Deserialize<'static>,
    {
        let shape = probe::probe_merged(value, &self.config, self.policy.as_ref());
        let schema = self.synthesize_shape(&shape, table)?;
        if !self.config.collect_examples {
            return Ok(schema);
        }
        match DynamicValue::from_serialize(value) {
            Ok(Some(example)) => Ok(attach_example(schema, example, table)),
            Ok(None) => Ok(schema),
            Err(err) => {
                debug!(error = %err, "example capture failed; keeping schema without example");
                Ok(schema)
            }
        }
    }

    /// Schema for a type, without an instance.
    pub fn synthesize_from_type<T>(&self, table: &mut ReferenceTable) -> Result<Schema>
    where
        T: Deserialize<'static>,
    {
        let shape = probe::probe_type::<T>(&self.config, self.policy.as_ref());
        self.synthesize_shape(&shape, table)
    }

    /// Lower an already probed shape.
    pub fn synthesize_shape(&self, shape: &TypeShape, table: &mut ReferenceTable) -> Result<Schema> {
        if shape.is_recursive() {
            return Err(SynthesisError::RecursiveRoot {
                type_name: shape.type_identity.display_name(),
            });
        }

        let targets = shape.recursive_targets();
        let mut defined = BTreeSet::new();
        collect_definitions(shape, &mut defined);
        if let Some(name) = targets.iter().find(|t| !defined.contains(*t) && !table.contains(t)) {
            return Err(SynthesisError::MissingReference { name: name.clone() });
        }

        let mut lowering = Lowering { config: &self.config, targets: &targets, table };
        let schema = lowering.lower(shape);
        Ok(if shape.is_optional { schema.nullable() } else { schema })
    }
}

/// Synthesize with the default configuration.
pub fn synthesize_from_value<T>(value: &T, table: &mut ReferenceTable) -> Result<Schema>
where
    T: Serialize + Deserialize<'static>,
{
    Synthesizer::default().synthesize_from_value(value, table)
}

/// Synthesize with the default configuration.
pub fn synthesize_from_type<T>(table: &mut ReferenceTable) -> Result<Schema>
where
    T: Deserialize<'static>,
{
    Synthesizer::default().synthesize_from_type::<T>(table)
}

/// Put `example` on the root, or on its table entry when the root (possibly
/// behind a nullable) is a reference.
fn attach_example(schema: Schema, example: DynamicValue, table: &mut ReferenceTable) -> Schema {
    let target = match &schema {
        Schema::Nullable(inner) => inner.as_ref(),
        other => other,
    };
    if let Schema::Reference(name) = target {
        if let Some(entry) = table.get(name).cloned() {
            table.insert(name.clone(), entry.with_example(example));
        }
        return schema;
    }
    schema.with_example(example)
}

/// Display names of the named definitions present in `shape`. Any named
/// container counts; lowering references it once a marker points at it.
fn collect_definitions(shape: &TypeShape, out: &mut BTreeSet<String>) {
    if shape.is_recursive() {
        return;
    }
    if shape.type_identity.is_named() {
        out.insert(shape.type_identity.display_name());
    }
    match &shape.container {
        Container::Recursive | Container::Leaf(_) => {}
        Container::Record(r) => r.fields.values().for_each(|f| collect_definitions(f, out)),
        Container::Enum(e) => e.payloads.values().for_each(|p| collect_definitions(p, out)),
        Container::Tuple(items) => items.iter().for_each(|i| collect_definitions(i, out)),
        Container::List(item) => collect_definitions(item, out),
    }
}

// ------------------------------- Lowering --------------------------------- //

struct Lowering<'a> {
    config: &'a SynthesisConfig,
    /// Names some recursion marker points at; always referenced.
    targets: &'a BTreeSet<String>,
    table: &'a mut ReferenceTable,
}

impl Lowering<'_> {
    fn lower(&mut self, shape: &TypeShape) -> Schema {
        match &shape.container {
            Container::Recursive => Schema::reference(shape.type_identity.display_name()),
            Container::Leaf(kind) => self.referenced(shape, false, |_| leaf(*kind, shape.format)),
            Container::List(item) => self.referenced(shape, false, |l| Schema::array(l.edge(item))),
            Container::Record(r) if !r.is_fixed => self.referenced(shape, false, |l| {
                let values = r.any_key_value().map_or(Schema::Any, |v| l.edge(v));
                Schema::dictionary(values)
            }),
            Container::Record(r) => {
                let nontrivial = !r.fields.is_empty();
                self.referenced(shape, nontrivial, |l| l.object(r))
            }
            Container::Enum(e) => self.referenced(shape, true, |l| l.enumeration(e)),
            Container::Tuple(items) => self.referenced(shape, false, |l| {
                Schema::Tuple(items.iter().map(|i| l.edge(i)).collect())
            }),
        }
    }

    /// Position other than a record field: optionality becomes nullability.
    fn edge(&mut self, shape: &TypeShape) -> Schema {
        let schema = self.lower(shape);
        if shape.is_optional { schema.nullable() } else { schema }
    }

    fn referenced(&mut self, shape: &TypeShape, nontrivial: bool, build: impl FnOnce(&mut Self) -> Schema) -> Schema {
        let name = shape.type_identity.display_name();
        if !shape.type_identity.is_named() || !(nontrivial || self.targets.contains(&name)) {
            return build(self);
        }
        if self.table.reserve(&name) {
            trace!(name = %name, "reference reserved");
        }
        let schema = build(self);
        self.table.insert(name.clone(), schema);
        Schema::Reference(name)
    }

    fn object(&mut self, record: &RecordShape) -> Schema {
        let mut obj = ObjectSchema::default();
        for (name, field) in &record.fields {
            let key = self.config.key_casing.apply(name);
            let schema = self.lower(field);
            if !field.is_optional {
                obj.required.push(key.clone());
            }
            obj.properties.insert(key, schema);
        }
        Schema::Object(obj)
    }

    fn enumeration(&mut self, e: &EnumShape) -> Schema {
        if e.is_unit_only() {
            return Schema::string_enum(e.cases.iter().cloned());
        }
        let mut arms = Vec::new();
        let units: Vec<&str> = e.unit_cases().collect();
        if !units.is_empty() {
            arms.push(Schema::string_enum(units));
        }
        for case in &e.cases {
            let Some(payload) = e.payloads.get(case) else { continue };
            let mut obj = ObjectSchema::default();
            obj.properties.insert(case.clone(), self.edge(payload));
            obj.required.push(case.clone());
            arms.push(Schema::Object(obj));
        }
        Schema::OneOf(arms)
    }
}

fn integer(format: Option<&'static str>, unsigned: bool) -> Schema {
    Schema::Integer(IntegerSchema {
        format,
        minimum: unsigned.then_some(0),
        example: None,
    })
}

fn leaf(kind: PrimitiveKind, format: Option<Format>) -> Schema {
    match kind {
        PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 => integer(Some("int32"), false),
        PrimitiveKind::I64 | PrimitiveKind::Isize => integer(Some("int64"), false),
        PrimitiveKind::I128 => integer(None, false),
        PrimitiveKind::U8 | PrimitiveKind::U16 => integer(Some("int32"), true),
        PrimitiveKind::U32 | PrimitiveKind::U64 | PrimitiveKind::Usize => integer(Some("int64"), true),
        PrimitiveKind::U128 => integer(None, true),
        PrimitiveKind::F32 => Schema::Number(NumberSchema { format: Some("float"), example: None }),
        PrimitiveKind::F64 => Schema::Number(NumberSchema { format: Some("double"), example: None }),
        PrimitiveKind::Bool => Schema::Boolean,
        PrimitiveKind::Char => Schema::String(StringSchema {
            min_length: Some(1),
            max_length: Some(1),
            ..Default::default()
        }),
        PrimitiveKind::String => Schema::String(StringSchema { format, ..Default::default() }),
        PrimitiveKind::Bytes => Schema::String(StringSchema {
            format: Some(Format::Binary),
            ..Default::default()
        }),
        PrimitiveKind::Unit => Schema::Null,
        PrimitiveKind::Null => Schema::Any,
    }
}
