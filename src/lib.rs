//! Synthesize schema documents from the serde traversals of values and types.
//!
//! A value (or just its type) is walked through its own `Serialize` /
//! `Deserialize` impl against a recording serializer or a dummy-producing
//! deserializer. What the impl asks for is collected as a [`TypeShape`] and
//! lowered to [`Schema`] nodes, with named types extracted into a
//! [`ReferenceTable`] shared across one document.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use shape_synth::{synthesize_from_type, ReferenceTable, Schema};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Tag {
//!     id: i64,
//!     value: String,
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct ListResponse {
//!     tags: Vec<Tag>,
//! }
//!
//! let mut table = ReferenceTable::new();
//! let root = synthesize_from_type::<ListResponse>(&mut table)?;
//! assert_eq!(root, Schema::reference("ListResponse"));
//! assert_eq!(table.names().collect::<Vec<_>>(), ["ListResponse", "Tag"]);
//! # Ok::<_, shape_synth::SynthesisError>(())
//! ```
pub mod config;
pub mod dynamic;
pub mod error;
pub mod probe;
pub mod references;
pub mod schema;
pub mod shape;
pub mod synth;

pub use config::{KeyCasing, SynthesisConfig, SynthesisConfigBuilder};
pub use dynamic::DynamicValue;
pub use error::{DynamicError, Result, SynthesisError};
pub use probe::{probe_merged, probe_type, probe_value};
pub use references::ReferenceTable;
pub use schema::Schema;
pub use shape::{Container, Format, FormatPolicy, PrimitiveKind, TypeIdentity, TypeShape, WellKnownFormats};
pub use synth::{synthesize_from_type, synthesize_from_value, Synthesizer};
