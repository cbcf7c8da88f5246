//! Probers: walk a value or a bare type through serde and record its shape.
//!
//! * [`probe_value`] drives a live instance's `Serialize` impl against a
//!   shape-recording serializer.
//! * [`probe_type`] drives a type's `Deserialize` impl against a deserializer
//!   that invents dummy data and records what was asked for.
//! * [`probe_merged`] joins both, so that what the instance does not show
//!   (absent optionals, empty containers, enum cases not taken) is filled in
//!   from the type.
//!
//! All three are total: failures inside a traversal degrade the affected
//! subtree to the null placeholder and are logged, never returned.
pub mod path;
pub mod protocol;
pub mod ty;
pub mod value;

use serde::{Deserialize, Serialize};

use crate::config::SynthesisConfig;
use crate::shape::{self, FormatPolicy, TypeShape};

pub use path::{Entry, PathKey, PathStack};
pub use protocol::RecordRequest;

/// State owned by one in-flight probe.
pub struct ProbeSession<'p> {
    pub config: &'p SynthesisConfig,
    pub policy: &'p dyn FormatPolicy,
    pub path: PathStack,
}

impl<'p> ProbeSession<'p> {
    pub fn new(config: &'p SynthesisConfig, policy: &'p dyn FormatPolicy) -> Self {
        Self { config, policy, path: PathStack::new() }
    }

    pub fn too_deep(&self) -> bool {
        self.path.depth() >= self.config.max_depth.max(1)
    }
}

/// Shape of a live instance.
pub fn probe_value<T>(value: &T, config: &SynthesisConfig, policy: &dyn FormatPolicy) -> TypeShape
where
    T: ?Sized + Serialize,
{
    let mut session = ProbeSession::new(config, policy);
    value::probe_child(&mut session, value)
}

/// Shape of a type, without an instance.
pub fn probe_type<T>(config: &SynthesisConfig, policy: &dyn FormatPolicy) -> TypeShape
where
    T: Deserialize<'static>,
{
    ty::probe::<T>(config, policy)
}

/// Shape of an instance, completed from its type.
pub fn probe_merged<T>(value: &T, config: &SynthesisConfig, policy: &dyn FormatPolicy) -> TypeShape
where
    T: Serialize + Deserialize<'static>,
{
    let from_type = probe_type::<T>(config, policy);
    let from_value = probe_value(value, config, policy);
    shape::join(&from_type, &from_value)
}
