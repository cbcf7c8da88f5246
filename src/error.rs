//! Error types.
//!
//! Only [`SynthesisError`] ever reaches a caller of the synthesis entry points.
//! [`ProbeError`] is the error type the probers hand to serde; the probers absorb
//! it and degrade the affected subtree instead of returning it.

use std::fmt::Display;

use thiserror::Error;

/// Convenient alias used by the synthesis entry points.
pub type Result<T, E = SynthesisError> = std::result::Result<T, E>;

/// Errors surfaced by the schema synthesizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// A shape whose root is the `Recursive` marker was handed to the
    /// synthesizer. Probes never produce this; it means the probe layer was
    /// driven incorrectly.
    #[error("shape for `{type_name}` is a recursion marker at the root")]
    RecursiveRoot { type_name: String },

    /// A `Recursive` marker points at a type that does not enclose it.
    #[error("recursion marker for `{name}` has no enclosing definition")]
    MissingReference { name: String },
}

/// Failure raised while walking a value or type through serde.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Raised by the traversed type's own serde logic.
    #[error("{0}")]
    Custom(String),

    /// Minimal-mode completion of a recursive type went too deep.
    #[error("probe depth exceeded: {depth} > {max}")]
    DepthExceeded { depth: usize, max: usize },

    /// The traversal mixed capabilities at one position.
    #[error("unsupported capability sequence: {0}")]
    UnsupportedSequence(&'static str),
}

impl serde::ser::Error for ProbeError {
    fn custom<T: Display>(msg: T) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

impl serde::de::Error for ProbeError {
    fn custom<T: Display>(msg: T) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

/// Errors raised while capturing a [`DynamicValue`](crate::dynamic::DynamicValue).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DynamicError {
    #[error("{0}")]
    Custom(String),

    /// Map keys must render as strings.
    #[error("map key must be a string, got {0}")]
    UnsupportedKey(&'static str),
}

impl serde::ser::Error for DynamicError {
    fn custom<T: Display>(msg: T) -> Self {
        DynamicError::Custom(msg.to_string())
    }
}

impl serde::de::Error for DynamicError {
    fn custom<T: Display>(msg: T) -> Self {
        DynamicError::Custom(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render() {
        let err = SynthesisError::RecursiveRoot { type_name: "Node".into() };
        assert_eq!(err.to_string(), "shape for `Node` is a recursion marker at the root");
        let err = ProbeError::DepthExceeded { depth: 65, max: 64 };
        assert_eq!(err.to_string(), "probe depth exceeded: 65 > 64");
        let err = <DynamicError as serde::ser::Error>::custom("boom");
        assert_eq!(err, DynamicError::Custom("boom".into()));
    }
}
