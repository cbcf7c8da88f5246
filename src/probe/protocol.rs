//! The structural walker protocol as seen by the probers.
//!
//! A type's own serde logic asks for one of three capabilities at every
//! position: a single leaf (possibly delegating to a nested value), a list, or a
//! record. The serializer or deserializer is consumed by whichever capability
//! is called, so a position can never be asked for two of them. Records come in
//! two flavors and [`RecordRequest`] tells them apart without any trial
//! decoding: a struct declares its keys, a map asks for the full key
//! enumeration.

use crate::error::ProbeError;
use crate::shape::{RecordShape, TypeShape};

/// How a record-shaped traversal asked for its keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordRequest {
    /// Struct-like: a fixed key set. Read mode knows the names up front; write
    /// mode learns them field by field and passes an empty list.
    Declared(&'static [&'static str]),
    /// Map-like: the traversal enumerates whatever keys are present.
    FullKeyEnumeration,
}

impl RecordRequest {
    pub fn requests_full_key_enumeration(&self) -> bool {
        matches!(self, RecordRequest::FullKeyEnumeration)
    }

    pub fn declared_fields(&self) -> &'static [&'static str] {
        match self {
            RecordRequest::Declared(fields) => fields,
            RecordRequest::FullKeyEnumeration => &[],
        }
    }

    /// Empty record matching the request. Open records start with the null
    /// placeholder as their representative value.
    pub fn empty_record(&self) -> RecordShape {
        if self.requests_full_key_enumeration() {
            RecordShape::open(TypeShape::null())
        } else {
            RecordShape::fixed()
        }
    }
}

/// Key/value discipline of a map traversal: every value must follow exactly
/// one key.
#[derive(Debug, Default)]
pub struct EntryOrder {
    awaiting_value: bool,
}

impl EntryOrder {
    pub fn key(&mut self) -> Result<(), ProbeError> {
        if self.awaiting_value {
            return Err(ProbeError::UnsupportedSequence("map key followed by another key"));
        }
        self.awaiting_value = true;
        Ok(())
    }

    pub fn value(&mut self) -> Result<(), ProbeError> {
        if !self.awaiting_value {
            return Err(ProbeError::UnsupportedSequence("map value without a key"));
        }
        self.awaiting_value = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_records_are_fixed() {
        let req = RecordRequest::Declared(&["id", "value"]);
        assert!(!req.requests_full_key_enumeration());
        assert_eq!(req.declared_fields(), ["id", "value"]);
        assert!(req.empty_record().is_fixed);
    }

    #[test]
    fn full_key_enumeration_is_open() {
        let req = RecordRequest::FullKeyEnumeration;
        assert!(req.requests_full_key_enumeration());
        let record = req.empty_record();
        assert!(!record.is_fixed);
        assert!(record.any_key_value().is_some_and(TypeShape::is_placeholder));
    }

    #[test]
    fn entry_order_rejects_orphans() {
        let mut order = EntryOrder::default();
        assert!(order.value().is_err());
        order.key().unwrap();
        assert!(order.key().is_err());
        order.value().unwrap();
    }
}
