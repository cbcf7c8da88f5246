//! Path stack: the ancestry of the position currently being probed.
//!
//! Used only to detect re-entrance of a named type and to render locations in
//! log messages. It lives for a single probe and is never persisted.

use std::fmt;

use crate::shape::TypeIdentity;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathKey {
    Field(String),
    Index(usize),
    MapValue,
    Variant(&'static str),
}

#[derive(Clone, Debug)]
struct Frame {
    identity: TypeIdentity,
    key: Option<PathKey>,
}

/// Result of entering a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    Fresh,
    /// The type is already being probed by an ancestor frame.
    Reentrant,
}

/// Depth to restore with [`PathStack::truncate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark(usize);

#[derive(Clone, Debug, Default)]
pub struct PathStack {
    frames: Vec<Frame>,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn mark(&self) -> Mark {
        Mark(self.frames.len())
    }

    /// Push a frame for `identity`. Re-entrance is checked against the
    /// ancestor frames only, and only for named identities.
    pub fn enter(&mut self, identity: TypeIdentity) -> Entry {
        let reentrant = identity.is_named()
            && self.frames.iter().any(|f| f.identity == identity);
        self.frames.push(Frame { identity, key: None });
        if reentrant { Entry::Reentrant } else { Entry::Fresh }
    }

    /// Set the key being visited inside the innermost frame.
    pub fn set_key(&mut self, key: PathKey) {
        if let Some(frame) = self.frames.last_mut() {
            frame.key = Some(key);
        }
    }

    /// Drop every frame above `mark`; used when a traversal unwinds with an
    /// error before closing its containers.
    pub fn truncate(&mut self, mark: Mark) {
        self.frames.truncate(mark.0);
    }
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for frame in &self.frames {
            if first {
                write!(f, "{}", frame.identity)?;
                first = false;
            }
            match &frame.key {
                Some(PathKey::Field(name)) => write!(f, ".{name}")?,
                Some(PathKey::Index(i)) => write!(f, "[{i}]")?,
                Some(PathKey::MapValue) => f.write_str("[*]")?,
                Some(PathKey::Variant(v)) => write!(f, "::{v}")?,
                None => {}
            }
        }
        if first {
            f.write_str("<root>")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrance_only_checks_ancestors() {
        let mut path = PathStack::new();
        assert_eq!(path.enter(TypeIdentity::named("Node")), Entry::Fresh);
        path.set_key(PathKey::Field("children".into()));
        assert_eq!(path.enter(TypeIdentity::anonymous("Vec")), Entry::Fresh);
        path.set_key(PathKey::Index(0));
        let inner = path.mark();
        assert_eq!(path.enter(TypeIdentity::named("Node")), Entry::Reentrant);
        path.truncate(inner);
        assert_eq!(path.to_string(), "Node.children[0]");
    }

    #[test]
    fn anonymous_identities_never_cycle() {
        let mut path = PathStack::new();
        path.enter(TypeIdentity::anonymous("Vec"));
        assert_eq!(path.enter(TypeIdentity::anonymous("Vec")), Entry::Fresh);
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn truncate_restores_depth() {
        let mut path = PathStack::new();
        let mark = path.mark();
        path.enter(TypeIdentity::named("A"));
        path.enter(TypeIdentity::named("B"));
        path.truncate(mark);
        assert_eq!(path.depth(), 0);
        assert_eq!(path.to_string(), "<root>");
    }
}
