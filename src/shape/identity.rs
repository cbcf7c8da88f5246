use std::borrow::Cow;
use std::fmt;

/// Identity of the type a shape was observed for.
///
/// Named identities come from serde (`struct`/`enum`/newtype names) and take
/// part in cycle detection and reference deduplication. Anonymous identities
/// (`Vec`, `Map`, `Tuple`, primitive names) only label a shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity {
    name: Cow<'static, str>,
    named: bool,
}

impl TypeIdentity {
    pub const fn named(name: &'static str) -> Self {
        Self { name: Cow::Borrowed(name), named: true }
    }

    pub const fn anonymous(label: &'static str) -> Self {
        Self { name: Cow::Borrowed(label), named: false }
    }

    /// Anonymous identity labelled with the display form of `T`'s Rust path.
    pub fn of<T: ?Sized>() -> Self {
        Self {
            name: Cow::Owned(display_name(std::any::type_name::<T>())),
            named: false,
        }
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deduplication key: the name with module qualification stripped.
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Strip module paths from every segment of a Rust type path.
///
/// `alloc::vec::Vec<my_crate::api::Tag>` becomes `Vec<Tag>`.
pub fn display_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut token = String::new();

    fn flush(token: &mut String, out: &mut String) {
        if !token.is_empty() {
            let last = token.rsplit("::").next().unwrap_or(token.as_str());
            out.push_str(last);
            token.clear();
        }
    }

    for c in raw.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nested_module_paths() {
        assert_eq!(display_name("alloc::vec::Vec<my_crate::api::Tag>"), "Vec<Tag>");
        assert_eq!(
            display_name("std::collections::HashMap<alloc::string::String, a::B>"),
            "HashMap<String, B>"
        );
        assert_eq!(display_name("Tag"), "Tag");
        assert_eq!(display_name("(i32, &str)"), "(i32, &str)");
    }

    #[test]
    fn of_is_anonymous() {
        struct Local;
        let id = TypeIdentity::of::<Local>();
        assert!(!id.is_named());
        assert_eq!(id.name(), "Local");
        assert!(TypeIdentity::named("Tag").is_named());
    }
}
