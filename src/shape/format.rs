//! Well-known leaf formats and the policy that recognizes them.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Format hint carried by string-like leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    DateTime,
    Date,
    Uuid,
    Uri,
    Binary,
}

impl Format {
    /// Schema `format` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Format::DateTime => "date-time",
            Format::Date => "date",
            Format::Uuid => "uuid",
            Format::Uri => "uri",
            Format::Binary => "binary",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides format hints for leaves and the dummy strings the type-only prober
/// hands to well-known string types.
pub trait FormatPolicy: Send + Sync {
    /// Recognize a format from a visitor's `expecting` text, e.g. `"a UUID string"`.
    fn recognize_expectation(&self, expecting: &str) -> Option<Format>;

    /// Recognize a format from an observed string value.
    fn detect_sample(&self, sample: &str) -> Option<Format>;

    /// A string that parses as `format`.
    fn dummy(&self, format: Format) -> &'static str;
}

/// Default policy: UUIDs, RFC 3339 date-times and dates, URIs.
#[derive(Clone, Copy, Debug, Default)]
pub struct WellKnownFormats;

static UUID_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern")
});

static DATE_TIME_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$")
        .expect("date-time pattern")
});

static DATE_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern"));

impl FormatPolicy for WellKnownFormats {
    fn recognize_expectation(&self, expecting: &str) -> Option<Format> {
        let e = expecting.to_ascii_lowercase();
        let words: Vec<&str> = e.split(|c: char| !c.is_ascii_alphanumeric()).collect();
        let has = |w: &str| words.iter().any(|x| *x == w);
        if has("uuid") {
            Some(Format::Uuid)
        } else if has("datetime") || (has("date") && has("time")) {
            Some(Format::DateTime)
        } else if has("date") {
            Some(Format::Date)
        } else if has("url") || has("uri") {
            Some(Format::Uri)
        } else {
            None
        }
    }

    fn detect_sample(&self, sample: &str) -> Option<Format> {
        if UUID_RX.is_match(sample) {
            Some(Format::Uuid)
        } else if DATE_TIME_RX.is_match(sample) {
            Some(Format::DateTime)
        } else if DATE_RX.is_match(sample) {
            Some(Format::Date)
        } else if looks_like_uri(sample) {
            Some(Format::Uri)
        } else {
            None
        }
    }

    fn dummy(&self, format: Format) -> &'static str {
        match format {
            Format::DateTime => "1970-01-01T00:00:00Z",
            Format::Date => "1970-01-01",
            Format::Uuid => "00000000-0000-0000-0000-000000000000",
            Format::Uri => "https://example.com/",
            Format::Binary => "",
        }
    }
}

pub fn looks_like_uri(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
        || s.starts_with("mailto:") || s.starts_with("tel:")
}
