//! Configuration for schema synthesis.
//!
//! Everything a synthesis session needs is threaded through explicitly; there is
//! no process-wide key strategy or format table.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Deserializer, Serialize};

/// Key-casing policy applied to every property name written into a record
/// schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyCasing {
    /// Keep names as serde reports them.
    #[default]
    AsIs,
    CamelCase,
    SnakeCase,
    KebabCase,
    PascalCase,
    ScreamingSnakeCase,
    #[serde(skip)]
    Custom(fn(&str) -> String),
}

impl KeyCasing {
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyCasing::AsIs => key.to_string(),
            KeyCasing::CamelCase => key.to_lower_camel_case(),
            KeyCasing::SnakeCase => key.to_snake_case(),
            KeyCasing::KebabCase => key.to_kebab_case(),
            KeyCasing::PascalCase => key.to_upper_camel_case(),
            KeyCasing::ScreamingSnakeCase => key.to_shouty_snake_case(),
            KeyCasing::Custom(f) => f(key),
        }
    }
}

/// Configuration for schema synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisConfig {
    /// Casing applied to property names and required-set entries
    pub key_casing: KeyCasing,

    /// Attach format hints (date-time, uuid, uri, ...) to string leaves
    pub detect_formats: bool,

    /// Capture the probed instance as an example on the root schema
    pub collect_examples: bool,

    /// Maximum probe depth; deeper subtrees degrade to an "any" schema
    #[serde(deserialize_with = "at_least_one")]
    pub max_depth: usize,

    /// Upper bound on type-only passes spent exploring enum cases
    #[serde(deserialize_with = "at_least_one")]
    pub max_passes: usize,

    /// Prefix of rendered references, e.g. `#/components/schemas/`
    pub reference_prefix: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            key_casing: KeyCasing::AsIs,
            detect_formats: true,
            collect_examples: true,
            max_depth: 64,
            max_passes: 32,
            reference_prefix: "#/components/schemas/".to_string(),
        }
    }
}

impl SynthesisConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> SynthesisConfigBuilder {
        SynthesisConfigBuilder::default()
    }

    /// Raise the depth and pass limits to at least 1
    pub fn clamped(mut self) -> Self {
        self.max_depth = self.max_depth.max(1);
        self.max_passes = self.max_passes.max(1);
        self
    }
}

fn at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    usize::deserialize(deserializer).map(|n| n.max(1))
}

/// Builder for SynthesisConfig
#[derive(Debug, Default)]
pub struct SynthesisConfigBuilder {
    config: SynthesisConfig,
}

impl SynthesisConfigBuilder {
    pub fn key_casing(mut self, casing: KeyCasing) -> Self {
        self.config.key_casing = casing;
        self
    }

    pub fn detect_formats(mut self, detect: bool) -> Self {
        self.config.detect_formats = detect;
        self
    }

    pub fn collect_examples(mut self, collect: bool) -> Self {
        self.config.collect_examples = collect;
        self
    }

    /// Set the maximum probe depth (at least 1)
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    /// Set the pass budget for enum exploration (at least 1)
    pub fn max_passes(mut self, passes: usize) -> Self {
        self.config.max_passes = passes.max(1);
        self
    }

    pub fn reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.reference_prefix = prefix.into();
        self
    }

    pub fn build(self) -> SynthesisConfig {
        self.config
    }
}
