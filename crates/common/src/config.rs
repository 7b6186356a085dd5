//! Versioned generator configuration.
//!
//! Holds the hand-maintained override tables (operation id fixes, service
//! reclassification, service to package consolidation) plus the small set of
//! structural knobs the naming policy needs. The document is TOML; a default
//! copy is embedded in the binary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The embedded default configuration document.
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// HTTP methods accepted in `operation_id_overrides` keys.
const OVERRIDE_METHODS: [&str; 5] = ["DELETE", "GET", "PATCH", "POST", "PUT"];

/// Errors raised while loading a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or has unknown keys.
    #[error("failed to parse config {origin}: {source}")]
    Parse {
        /// File path or `<embedded>`.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The `version` field does not match [`GeneratorConfig::SUPPORTED_VERSION`].
    #[error("unsupported config version {found} in {origin} (expected {expected})")]
    UnsupportedVersion {
        /// File path or `<embedded>`.
        origin: String,
        /// Version in the document.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// An `operation_id_overrides` key is not `METHOD:/path`.
    #[error("invalid operation id override key '{key}' in {origin}: expected METHOD:/path")]
    InvalidOverrideKey {
        /// File path or `<embedded>`.
        origin: String,
        /// The offending key.
        key: String,
    },
}

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Document format version, see [`GeneratorConfig::SUPPORTED_VERSION`].
    pub version: u32,
    /// `[naming]` tables.
    #[serde(default)]
    pub naming: NamingConfig,
    /// `[types]` knobs.
    #[serde(default)]
    pub types: TypesConfig,
    /// `[builder]` knobs.
    #[serde(default)]
    pub builder: BuilderConfig,
}

/// Operation naming and service ownership tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// `"METHOD:/path"` to replacement operation id.
    #[serde(default)]
    pub operation_id_overrides: BTreeMap<String, String>,
    /// Operation id to the service that owns it.
    #[serde(default)]
    pub operation_services: BTreeMap<String, String>,
    /// Service name to package name.
    #[serde(default)]
    pub service_packages: BTreeMap<String, String>,
    /// Keywords that claim any operation whose path or id mentions them.
    #[serde(default = "default_service_keywords")]
    pub service_keywords: Vec<String>,
    /// Path segments after which the next segment names the service.
    #[serde(default = "default_routing_prefixes")]
    pub routing_prefixes: Vec<String>,
    /// Prefix stripped from the segment found after a routing prefix.
    #[serde(default = "default_routing_strip_prefix")]
    pub routing_strip_prefix: String,
}

/// Type naming knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypesConfig {
    /// Schema names emitted verbatim instead of being re-cased.
    #[serde(default = "default_preserved_names")]
    pub preserved_names: Vec<String>,
}

/// Builder pass knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderConfig {
    /// First path segment the builder hierarchy starts from, when present.
    #[serde(default = "default_root_segment")]
    pub root_segment: String,
}

fn default_service_keywords() -> Vec<String> {
    vec!["pulsar".to_string()]
}

fn default_routing_prefixes() -> Vec<String> {
    vec!["addon-providers".to_string()]
}

fn default_routing_strip_prefix() -> String {
    "addon-".to_string()
}

fn default_preserved_names() -> Vec<String> {
    vec!["WireGuard".to_string()]
}

fn default_root_segment() -> String {
    "v4".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            operation_id_overrides: BTreeMap::new(),
            operation_services: BTreeMap::new(),
            service_packages: BTreeMap::new(),
            service_keywords: default_service_keywords(),
            routing_prefixes: default_routing_prefixes(),
            routing_strip_prefix: default_routing_strip_prefix(),
        }
    }
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            preserved_names: default_preserved_names(),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            root_segment: default_root_segment(),
        }
    }
}

impl GeneratorConfig {
    /// Version this build understands.
    pub const SUPPORTED_VERSION: u32 = 1;

    /// Load the configuration embedded in the binary.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG, "<embedded>")
    }

    /// Load from `path` when given, otherwise use the embedded default.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::embedded(),
        }
    }

    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents, &path.display().to_string())?;
        debug!(
            config_path = %path.display(),
            fingerprint = %config.fingerprint(),
            "Loaded generator config"
        );
        Ok(config)
    }

    /// Parse and validate a configuration document. `origin` names it in errors.
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    fn validate(&self, origin: &str) -> Result<(), ConfigError> {
        if self.version != Self::SUPPORTED_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                origin: origin.to_string(),
                found: self.version,
                expected: Self::SUPPORTED_VERSION,
            });
        }

        for key in self.naming.operation_id_overrides.keys() {
            let valid = key.split_once(':').is_some_and(|(method, path)| {
                OVERRIDE_METHODS.contains(&method) && path.starts_with('/')
            });
            if !valid {
                return Err(ConfigError::InvalidOverrideKey {
                    origin: origin.to_string(),
                    key: key.clone(),
                });
            }
        }

        Ok(())
    }

    /// Short digest of the configuration contents.
    ///
    /// Computed from the parsed values rather than the source text, so
    /// formatting and comments do not change it. Every generated file is
    /// stamped with it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());

        let tables = [
            ("operation_id_overrides", &self.naming.operation_id_overrides),
            ("operation_services", &self.naming.operation_services),
            ("service_packages", &self.naming.service_packages),
        ];
        for (name, table) in tables {
            hash_field(&mut hasher, name);
            for (key, value) in table {
                hash_field(&mut hasher, key);
                hash_field(&mut hasher, value);
            }
        }

        let lists = [
            ("service_keywords", &self.naming.service_keywords),
            ("routing_prefixes", &self.naming.routing_prefixes),
            ("preserved_names", &self.types.preserved_names),
        ];
        for (name, list) in lists {
            hash_field(&mut hasher, name);
            for item in list {
                hash_field(&mut hasher, item);
            }
        }

        hash_field(&mut hasher, &self.naming.routing_strip_prefix);
        hash_field(&mut hasher, &self.builder.root_segment);

        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}

// Length-prefix every value so adjacent fields cannot run together.
fn hash_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
