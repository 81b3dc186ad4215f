//! Engine configuration (`graft.toml`).
//!
//! Defines the typed configuration for the scanner, the round scheduler and
//! the identity generator. Every field has a default; a missing file means
//! all defaults.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::model::known;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraftConfig {
    /// Hint scanning settings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Round scheduling settings.
    #[serde(default)]
    pub rounds: RoundsConfig,

    /// Generated identity settings.
    #[serde(default)]
    pub identity: IdentityConfig,
}

// ---------------------------------------------------------------------------
// ScanConfig
// ---------------------------------------------------------------------------

/// Hint scanning settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Package holding hint properties (default: `"graft.hint"`).
    #[serde(default = "default_hint_namespace")]
    pub hint_namespace: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            hint_namespace: default_hint_namespace(),
        }
    }
}

fn default_hint_namespace() -> String {
    "graft.hint".to_owned()
}

// ---------------------------------------------------------------------------
// RoundsConfig
// ---------------------------------------------------------------------------

/// Round scheduling settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoundsConfig {
    /// Extra annotations whose presence in a round means more contributions
    /// are still being generated. Any round symbol carrying one defers the
    /// round's merge work.
    #[serde(default)]
    pub signal_annotations: Vec<String>,

    /// Log cache statistics and deferral reasons at `info` instead of `debug`.
    #[serde(default)]
    pub verbose: bool,
}

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

/// Generated identity settings.
///
/// The simple-name budget of a generated type is
/// `max_file_name_length - reserved_extension_length - reserved_generated_suffix_length`,
/// minus the length of the reserved inner type name plus one for its separator.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Package prefix for generated subcomponents (default: `"graft.component"`).
    #[serde(default = "default_component_namespace")]
    pub component_namespace: String,

    /// File name ceiling (default: 255).
    #[serde(default = "default_max_file_name_length")]
    pub max_file_name_length: usize,

    /// Longest file extension a host may append (default: 14, `.kapt_metadata`).
    #[serde(default = "default_reserved_extension_length")]
    pub reserved_extension_length: usize,

    /// Longest suffix a downstream generator may append to a class name (default: 8).
    #[serde(default = "default_reserved_generated_suffix_length")]
    pub reserved_generated_suffix_length: usize,

    /// Hex characters of the truncation hash (default: 8).
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            component_namespace: default_component_namespace(),
            max_file_name_length: default_max_file_name_length(),
            reserved_extension_length: default_reserved_extension_length(),
            reserved_generated_suffix_length: default_reserved_generated_suffix_length(),
            hash_length: default_hash_length(),
        }
    }
}

fn default_component_namespace() -> String {
    "graft.component".to_owned()
}

const fn default_max_file_name_length() -> usize {
    255
}

const fn default_reserved_extension_length() -> usize {
    14
}

const fn default_reserved_generated_suffix_length() -> usize {
    8
}

const fn default_hash_length() -> usize {
    8
}

impl IdentityConfig {
    /// Characters left for a simple name after the fixed reservations, or
    /// `None` if the reservations already exceed the ceiling.
    #[must_use]
    pub fn base_budget(&self) -> Option<usize> {
        self.max_file_name_length
            .checked_sub(self.reserved_extension_length)
            .and_then(|n| n.checked_sub(self.reserved_generated_suffix_length))
    }

    fn validate(&self) -> Result<(), String> {
        if self.hash_length == 0 || self.hash_length > 64 {
            return Err(format!(
                "identity.hash_length must be between 1 and 64, got {}",
                self.hash_length
            ));
        }
        let needed = self.hash_length + 1 + known::PARENT_COMPONENT.len() + 1;
        match self.base_budget() {
            Some(budget) if budget > needed => Ok(()),
            _ => Err(format!(
                "identity reservations leave no room for a simple name: \
                 max_file_name_length ({}) must exceed reserved_extension_length ({}) + \
                 reserved_generated_suffix_length ({}) + {needed}",
                self.max_file_name_length,
                self.reserved_extension_length,
                self.reserved_generated_suffix_length,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Error + loading
// ---------------------------------------------------------------------------

/// Configuration load or parse failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl GraftConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields or
    ///   inconsistent identity reservations, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields or invalid values.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config
            .identity
            .validate()
            .map_err(|message| ConfigError {
                path: None,
                message,
            })?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
