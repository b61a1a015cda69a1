use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::form::DEFAULT_PASS_LIMIT;

/// The directory under a store root holding tool settings.
pub const CONFIG_DIR: &str = ".cbi";

/// Settings for the command line tool and the forms it builds.
///
/// Stored as `.cbi/config.toml` under the store root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// How many dependency passes may follow the first before the check
    /// gives up.
    dependency_pass_limit: usize,

    /// Forces forms read-only (or writable) instead of probing the store.
    pub readonly: Option<bool>,

    /// The file extension of configuration files. `json`, `yaml` and `yml`
    /// select that document format; anything else is TOML.
    extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dependency_pass_limit: DEFAULT_PASS_LIMIT,
            readonly: None,
            extension: default_extension(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads `.cbi/config.toml` under `root`, falling back to the defaults.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        let path = root.join(CONFIG_DIR).join("config.toml");
        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Failed to load config: {e}");
            Self::default()
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The dependency pass limit.
    #[must_use]
    pub const fn dependency_pass_limit(&self) -> usize {
        self.dependency_pass_limit
    }

    /// The configuration file extension, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

const fn default_pass_limit() -> usize {
    DEFAULT_PASS_LIMIT
}

fn default_extension() -> String {
    "toml".to_string()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_pass_limit")]
        dependency_pass_limit: usize,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        readonly: Option<bool>,

        #[serde(default = "default_extension")]
        extension: String,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                dependency_pass_limit,
                readonly,
                extension,
            } => Self {
                dependency_pass_limit,
                readonly,
                extension,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            dependency_pass_limit: config.dependency_pass_limit,
            readonly: config.readonly,
            extension: config.extension,
        }
    }
}
