//! Configuration file support.
//!
//! Two locations are consulted:
//! - Global: `<config dir>/llama-build/config.toml` - user-wide defaults
//! - Project: `<source root>/.llama-build/config.toml` - per-checkout overrides
//!
//! Project config takes precedence over global config. Options given on the
//! command line with `-D` take precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-checkout configuration directory.
pub const PROJECT_CONFIG_DIR: &str = ".llama-build";

/// llama-build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildSettings,

    /// Toolchain overrides
    pub toolchain: ToolchainSettings,

    /// Default values for `-D` options, keyed by option name
    pub options: BTreeMap<String, toml::Value>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSettings {
    /// Directory for intermediate objects and archives (relative to the source root)
    pub build_dir: Option<PathBuf>,

    /// Install prefix (relative to the source root)
    pub prefix: Option<PathBuf>,

    /// Number of parallel compile jobs (None = one per core)
    pub jobs: Option<usize>,

    /// How the source revision is looked up (`git` or `libgit2`)
    pub revision_source: Option<String>,

    /// Always emit compile_commands.json
    pub emit_compile_commands: bool,
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,

    /// Path to the archiver (e.g., /usr/bin/llvm-ar)
    pub ar: Option<PathBuf>,
}

impl ToolchainSettings {
    /// Check if any toolchain path is configured.
    pub fn has_overrides(&self) -> bool {
        self.cc.is_some() || self.cxx.is_some() || self.ar.is_some()
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.build_dir.is_some() {
            self.build.build_dir = other.build.build_dir;
        }
        if other.build.prefix.is_some() {
            self.build.prefix = other.build.prefix;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.revision_source.is_some() {
            self.build.revision_source = other.build.revision_source;
        }
        if other.build.emit_compile_commands {
            self.build.emit_compile_commands = true;
        }

        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if other.toolchain.ar.is_some() {
            self.toolchain.ar = other.toolchain.ar;
        }

        self.options.extend(other.options);
    }

    /// Option defaults rendered as `-D` style strings.
    ///
    /// Only scalar values are accepted; tables and arrays have no meaning
    /// for a build option.
    pub fn option_defaults(&self) -> Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (name, value) in &self.options {
            let rendered = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Integer(i) => i.to_string(),
                other => bail!(
                    "option `{}` in config must be a string, boolean or integer, found {}",
                    name,
                    other.type_str()
                ),
            };
            out.insert(name.clone(), rendered);
        }
        Ok(out)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`.llama-build/config.toml`)
/// 2. Global config (`<config dir>/llama-build/config.toml`)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Global config path, if the platform has a config directory.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "llama-build").map(|d| d.config_dir().join("config.toml"))
}

/// Project config path for a source root.
pub fn project_config_path(source_root: &Path) -> PathBuf {
    source_root.join(PROJECT_CONFIG_DIR).join("config.toml")
}
