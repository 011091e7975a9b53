//! Render configuration
//!
//! Configuration is read once, when a run starts, from these sources in
//! order of precedence:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (TOML or YAML, under a `[render]` table)
//! 3. Environment variables (`FLEETRECAP_*`, plus `NO_COLOR`)
//! 4. CLI arguments (highest priority)
//!
//! # Configuration File Format (TOML)
//!
//! ```toml
//! [render]
//! renderer = "tally"
//! always_show_diff = false
//! show_host_start = true
//! diff_formatter = "delta --color-only"
//! volatile_fields = ["delta", "start", "end"]
//! anonymize_hosts = true
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `FLEETRECAP_NOCOLOR` | disable colors |
//! | `FLEETRECAP_FORCE_COLOR` | colors even when not on a terminal |
//! | `FLEETRECAP_ALWAYS_DIFF` | show diffs of unchanged results too |
//! | `FLEETRECAP_INTERPRETER` | interpreter path, passed through |
//! | `FLEETRECAP_RENDERER` | `classic` or `tally` |
//! | `FLEETRECAP_SHOW_HOST_START` | print a line when a host starts a task |
//! | `FLEETRECAP_DIFF_FORMATTER` | command line to pipe diffs through |
//! | `FLEETRECAP_VOLATILE_FIELDS` | comma separated fields ignored for dedup |
//! | `FLEETRECAP_ANONYMIZE_HOSTS` | replace host names before comparing |
//! | `FLEETRECAP_WIDTH` | terminal width override |

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::callback::grouper::DEFAULT_VOLATILE_FIELDS;
use crate::error::Error;

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "FLEETRECAP";

// ============================================================================
// Render Config
// ============================================================================

/// Which renderer to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Grouped block at task end, no live line
    #[default]
    Classic,
    /// Live status line plus per-status folded summaries
    Tally,
}

impl RendererKind {
    /// Whether this renderer keeps a live status line.
    pub fn has_live_line(self) -> bool {
        matches!(self, RendererKind::Tally)
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererKind::Classic => f.write_str("classic"),
            RendererKind::Tally => f.write_str("tally"),
        }
    }
}

impl FromStr for RendererKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(RendererKind::Classic),
            "tally" => Ok(RendererKind::Tally),
            other => Err(Error::InvalidConfigValue {
                key: "renderer".to_string(),
                message: format!("unknown renderer '{}', expected 'classic' or 'tally'", other),
            }),
        }
    }
}

/// Settings for one rendering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Use colored output
    pub use_color: bool,
    /// Color even when stdout is not a terminal
    pub force_color: bool,
    /// Show diffs for results that did not change
    pub always_show_diff: bool,
    /// Interpreter path; carried along for the execution engine, unused here
    pub interpreter: Option<PathBuf>,
    /// Renderer variant
    pub renderer: RendererKind,
    /// Print `started: [host] task` lines
    pub show_host_start: bool,
    /// External diff formatter command line
    pub diff_formatter: Option<String>,
    /// Result fields ignored when comparing results
    pub volatile_fields: Vec<String>,
    /// Replace a host's own name before comparing its results
    pub anonymize_hosts: bool,
    /// Width of the live status line; detected from the terminal when unset
    pub width: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            force_color: false,
            always_show_diff: false,
            interpreter: None,
            renderer: RendererKind::default(),
            show_host_start: false,
            diff_formatter: None,
            volatile_fields: DEFAULT_VOLATILE_FIELDS.iter().map(|s| s.to_string()).collect(),
            anonymize_hosts: true,
            width: None,
        }
    }
}

impl RenderConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the given renderer, colors off. Convenient for
    /// captured output.
    pub fn plain(renderer: RendererKind) -> Self {
        Self {
            use_color: false,
            renderer,
            ..Self::default()
        }
    }

    /// Whether colors are emitted.
    pub fn colors_enabled(&self) -> bool {
        self.force_color || self.use_color
    }

    /// Width of the live status line.
    pub fn line_width(&self) -> usize {
        self.width
            .filter(|w| *w > 0)
            .unwrap_or_else(|| console::Term::stdout().size().1 as usize)
    }

    /// Apply a partial configuration on top of this one.
    pub fn apply(&mut self, overrides: RenderOverrides) {
        if let Some(v) = overrides.use_color {
            self.use_color = v;
        }
        if let Some(v) = overrides.force_color {
            self.force_color = v;
        }
        if let Some(v) = overrides.always_show_diff {
            self.always_show_diff = v;
        }
        if let Some(v) = overrides.interpreter {
            self.interpreter = Some(v);
        }
        if let Some(v) = overrides.renderer {
            self.renderer = v;
        }
        if let Some(v) = overrides.show_host_start {
            self.show_host_start = v;
        }
        if let Some(v) = overrides.diff_formatter {
            // an empty command disables formatting
            self.diff_formatter = Some(v).filter(|cmd| !cmd.trim().is_empty());
        }
        if let Some(v) = overrides.volatile_fields {
            self.volatile_fields = v;
        }
        if let Some(v) = overrides.anonymize_hosts {
            self.anonymize_hosts = v;
        }
        if let Some(v) = overrides.width {
            self.width = Some(v);
        }
    }

    /// Build a configuration from `(key, value)` pairs as found in the
    /// environment, on top of the defaults.
    pub fn from_pairs<I, K, V>(prefix: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        config.apply(RenderOverrides::from_pairs(prefix, pairs)?);
        Ok(config)
    }
}

/// A partial configuration: every field is optional and only set fields
/// override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOverrides {
    /// See [`RenderConfig::use_color`]
    pub use_color: Option<bool>,
    /// See [`RenderConfig::force_color`]
    pub force_color: Option<bool>,
    /// See [`RenderConfig::always_show_diff`]
    #[serde(alias = "always_diff")]
    pub always_show_diff: Option<bool>,
    /// See [`RenderConfig::interpreter`]
    pub interpreter: Option<PathBuf>,
    /// See [`RenderConfig::renderer`]
    pub renderer: Option<RendererKind>,
    /// See [`RenderConfig::show_host_start`]
    pub show_host_start: Option<bool>,
    /// See [`RenderConfig::diff_formatter`]; empty disables
    pub diff_formatter: Option<String>,
    /// See [`RenderConfig::volatile_fields`]
    pub volatile_fields: Option<Vec<String>>,
    /// See [`RenderConfig::anonymize_hosts`]
    pub anonymize_hosts: Option<bool>,
    /// See [`RenderConfig::width`]
    pub width: Option<usize>,
}

impl RenderOverrides {
    /// Read overrides from `(key, value)` pairs.
    ///
    /// Only keys starting with `<prefix>_` are considered, plus the
    /// conventional `NO_COLOR`.
    pub fn from_pairs<I, K, V>(prefix: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut overrides = Self::default();
        let prefix = format!("{}_", prefix);

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key == "NO_COLOR" {
                if !value.is_empty() {
                    overrides.use_color = Some(false);
                }
                continue;
            }
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };
            match name {
                "NOCOLOR" | "NO_COLOR" => overrides.use_color = Some(!parse_bool(name, value)?),
                "FORCE_COLOR" => overrides.force_color = Some(parse_bool(name, value)?),
                "ALWAYS_DIFF" => overrides.always_show_diff = Some(parse_bool(name, value)?),
                "INTERPRETER" => overrides.interpreter = Some(PathBuf::from(value)),
                "RENDERER" => overrides.renderer = Some(value.parse()?),
                "SHOW_HOST_START" => overrides.show_host_start = Some(parse_bool(name, value)?),
                "DIFF_FORMATTER" => overrides.diff_formatter = Some(value.to_string()),
                "VOLATILE_FIELDS" => {
                    overrides.volatile_fields = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect(),
                    )
                }
                "ANONYMIZE_HOSTS" => overrides.anonymize_hosts = Some(parse_bool(name, value)?),
                "WIDTH" => {
                    overrides.width = Some(value.trim().parse().map_err(|_| Error::InvalidConfigValue {
                        key: key.to_string(),
                        message: format!("expected a column count, got '{}'", value),
                    })?)
                }
                _ => debug!("Ignoring unknown setting {}", key),
            }
        }

        Ok(overrides)
    }
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, Error> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::InvalidConfigValue {
            key: key.to_lowercase(),
            message: format!("expected a boolean, got '{}'", value),
        }),
    }
}

// ============================================================================
// Config Loader
// ============================================================================

/// Loads a [`RenderConfig`] from all sources.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Configuration files to load (in order)
    config_files: Vec<PathBuf>,
    /// Environment variable prefix
    env_prefix: Option<String>,
    /// CLI overrides
    cli_overrides: RenderOverrides,
    /// Whether to load from standard locations
    load_standard_locations: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            config_files: Vec::new(),
            env_prefix: Some(ENV_PREFIX.to_string()),
            cli_overrides: RenderOverrides::default(),
            load_standard_locations: true,
        }
    }

    /// Add a configuration file to load.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Disable environment variable loading.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Disable loading from standard configuration locations.
    pub fn without_standard_locations(mut self) -> Self {
        self.load_standard_locations = false;
        self
    }

    /// Set CLI overrides.
    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Load configuration from all sources.
    pub fn load(self) -> Result<RenderConfig> {
        let mut config = RenderConfig::default();

        if self.load_standard_locations {
            for path in Self::standard_config_paths() {
                if path.exists() {
                    debug!("Loading render config from: {}", path.display());
                    match Self::load_file(&path) {
                        Ok(overrides) => config.apply(overrides),
                        Err(e) => warn!("Ignoring unreadable config {}: {:#}", path.display(), e),
                    }
                }
            }
        }

        for path in &self.config_files {
            if !path.exists() {
                return Err(Error::ConfigLoad {
                    path: path.clone(),
                    message: "file not found".to_string(),
                }
                .into());
            }
            debug!("Loading render config from: {}", path.display());
            let overrides = Self::load_file(path)
                .with_context(|| format!("Failed to load config from: {}", path.display()))?;
            config.apply(overrides);
        }

        if let Some(prefix) = &self.env_prefix {
            config.apply(RenderOverrides::from_pairs(prefix, env::vars())?);
        }

        config.apply(self.cli_overrides);

        if let Some(interpreter) = &config.interpreter {
            debug!("Interpreter passthrough: {}", interpreter.display());
        }
        Ok(config)
    }

    /// Get standard configuration file locations.
    fn standard_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fleetrecap/config.toml"));
            paths.push(config_dir.join("fleetrecap/config.yml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fleetrecap.toml"));
        }

        paths.push(PathBuf::from("fleetrecap.toml"));

        paths
    }

    /// Load a configuration file.
    fn load_file(path: &Path) -> Result<RenderOverrides> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let wrapper: RenderWrapper = match extension {
            "toml" => toml::from_str(&content)?,
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(wrapper.render)
    }
}

/// Config files nest settings under `[render]`.
#[derive(Debug, Deserialize)]
struct RenderWrapper {
    #[serde(default)]
    render: RenderOverrides,
}
