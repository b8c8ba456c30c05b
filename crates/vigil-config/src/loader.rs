// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file; the format follows the extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw content
//! 3. Layer `VIGIL__` environment overrides on top through the `config` crate
//! 4. Deserialize into [`VigilConfig`]
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! VIGIL__CONNECTION__ENDPOINT=opc.tcp://plc:4840
//! VIGIL__POLL__PERIOD=500ms
//! VIGIL__MONITORED_ITEM__QUEUE_SIZE=20
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::VigilConfig;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "VIGIL";

const ENV_SEPARATOR: &str = "__";

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn file_format(self) -> FileFormat {
        match self {
            ConfigFormat::Yaml => FileFormat::Yaml,
            ConfigFormat::Toml => FileFormat::Toml,
            ConfigFormat::Json => FileFormat::Json,
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use vigil_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("vigil.yaml").unwrap();
/// println!("Observing {}", config.target);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    env_overrides: bool,
    resolve_placeholders: bool,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Creates a loader with environment overrides enabled.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_overrides: true,
            resolve_placeholders: true,
            env_source: None,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables `VIGIL__` overrides.
    pub fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.env_overrides = enabled;
        self
    }

    /// Enables or disables `${VAR}` placeholder resolution.
    pub fn with_placeholders(mut self, enabled: bool) -> Self {
        self.resolve_placeholders = enabled;
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Loads and validates configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml` or
    /// `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<VigilConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = self.read_file(path)?;

        let config = self.build(&content, format, &path.display().to_string())?;
        info!(
            endpoint = %config.connection.endpoint,
            target = %config.target,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<VigilConfig> {
        self.build(content, format, "<string>")
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(PathBuf::from(path), e))
    }

    fn build(&self, content: &str, format: ConfigFormat, origin: &str) -> ConfigResult<VigilConfig> {
        let content = if self.resolve_placeholders {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut builder =
            Config::builder().add_source(File::from_str(&content, format.file_format()));

        if self.env_overrides {
            let environment = Environment::with_prefix(&self.env_prefix)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(self.env_source.clone());
            builder = builder.add_source(environment);
        }

        let config: VigilConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::parse(origin, e.to_string()))?;

        config.validate()?;
        debug!(origin = origin, "Configuration validated");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unset variables without a default are left in place.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

/// Renders a configuration in `format`.
///
/// YAML is emitted in JSON flow style, which every YAML parser accepts.
pub fn to_string(config: &VigilConfig, format: ConfigFormat) -> ConfigResult<String> {
    match format {
        ConfigFormat::Yaml | ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// # Examples
///
/// ```no_run
/// use vigil_config::loader::load_config;
///
/// let config = load_config("vigil.toml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<VigilConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<VigilConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
