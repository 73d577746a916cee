//! Config file discovery and layered loading.
//!
//! Implements [`load`]:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/hearth/config.toml` (system)
//! 3. Resolve the home directory (override, `HEARTH_HOME`, platform home)
//! 4. Merge `<home>/config.toml` (user)
//! 5. Apply `HEARTH_*` environment overrides
//! 6. Deserialize merged tree → [`Config`]
//! 7. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{HOME_VAR, apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves, set_path};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Default system-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/hearth/config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Inputs to [`load`].
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Explicit home directory (`--home`). Wins over `HEARTH_HOME`.
    pub home_override: Option<PathBuf>,
    /// System config path. `None` skips the system layer.
    pub system_path: Option<PathBuf>,
    /// Environment variables consulted for overrides.
    pub env_vars: HashMap<String, String>,
}

impl ConfigSources {
    /// Sources for a real process: the standard system path and the
    /// current `HEARTH_*` variables.
    #[must_use]
    pub fn from_process(home_override: Option<&Path>) -> Self {
        Self {
            home_override: home_override.map(Path::to_path_buf),
            system_path: Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
            env_vars: collect_env_vars(),
        }
    }

    /// Sources rooted at `home` with no system layer and no variables.
    #[must_use]
    pub fn isolated(home: impl Into<PathBuf>) -> Self {
        Self {
            home_override: Some(home.into()),
            system_path: None,
            env_vars: HashMap::new(),
        }
    }
}

/// Load the configuration with layered file precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the home
/// directory cannot be determined, or the merged configuration fails
/// validation.
pub fn load(sources: &ConfigSources) -> ConfigResult<ResolvedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2. System config.
    if let Some(system_path) = &sources.system_path
        && let Some(overlay) = try_load_file(system_path)?
    {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::System,
            &mut field_sources,
        );
        loaded_files.push(system_path.display().to_string());
        info!(path = %system_path.display(), "loaded system config");
    }

    // 3. Home directory.
    let (home, home_layer) = resolve_home(sources)?;

    // 4. User config.
    let user_path = home.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    // 5. Environment overrides.
    let env_count = apply_env_overrides(&mut merged, &mut field_sources, &sources.env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    // The home key is never taken from a file.
    set_path(
        &mut merged,
        "home",
        toml::Value::String(home.display().to_string()),
        &home_layer,
        &mut field_sources,
    );

    // 6. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// Fields the file omits take their defaults. `home` is left empty.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

fn resolve_home(sources: &ConfigSources) -> ConfigResult<(PathBuf, ConfigLayer)> {
    if let Some(home) = &sources.home_override {
        return Ok((home.clone(), ConfigLayer::CommandLine));
    }

    if let Some(raw) = sources.env_vars.get(HOME_VAR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(raw);
        if !path.is_absolute() {
            return Err(ConfigError::EnvError {
                var_name: HOME_VAR.to_owned(),
                message: format!("must be an absolute path, got '{raw}'"),
            });
        }
        return Ok((path, ConfigLayer::Environment));
    }

    let base = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok((base.home_dir().join(".hearth"), ConfigLayer::Defaults))
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}
