//! Bridge from `hearth_config::Config` to runtime types.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hearth_catalog::{CatalogClient, StalePolicy, source_for_location};
use hearth_config::Config;
use hearth_core::{EnvironmentName, HearthHome};
use hearth_env::{
    EnvironmentRegistry, EnvironmentStore, GitInstaller, ManagerSettings, SourceInstaller,
};
use hearth_telemetry::{LogConfig, LogFormat, LogTarget};

/// Convert config to [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg.logging.format.parse().unwrap_or(LogFormat::Compact);

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);

    log_config = match cfg.logging.target.to_ascii_lowercase().as_str() {
        "file" => {
            log_config.with_file_logging(HearthHome::from_path(&cfg.home).logs_dir(), "hearth")
        },
        "stdout" => log_config.with_target(LogTarget::Stdout),
        _ => log_config.with_target(LogTarget::Stderr),
    };

    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}

/// Convert config to [`ManagerSettings`]. A zero timeout disables the deadline.
pub(crate) fn to_manager_settings(cfg: &Config) -> ManagerSettings {
    ManagerSettings {
        install_timeout: (cfg.install.timeout_secs > 0)
            .then(|| Duration::from_secs(cfg.install.timeout_secs)),
    }
}

/// Build the catalog client described by `[catalog]`.
pub(crate) fn to_catalog_client(cfg: &Config) -> anyhow::Result<CatalogClient> {
    let source = source_for_location(
        &cfg.catalog.url,
        Duration::from_secs(cfg.catalog.timeout_secs),
    )
    .with_context(|| format!("invalid catalog location {}", cfg.catalog.url))?;

    let policy = if cfg.catalog.allow_stale {
        StalePolicy::AllowStale
    } else {
        StalePolicy::Strict
    };

    Ok(CatalogClient::new(source)
        .with_freshness(Duration::from_secs(cfg.catalog.freshness_secs))
        .with_stale_policy(policy))
}

/// Build the environment registry rooted at `cfg.home`.
pub(crate) fn to_registry(cfg: &Config) -> anyhow::Result<EnvironmentRegistry> {
    let home = HearthHome::from_path(&cfg.home);
    home.ensure()
        .with_context(|| format!("failed to create {}", cfg.home.display()))?;

    let default_environment = EnvironmentName::new(&cfg.default_environment)
        .context("invalid default_environment")?;

    Ok(EnvironmentRegistry::new(
        EnvironmentStore::new(home),
        Arc::new(to_catalog_client(cfg)?),
        Arc::new(SourceInstaller::new(GitInstaller::new(&cfg.install.git_binary))),
        default_environment,
    )
    .with_settings(to_manager_settings(cfg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(home: &std::path::Path) -> Config {
        Config {
            home: home.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn log_config_follows_logging_section() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".into();
        cfg.logging.format = "json".into();
        cfg.logging.directives = vec!["hearth_env=trace".into()];

        let lc = to_log_config(&cfg);
        assert_eq!(lc.level, "debug");
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.directives, vec!["hearth_env=trace"]);
    }

    #[test]
    fn unknown_log_format_falls_back_to_compact() {
        let mut cfg = Config::default();
        cfg.logging.format = "xml".into();
        assert_eq!(to_log_config(&cfg).format, LogFormat::Compact);
    }

    #[test]
    fn file_target_logs_under_home() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        assert_eq!(to_log_config(&cfg).target, LogTarget::Stderr);

        cfg.logging.target = "file".into();
        let lc = to_log_config(&cfg);
        assert_eq!(lc.target, LogTarget::File(tmp.path().join("logs")));
        assert_eq!(lc.file.prefix, "hearth");
        assert!(!lc.ansi);

        cfg.logging.target = "stdout".into();
        assert_eq!(to_log_config(&cfg).target, LogTarget::Stdout);
    }

    #[test]
    fn zero_install_timeout_disables_deadline() {
        let mut cfg = Config::default();
        assert_eq!(
            to_manager_settings(&cfg).install_timeout,
            Some(Duration::from_secs(600))
        );
        cfg.install.timeout_secs = 0;
        assert_eq!(to_manager_settings(&cfg).install_timeout, None);
    }

    #[test]
    fn catalog_client_uses_freshness() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.catalog.url = tmp.path().join("catalog.json").display().to_string();
        cfg.catalog.freshness_secs = 5;

        let client = to_catalog_client(&cfg).unwrap();
        assert_eq!(client.freshness(), Duration::from_secs(5));
    }

    #[test]
    fn registry_creates_home() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(&tmp.path().join("home"));
        let registry = to_registry(&cfg).unwrap();
        assert_eq!(registry.default_environment().as_str(), "default");
        assert!(tmp.path().join("home").join("environments").is_dir());
    }

    #[test]
    fn bad_catalog_url_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.catalog.url = "ftp://example.com/catalog.json".into();
        assert!(to_registry(&cfg).is_err());
    }
}
