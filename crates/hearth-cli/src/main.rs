//! Hearth CLI - isolated package environments.
//!
//! Every invocation acts as one short-lived session: package commands bind
//! the environment named by `--env` (or the configured default), run, and
//! release the binding on exit.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_core::{EnvironmentName, PackageKind, PackageName, parse_kind};

mod commands;
mod config_bridge;
mod theme;

use commands::{AppContext, catalog, config, env, pkg};

/// Hearth - isolated package environments
#[derive(Parser)]
#[command(name = "hearth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Hearth home directory (overrides HEARTH_HOME)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Environment to operate on (defaults to the configured default)
    #[arg(short, long, global = true, value_parser = parse_environment)]
    env: Option<EnvironmentName>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage environments
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Manage packages in an environment
    Pkg {
        #[command(subcommand)]
        command: PkgCommands,
    },

    /// Browse the package catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum EnvCommands {
    /// List all environments
    List,
    /// Create an environment
    Create {
        /// Environment name
        #[arg(value_parser = parse_environment)]
        name: EnvironmentName,
    },
    /// Delete an environment and everything installed in it
    Delete {
        /// Environment name
        #[arg(value_parser = parse_environment)]
        name: EnvironmentName,
    },
    /// Show environment details
    Show {
        /// Environment name (defaults to --env)
        #[arg(value_parser = parse_environment)]
        name: Option<EnvironmentName>,
    },
}

#[derive(Subcommand)]
enum PkgCommands {
    /// List installed packages
    List {
        /// Only show packages of this kind
        #[arg(short, long, value_parser = parse_kind_arg)]
        kind: Option<PackageKind>,
    },
    /// Install a package from the catalog
    Install {
        /// Package name
        #[arg(value_parser = parse_package)]
        name: PackageName,
        /// Exact version (defaults to the newest)
        #[arg(long)]
        version: Option<String>,
    },
    /// Remove an installed package
    Remove {
        /// Package name
        #[arg(value_parser = parse_package)]
        name: PackageName,
    },
    /// Check installed packages against their artifacts
    Verify,
    /// Delete orphaned artifacts and staging leftovers
    Prune,
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// List catalog entries
    List {
        /// Only show packages of this kind
        #[arg(short, long, value_parser = parse_kind_arg)]
        kind: Option<PackageKind>,
        /// Bypass the freshness cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show which entry an install would pick
    Resolve {
        /// Package name
        #[arg(value_parser = parse_package)]
        name: PackageName,
        /// Exact version
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Print plain TOML without annotations
        #[arg(long)]
        raw: bool,
    },
}

fn parse_environment(s: &str) -> Result<EnvironmentName, String> {
    EnvironmentName::new(s).map_err(|e| e.to_string())
}

fn parse_package(s: &str) -> Result<PackageName, String> {
    PackageName::new(s).map_err(|e| e.to_string())
}

fn parse_kind_arg(s: &str) -> Result<PackageKind, String> {
    parse_kind(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = hearth_config::Config::load(cli.home.as_deref());

    // Set up logging from config, with --verbose override.
    let log_config = match &loaded {
        Ok(resolved) => {
            let mut lc = config_bridge::to_log_config(&resolved.config);
            if cli.verbose {
                "debug".clone_into(&mut lc.level);
            }
            lc
        },
        Err(_) => {
            let level = if cli.verbose { "debug" } else { "warn" };
            hearth_telemetry::LogConfig::new(level)
        },
    };
    if let Err(e) = hearth_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let resolved = loaded.context("failed to load configuration")?;

    if let Commands::Config {
        command: ConfigCommands::Show { raw },
    } = &cli.command
    {
        config::show_config(&resolved, *raw);
        return Ok(());
    }

    let registry = Arc::new(config_bridge::to_registry(&resolved.config)?);
    let target = cli
        .env
        .clone()
        .unwrap_or_else(|| registry.default_environment().clone());
    let ctx = AppContext { registry };

    match cli.command {
        Commands::Env { command } => match command {
            EnvCommands::List => env::list_environments(&ctx),
            EnvCommands::Create { name } => env::create_environment(&ctx, &name),
            EnvCommands::Delete { name } => env::delete_environment(&ctx, &name).await,
            EnvCommands::Show { name } => {
                env::show_environment(&ctx, name.as_ref().unwrap_or(&target)).await
            },
        },
        Commands::Pkg { command } => match command {
            PkgCommands::List { kind } => pkg::list_packages(&ctx, &target, kind).await,
            PkgCommands::Install { name, version } => {
                pkg::install_package(&ctx, &target, &name, version.as_deref()).await
            },
            PkgCommands::Remove { name } => pkg::remove_package(&ctx, &target, &name).await,
            PkgCommands::Verify => pkg::verify_packages(&ctx, &target).await,
            PkgCommands::Prune => pkg::prune_packages(&ctx, &target).await,
        },
        Commands::Catalog { command } => match command {
            CatalogCommands::List { kind, refresh } => {
                catalog::list_catalog(&ctx, kind, refresh).await
            },
            CatalogCommands::Resolve { name, version } => {
                catalog::resolve_package(&ctx, &name, version.as_deref()).await
            },
        },
        Commands::Config { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hearth", "pkg", "install", "french-skill", "--version", "1.2.0", "--env", "research",
        ])
        .unwrap();
        assert_eq!(cli.env.unwrap().as_str(), "research");
        match cli.command {
            Commands::Pkg {
                command: PkgCommands::Install { name, version },
            } => {
                assert_eq!(name.as_str(), "french-skill");
                assert_eq!(version.as_deref(), Some("1.2.0"));
            },
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn rejects_bad_names_and_kinds() {
        assert!(Cli::try_parse_from(["hearth", "env", "create", "../escape"]).is_err());
        assert!(Cli::try_parse_from(["hearth", "pkg", "list", "--kind", "widget"]).is_err());
        assert!(Cli::try_parse_from(["hearth", "pkg", "list", "--kind", "app"]).is_ok());
    }
}
