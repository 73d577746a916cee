//! Environment commands.

use anyhow::Context;
use colored::Colorize;
use hearth_core::{EnvironmentName, HearthError};

use super::AppContext;
use crate::theme::Theme;

/// List every environment.
pub(crate) fn list_environments(ctx: &AppContext) -> anyhow::Result<()> {
    let environments = ctx.registry.list().context("failed to list environments")?;

    if environments.is_empty() {
        println!("{}", Theme::info("No environments yet"));
        return Ok(());
    }

    let default = ctx.registry.default_environment();
    println!("\n{}", Theme::header("Environments"));
    println!(
        "{:<24} {:>18} {:>9}",
        "NAME".dimmed(),
        "CREATED".dimmed(),
        "SESSIONS".dimmed()
    );
    println!("{}", Theme::separator());
    for env in environments {
        let marker = if &env.name == default { " (default)" } else { "" };
        println!(
            "{:<24} {:>18} {:>9}{}",
            env.name.as_str(),
            Theme::timestamp(&env.created_at),
            ctx.registry.bound_sessions(&env.name),
            Theme::dimmed(marker)
        );
    }
    println!();
    Ok(())
}

/// Create an environment, failing if it exists.
pub(crate) fn create_environment(ctx: &AppContext, name: &EnvironmentName) -> anyhow::Result<()> {
    match ctx.registry.create(name) {
        Ok(env) => {
            println!(
                "{}",
                Theme::success(&format!(
                    "Created environment {} at {}",
                    env.name,
                    env.storage_root.display()
                ))
            );
            Ok(())
        },
        Err(HearthError::EnvironmentExists(_)) => {
            println!(
                "{}",
                Theme::warning(&format!("Environment {name} already exists"))
            );
            Ok(())
        },
        Err(e) => Err(e).with_context(|| format!("failed to create environment {name}")),
    }
}

/// Delete an environment and everything installed in it.
pub(crate) async fn delete_environment(
    ctx: &AppContext,
    name: &EnvironmentName,
) -> anyhow::Result<()> {
    ctx.registry
        .delete(name)
        .await
        .with_context(|| format!("failed to delete environment {name}"))?;
    println!(
        "{}",
        Theme::success(&format!("Deleted environment {name}"))
    );
    Ok(())
}

/// Show one environment and its installed packages.
pub(crate) async fn show_environment(
    ctx: &AppContext,
    name: &EnvironmentName,
) -> anyhow::Result<()> {
    let manager = ctx
        .registry
        .get_manager(name)
        .await
        .with_context(|| format!("failed to open environment {name}"))?;
    let env = manager.environment();
    let packages = manager.list();

    println!("\n{}", Theme::header(&format!("Environment {name}")));
    println!("{}", Theme::separator());
    println!(
        "  {}",
        Theme::kv("Storage", &env.storage_root.display().to_string())
    );
    println!("  {}", Theme::kv("Created", &Theme::timestamp(&env.created_at)));
    println!("  {}", Theme::kv("Packages", &packages.len().to_string()));
    for pkg in &packages {
        println!(
            "    {} {} {}",
            Theme::kind(pkg.kind),
            pkg.name.as_str().bold(),
            Theme::dimmed(&pkg.version)
        );
    }
    println!();
    Ok(())
}

