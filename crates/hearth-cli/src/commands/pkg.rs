//! Package commands, run inside one environment.

use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use hearth_core::{EnvironmentName, PackageKind, PackageName};
use hearth_env::SessionContext;

use super::{AppContext, interrupt_token};
use crate::theme::Theme;

async fn session(ctx: &AppContext, env: &EnvironmentName) -> anyhow::Result<SessionContext> {
    SessionContext::create_in(Arc::clone(&ctx.registry), env.clone())
        .await
        .with_context(|| format!("failed to open environment {env}"))
}

/// List installed packages, optionally filtered by kind.
pub(crate) async fn list_packages(
    ctx: &AppContext,
    env: &EnvironmentName,
    kind: Option<PackageKind>,
) -> anyhow::Result<()> {
    let session = session(ctx, env).await?;
    let packages: Vec<_> = session
        .list_packages()
        .into_iter()
        .filter(|p| kind.is_none_or(|k| p.kind == k))
        .collect();

    if packages.is_empty() {
        println!(
            "{}",
            Theme::info(&format!("No packages installed in {env}"))
        );
        return Ok(());
    }

    println!("\n{}", Theme::header(&format!("Packages in {env}")));
    println!(
        "{:<8} {:<28} {:<12} {}",
        "KIND".dimmed(),
        "NAME".dimmed(),
        "VERSION".dimmed(),
        "INSTALLED".dimmed()
    );
    println!("{}", Theme::separator());
    for pkg in packages {
        println!(
            "{} {:<28} {:<12} {}",
            Theme::kind(pkg.kind),
            pkg.name.as_str(),
            pkg.version,
            Theme::timestamp(&pkg.installed_at)
        );
    }
    println!();
    Ok(())
}

/// Install (or replace) a package.
pub(crate) async fn install_package(
    ctx: &AppContext,
    env: &EnvironmentName,
    name: &PackageName,
    version: Option<&str>,
) -> anyhow::Result<()> {
    let session = session(ctx, env).await?;
    let cancel = interrupt_token();
    let previous = session.package_manager().get(name);

    let pkg = session
        .install(name, version, &cancel)
        .await
        .with_context(|| format!("failed to install {name} into {env}"))?;

    let message = match previous {
        Some(old) if old.version != pkg.version => format!(
            "Replaced {} {} with {} in {env}",
            pkg.name, old.version, pkg.version
        ),
        Some(_) => format!("Reinstalled {} {} in {env}", pkg.name, pkg.version),
        None => format!("Installed {} {} into {env}", pkg.name, pkg.version),
    };
    println!("{}", Theme::success(&message));
    Ok(())
}

/// Remove an installed package.
pub(crate) async fn remove_package(
    ctx: &AppContext,
    env: &EnvironmentName,
    name: &PackageName,
) -> anyhow::Result<()> {
    let session = session(ctx, env).await?;
    let pkg = session
        .remove(name)
        .await
        .with_context(|| format!("failed to remove {name} from {env}"))?;
    println!(
        "{}",
        Theme::success(&format!("Removed {} {} from {env}", pkg.name, pkg.version))
    );
    Ok(())
}

/// Check that every indexed package still has its artifacts.
pub(crate) async fn verify_packages(ctx: &AppContext, env: &EnvironmentName) -> anyhow::Result<()> {
    let session = session(ctx, env).await?;
    let violations = session.package_manager().verify();

    if violations.is_empty() {
        println!(
            "{}",
            Theme::success(&format!("All packages in {env} are intact"))
        );
        return Ok(());
    }

    for violation in &violations {
        println!("{}", Theme::error(&violation.to_string()));
    }
    anyhow::bail!("{} problem(s) found in {env}", violations.len())
}

/// Delete artifacts and staging leftovers no index entry references.
pub(crate) async fn prune_packages(ctx: &AppContext, env: &EnvironmentName) -> anyhow::Result<()> {
    let session = session(ctx, env).await?;
    let removed = session
        .package_manager()
        .prune_orphans()
        .await
        .with_context(|| format!("failed to prune {env}"))?;

    if removed == 0 {
        println!("{}", Theme::info("Nothing to prune"));
    } else {
        println!(
            "{}",
            Theme::success(&format!("Pruned {removed} orphaned director(ies) in {env}"))
        );
    }
    Ok(())
}
