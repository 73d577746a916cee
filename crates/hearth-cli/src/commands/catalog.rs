//! Catalog commands.

use anyhow::Context;
use colored::Colorize;
use hearth_core::{PackageKind, PackageName};

use super::{AppContext, interrupt_token};
use crate::theme::Theme;

/// List catalog entries, optionally filtered by kind.
pub(crate) async fn list_catalog(
    ctx: &AppContext,
    kind: Option<PackageKind>,
    refresh: bool,
) -> anyhow::Result<()> {
    let catalog = ctx.registry.catalog();
    let cancel = interrupt_token();
    let entries = if refresh {
        catalog.refresh(&cancel).await
    } else {
        catalog.fetch(&cancel).await
    }
    .with_context(|| format!("failed to fetch catalog from {}", catalog.location()))?;

    let mut shown: Vec<_> = entries
        .iter()
        .filter(|e| kind.is_none_or(|k| e.kind == k))
        .collect();
    shown.sort_by(|a, b| a.name.cmp(&b.name));

    if shown.is_empty() {
        println!("{}", Theme::info("The catalog has no matching packages"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Catalog"));
    println!("{}", Theme::dimmed(catalog.location()));
    println!(
        "{:<8} {:<28} {:<12} {}",
        "KIND".dimmed(),
        "NAME".dimmed(),
        "VERSION".dimmed(),
        "SOURCE".dimmed()
    );
    println!("{}", Theme::separator());
    for entry in shown {
        println!(
            "{} {:<28} {:<12} {}",
            Theme::kind(entry.kind),
            entry.name.as_str(),
            entry.version,
            Theme::dimmed(&entry.source_ref)
        );
    }
    println!();
    Ok(())
}

/// Show which entry an install of `name` would pick.
pub(crate) async fn resolve_package(
    ctx: &AppContext,
    name: &PackageName,
    version: Option<&str>,
) -> anyhow::Result<()> {
    let entry = ctx
        .registry
        .catalog()
        .resolve(name, version, &interrupt_token())
        .await
        .with_context(|| format!("failed to resolve {name}"))?;

    println!("{}", Theme::header(&format!("{} {}", entry.name, entry.version)));
    println!("  {}", Theme::kv("Kind", entry.kind.as_str()));
    println!("  {}", Theme::kv("Source", &entry.source_ref));
    Ok(())
}
