//! Installable units and their catalog descriptions.
//!
//! What earlier designs split into "abilities" and "apps" is one entity here.
//! [`PackageKind`] is metadata only: nothing in the core branches on it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};
use crate::names::{EnvironmentName, PackageName};

/// Presentation tag for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// A voice or agent skill.
    Ability,
    /// A user-facing application.
    App,
    /// Shared code consumed by other packages.
    Library,
    /// Hardware or platform integration.
    Driver,
}

impl PackageKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 4] = [Self::Ability, Self::App, Self::Library, Self::Driver];

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ability => "ability",
            Self::App => "app",
            Self::Library => "library",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown package kind: {s}"))
    }
}

/// One entry of the remote catalog.
///
/// Read-only. Never persisted beyond the catalog client's freshness cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Package name.
    pub name: PackageName,
    /// Version string, ordered by [`crate::version::compare_versions`].
    pub version: String,
    /// Presentation tag.
    pub kind: PackageKind,
    /// Opaque locator handed to the installer (repository URL + ref, path).
    #[serde(alias = "source_ref")]
    pub source_ref: String,
}

impl CatalogEntry {
    /// Create a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::InvalidName`] if `name` is malformed.
    pub fn new(
        name: &str,
        version: impl Into<String>,
        kind: PackageKind,
        source_ref: impl Into<String>,
    ) -> HearthResult<Self> {
        Ok(Self {
            name: PackageName::new(name)?,
            version: version.into(),
            kind,
            source_ref: source_ref.into(),
        })
    }
}

/// An installed package within one environment.
///
/// Only exists once the install committed. Identity within the environment is
/// `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name.
    pub name: PackageName,
    /// Installed version.
    pub version: String,
    /// Presentation tag.
    pub kind: PackageKind,
    /// Environment the package is installed in.
    pub environment: EnvironmentName,
    /// Locator the package was installed from.
    pub source_ref: String,
    /// When the install committed.
    pub installed_at: DateTime<Utc>,
}

impl Package {
    /// Build the record for a freshly committed install of `entry`.
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry, environment: EnvironmentName) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            kind: entry.kind,
            environment,
            source_ref: entry.source_ref.clone(),
            installed_at: Utc::now(),
        }
    }
}

/// Parse a kind filter such as `--kind ability`.
///
/// # Errors
///
/// Returns [`HearthError::InvalidName`] for an unknown kind.
pub fn parse_kind(s: &str) -> HearthResult<PackageKind> {
    s.parse().map_err(|reason| HearthError::InvalidName {
        kind: "package kind",
        name: s.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entry_wire_format() {
        let json = r#"{"name":"french-skill","version":"1.2.0","kind":"ability","sourceRef":"git://x/french"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name.as_str(), "french-skill");
        assert_eq!(entry.kind, PackageKind::Ability);
        assert_eq!(entry.source_ref, "git://x/french");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["sourceRef"], "git://x/french");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"name":"x","version":"1","kind":"widget","sourceRef":"s"}"#;
        assert!(serde_json::from_str::<CatalogEntry>(json).is_err());
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("App".parse::<PackageKind>(), Ok(PackageKind::App));
        assert_eq!("driver".parse::<PackageKind>(), Ok(PackageKind::Driver));
        assert!("plugin".parse::<PackageKind>().is_err());
        assert!(parse_kind("plugin").is_err());
    }

    #[test]
    fn package_from_entry() {
        let entry =
            CatalogEntry::new("french-skill", "1.2.0", PackageKind::Ability, "git://x/french")
                .unwrap();
        let env = EnvironmentName::new("research").unwrap();
        let pkg = Package::from_entry(&entry, env.clone());
        assert_eq!(pkg.name, entry.name);
        assert_eq!(pkg.version, "1.2.0");
        assert_eq!(pkg.environment, env);
    }
}
