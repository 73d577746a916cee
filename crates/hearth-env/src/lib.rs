//! Hearth Env - isolated package environments.
//!
//! This crate provides:
//! - [`EnvironmentStore`]: durable table of environments and their storage roots
//! - [`PackageIndex`]: the per-environment durable package index
//! - [`Installer`]: artifact production, with git and local-directory installers
//! - [`PackageManager`]: installed state and install/remove for one environment
//! - [`EnvironmentRegistry`]: environment lifecycle plus the live-manager table
//! - [`SessionContext`]: a caller's binding to one active environment
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hearth_catalog::{CatalogClient, DEFAULT_TIMEOUT, source_for_location};
//! use hearth_core::{CancellationToken, EnvironmentName, HearthHome, PackageName};
//! use hearth_env::{EnvironmentRegistry, EnvironmentStore, SessionContext, SourceInstaller};
//!
//! # async fn example() -> hearth_core::HearthResult<()> {
//! let source = source_for_location("https://catalog.hearth.dev/v1/packages.json", DEFAULT_TIMEOUT)?;
//! let registry = Arc::new(EnvironmentRegistry::new(
//!     EnvironmentStore::new(HearthHome::from_path("/tmp/hearth")),
//!     Arc::new(CatalogClient::new(source)),
//!     Arc::new(SourceInstaller::default()),
//!     EnvironmentName::new("default")?,
//! ));
//!
//! let session = SessionContext::create(Arc::clone(&registry)).await?;
//! session.switch_environment(&EnvironmentName::new("research")?).await?;
//! session
//!     .install(&PackageName::new("french-skill")?, None, &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod index;
pub mod installer;
pub mod manager;
pub mod registry;
pub mod session;
pub mod store;

pub use index::{INDEX_FILE_NAME, IndexViolation, IndexedPackage, PackageIndex};
pub use installer::{GitInstaller, GitSource, Installer, LocalInstaller, SourceInstaller};
pub use manager::{ManagerSettings, PackageManager, STAGING_DIR};
pub use registry::EnvironmentRegistry;
pub use session::SessionContext;
pub use store::{EnvironmentStore, METADATA_FILE_NAME};
