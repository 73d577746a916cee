//! Hearth Core - foundation types for isolated package environments.
//!
//! This crate provides:
//! - Validated identifiers ([`EnvironmentName`], [`PackageName`], [`SessionId`])
//! - The installable-unit model ([`Package`], [`CatalogEntry`], [`PackageKind`])
//! - The error taxonomy shared by every component ([`HearthError`])
//! - Catalog version ordering
//! - The on-disk home layout ([`dirs::HearthHome`])
//! - Cancellation and deadline helpers for long-running operations

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod cancel;
pub mod dirs;
pub mod environment;
pub mod error;
pub mod names;
pub mod package;
pub mod types;
pub mod version;

pub use cancel::{CancellationToken, cancel_after, cancellable, with_deadline};
pub use dirs::HearthHome;
pub use environment::Environment;
pub use error::{HearthError, HearthResult};
pub use names::{EnvironmentName, PackageName};
pub use package::{CatalogEntry, Package, PackageKind, parse_kind};
pub use types::SessionId;
pub use version::{compare_versions, versions_match};
