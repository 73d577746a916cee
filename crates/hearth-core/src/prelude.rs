//! Prelude module - commonly used types for convenient import.
//!
//! Use `use hearth_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{HearthError, HearthResult};

// Identifiers
pub use crate::{EnvironmentName, PackageName, SessionId};

// Records
pub use crate::{CatalogEntry, Environment, Package, PackageKind};

// Cancellation
pub use crate::CancellationToken;
