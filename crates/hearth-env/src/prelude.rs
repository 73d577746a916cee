//! Prelude module - commonly used types for convenient import.
//!
//! Use `use hearth_env::prelude::*;` to import all essential types.

pub use crate::{EnvironmentRegistry, Installer, PackageManager, SessionContext};
