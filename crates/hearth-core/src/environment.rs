//! The environment record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::names::EnvironmentName;

/// An isolated namespace with its own storage root and installed-package set.
///
/// `name` is the identity key; `storage_root` is derived from it and never
/// overlaps another environment's root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name.
    pub name: EnvironmentName,
    /// Directory holding the environment's index and artifacts.
    pub storage_root: PathBuf,
    /// When the environment was first created.
    pub created_at: DateTime<Utc>,
}
