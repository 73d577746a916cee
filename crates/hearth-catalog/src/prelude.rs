//! Prelude module - commonly used types for convenient import.
//!
//! Use `use hearth_catalog::prelude::*;` to import all essential types.

pub use crate::{CatalogClient, CatalogSource, StalePolicy};
