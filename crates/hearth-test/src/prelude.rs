//! Prelude module - commonly used test helpers for convenient import.
//!
//! Use `use hearth_test::prelude::*;` to import all essential helpers.

pub use crate::{
    FailingInstaller, GatedInstaller, RecordingInstaller, RegistryFixture, StaticCatalogSource,
    french_skill_entry, init_test_logging, sample_catalog,
};
