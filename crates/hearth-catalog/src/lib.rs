//! Hearth Catalog - the remote package catalog.
//!
//! A [`CatalogSource`] performs one uncached round-trip (HTTP or a local
//! JSON file). [`CatalogClient`] wraps a source with a freshness cache,
//! coalesces concurrent misses, and resolves a package name plus optional
//! version to a single [`CatalogEntry`](hearth_core::CatalogEntry).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod client;
mod parse;
mod source;

pub use client::{CacheStats, CatalogClient, DEFAULT_FRESHNESS, StalePolicy, select_entry};
pub use parse::parse_catalog;
pub use source::{
    CatalogSource, DEFAULT_TIMEOUT, FileCatalogSource, HttpCatalogSource, MAX_CATALOG_SIZE,
    source_for_location,
};
