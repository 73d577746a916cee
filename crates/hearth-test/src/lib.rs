//! Hearth Test - Shared test utilities for Hearth environments.
//!
//! This crate provides catalog and installer doubles plus a temporary-home
//! registry fixture, used as a dev-dependency across the workspace.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! hearth-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use hearth_test::{RegistryFixture, french_skill_entry};
//!
//! #[tokio::test]
//! async fn installs_into_research() {
//!     let fx = RegistryFixture::new().with_entry(french_skill_entry()).build();
//!     let manager = fx.registry.attach(&fx.env("research"), fx.session()).await.unwrap();
//!     manager.install(&fx.package("french-skill"), None, &fx.token()).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod catalog;
pub mod fixtures;
pub mod installers;

pub use catalog::*;
pub use fixtures::*;
pub use installers::*;
