//! Command implementations.

pub(crate) mod catalog;
pub(crate) mod config;
pub(crate) mod env;
pub(crate) mod pkg;

use std::sync::Arc;

use hearth_core::CancellationToken;
use hearth_env::EnvironmentRegistry;
use tracing::debug;

/// A token cancelled on Ctrl-C, so long fetches and installs roll back cleanly.
pub(crate) fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Shared state for one CLI invocation.
pub(crate) struct AppContext {
    pub(crate) registry: Arc<EnvironmentRegistry>,
}
