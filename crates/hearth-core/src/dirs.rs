//! Directory layout for the Hearth home.
//!
//! ```text
//! ~/.hearth/                        (HearthHome, or $HEARTH_HOME)
//! ├── config.toml                   (user config layer)
//! ├── logs/                         (rotated log files)
//! └── environments/
//!     └── <name>/                   (one storage root per environment)
//!         ├── environment.json
//!         ├── packages.lock
//!         ├── packages/<pkg>/<install-id>/
//!         └── .staging/<install-id>/
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::names::EnvironmentName;

/// Environment variable that overrides the home directory.
pub const HOME_ENV_VAR: &str = "HEARTH_HOME";

/// Global Hearth home directory (`~/.hearth/` or `$HEARTH_HOME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HearthHome {
    root: PathBuf,
}

impl HearthHome {
    /// Resolve the home directory.
    ///
    /// Checks `$HEARTH_HOME` first, then falls back to `<user home>/.hearth/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `$HEARTH_HOME` is relative or no user home
    /// directory can be determined.
    pub fn resolve() -> io::Result<Self> {
        if let Ok(custom) = std::env::var(HOME_ENV_VAR) {
            let p = PathBuf::from(&custom);
            if !p.is_absolute() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "HEARTH_HOME must be an absolute path",
                ));
            }
            return Ok(Self { root: p });
        }

        let base = directories::BaseDirs::new().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "neither HEARTH_HOME nor a user home directory is available",
            )
        })?;
        Ok(Self {
            root: base.home_dir().join(".hearth"),
        })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the top-level directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.environments_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory containing one storage root per environment.
    #[must_use]
    pub fn environments_dir(&self) -> PathBuf {
        self.root.join("environments")
    }

    /// Storage root of a single environment.
    #[must_use]
    pub fn environment_dir(&self, name: &EnvironmentName) -> PathBuf {
        self.environments_dir().join(name.as_str())
    }

    /// Logs directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// User-level config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
