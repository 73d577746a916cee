//! Validated identifiers for environments and packages.
//!
//! Both names end up as directory names under the Hearth home, so they are
//! validated on construction *and* on deserialization. A crafted index or
//! metadata file cannot smuggle a path traversal payload through serde.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};

/// Longest accepted environment name.
pub const MAX_ENVIRONMENT_NAME_LEN: usize = 64;

/// Longest accepted package name.
pub const MAX_PACKAGE_NAME_LEN: usize = 128;

/// Name of an environment, the sole identity key for it.
///
/// Must be non-empty and match `[A-Za-z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EnvironmentName(String);

impl<'de> Deserialize<'de> for EnvironmentName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl EnvironmentName {
    /// Create a new `EnvironmentName`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::InvalidName`] if the name is empty, too long,
    /// or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> HearthResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a valid environment name.
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        Self::validate(name).is_ok()
    }

    fn validate(name: &str) -> HearthResult<()> {
        let invalid = |reason: String| HearthError::InvalidName {
            kind: "environment",
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("must not be empty".into()));
        }
        if name.len() > MAX_ENVIRONMENT_NAME_LEN {
            return Err(invalid(format!(
                "must be at most {MAX_ENVIRONMENT_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(
                "must contain only ASCII letters, digits, '_' and '-'".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EnvironmentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EnvironmentName {
    type Error = HearthError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Name of an installable package.
///
/// Must be non-empty, match `[A-Za-z0-9_.-]+`, and not start with `.` or `-`.
/// Dots are allowed for catalog names such as `mycroft.weather`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageName(String);

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl PackageName {
    /// Create a new `PackageName`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::InvalidName`] if the name is malformed.
    pub fn new(name: impl Into<String>) -> HearthResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a valid package name.
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        Self::validate(name).is_ok()
    }

    fn validate(name: &str) -> HearthResult<()> {
        let invalid = |reason: String| HearthError::InvalidName {
            kind: "package",
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("must not be empty".into()));
        }
        if name.len() > MAX_PACKAGE_NAME_LEN {
            return Err(invalid(format!(
                "must be at most {MAX_PACKAGE_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(
                "must contain only ASCII letters, digits, '_', '-' and '.'".into(),
            ));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(invalid("must not start with '.' or '-'".into()));
        }
        Ok(())
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PackageName {
    type Error = HearthError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
