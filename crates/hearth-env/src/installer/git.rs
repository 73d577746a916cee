//! Git-backed installer: a shallow clone into the staging directory.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use hearth_core::{CancellationToken, CatalogEntry, HearthError, HearthResult};
use tokio::process::Command;
use tracing::debug;

use super::Installer;

/// A parsed git `sourceRef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    /// URL handed to `git clone`.
    pub url: String,
    /// Branch or tag from a `#ref` suffix.
    pub git_ref: Option<String>,
}

impl GitSource {
    /// Whether `source_ref` names a git repository.
    ///
    /// Accepted: `git://…`, `git+https://…`, `git+ssh://…`, `ssh://…`,
    /// `git@host:path`, and `https://…` / `http://…` URLs ending in `.git`.
    #[must_use]
    pub fn looks_like_git(source_ref: &str) -> bool {
        let (base, _) = split_ref(source_ref);
        base.starts_with("git://")
            || base.starts_with("git+")
            || base.starts_with("ssh://")
            || base.starts_with("git@")
            || ((base.starts_with("https://") || base.starts_with("http://"))
                && base.trim_end_matches('/').ends_with(".git"))
    }

    /// Parse a git `sourceRef`.
    ///
    /// # Errors
    ///
    /// Returns a description if the source is not a git reference or the
    /// ref suffix is unusable.
    pub fn parse(source_ref: &str) -> Result<Self, String> {
        if !Self::looks_like_git(source_ref) {
            return Err(format!("'{source_ref}' is not a git source"));
        }

        let (base, git_ref) = split_ref(source_ref);

        if let Some(r) = git_ref
            && (r.is_empty() || r.starts_with('-') || r.chars().any(char::is_whitespace))
        {
            return Err(format!("invalid git ref '{r}'"));
        }

        let url = base.strip_prefix("git+").unwrap_or(base);
        Ok(Self {
            url: url.to_string(),
            git_ref: git_ref.map(str::to_string),
        })
    }
}

/// Installs by shallow-cloning the package's repository.
#[derive(Debug, Clone)]
pub struct GitInstaller {
    git_binary: String,
}

impl Default for GitInstaller {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitInstaller {
    /// Use `git_binary` to run clones.
    #[must_use]
    pub fn new(git_binary: impl Into<String>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    fn command(&self, source: &GitSource, staging: &Path) -> Command {
        let mut cmd = Command::new(&self.git_binary);

        // Only pass through what git needs; drop injected GIT_* hooks.
        cmd.env_clear();
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        if let Ok(home) = std::env::var("HOME") {
            cmd.env("HOME", home);
        }
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        cmd.args(["clone", "--depth=1", "--quiet"]);
        if let Some(r) = &source.git_ref {
            cmd.args(["--branch", r]);
        }
        cmd.arg("--").arg(&source.url).arg(staging);
        cmd
    }
}

#[async_trait]
impl Installer for GitInstaller {
    async fn install(
        &self,
        entry: &CatalogEntry,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> HearthResult<()> {
        let failed = |reason: String| HearthError::InstallFailed {
            package: entry.name.to_string(),
            reason,
        };

        let source = GitSource::parse(&entry.source_ref).map_err(failed)?;
        debug!(package = %entry.name, url = %source.url, git_ref = ?source.git_ref, "Cloning package");

        let output = hearth_core::cancellable(
            "git clone",
            cancel,
            async {
                self.command(&source, staging)
                    .output()
                    .await
                    .map_err(|e| failed(format!("failed to run {}: {e}", self.git_binary)))
            },
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("git clone failed: {}", stderr.trim())));
        }
        Ok(())
    }
}

/// Split `sourceRef` at its first `#` into the repository part and the ref.
fn split_ref(source_ref: &str) -> (&str, Option<&str>) {
    match source_ref.split_once('#') {
        Some((base, r)) => (base, Some(r)),
        None => (source_ref, None),
    }
}
