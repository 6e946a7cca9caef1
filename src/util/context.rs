//! Global context for berth operations.
//!
//! Provides centralized access to the per-user state directory and the
//! fixed, user-visible location of the compatibility policy file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// File name of the global compatibility policy rule table.
pub const POLICY_FILE_NAME: &str = "compatibility.toml";

/// Project directories for berth
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "berth", "berth"));

/// Global context containing user-level paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Home directory for global berth data (~/.berth/)
    home: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext with the default home directory.
    pub fn new() -> Self {
        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.data_dir().to_path_buf()
        } else {
            // Fallback to ~/.berth
            directories::BaseDirs::new()
                .map(|b| b.home_dir().join(".berth"))
                .unwrap_or_else(|| PathBuf::from(".berth"))
        };

        GlobalContext { home }
    }

    /// Create a GlobalContext rooted at a specific home directory.
    ///
    /// Used by tests and by embedders that keep state somewhere else.
    pub fn with_home(home: PathBuf) -> Self {
        GlobalContext { home }
    }

    /// Get the berth home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the policy directory (`<home>/policy`).
    pub fn policy_dir(&self) -> PathBuf {
        self.home.join("policy")
    }

    /// Get the path of the global compatibility policy rule table.
    pub fn policy_path(&self) -> PathBuf {
        self.policy_dir().join(POLICY_FILE_NAME)
    }

    /// Ensure a directory exists, creating it if necessary.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}
