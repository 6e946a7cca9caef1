//! Compatibility resolution error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::settings::SettingsError;

/// Error during binary-compatibility resolution.
#[derive(Debug, Error)]
pub enum CompatError {
    #[error(
        "the compatibility policy file doesn't exist: {}. If you want to \
         disable compatibility probing, edit its contents instead of removing it",
        .path.display()
    )]
    MissingPolicyFile { path: PathBuf },

    #[error("invalid compatibility policy file {}: {reason}", .path.display())]
    InvalidPolicyFile { path: PathBuf, reason: String },

    #[error("error while processing compatibility policy `{policy}` for `{recipe}`:\n{trace}")]
    PolicyFailed {
        policy: String,
        recipe: String,
        trace: String,
    },

    #[error("validation failed for `{recipe}`")]
    Validation {
        recipe: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Render an error chain as a short, truncated trace for policy failures.
pub(crate) fn scoped_trace(err: &anyhow::Error) -> String {
    const MAX_CAUSES: usize = 5;
    let mut lines: Vec<String> = err
        .chain()
        .take(MAX_CAUSES)
        .enumerate()
        .map(|(i, cause)| {
            if i == 0 {
                cause.to_string()
            } else {
                format!("  caused by: {cause}")
            }
        })
        .collect();
    if err.chain().count() > MAX_CAUSES {
        lines.push("  ...".to_string());
    }
    lines.join("\n")
}
