//! Validated deployment target

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::OcdError;

/// Characters that would let a folder path escape its quoting in a shell line
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '$', '`', '<', '>'];

/// Absolute path to a Git working tree that passed validation.
///
/// Construct through [`DeploymentTarget::validate`]; there is no other way to
/// obtain one, so every runner invocation works on a checked path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    path: PathBuf,
}

impl DeploymentTarget {
    pub async fn validate(raw: &str) -> Result<Self, OcdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(OcdError::ValidationError("folder path is required".to_string()));
        }
        reject_metacharacters(raw)?;

        let path = tokio::fs::canonicalize(raw).await.map_err(|e| {
            OcdError::ValidationError(format!("folder does not exist: {} ({})", raw, e))
        })?;
        let path = strip_verbatim_prefix(path);
        // canonicalization may resolve symlinks into something unsafe
        reject_metacharacters(&path.to_string_lossy())?;

        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_dir() {
            return Err(OcdError::ValidationError(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        // worktrees and submodules carry a `.git` file instead of a directory
        if !tokio::fs::try_exists(path.join(".git")).await.unwrap_or(false) {
            return Err(OcdError::ValidationError(format!(
                "not a git repository: {}",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the tree holds the customization project rather than microservices
    pub fn is_customization(&self) -> bool {
        self.path.to_string_lossy().contains("customization")
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn reject_metacharacters(path: &str) -> Result<(), OcdError> {
    match path.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        Some(c) => Err(OcdError::ValidationError(format!(
            "folder path contains forbidden character '{}'",
            c
        ))),
        None => Ok(()),
    }
}

fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) => PathBuf::from(stripped),
        None => path,
    }
}
