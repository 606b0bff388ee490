//! Deployment script bundle and its temporary materialization

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::deploy::target::DeploymentTarget;
use crate::errors::OcdError;

pub const STANDARD_SCRIPT: &str = "OCD.sh";
pub const CUSTOMIZATION_SCRIPT: &str = "OCD-customization.sh";
pub const SHARED_DIR: &str = "shared";

/// Main scripts plus the helpers they source from `shared/`
#[derive(Debug, Clone)]
pub struct ScriptBundle {
    standard: String,
    customization: String,
    shared: Vec<(String, String)>,
}

impl ScriptBundle {
    /// Scripts compiled into the binary
    pub fn embedded() -> Self {
        Self {
            standard: include_str!("../../scripts/OCD.sh").to_string(),
            customization: include_str!("../../scripts/OCD-customization.sh").to_string(),
            shared: vec![
                (
                    "utils.sh".to_string(),
                    include_str!("../../scripts/shared/utils.sh").to_string(),
                ),
                (
                    "maven.sh".to_string(),
                    include_str!("../../scripts/shared/maven.sh").to_string(),
                ),
            ],
        }
    }

    /// Bundle running `contents` for every project type
    pub fn with_main(contents: impl Into<String>) -> Self {
        let contents = contents.into();
        Self {
            standard: contents.clone(),
            customization: contents,
            shared: Vec::new(),
        }
    }

    pub fn with_shared(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.shared.push((name.into(), contents.into()));
        self
    }

    pub fn main_script_name(target: &DeploymentTarget) -> &'static str {
        if target.is_customization() {
            CUSTOMIZATION_SCRIPT
        } else {
            STANDARD_SCRIPT
        }
    }

    /// Write the bundle for `target` into a fresh private directory.
    ///
    /// The directory is removed when the returned value is dropped.
    pub async fn materialize(&self, target: &DeploymentTarget) -> Result<MaterializedScripts, OcdError> {
        let dir = tempfile::Builder::new()
            .prefix("ocd_")
            .tempdir()
            .map_err(|e| OcdError::SpawnError(format!("failed to create script dir: {}", e)))?;

        let name = Self::main_script_name(target);
        let contents = if target.is_customization() {
            &self.customization
        } else {
            &self.standard
        };
        let script = dir.path().join(name);
        write_script(&script, contents).await?;

        let shared_dir = dir.path().join(SHARED_DIR);
        tokio::fs::create_dir_all(&shared_dir)
            .await
            .map_err(|e| OcdError::SpawnError(format!("failed to create shared dir: {}", e)))?;
        for (file, contents) in &self.shared {
            write_script(&shared_dir.join(file), contents).await?;
        }

        debug!("Materialized {} into {}", name, dir.path().display());
        Ok(MaterializedScripts { dir, script })
    }
}

/// Scripts on disk for exactly one deployment
#[derive(Debug)]
pub struct MaterializedScripts {
    dir: TempDir,
    script: PathBuf,
}

impl MaterializedScripts {
    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

async fn write_script(path: &Path, contents: &str) -> Result<(), OcdError> {
    tokio::fs::write(path, normalize_line_endings(contents))
        .await
        .map_err(|e| OcdError::SpawnError(format!("failed to write {}: {}", path.display(), e)))
}

/// Bash rejects `\r` in scripts checked out on Windows
pub fn normalize_line_endings(contents: &str) -> String {
    contents.replace("\r\n", "\n").replace('\r', "\n")
}
