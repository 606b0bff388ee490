//! Changed microservices of a working tree

use std::collections::BTreeSet;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::errors::OcdError;

/// Uncommitted changes of a tree and the microservices they touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub files: Vec<String>,
    pub services: Vec<String>,
}

/// Relative paths reported by `git status --porcelain`
pub async fn changed_files(tree: &Path) -> Result<Vec<String>, OcdError> {
    let output = Command::new("git")
        .current_dir(tree)
        .args(["status", "--porcelain=v1", "-z", "--untracked-files=all"])
        .env("GIT_PAGER", "cat")
        .output()
        .await
        .map_err(|e| OcdError::GitError(format!("failed to run git status: {}", e)))?;

    if !output.status.success() {
        return Err(OcdError::GitError(format!(
            "git status failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
}

/// Changed files plus the top-level directories holding a `pom.xml`
pub async fn changed_services(tree: &Path) -> Result<ChangeSet, OcdError> {
    let files = changed_files(tree).await?;

    let mut services = BTreeSet::new();
    for file in &files {
        let Some(top) = file.split('/').next().filter(|_| file.contains('/')) else {
            continue;
        };
        if services.contains(top) {
            continue;
        }
        if tokio::fs::try_exists(tree.join(top).join("pom.xml"))
            .await
            .unwrap_or(false)
        {
            services.insert(top.to_string());
        }
    }
    debug!(
        "{} changed files, {} changed services in {}",
        files.len(),
        services.len(),
        tree.display()
    );

    Ok(ChangeSet {
        files,
        services: services.into_iter().collect(),
    })
}

/// Parse NUL separated porcelain v1 records.
///
/// Renames and copies carry their source path as an extra record, which is
/// skipped.
fn parse_porcelain(raw: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut records = raw.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        if record.len() < 4 {
            continue;
        }
        let (status, path) = record.split_at(3);
        if status.starts_with('R') || status.starts_with('C') {
            records.next();
        }
        files.push(path.trim_end_matches('/').to_string());
    }
    files
}
