//! CI API models

use serde::{Deserialize, Serialize};

/// Reference to a Jenkins build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    pub number: u64,
    #[serde(default)]
    pub url: String,
}

/// Jenkins job summary (`/job/<name>/api/json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub buildable: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub in_queue: bool,
    #[serde(default)]
    pub last_build: Option<BuildRef>,
    #[serde(default)]
    pub last_successful_build: Option<BuildRef>,
    #[serde(default)]
    pub last_failed_build: Option<BuildRef>,
    #[serde(default)]
    pub next_build_number: Option<u64>,
}

/// Jenkins build details (`/job/<name>/<number>/api/json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub number: u64,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Result of queueing a Jenkins build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBuild {
    pub job: String,
    pub queue_url: Option<String>,
}

/// Jenkins server root (`/api/json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsRoot {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub node_description: Option<String>,
    #[serde(default)]
    pub use_security: bool,
}

/// Bitbucket Server paged response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub size: u32,
    #[serde(default = "default_true")]
    pub is_last_page: bool,
    #[serde(default)]
    pub next_page_start: Option<u32>,
}

fn default_true() -> bool {
    true
}

/// Bitbucket Server branch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub display_id: String,
    #[serde(default)]
    pub latest_commit: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}
