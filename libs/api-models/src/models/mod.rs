//! Server API models

use serde::{Deserialize, Serialize};

/// Pipeline phase reported by the deployment script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prerequisites,
    Settings,
    Build,
    Deploy,
    Patch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prerequisites => "prerequisites",
            Stage::Settings => "settings",
            Stage::Build => "build",
            Stage::Deploy => "deploy",
            Stage::Patch => "patch",
        }
    }
}

/// Status of a stage or of a single service within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// Structured progress derived from one line of script output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: Stage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    pub status: ProgressStatus,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Event pushed to a client for one deployment session.
///
/// `Complete` is the terminal event; it is always the last event of a
/// session and is produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputEvent {
    Output { content: String },
    Progress(ProgressUpdate),
    Complete { content: String, success: bool },
}

impl OutputEvent {
    pub fn output(content: impl Into<String>) -> Self {
        OutputEvent::Output {
            content: content.into(),
        }
    }

    pub fn complete(success: bool, content: impl Into<String>) -> Self {
        OutputEvent::Complete {
            content: content.into(),
            success,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputEvent::Complete { .. })
    }
}

/// Stream bookkeeping frames that are not part of a session's event sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamNotice {
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    KeepAlive,
}

/// Deployment start request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub folder_path: String,
}

/// Inbound control frame on the deployment WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ControlMessage {
    pub fn is_cancel(&self) -> bool {
        self.kind.eq_ignore_ascii_case("cancel")
    }
}

/// Deployment start response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStartResponse {
    pub session_id: String,
}

/// Deployment cancel response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub status: String,
    pub session_id: String,
}

/// Error body shared by all endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: i64,
    pub active_sessions: usize,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Target validation response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResponse {
    pub folder_path: String,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub changed_services: Vec<String>,
}

/// Changed files and microservices in a working tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesResponse {
    pub folder_path: String,
    pub files: Vec<String>,
    pub services: Vec<String>,
}

/// Non-secret configuration exposed to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfigResponse {
    pub platform: String,
    pub command_timeout_secs: u64,
    pub endpoints: PublicEndpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEndpoints {
    pub jenkins_base_url: Option<String>,
    pub bitbucket_base_url: Option<String>,
    pub bitbucket_project_key: Option<String>,
    pub bitbucket_customization_repo: Option<String>,
}
