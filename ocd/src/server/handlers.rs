//! HTTP request handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use ocd_api_models::models::{
    ChangesResponse, DeployRequest, HealthResponse, PublicConfigResponse, PublicEndpoints,
    TargetResponse, VersionResponse,
};
use ocd_ci_models::models::{Branch, BuildInfo, JenkinsRoot, JobInfo, QueuedBuild};
use serde::Deserialize;
use tracing::warn;

use crate::deploy::DeploymentTarget;
use crate::errors::{CiError, CiErrorKind, OcdError};
use crate::git::changed_services;
use crate::http::CiClient;
use crate::server::state::ServerState;
use crate::utils::{platform_name, version_info};

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ocd-gui".to_string(),
        version: version.version,
        timestamp: chrono::Utc::now().timestamp(),
        active_sessions: state.broker.active_count().await,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Non-secret configuration for the UI
pub async fn public_config_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(PublicConfigResponse {
        platform: platform_name().to_string(),
        command_timeout_secs: state.broker.runner().options().timeout.as_secs(),
        endpoints: PublicEndpoints {
            jenkins_base_url: state.jenkins.as_ref().map(|j| j.base_url().to_string()),
            bitbucket_base_url: state
                .bitbucket
                .as_ref()
                .map(|b| b.client.base_url().to_string()),
            bitbucket_project_key: state.bitbucket.as_ref().map(|b| b.project.clone()),
            bitbucket_customization_repo: state.bitbucket.as_ref().map(|b| b.repo.clone()),
        },
    })
}

/// Check a folder before deploying it
pub async fn validate_target_handler(Json(request): Json<DeployRequest>) -> impl IntoResponse {
    let target = match DeploymentTarget::validate(&request.folder_path).await {
        Ok(target) => target,
        Err(e) => {
            return Json(TargetResponse {
                folder_path: request.folder_path,
                success: false,
                message: e.to_string(),
                changed_services: Vec::new(),
            })
        }
    };

    let changed_services = match changed_services(target.path()).await {
        Ok(changes) => changes.services,
        Err(e) => {
            warn!("Could not list changes of {}: {}", target, e);
            Vec::new()
        }
    };

    Json(TargetResponse {
        folder_path: target.to_string(),
        success: true,
        message: "Valid Git repository".to_string(),
        changed_services,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    #[serde(default)]
    pub folder_path: String,
}

/// Changed files and microservices of a tree
pub async fn changes_handler(
    Query(query): Query<ChangesQuery>,
) -> Result<Json<ChangesResponse>, OcdError> {
    let target = DeploymentTarget::validate(&query.folder_path).await?;
    let changes = changed_services(target.path()).await?;
    Ok(Json(ChangesResponse {
        folder_path: target.to_string(),
        files: changes.files,
        services: changes.services,
    }))
}

fn jenkins(state: &ServerState) -> Result<&CiClient, CiError> {
    state
        .jenkins
        .as_deref()
        .ok_or_else(|| CiError::new(CiErrorKind::Configuration, "Jenkins is not configured"))
}

pub async fn jenkins_health_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<JenkinsRoot>, OcdError> {
    Ok(Json(jenkins(&state)?.jenkins_health().await?))
}

pub async fn job_info_handler(
    State(state): State<Arc<ServerState>>,
    Path(job): Path<String>,
) -> Result<Json<JobInfo>, OcdError> {
    Ok(Json(jenkins(&state)?.job_info(&job).await?))
}

pub async fn build_status_handler(
    State(state): State<Arc<ServerState>>,
    Path((job, build)): Path<(String, u64)>,
) -> Result<Json<BuildInfo>, OcdError> {
    Ok(Json(jenkins(&state)?.build_status(&job, build).await?))
}

/// Queue a build; the optional body is a flat JSON object of parameters
pub async fn trigger_build_handler(
    State(state): State<Arc<ServerState>>,
    Path(job): Path<String>,
    body: Bytes,
) -> Result<Json<QueuedBuild>, OcdError> {
    let params: Vec<(String, String)> = if body.iter().all(u8::is_ascii_whitespace) {
        Vec::new()
    } else {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&body)?;
        raw.into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect()
    };
    Ok(Json(jenkins(&state)?.trigger_build(&job, &params).await?))
}

/// Branches of the customization repository
pub async fn customization_branches_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Branch>>, OcdError> {
    let bitbucket = state
        .bitbucket
        .as_deref()
        .ok_or_else(|| CiError::new(CiErrorKind::Configuration, "Bitbucket is not configured"))?;
    let branches = bitbucket
        .client
        .branches(&bitbucket.project, &bitbucket.repo)
        .await?;
    Ok(Json(branches))
}
