//! Jenkins endpoints

use ocd_ci_models::models::{BuildInfo, JenkinsRoot, JobInfo, QueuedBuild};
use reqwest::header;
use tracing::info;

use crate::http::client::CiClient;
use crate::errors::{CiError, CiErrorKind};

/// `/job/a/job/b` path for a job given as `a/b`
pub fn job_path(job: &str) -> Result<String, CiError> {
    let segments: Vec<&str> = job.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(CiError::new(CiErrorKind::InvalidParameters, "job name is required"));
    }
    let mut path = String::new();
    for segment in segments {
        if segment == "." || segment == ".." || segment.contains(['?', '#']) {
            return Err(CiError::new(
                CiErrorKind::InvalidParameters,
                format!("invalid job name: {}", job),
            ));
        }
        path.push_str("/job/");
        path.push_str(segment);
    }
    Ok(path)
}

impl CiClient {
    /// Jenkins root document; doubles as a connectivity and credentials check
    pub async fn jenkins_health(&self) -> Result<JenkinsRoot, CiError> {
        self.get("/api/json").await
    }

    pub async fn job_info(&self, job: &str) -> Result<JobInfo, CiError> {
        self.get(&format!("{}/api/json", job_path(job)?)).await
    }

    pub async fn build_status(&self, job: &str, number: u64) -> Result<BuildInfo, CiError> {
        self.get(&format!("{}/{}/api/json", job_path(job)?, number))
            .await
    }

    /// Queue a build; parameterized jobs go through `buildWithParameters`
    pub async fn trigger_build(
        &self,
        job: &str,
        params: &[(String, String)],
    ) -> Result<QueuedBuild, CiError> {
        let endpoint = if params.is_empty() {
            "build"
        } else {
            "buildWithParameters"
        };
        let path = format!("{}/{}", job_path(job)?, endpoint);
        let response = self.post_form(&path, params).await?;

        let queue_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        info!("Queued Jenkins build for {} ({:?})", job, queue_url);

        Ok(QueuedBuild {
            job: job.to_string(),
            queue_url,
        })
    }
}
