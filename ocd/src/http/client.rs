//! HTTP client for the Jenkins and Bitbucket REST APIs

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::errors::{CiError, CiErrorKind};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Basic auth pair; the token is an API token, never a password
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct CiClientOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub cooldown: CooldownOptions,
    pub insecure_skip_verify: bool,
}

impl Default for CiClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            cooldown: CooldownOptions::default(),
            insecure_skip_verify: false,
        }
    }
}

/// Authenticated JSON client bound to one CI server
pub struct CiClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    options: CiClientOptions,
}

impl CiClient {
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        options: CiClientOptions,
    ) -> Result<Self, CiError> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            CiError::new(CiErrorKind::InvalidUrl, format!("invalid base url {}: {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CiError::new(
                CiErrorKind::InvalidUrl,
                format!("unsupported scheme in {}", base_url),
            ));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CiError> {
        let url = self.url(path);
        let response = self.send(&url, || self.client.get(&url)).await?;
        response.json().await.map_err(|e| {
            CiError::new(CiErrorKind::Parsing, format!("failed to decode {}: {}", url, e))
        })
    }

    /// POST form parameters to `path`, returning the raw response
    pub async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Response, CiError> {
        let url = self.url(path);
        self.send(&url, || self.client.post(&url).form(params)).await
    }

    /// Send with retries on retryable failures
    async fn send<F>(&self, url: &str, build: F) -> Result<Response, CiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.send_once(url, build()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    let delay = calc_exp_backoff(&self.options.cooldown, attempt);
                    warn!(
                        "Request to {} failed (attempt {}): {}; retrying in {:?}",
                        url,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Request to {} failed: {}", url, e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, url: &str, request: RequestBuilder) -> Result<Response, CiError> {
        debug!("{}", url);
        let request = match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(creds.token.expose_secret())),
            None => request,
        };
        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CiError::from_status(status.as_u16(), url, &body))
    }
}
