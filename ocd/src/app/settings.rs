//! Settings read from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use crate::http::Credentials;
use crate::logs::LogLevel;

pub const DEFAULT_PORT: u16 = 2111;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_WSL_USER: &str = "k8s";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "localhost,127.0.0.1";
pub const DEFAULT_SESSION_RETENTION_SECS: u64 = 600;

/// Server settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    /// Linux user the WSL strategy runs as
    pub wsl_user: String,

    /// Upper bound on one deployment
    pub command_timeout: Duration,

    /// Hosts allowed as browser origins; `*` allows any
    pub allowed_origins: Vec<String>,

    /// How long a finished, uncollected session is kept
    pub session_retention: Duration,

    pub log_level: LogLevel,
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,

    pub open_browser: bool,

    pub jenkins: Option<JenkinsSettings>,
    pub bitbucket: Option<BitbucketSettings>,

    pub tls_insecure_skip_verify: bool,
}

#[derive(Debug, Clone)]
pub struct JenkinsSettings {
    pub base_url: String,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
pub struct BitbucketSettings {
    pub base_url: String,
    pub project: String,
    pub customization_repo: String,
    pub credentials: Option<Credentials>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credentials = |prefix: &str| {
            let username = get(&format!("{}_USERNAME", prefix))?;
            let token = get(&format!("{}_TOKEN", prefix))?;
            Some(Credentials {
                username,
                token: SecretString::from(token),
            })
        };

        let jenkins = get("OCD_JENKINS_URL").map(|base_url| JenkinsSettings {
            base_url,
            credentials: credentials("OCD_JENKINS"),
        });

        let bitbucket = get("OCD_BITBUCKET_URL").map(|base_url| BitbucketSettings {
            base_url,
            project: get("OCD_BITBUCKET_PROJECT").unwrap_or_else(|| "ATTSVO".to_string()),
            customization_repo: get("OCD_BITBUCKET_REPO")
                .unwrap_or_else(|| "customization".to_string()),
            credentials: credentials("OCD_BITBUCKET"),
        });

        Self {
            host: get("OCD_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("OCD_PORT", get("OCD_PORT"), DEFAULT_PORT),
            wsl_user: get("OCD_WSL_USER").unwrap_or_else(|| DEFAULT_WSL_USER.to_string()),
            command_timeout: Duration::from_secs(
                parse_or(
                    "OCD_COMMAND_TIMEOUT",
                    get("OCD_COMMAND_TIMEOUT"),
                    DEFAULT_COMMAND_TIMEOUT_SECS,
                )
                .max(1),
            ),
            allowed_origins: parse_origins(
                &get("OCD_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            session_retention: Duration::from_secs(parse_or(
                "OCD_SESSION_RETENTION",
                get("OCD_SESSION_RETENTION"),
                DEFAULT_SESSION_RETENTION_SECS,
            )),
            log_level: parse_or("OCD_LOG_LEVEL", get("OCD_LOG_LEVEL"), LogLevel::Info),
            log_dir: get("OCD_LOG_DIR").map(PathBuf::from),
            log_json: parse_bool("OCD_LOG_JSON", get("OCD_LOG_JSON"), false),
            open_browser: parse_bool("OCD_OPEN_BROWSER", get("OCD_OPEN_BROWSER"), true),
            jenkins,
            bitbucket,
            tls_insecure_skip_verify: parse_bool(
                "OCD_TLS_INSECURE_SKIP_VERIFY",
                get("OCD_TLS_INSECURE_SKIP_VERIFY"),
                false,
            ),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => default,
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        Some(other) => {
            warn!("Ignoring invalid {}={:?}", key, other);
            default
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
