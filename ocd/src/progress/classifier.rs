//! Line classifier turning deployment script output into progress updates
//!
//! Rules are evaluated in table order and the first rule that produces an
//! update wins. A rule whose marker matches but whose payload cannot be
//! extracted (for example a reactor banner without a module name) yields
//! nothing and evaluation continues with the next rule.

use ocd_api_models::models::{ProgressStatus, ProgressUpdate, Stage};

use crate::progress::ansi::{is_noise, strip_ansi};

struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&str) -> Option<ProgressUpdate>,
}

const PREREQUISITES: &str = "Connection Checks & Prerequisites";
const KUBERNETES: &str = "Kubernetes Deployment";

static RULES: &[Rule] = &[
    Rule {
        name: "prerequisites-start",
        matches: |l| l.contains("Performing connection checks and prerequisites"),
        build: |_| Some(update(Stage::Prerequisites, None, ProgressStatus::Running, PREREQUISITES, None)),
    },
    Rule {
        name: "prerequisites-passed",
        matches: |l| l.contains("All prerequisites checks passed!"),
        build: |l| {
            Some(update(
                Stage::Prerequisites,
                None,
                ProgressStatus::Success,
                PREREQUISITES,
                parenthesized(l),
            ))
        },
    },
    Rule {
        name: "prerequisites-failed",
        matches: |l| l.contains("Prerequisites check failed"),
        build: |_| Some(update(Stage::Prerequisites, None, ProgressStatus::Error, PREREQUISITES, None)),
    },
    Rule {
        name: "maven-settings",
        matches: |l| l.contains("Maven Settings XML Updated"),
        build: |l| {
            Some(update(
                Stage::Settings,
                None,
                ProgressStatus::Success,
                "Maven Settings XML Update",
                parenthesized(l),
            ))
        },
    },
    Rule {
        name: "build-start",
        matches: |l| l.contains("Building microservice:"),
        build: |l| {
            let service = word_after(l, "Building microservice:");
            let message = format!("Building {}", service.as_deref().unwrap_or_default());
            Some(update(Stage::Build, service, ProgressStatus::Running, message, None))
        },
    },
    Rule {
        name: "build-success",
        matches: |l| l.contains("Build completed successfully for"),
        build: |l| {
            let service = word_after(l, "Build completed successfully for");
            let message = format!("Build completed for {}", service.as_deref().unwrap_or_default());
            Some(update(Stage::Build, service, ProgressStatus::Success, message, None))
        },
    },
    Rule {
        // The service-specific form wins over the generic Maven failure
        // markers when both appear on one line.
        name: "build-failure",
        matches: |l| {
            l.contains("BUILD FAILURE")
                || l.contains("Build failed for")
                || l.contains("Failed to execute goal")
                || l.contains("Compilation failure")
        },
        build: |l| {
            let service = if l.contains("Build failed for") {
                word_after(l, "Build failed for")
            } else {
                None
            };
            Some(match service {
                Some(service) => update(
                    Stage::Build,
                    Some(service.clone()),
                    ProgressStatus::Error,
                    format!("Build failed for {}", service),
                    Some(l.to_string()),
                ),
                None => update(Stage::Build, None, ProgressStatus::Error, "Building Microservices", None),
            })
        },
    },
    Rule {
        name: "maven-reactor-module",
        matches: |l| l.contains("Building") && l.contains("---"),
        build: |l| {
            let rest = &l[l.find("Building ")? + "Building ".len()..];
            let service = &rest[..rest.find(' ')?];
            Some(update(
                Stage::Build,
                Some(service.to_string()),
                ProgressStatus::Running,
                format!("Maven building {}", service),
                None,
            ))
        },
    },
    Rule {
        name: "docker-step",
        matches: |l| l.contains("DOCKER>") && l.contains("Step"),
        build: |l| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Building Docker image",
                docker_step(l),
            ))
        },
    },
    Rule {
        name: "docker-built",
        matches: |l| l.contains("DOCKER>") && l.contains("Successfully built"),
        build: |l| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Docker image built successfully",
                first_word_after(l, "Successfully built ").map(|id| format!("Image ID: {}", id)),
            ))
        },
    },
    Rule {
        name: "docker-tagged",
        matches: |l| l.contains("DOCKER>") && l.contains("Successfully tagged"),
        build: |l| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Docker image tagged",
                first_word_after(l, "Successfully tagged "),
            ))
        },
    },
    Rule {
        name: "registry-push",
        matches: |l| l.contains("The push refers to repository"),
        build: |l| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Pushing to registry",
                bracketed(l).map(str::to_string),
            ))
        },
    },
    Rule {
        name: "layer-pushed",
        matches: |l| l.contains("Pushed") && l.contains(':'),
        build: |_| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Uploading layers",
                Some("Layer pushed successfully".to_string()),
            ))
        },
    },
    Rule {
        name: "layer-pushing",
        matches: |l| l.contains("Pushing") && l.contains('[') && l.contains(']'),
        build: |l| {
            Some(update(
                Stage::Deploy,
                None,
                ProgressStatus::Running,
                "Uploading to Nexus",
                push_progress(l),
            ))
        },
    },
    Rule {
        name: "deploy-start",
        matches: |l| l.contains("Deploying microservice:"),
        build: |l| {
            let service = word_after(l, "Deploying microservice:");
            let message = format!("Deploying {}", service.as_deref().unwrap_or_default());
            Some(update(Stage::Deploy, service, ProgressStatus::Running, message, None))
        },
    },
    Rule {
        name: "image-built",
        matches: |l| l.contains("Docker image build completed successfully for"),
        build: |l| {
            let service = word_after(l, "Docker image build completed successfully for");
            let message = format!("Docker image built for {}", service.as_deref().unwrap_or_default());
            Some(update(Stage::Deploy, service, ProgressStatus::Success, message, None))
        },
    },
    Rule {
        name: "patched",
        matches: |l| l.contains("Microservice") && l.contains("patched with new image"),
        build: |l| {
            let service = token_after(l, "Microservice");
            let message = format!("Microservice {} updated", service.as_deref().unwrap_or_default());
            Some(update(Stage::Patch, service, ProgressStatus::Success, message, None))
        },
    },
    Rule {
        name: "patch-missing-service",
        matches: |l| l.contains("Error: Could not find microservice for"),
        build: |l| {
            let service = token_after(l, "for")?;
            Some(update(
                Stage::Patch,
                Some(service.clone()),
                ProgressStatus::Error,
                format!("Deployment failed for {}", service),
                Some("Microservice not found in cluster".to_string()),
            ))
        },
    },
    Rule {
        name: "deploy-failed",
        matches: |l| l.contains("Deploy: FAILED"),
        build: |_| {
            Some(update(
                Stage::Patch,
                None,
                ProgressStatus::Error,
                KUBERNETES,
                Some("One or more deployments failed".to_string()),
            ))
        },
    },
    Rule {
        name: "deploy-partial",
        matches: |l| l.contains("PARTIAL:") && l.contains("microservices processed successfully"),
        build: |_| {
            Some(update(
                Stage::Patch,
                None,
                ProgressStatus::Error,
                KUBERNETES,
                Some("Partial deployment - some services failed".to_string()),
            ))
        },
    },
];

/// Classify one line of script output.
///
/// Pure and stateless: the same line always yields the same result.
pub fn classify(line: &str) -> Option<ProgressUpdate> {
    let clean = strip_ansi(line.trim());
    let clean = clean.trim();
    if clean.is_empty() || is_noise(clean) {
        return None;
    }

    RULES
        .iter()
        .filter(|rule| (rule.matches)(clean))
        .find_map(|rule| {
            let update = (rule.build)(clean);
            if update.is_none() {
                tracing::trace!("Rule {} matched without payload: {}", rule.name, clean);
            }
            update
        })
}

fn update(
    stage: Stage,
    service: Option<String>,
    status: ProgressStatus,
    message: impl Into<String>,
    details: Option<String>,
) -> ProgressUpdate {
    ProgressUpdate {
        stage,
        service,
        status,
        message: message.into(),
        details: details.filter(|d| !d.is_empty()),
    }
}

/// First whitespace-separated word following `marker`, escape codes removed
fn word_after(line: &str, marker: &str) -> Option<String> {
    let idx = line.find(marker)?;
    line[idx + marker.len()..]
        .split_whitespace()
        .next()
        .map(strip_ansi)
        .filter(|w| !w.is_empty())
}

/// Like `word_after`, but `marker` must already end with its separator
fn first_word_after(line: &str, marker: &str) -> Option<String> {
    let idx = line.find(marker)?;
    line[idx + marker.len()..]
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Word following the first whole token equal to `token`
fn token_after(line: &str, token: &str) -> Option<String> {
    let mut words = line.split_whitespace();
    words.find(|w| *w == token)?;
    words.next().map(strip_ansi).filter(|w| !w.is_empty())
}

/// Text between the first `(` and the last `)`
fn parenthesized(line: &str) -> Option<String> {
    let start = line.find('(')?;
    let end = line.rfind(')')?;
    (end > start).then(|| line[start + 1..end].to_string())
}

/// Text inside the first `[...]` pair
fn bracketed(line: &str) -> Option<&str> {
    let start = line.find('[')?;
    let len = line[start..].find(']')?;
    Some(&line[start + 1..start + len])
}

/// `Step N/M` fragment of a Docker build line
fn docker_step(line: &str) -> Option<String> {
    let rest = &line[line.find("Step ")?..];
    let end = rest.find(':')?;
    Some(rest[..end].trim_end().to_string())
}

/// Progress bar and the size column following it
fn push_progress(line: &str) -> Option<String> {
    let start = line.find('[')?;
    let end = start + line[start..].find(']')?;
    let bar = &line[start..=end];
    Some(match line[end + 1..].split_whitespace().next() {
        Some(size) => format!("{} {}", bar, size),
        None => bar.to_string(),
    })
}
