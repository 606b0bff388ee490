//! Launch strategies for the deployment script

use std::ffi::OsString;
use std::path::Path;

use crate::errors::OcdError;

/// Java logging flags that put timestamps on Maven output
pub const MAVEN_OPTS: &str =
    "-Dorg.slf4j.simpleLogger.showDateTime=true -Dorg.slf4j.simpleLogger.dateTimeFormat=HH:mm:ss";

/// Environment applied to every deployment process
pub const PROCESS_ENV: &[(&str, &str)] = &[
    ("TERM", "xterm-256color"),
    ("COLUMNS", "120"),
    ("LINES", "30"),
    ("PAGER", "cat"),
    ("GIT_PAGER", "cat"),
    ("SYSTEMD_PAGER", ""),
    ("MAVEN_OPTS", MAVEN_OPTS),
    ("OCD_VERBOSE", "true"),
];

/// How the deployment script is started on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// Login bash on Linux and macOS
    Direct,
    /// Login bash inside WSL as the given user
    Wsl { user: String },
    /// Host without a supported launcher
    Unsupported { os: String },
}

/// Program plus discrete arguments ready for `Command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Platform {
    /// Strategy for the running host
    pub fn detect(wsl_user: &str) -> Self {
        match std::env::consts::OS {
            "linux" | "macos" => Platform::Direct,
            "windows" => Platform::Wsl {
                user: wsl_user.to_string(),
            },
            other => Platform::Unsupported {
                os: other.to_string(),
            },
        }
    }

    /// Build the invocation running `script` from inside `work_dir`
    pub fn invocation(&self, script: &Path, work_dir: &Path) -> Result<Invocation, OcdError> {
        match self {
            Platform::Direct => Ok(Invocation {
                program: "bash".into(),
                args: vec![
                    "-l".into(),
                    "-c".into(),
                    shell_line(&script.to_string_lossy(), &work_dir.to_string_lossy()).into(),
                ],
            }),
            Platform::Wsl { user } => {
                if which("wsl").is_none() {
                    return Err(OcdError::SpawnError(
                        "WSL not available on Windows. Please install WSL to use OCD".to_string(),
                    ));
                }
                Ok(Invocation {
                    program: "wsl".into(),
                    args: vec![
                        "--user".into(),
                        user.into(),
                        "bash".into(),
                        "-l".into(),
                        "-c".into(),
                        shell_line(&to_wsl_path(script), &to_wsl_path(work_dir)).into(),
                    ],
                })
            }
            Platform::Unsupported { os } => Err(OcdError::SpawnError(format!(
                "unsupported operating system: {}",
                os
            ))),
        }
    }
}

/// Shell line executed by the login bash.
///
/// Environment is also exported here since WSL does not forward the
/// Windows-side process environment.
fn shell_line(script: &str, work_dir: &str) -> String {
    format!(
        "export MAVEN_OPTS={} && export OCD_VERBOSE=true && {{ proxy on 2>/dev/null || true; }} && cd {} && bash {}",
        quote(MAVEN_OPTS),
        quote(work_dir),
        quote(script),
    )
}

/// Single-quote a value for bash
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Convert a Windows path to its `/mnt/<drive>` form inside WSL
pub fn to_wsl_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let raw = raw.strip_prefix(r"\\?\").unwrap_or(&raw);
    let slashed = raw.replace('\\', "/");
    let bytes = slashed.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        format!("/mnt/{}{}", drive, &slashed[2..])
    } else {
        slashed
    }
}

fn which(program: &str) -> Option<std::path::PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        [program.to_string(), format!("{}.exe", program)]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
