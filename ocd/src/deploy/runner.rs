//! Process runner for one deployment

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use ocd_api_models::models::OutputEvent;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deploy::platform::{Platform, PROCESS_ENV};
use crate::deploy::scripts::ScriptBundle;
use crate::deploy::session::Outcome;
use crate::deploy::target::DeploymentTarget;
use crate::errors::OcdError;
use crate::progress::{classify, clean_line};

pub const SUCCESS_MESSAGE: &str = "Deployment completed successfully";
pub const FAILURE_MESSAGE: &str = "Deployment failed. Check logs for more details";
pub const ABORTED_MESSAGE: &str = "Deployment aborted by user";

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Upper bound on the whole deployment
    pub timeout: Duration,

    /// How long readers may keep draining output once the process is gone
    pub drain_grace: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1800),
            drain_grace: Duration::from_secs(5),
        }
    }
}

/// Runs the deployment script and turns its output into session events
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    platform: Platform,
    scripts: ScriptBundle,
    options: RunnerOptions,
}

enum Exit {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(platform: Platform, scripts: ScriptBundle, options: RunnerOptions) -> Self {
        Self {
            platform,
            scripts,
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run one deployment to completion.
    ///
    /// Every path ends with exactly one `complete` event on `events`, sent
    /// after all output events of the process.
    pub async fn run(
        &self,
        target: &DeploymentTarget,
        cancel: CancellationToken,
        events: UnboundedSender<OutputEvent>,
    ) -> Outcome {
        let outcome = match self.execute(target, &cancel, &events).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Deployment for {} could not start: {}", target, e);
                let _ = events.send(OutputEvent::complete(false, e.to_string()));
                return Outcome::Failure;
            }
        };

        let message = match outcome {
            Outcome::Success => SUCCESS_MESSAGE.to_string(),
            Outcome::Failure => FAILURE_MESSAGE.to_string(),
            Outcome::Timeout => timeout_message(self.options.timeout),
            Outcome::Aborted => ABORTED_MESSAGE.to_string(),
        };
        let _ = events.send(OutputEvent::complete(outcome.is_success(), message));
        outcome
    }

    async fn execute(
        &self,
        target: &DeploymentTarget,
        cancel: &CancellationToken,
        events: &UnboundedSender<OutputEvent>,
    ) -> Result<Outcome, OcdError> {
        // dropped at the end of this function on every path
        let scripts = self.scripts.materialize(target).await?;
        let invocation = self.platform.invocation(scripts.script(), target.path())?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(target.path())
            .envs(PROCESS_ENV.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| OcdError::SpawnError(e.to_string()))?;
        info!(
            "Started deployment for {} (pid {:?}, timeout {}s)",
            target,
            child.id(),
            self.options.timeout.as_secs()
        );

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, events.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, events.clone(), "stderr"));
        }

        let exit = tokio::select! {
            status = child.wait() => Exit::Exited(status),
            _ = tokio::time::sleep(self.options.timeout) => Exit::TimedOut,
            _ = cancel.cancelled() => Exit::Cancelled,
        };

        let outcome = match exit {
            Exit::Exited(Ok(status)) if status.success() => Outcome::Success,
            Exit::Exited(Ok(status)) => {
                warn!("Deployment for {} exited with {}", target, status);
                Outcome::Failure
            }
            Exit::Exited(Err(e)) => {
                error!("Failed waiting on deployment for {}: {}", target, e);
                kill_process_tree(&mut child).await;
                Outcome::Failure
            }
            Exit::TimedOut => {
                warn!(
                    "Deployment for {} timed out after {}s",
                    target,
                    self.options.timeout.as_secs()
                );
                kill_process_tree(&mut child).await;
                Outcome::Timeout
            }
            Exit::Cancelled => {
                info!("Deployment for {} aborted by user", target);
                kill_process_tree(&mut child).await;
                Outcome::Aborted
            }
        };

        drain_readers(readers, self.options.drain_grace).await;
        Ok(outcome)
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("Deployment timed out after {} seconds", timeout.as_secs())
}

fn spawn_reader<R>(
    stream: R,
    events: UnboundedSender<OutputEvent>,
    name: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let raw = String::from_utf8_lossy(&buf);
                    let Some(line) = clean_line(&raw) else {
                        continue;
                    };
                    // keep reading after the consumer is gone so the pipe never fills
                    let progress = classify(&line);
                    let _ = events.send(OutputEvent::output(line));
                    if let Some(progress) = progress {
                        let _ = events.send(OutputEvent::Progress(progress));
                    }
                }
                Err(e) => {
                    debug!("Reading {} stopped: {}", name, e);
                    break;
                }
            }
        }
    })
}

/// Wait for readers to hit end of stream, aborting any that outlive `grace`
async fn drain_readers(readers: Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            warn!("Output reader did not finish within {:?}; discarding the rest", grace);
            reader.abort();
            // no reader may still be sending once the terminal event goes out
            let _ = reader.await;
        }
    }
}

/// Kill the process and everything it started
async fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Failed to kill deployment process: {}", e);
    }
}
