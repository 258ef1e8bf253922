//! Run a shell command under the preloaded library.
//!
//! The command runs as `sh -c <command>` in its own process group so that a
//! timeout can kill the shell together with everything it started.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::env::EnvMap;
use crate::profile::SandboxProfile;

/// How long to keep collecting output after the process group was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(
        "Sandbox library not found at {}. Refusing to execute command without sandboxing.",
        .0.display()
    )]
    LibraryMissing(PathBuf),
    #[error("failed to start sh in {}: {source}", .dir.display())]
    Spawn {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for sandboxed command: {0}")]
    Wait(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `128 + signal` when killed by a signal, -1 on timeout.
    pub return_code: i32,
    pub timed_out: bool,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.return_code == 0 && !self.timed_out && self.error.is_none()
    }
}

pub async fn run_sandboxed(
    command: &str,
    profile: &SandboxProfile,
    env: &EnvMap,
) -> Result<RunOutcome, RunError> {
    // LD_PRELOAD silently skips a missing library, so check up front.
    if !profile.library_path.exists() {
        error!("Sandbox library not found at {:?}", profile.library_path);
        return Err(RunError::LibraryMissing(profile.library_path.clone()));
    }

    debug!("Running sandboxed command: {}", command);
    debug!("Working directory: {:?}", profile.working_dir);
    debug!("Blocked paths: {:?}", profile.blocked_paths);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env_clear()
        .envs(env)
        .current_dir(&profile.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            dir: profile.working_dir.clone(),
            source,
        })?;

    let pgid = child.id().map(|id| Pid::from_raw(id as i32));
    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));

    let status = match profile.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Some(status.map_err(RunError::Wait)?),
            Err(_) => None,
        },
        None => Some(child.wait().await.map_err(RunError::Wait)?),
    };

    let Some(status) = status else {
        warn!("Command timed out after {:?}, killing process group", profile.timeout);
        if let Some(pgid) = pgid {
            if let Err(err) = killpg(pgid, Signal::SIGKILL) {
                debug!("killpg failed ({}), killing child directly", err);
            }
        }
        let _ = child.kill().await;
        let limit = profile.timeout.unwrap_or_default();
        return Ok(RunOutcome {
            stdout: drain(stdout, DRAIN_GRACE).await,
            stderr: drain(stderr, DRAIN_GRACE).await,
            return_code: -1,
            timed_out: true,
            error: Some(format!("Command timed out after {} seconds", limit.as_secs())),
        });
    };

    Ok(RunOutcome {
        stdout: drain(stdout, DRAIN_GRACE).await,
        stderr: drain(stderr, DRAIN_GRACE).await,
        return_code: exit_code(status),
        timed_out: false,
        error: None,
    })
}

/// The `sh -c` script for the trailing command-line words. A single word is
/// taken as the script itself. Several words are quoted so that each one
/// reaches the program as one argument.
pub fn shell_command(words: &[String]) -> String {
    match words {
        [script] => script.clone(),
        _ => words
            .iter()
            .map(|word| shell_quote(word))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_-./=:,+@%".contains(&b));
    if plain {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(err) = reader.read_to_end(&mut buf).await {
            debug!("output stream closed with error: {}", err);
        }
    }
    buf
}

/// Collected output of a reader task, empty if it does not finish in time
/// (a descendant that left the process group may still hold the pipe).
async fn drain(task: tokio::task::JoinHandle<Vec<u8>>, grace: Duration) -> String {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(err)) => {
            debug!("output reader failed: {}", err);
            String::new()
        }
        Err(_) => String::new(),
    }
}
