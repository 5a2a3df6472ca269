//! Remote supervision of the responder process.
//!
//! The responder runs inside a tmux session on a remote host. Restarting it
//! means typing Ctrl-C and the start command into that session over ssh.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use otvet_core::ProcessSettings;
use tokio::process::Command;
use tracing::{debug, info};

/// `ssh` exits with 255 when the connection itself fails.
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to run ssh: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("remote command timed out after {0}s")]
    Timeout(u64),

    #[error("ssh connection failed: {0}")]
    Connection(String),

    #[error("remote command exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Session check and restart for a long-running process.
#[async_trait::async_trait]
pub trait ProcessController: Send + Sync {
    /// Whether session `id` exists.
    async fn check_alive(&self, id: &str) -> Result<bool, ProcessError>;

    /// Interrupt whatever runs in session `id` and start `command` in `dir`.
    async fn restart(&self, id: &str, command: &str, dir: &str) -> Result<(), ProcessError>;
}

/// [`ProcessController`] driving tmux through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshTmuxController {
    host: String,
    port: u16,
    username: Option<String>,
    identity_file: Option<PathBuf>,
    timeout: Duration,
}

impl SshTmuxController {
    /// `None` when `[process] host` is unset.
    pub fn from_settings(settings: &ProcessSettings) -> Option<Self> {
        let host = settings.host.as_ref()?.trim();
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port: settings.port,
            username: settings.username.clone(),
            identity_file: settings.identity_file.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    pub(crate) fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.destination());
        args.push(remote_command.to_string());
        args
    }

    async fn run(&self, remote_command: &str) -> Result<std::process::Output, ProcessError> {
        debug!(host = %self.host, command = remote_command, "running remote command");
        let child = Command::new("ssh")
            .args(self.ssh_args(remote_command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ProcessError::Timeout(self.timeout.as_secs()))??;

        if output.status.code() == Some(SSH_CONNECTION_FAILURE) {
            return Err(ProcessError::Connection(stderr_text(&output)));
        }
        Ok(output)
    }
}

#[async_trait::async_trait]
impl ProcessController for SshTmuxController {
    async fn check_alive(&self, id: &str) -> Result<bool, ProcessError> {
        let output = self
            .run(&format!("tmux has-session -t {}", shell_quote(id)))
            .await?;
        Ok(output.status.success())
    }

    async fn restart(&self, id: &str, command: &str, dir: &str) -> Result<(), ProcessError> {
        let output = self.run(&restart_script(id, command, dir)).await?;
        if !output.status.success() {
            return Err(ProcessError::Failed {
                code: output.status.code(),
                stderr: stderr_text(&output),
            });
        }
        info!(host = %self.host, session = id, "restarted remote session");
        Ok(())
    }
}

fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Quote `value` as one POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Remote shell script that restarts `command` inside tmux session `id`.
///
/// The text typed into the session is passed verbatim, so `~` in `dir`
/// is still expanded by the session's shell.
pub(crate) fn restart_script(id: &str, command: &str, dir: &str) -> String {
    let target = shell_quote(id);
    let keys = |text: &str| format!("tmux send-keys -t {target} {} C-m", shell_quote(text));
    [
        format!("tmux send-keys -t {target} C-c"),
        "sleep 2".to_string(),
        keys("clear"),
        keys(&format!("cd {dir}")),
        keys(command),
    ]
    .join(" && ")
}
