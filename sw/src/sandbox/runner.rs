//! CommandRunner - executes validated commands under `sh -c`

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CommandNotAllowed, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, check_command, normalize_path, sandbox_env};
use crate::config::SandboxConfig;

/// Runs shell commands confined to a working root
#[derive(Debug, Clone)]
pub struct CommandRunner {
    root: PathBuf,
    allow_network: bool,
    default_timeout: u64,
    max_timeout: u64,
    extra_bin: Option<PathBuf>,
}

impl CommandRunner {
    /// Create a runner with the default timeouts and network disabled
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(?root, "CommandRunner::new: called");
        Self {
            root,
            allow_network: false,
            default_timeout: DEFAULT_TIMEOUT_SECS,
            max_timeout: MAX_TIMEOUT_SECS,
            extra_bin: None,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &SandboxConfig) -> Self {
        let mut runner = Self::new(root);
        runner.allow_network = config.allow_network;
        runner.max_timeout = config.max_timeout_secs.min(MAX_TIMEOUT_SECS);
        runner.default_timeout = config.default_timeout_secs.min(runner.max_timeout);
        runner
    }

    pub fn with_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }

    /// Prepend a virtualenv `bin` directory to `PATH` for every command
    pub fn with_venv_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.extra_bin = Some(bin.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a command without running it
    pub fn check(&self, command: &str, cwd: &Path) -> Result<(), CommandNotAllowed> {
        debug!(%command, ?cwd, "CommandRunner::check: called");
        if !self.contains(cwd) {
            return Err(CommandNotAllowed::new(
                command,
                format!("working directory '{}' is outside the working root", cwd.display()),
            ));
        }
        check_command(command, &self.root, cwd)
    }

    /// Requested timeout clamped to the configured maximum
    pub fn effective_timeout(&self, requested: Option<u64>) -> u64 {
        requested.unwrap_or(self.default_timeout).clamp(1, self.max_timeout)
    }

    /// Run a command and describe the outcome as text
    ///
    /// Only a policy violation is an `Err`; exit codes, timeouts and spawn
    /// failures all come back as result text.
    pub async fn run(&self, command: &str, cwd: &Path, timeout_secs: Option<u64>) -> Result<String, CommandNotAllowed> {
        debug!(%command, ?cwd, ?timeout_secs, "CommandRunner::run: called");
        if let Err(blocked) = self.check(command, cwd) {
            warn!(%command, reason = %blocked.reason, root = %self.root.display(), "Blocked command");
            return Err(blocked);
        }

        let timeout = self.effective_timeout(timeout_secs);
        let env = sandbox_env(&self.root, self.allow_network, self.extra_bin.as_deref());

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(%command, error = %e, "Failed to spawn command");
                return Ok(format!("$ {}\n(ERROR: {:?}: {})", command, e.kind(), e));
            }
        };
        let pid = child.id();
        info!(%command, ?pid, timeout, "Running command");

        match tokio::time::timeout(Duration::from_secs(timeout), child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                debug!(code, stdout_len = output.stdout.len(), stderr_len = output.stderr.len(), "CommandRunner::run: completed");
                Ok(format!(
                    "$ {}\n(exit={})\n{}{}",
                    command,
                    code,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ))
            }
            Ok(Err(e)) => {
                warn!(%command, error = %e, "Command wait failed");
                Ok(format!("$ {}\n(ERROR: {:?}: {})", command, e.kind(), e))
            }
            Err(_) => {
                warn!(%command, timeout, "Command timed out, killing process group");
                if let Some(pid) = pid
                    && let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
                {
                    debug!(error = %e, "CommandRunner::run: killpg failed");
                }
                Ok(format!("$ {}\n(TIMEOUT after {}s)", command, timeout))
            }
        }
    }

    /// Like [`run`](Self::run) but folds a policy violation into `BLOCKED` text
    pub async fn run_text(&self, command: &str, cwd: &Path, timeout_secs: Option<u64>) -> String {
        match self.run(command, cwd, timeout_secs).await {
            Ok(text) => text,
            Err(blocked) => blocked.to_result_text(),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if path.starts_with(&self.root) {
            return true;
        }
        match (self.root.canonicalize(), path.canonicalize()) {
            (Ok(root), Ok(path)) => path.starts_with(root),
            (Ok(root), Err(_)) => path.starts_with(root),
            _ => false,
        }
    }
}
