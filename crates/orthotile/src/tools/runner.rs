use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use super::error::{stderr_excerpt, ToolError};

/// One command line to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Executable name without its directory, used in errors and logs.
    pub fn display_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Arguments as lossy strings.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Value of a `--name=value` style argument, if present.
    pub fn flag_value(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.args
            .iter()
            .filter_map(|a| a.to_str())
            .find_map(|a| a.strip_prefix(prefix.as_str()).map(String::from))
    }

    /// Whether the program or any argument equals `needle`.
    pub fn mentions(&self, needle: impl AsRef<OsStr>) -> bool {
        let needle = needle.as_ref();
        self.program.as_os_str() == needle || self.args.iter().any(|a| a.as_os_str() == needle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs an external tool to completion or until `timeout` elapses.
///
/// Implementations must not retry. A non-zero exit is reported as
/// [`ToolError::Failed`], an elapsed timeout as [`ToolError::Timeout`].
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        let tool = invocation.display_name();
        let started = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child is killed if the wait below is abandoned on timeout.
            .kill_on_drop(true);
        // Own group, so helpers forked by the tool (python workers) can be
        // killed with it.
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;
        let pgid = child.id();

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Wait {
                tool: tool.clone(),
                source,
            })?,
            Err(_) => {
                // The group outlives its leader while any member is alive.
                kill_process_group(pgid, &tool);
                tracing::warn!(tool = %tool, timeout_secs = timeout.as_secs(), "Tool timed out, killed");
                return Err(ToolError::Timeout {
                    tool,
                    seconds: timeout.as_secs(),
                });
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if output.status.success() {
            tracing::debug!(tool = %tool, elapsed_ms, "Tool finished");
            return Ok(ToolOutput {
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        // Killed by a signal has no exit code.
        let code = output.status.code().unwrap_or(-1);
        tracing::debug!(tool = %tool, elapsed_ms, code, "Tool failed");
        Err(ToolError::Failed {
            stderr: stderr_excerpt(&output.stderr, &output.stdout, code),
            tool,
            code,
        })
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>, tool: &str) {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: plain syscall on a group this runner created.
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result != 0 {
        let errno = std::io::Error::last_os_error();
        // ESRCH: every member already exited.
        if errno.raw_os_error() == Some(libc::ESRCH) {
            return;
        }
        tracing::warn!(tool = %tool, pgid, %errno, "Failed to kill tool process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>, _tool: &str) {}
