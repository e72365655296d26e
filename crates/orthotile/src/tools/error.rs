use thiserror::Error;

/// Diagnostic output is cut to this many characters before it reaches a
/// job message.
pub const STDERR_EXCERPT_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    Failed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::Spawn { tool, .. }
            | ToolError::Wait { tool, .. }
            | ToolError::Failed { tool, .. }
            | ToolError::Timeout { tool, .. } => tool,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// Trimmed diagnostic text of a failed run, bounded to
/// [`STDERR_EXCERPT_CHARS`]. Falls back to stdout when stderr is empty,
/// since some of the python tools report errors there.
pub fn stderr_excerpt(stderr: &[u8], stdout: &[u8], code: i32) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);

    let text = match (stderr.trim(), stdout.trim()) {
        ("", "") => return format!("Command failed with exit code {}", code),
        ("", out) => out,
        (err, _) => err,
    };

    text.chars().take(STDERR_EXCERPT_CHARS).collect()
}
