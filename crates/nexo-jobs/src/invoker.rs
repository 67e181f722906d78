//! External tool invocation.
//!
//! Every scientific algorithm is an opaque executable: this module builds
//! the argument vector, pins the working directory to a job-private scratch
//! location, waits within the owning background task, and maps the exit
//! status. Exit ≠ 0 is always failure; stderr is never interpreted for
//! partial success. Invocations are bounded by a timeout that kills the
//! process and surfaces a timeout-specific error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use nexo_core::{defaults, Error, Result};

/// Locations of the external executables, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub trustrank_bin: String,
    pub closeness_bin: String,
    pub diamond_bin: String,
    pub java_bin: String,
    pub must_jar: String,
    pub bicon_python: String,
    pub bicon_script: String,
    /// Pre-built protein–drug network consumed by the ranking tools.
    pub ranking_network: PathBuf,
}

impl ToolPaths {
    /// Resolve tool locations from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `NEXO_TRUSTRANK_BIN` | `trustrank` |
    /// | `NEXO_CLOSENESS_BIN` | `closeness` |
    /// | `NEXO_DIAMOND_BIN` | `diamond` |
    /// | `NEXO_JAVA_BIN` | `java` |
    /// | `NEXO_MUST_JAR` | `must.jar` |
    /// | `NEXO_BICON_PYTHON` | `python3` |
    /// | `NEXO_BICON_SCRIPT` | `bicon.py` |
    /// | `NEXO_RANKING_NETWORK` | `static/ranking-network.gt` |
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self {
            trustrank_bin: var("NEXO_TRUSTRANK_BIN", "trustrank"),
            closeness_bin: var("NEXO_CLOSENESS_BIN", "closeness"),
            diamond_bin: var("NEXO_DIAMOND_BIN", "diamond"),
            java_bin: var("NEXO_JAVA_BIN", "java"),
            must_jar: var("NEXO_MUST_JAR", "must.jar"),
            bicon_python: var("NEXO_BICON_PYTHON", "python3"),
            bicon_script: var("NEXO_BICON_SCRIPT", "bicon.py"),
            ranking_network: PathBuf::from(var("NEXO_RANKING_NETWORK", "static/ranking-network.gt")),
        }
    }
}

/// Captured output of a finished tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One external tool invocation.
pub struct ToolCommand {
    label: String,
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(defaults::TOOL_TIMEOUT_SECS),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Append a flag only when `condition` holds.
    pub fn flag_if(self, condition: bool, flag: &str) -> Self {
        if condition {
            self.arg(flag)
        } else {
            self
        }
    }

    /// Pin the working directory to a job-private scratch location so
    /// concurrent jobs never collide on filenames.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the tool to completion.
    ///
    /// Blocks only the owning background task. On timeout the child is
    /// killed (`kill_on_drop`) and a timeout-specific error is returned.
    pub async fn run(self) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        info!(
            subsystem = "jobs",
            component = "invoker",
            tool = %self.label,
            program = %self.program,
            "Running external tool"
        );
        debug!(tool = %self.label, args = ?self.args, "Tool argument vector");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(Error::ToolTimeout {
                    tool: self.label,
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(Error::Tool(format!(
                    "Failed to launch {}: {e}",
                    self.label
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(Error::ToolExit {
                tool: self.label,
                code: output.status.code().unwrap_or(-1),
            });
        }

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_run_captures_stdout() {
        let output = ToolCommand::new("echo", "sh")
            .arg("-c")
            .arg("echo hello")
            .run()
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_code() {
        let err = ToolCommand::new("failing-tool", "sh")
            .arg("-c")
            .arg("exit 3")
            .run()
            .await
            .unwrap_err();
        match err {
            Error::ToolExit { tool, code } => {
                assert_eq!(tool, "failing-tool");
                assert_eq!(code, 3);
            }
            other => panic!("expected ToolExit, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_is_captured_but_not_interpreted() {
        // A zero exit with noisy stderr is still success.
        let output = ToolCommand::new("noisy", "sh")
            .arg("-c")
            .arg("echo warning >&2")
            .run()
            .await
            .unwrap();
        assert_eq!(output.stderr.trim(), "warning");
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reports() {
        let err = ToolCommand::new("sleeper", "sleep")
            .arg("30")
            .timeout(Duration::from_millis(100))
            .run()
            .await
            .unwrap_err();
        match err {
            Error::ToolTimeout { tool, .. } => assert_eq!(tool, "sleeper"),
            other => panic!("expected ToolTimeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let err = ToolCommand::new("ghost", "/nonexistent/tool-binary")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn test_current_dir_pins_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let output = ToolCommand::new("pwd", "sh")
            .arg("-c")
            .arg("pwd")
            .current_dir(tmp.path())
            .run()
            .await
            .unwrap();
        // Canonicalize both sides: the scratch dir may sit behind a symlink.
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[test]
    fn test_tool_paths_from_env_defaults() {
        // Only assert defaults for variables unlikely to be set in CI.
        let paths = ToolPaths::from_env();
        assert!(!paths.trustrank_bin.is_empty());
        assert!(!paths.java_bin.is_empty());
    }
}
