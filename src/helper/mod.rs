//! Helper script launching.
//!
//! Helpers are interpreter scripts living under the install root
//! (`<root>/shadow-bridge/*.py`, `<root>/gemini.ps1`). They are either
//! launched detached (fire and forget) or run to completion with captured
//! output. Machine-readable results are embedded in stdout between the
//! `<<<JSON_START>>>` and `<<<JSON_END>>>` markers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::Value;
use thiserror::Error;

pub const JSON_START: &str = "<<<JSON_START>>>";
pub const JSON_END: &str = "<<<JSON_END>>>";

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Could not find {what} at {}", path.display())]
    ScriptMissing { what: String, path: PathBuf },

    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("helper printed an invalid JSON payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Fail with the script path if it does not exist.
pub fn require_script(path: &Path, what: &str) -> Result<(), HelperError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(HelperError::ScriptMissing {
            what: what.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// A program invocation: interpreter prefix + script + arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl HelperCommand {
    /// `launcher` is an argv prefix such as `["py", "-3"]` or `["pwsh", "-File"]`.
    pub fn new(launcher: &[String]) -> Self {
        let (program, rest) = launcher
            .split_first()
            .map(|(p, r)| (p.clone(), r.to_vec()))
            .unwrap_or_default();
        HelperCommand {
            program,
            args: rest,
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn std_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> HelperError {
        HelperError::Spawn {
            command: self.to_string(),
            source,
        }
    }
}

impl fmt::Display for HelperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Output of a run-to-completion helper.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run to completion, capturing stdout and stderr.
pub async fn run_captured(cmd: &HelperCommand) -> Result<CapturedOutput, HelperError> {
    tracing::debug!(command = %cmd, "running helper (captured)");
    let output = tokio::process::Command::from(cmd.std_command())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| cmd.spawn_error(e))?;

    let captured = CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    };
    tracing::debug!(code = ?captured.code, "helper finished");
    tracing::trace!(stdout = %captured.stdout, stderr = %captured.stderr);
    Ok(captured)
}

/// Run to completion with the terminal attached; returns the exit code.
pub async fn run_inherited(cmd: &HelperCommand) -> Result<Option<i32>, HelperError> {
    tracing::debug!(command = %cmd, "running helper (inherited stdio)");
    let status = tokio::process::Command::from(cmd.std_command())
        .status()
        .await
        .map_err(|e| cmd.spawn_error(e))?;
    Ok(status.code())
}

/// Launch and forget. On Windows the child gets its own console; elsewhere
/// it is moved into its own process group with stdio detached.
pub fn spawn_detached(cmd: &HelperCommand) -> Result<u32, HelperError> {
    tracing::debug!(command = %cmd, "spawning detached helper");
    let mut command = cmd.std_command();

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
        command.creation_flags(CREATE_NEW_CONSOLE);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0);
    }

    let child = command.spawn().map_err(|e| cmd.spawn_error(e))?;
    Ok(child.id())
}

/// Extract the JSON payload between the sentinel markers.
///
/// Returns `Ok(None)` when no start marker is present. A missing end marker
/// means the payload runs to the end of the output.
pub fn extract_json_payload(stdout: &str) -> Result<Option<Value>, HelperError> {
    let Some((_, after_start)) = stdout.split_once(JSON_START) else {
        return Ok(None);
    };
    let payload = after_start
        .split_once(JSON_END)
        .map(|(inner, _)| inner)
        .unwrap_or(after_start);
    Ok(Some(serde_json::from_str(payload.trim())?))
}
