//! Centralized command execution with consistent error handling.
//!
//! Every host tool the builder drives goes through [`Cmd`], so failures always
//! carry the program name, exit code and captured stderr. Components that need
//! to substitute command execution in tests (the kernel resolver, the package
//! exporters) take a [`CommandRunner`] instead of calling [`Cmd`] directly.

use anyhow::{bail, Context, Result};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Build a result from an exit code and captured output.
    pub fn new(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            envs: Vec::new(),
            allow_fail: false,
            error_prefix: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        debug!(program = %self.program, args = ?self.args, "running command");

        let output = self.command().output().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            let prefix = self
                .error_prefix
                .unwrap_or_else(|| format!("'{}' failed", self.program));

            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code(), stderr);
            }
        }

        Ok(result)
    }

    /// Run the command with inherited stdio (interactive/streaming).
    ///
    /// Output goes directly to the terminal. Use for long-running commands
    /// where the user should see progress (e.g., mksquashfs).
    pub fn run_interactive(self) -> Result<ExitStatus> {
        debug!(program = %self.program, args = ?self.args, "running command (interactive)");

        let mut cmd = self.command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd.status().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        if !self.allow_fail && !status.success() {
            let prefix = self
                .error_prefix
                .unwrap_or_else(|| format!("'{}' failed", self.program));
            bail!("{} (exit code {})", prefix, status.code().unwrap_or(-1));
        }

        Ok(status)
    }
}

// =============================================================================
// Injectable execution
// =============================================================================

/// Generic command-execution facility.
///
/// `command[0]` is the program. With `raise_on_error == false` the runner
/// never fails: a non-zero exit, or a program that cannot be spawned at all,
/// comes back as a [`CommandResult`] with whatever output was captured.
pub trait CommandRunner {
    fn run(&self, command: &[String], raise_on_error: bool) -> Result<CommandResult>;
}

/// [`CommandRunner`] backed by real processes on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn run(&self, command: &[String], raise_on_error: bool) -> Result<CommandResult> {
        let Some((program, args)) = command.split_first() else {
            bail!("Cannot run an empty command");
        };

        let cmd = Cmd::new(program).args(args);
        if raise_on_error {
            return cmd.run();
        }

        match cmd.allow_fail().run() {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!(program = %program, "command could not be spawned: {:#}", e);
                Ok(CommandResult::new(127, "", format!("{:#}", e)))
            }
        }
    }
}

/// Build an owned command line from string-like parts.
pub fn command_line<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts.into_iter().map(|p| p.as_ref().to_string()).collect()
}

// =============================================================================
// Convenience functions
// =============================================================================

/// Run a command with arguments. Fails with stderr on error.
pub fn run<I, S>(program: &str, args: I) -> Result<CommandResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Cmd::new(program).args(args).run()
}

/// Run a shell command via `sh -c`.
///
/// # Example
/// ```ignore
/// let result = shell("find . -print0 | cpio --null -o -H newc | gzip > out")?;
/// ```
pub fn shell(command: &str) -> Result<CommandResult> {
    run("sh", ["-c", command])
}

/// Quote a string for safe interpolation into a `sh -c` script.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Check if a program exists in PATH.
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<String> {
    which::which(program)
        .ok()
        .map(|path| path.to_string_lossy().into_owned())
}

/// Check if a program exists in PATH (bool version).
pub fn exists(program: &str) -> bool {
    which(program).is_some()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let result = run("echo", ["hello"]).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = run("ls", ["/nonexistent_path_12345"]).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false")
            .error_msg("Custom build step failed")
            .run()
            .unwrap_err();

        assert!(err.to_string().contains("Custom build step failed"));
    }

    #[test]
    fn test_allow_fail() {
        let result = Cmd::new("false").allow_fail().run().unwrap();

        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn test_env_is_passed_to_child() {
        let result = Cmd::new("sh")
            .args(["-c", "echo $PXE_TEST_VALUE"])
            .env("PXE_TEST_VALUE", "forty-two")
            .run()
            .unwrap();

        assert_eq!(result.stdout_trimmed(), "forty-two");
    }

    #[test]
    fn test_host_runner_raises_on_failure() {
        let err = HostRunner
            .run(&command_line(["false"]), true)
            .unwrap_err();
        assert!(err.to_string().contains("'false' failed"));
    }

    #[test]
    fn test_host_runner_suppressed_failure() {
        let result = HostRunner.run(&command_line(["false"]), false).unwrap();
        assert!(!result.success());
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_host_runner_missing_program_is_empty_output() {
        let result = HostRunner
            .run(&command_line(["nonexistent_program_12345", "arg"]), false)
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.stdout_trimmed(), "");
    }

    #[test]
    fn test_host_runner_rejects_empty_command() {
        assert!(HostRunner.run(&[], false).is_err());
    }

    #[test]
    fn test_result_new_code() {
        assert_eq!(CommandResult::new(0, "", "").code(), 0);
        assert_eq!(CommandResult::new(3, "", "").code(), 3);
        assert!(CommandResult::new(0, "out", "").success());
    }

    #[test]
    fn test_shell_quote_round_trips_through_sh() {
        let value = "it's a \"path\" with $HOME";
        let result = shell(&format!("printf %s {}", shell_quote(value))).unwrap();
        assert_eq!(result.stdout, value);
    }

    #[test]
    fn test_exists() {
        assert!(exists("sh"));
        assert!(!exists("nonexistent_program_12345"));
    }
}
