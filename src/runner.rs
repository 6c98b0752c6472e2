// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Process Runner
//!
//! Synchronous execution of external tools. Two modes:
//! - interactive: stdio is inherited so the user sees (and drives) the tool
//! - captured: stdout is collected for display inside the menu, stderr still
//!   reaches the terminal
//!
//! Non-zero exits are returned to the caller as data. Whether a failure is
//! fatal is the caller's decision.

use std::process::{Command, ExitStatus, Stdio};

use log::{debug, warn};

use crate::{command::ToolCommand, KvmError, KvmResult};

/// Exit code of a finished tool, `None` if it was killed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(Some(0));

    pub fn success(&self) -> bool {
        self.0 == Some(0)
    }

    /// Convert a failed exit into a [`KvmError::ToolFailed`]
    pub fn check(self, cmd: &ToolCommand) -> KvmResult<()> {
        if self.success() {
            Ok(())
        } else {
            Err(KvmError::ToolFailed {
                program: cmd.program_name(),
                code: self.0,
                stderr: String::new(),
            })
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode(status.code())
    }
}

/// Result of a captured-mode invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: ExitCode::SUCCESS,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Return stdout, or a [`KvmError::ToolFailed`] if the tool failed
    pub fn check(self, cmd: &ToolCommand) -> KvmResult<String> {
        if self.code.success() {
            Ok(self.stdout)
        } else {
            Err(KvmError::ToolFailed {
                program: cmd.program_name(),
                code: self.code.0,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes tool invocations on behalf of the menu
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner {
    /// Run with inherited terminal I/O and wait for exit
    fn run_interactive(&mut self, cmd: &ToolCommand) -> KvmResult<ExitCode>;

    /// Run with stdout captured and wait for exit
    fn run_captured(&mut self, cmd: &ToolCommand) -> KvmResult<ToolOutput>;
}

/// [`ProcessRunner`] backed by real child processes
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(cmd: &ToolCommand) -> Command {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args).current_dir(&cmd.cwd);
        command
    }
}

impl ProcessRunner for SystemRunner {
    fn run_interactive(&mut self, cmd: &ToolCommand) -> KvmResult<ExitCode> {
        debug!("Running {} (cwd {})", cmd, cmd.cwd.display());

        let status = Self::command(cmd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(KvmError::from)?;

        let code = ExitCode::from(status);
        if !code.success() {
            warn!("{} exited with {:?}", cmd.program_name(), code.0);
        }
        Ok(code)
    }

    fn run_captured(&mut self, cmd: &ToolCommand) -> KvmResult<ToolOutput> {
        debug!("Capturing {} (cwd {})", cmd, cmd.cwd.display());

        let output = Self::command(cmd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(KvmError::from)?;

        let stderr = latin1(&output.stderr);
        if !stderr.is_empty() {
            eprint!("{}", stderr);
        }

        Ok(ToolOutput {
            code: output.status.into(),
            stdout: latin1(&output.stdout),
            stderr,
        })
    }
}

/// Decode bytes as ISO-8859-1, which never fails
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
