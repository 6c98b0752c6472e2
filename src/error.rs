// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! Error types shared by every component.

use std::io;

use thiserror::Error;

/// Custom error types for menu and tool operations
#[derive(Error, Debug)]
pub enum KvmError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{program} exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown release: {0}")]
    UnknownRelease(String),
}

pub type KvmResult<T> = Result<T, KvmError>;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_message_includes_stderr() {
        let err = KvmError::ToolFailed {
            program: "qemu-img".to_string(),
            code: Some(1),
            stderr: "Could not open 'x'\n".to_string(),
        };
        assert_eq!(err.to_string(), "qemu-img exited with status 1: Could not open 'x'");
    }

    #[test]
    fn tool_failure_without_code() {
        let err = KvmError::ToolFailed {
            program: "qemu-system-x86_64".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "qemu-system-x86_64 exited with no status (terminated by signal)"
        );
    }
}
