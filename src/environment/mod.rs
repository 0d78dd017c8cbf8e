//! Execution environment module
//!
//! An execution environment is one isolated, addressable runtime that can run
//! submitted programs and report their output. This module provides:
//! - The `ExecutionEnvironment` trait the session agent drives
//! - Request/result types shared by every implementation
//! - A Docker-backed implementation talking to the Engine API over its Unix socket

pub mod config;
pub mod docker;

pub use config::DockerConfig;
pub use docker::{demux_stream, DockerClient, DockerEnvironment};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Outcome of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The program ran to completion with exit code 0
    Success,
    /// The program failed, or the environment could not run it
    Error,
    /// The program did not finish within the configured timeout
    Timeout,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of one execute action
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Combined textual output (stdout followed by stderr)
    pub output: String,
    pub status: ExecutionStatus,
    /// Exit code reported by the runtime, when it got that far
    pub exit_code: Option<i64>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            output: output.into(),
            status: ExecutionStatus::Success,
            exit_code: Some(0),
            duration_ms,
        }
    }

    /// A failed run; the output is prefixed so it reads as an error in memory
    pub fn error(message: impl Into<String>, exit_code: Option<i64>, duration_ms: f64) -> Self {
        Self {
            output: format!("Error: {}", message.into()),
            status: ExecutionStatus::Error,
            exit_code,
            duration_ms,
        }
    }

    /// A run that exceeded its bound; partial output is kept
    pub fn timed_out(partial_output: &str, timeout: Duration) -> Self {
        let mut output = format!("Timeout: execution exceeded {}s", timeout.as_secs_f64());
        if !partial_output.is_empty() {
            output.push('\n');
            output.push_str(partial_output);
        }
        Self {
            output,
            status: ExecutionStatus::Timeout,
            exit_code: None,
            duration_ms: timeout.as_secs_f64() * 1000.0,
        }
    }
}

/// A program submitted to an environment
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Language tag the program was selected for
    pub language: String,
    /// Command line that runs the program; the source is appended as the last argument
    pub command: Vec<String>,
    /// Program source
    pub source: String,
    /// Upper bound on the run
    pub timeout: Duration,
    /// Extra environment variables for this run
    pub env: HashMap<String, String>,
}

impl RunRequest {
    /// Full argument vector: the runtime command followed by the source
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.push(self.source.clone());
        argv
    }
}

/// Error type for environment operations
#[derive(Debug)]
pub enum EnvironmentError {
    /// Could not reach the environment backend
    Connection(String),
    /// The backend rejected a request
    Api { status: u16, message: String },
    /// Provisioning failed (e.g. image missing, resource unavailable)
    Provisioning(String),
    /// An operation that needs a running environment was issued before start
    NotRunning,
    /// Malformed payload from the backend
    Protocol(String),
}

impl std::fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::Connection(msg) => write!(f, "Connection error: {}", msg),
            EnvironmentError::Api { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            EnvironmentError::Provisioning(msg) => write!(f, "Provisioning failed: {}", msg),
            EnvironmentError::NotRunning => write!(f, "Environment is not running"),
            EnvironmentError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for EnvironmentError {}

impl From<serde_json::Error> for EnvironmentError {
    fn from(e: serde_json::Error) -> Self {
        EnvironmentError::Protocol(e.to_string())
    }
}

/// An isolated runtime owned by exactly one session
///
/// Every method takes `&mut self`: only the owner may issue calls, and calls on
/// one handle never overlap.
#[async_trait]
pub trait ExecutionEnvironment: Send {
    /// Identity of the runtime instance, for logs
    fn id(&self) -> &str;

    /// Provision and start the runtime
    async fn start(&mut self) -> Result<(), EnvironmentError>;

    /// Tear the runtime down
    ///
    /// Must be safe to call after a partial or failed `start`.
    async fn stop(&mut self) -> Result<(), EnvironmentError>;

    /// Whether the runtime is currently up
    async fn is_running(&mut self) -> bool;

    /// Run a program, bounded by `request.timeout`
    ///
    /// A timeout is reported as an `ExecutionStatus::Timeout` result, not an error.
    async fn run(&mut self, request: &RunRequest) -> Result<ExecutionResult, EnvironmentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_out_result_keeps_partial_output() {
        let result = ExecutionResult::timed_out("partial", Duration::from_secs(2));
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.output.starts_with("Timeout: execution exceeded 2s"));
        assert!(result.output.ends_with("partial"));
        assert_eq!(result.exit_code, None);
    }

    #[test]
    fn test_error_result_prefix() {
        let result = ExecutionResult::error("boom", Some(1), 3.0);
        assert_eq!(result.output, "Error: boom");
        assert!(!result.status.is_success());
    }

    #[test]
    fn test_run_request_argv() {
        let request = RunRequest {
            language: "python".into(),
            command: vec!["python3".into(), "-c".into()],
            source: "print(1)".into(),
            timeout: Duration::from_secs(1),
            env: HashMap::new(),
        };
        assert_eq!(request.argv(), vec!["python3", "-c", "print(1)"]);
    }
}
