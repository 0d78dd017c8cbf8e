//! Code executor
//!
//! Submits extracted code blocks to an execution environment and returns a
//! structured result. Environment failures and timeouts come back as
//! error-status results; only configuration problems are errors here.

pub mod runtime;

pub use runtime::{Runtime, RuntimeRegistry};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::environment::{ExecutionEnvironment, ExecutionResult, RunRequest};
use crate::extract::CodeBlock;
use crate::metrics::{CODE_EXECUTIONS, CODE_EXECUTION_DURATION};

/// Error type for executor operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// No runtime is registered for the language
    UnsupportedLanguage(String),
    /// Called with no code blocks
    EmptyInput,
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::UnsupportedLanguage(lang) => write!(f, "Unsupported language: {}", lang),
            ExecutorError::EmptyInput => write!(f, "No code blocks to execute"),
        }
    }
}

impl std::error::Error for ExecutorError {}

/// Runs code blocks against an environment
#[derive(Debug, Clone)]
pub struct CodeExecutor {
    registry: RuntimeRegistry,
    timeout: Duration,
}

impl CodeExecutor {
    /// # Arguments
    /// * `registry` - Runtimes available in the environment
    /// * `timeout` - Fixed bound on every run in this session
    pub fn new(registry: RuntimeRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn supports(&self, language: &str) -> bool {
        self.registry.supports(language)
    }

    /// Build the run request for `blocks` in `language`
    ///
    /// Blocks whose language maps to the same runtime are joined in order, so
    /// later blocks see definitions from earlier ones. Other blocks are skipped.
    pub fn prepare(&self, blocks: &[CodeBlock], language: &str) -> Result<RunRequest, ExecutorError> {
        if blocks.is_empty() {
            return Err(ExecutorError::EmptyInput);
        }
        let runtime = self
            .registry
            .resolve(language)
            .ok_or_else(|| ExecutorError::UnsupportedLanguage(language.to_string()))?;

        let mut sources = Vec::with_capacity(blocks.len());
        for block in blocks {
            match self.registry.resolve(&block.language) {
                Some(r) if r.name == runtime.name => sources.push(block.code.as_str()),
                _ => {
                    warn!(
                        block_language = %block.language,
                        target = %runtime.name,
                        "Skipping code block in a different language"
                    );
                }
            }
        }

        Ok(RunRequest {
            language: runtime.name.clone(),
            command: runtime.command.clone(),
            source: sources.join("\n\n"),
            timeout: self.timeout,
            env: HashMap::new(),
        })
    }

    /// Execute `blocks` as one `language` program
    pub async fn execute(
        &self,
        env: &mut dyn ExecutionEnvironment,
        blocks: &[CodeBlock],
        language: &str,
    ) -> Result<ExecutionResult, ExecutorError> {
        let request = self.prepare(blocks, language)?;

        info!(
            environment = %env.id(),
            language = %request.language,
            blocks = blocks.len(),
            code_len = request.source.len(),
            "Executing code"
        );

        let start = Instant::now();
        let result = match env.run(&request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(environment = %env.id(), error = %e, "Remote execution failed");
                ExecutionResult::error(e.to_string(), None, start.elapsed().as_secs_f64() * 1000.0)
            }
        };

        CODE_EXECUTIONS
            .with_label_values(&[&request.language, result.status.as_str()])
            .inc();
        CODE_EXECUTION_DURATION
            .with_label_values(&[&request.language])
            .observe(result.duration_ms / 1000.0);

        debug!(
            status = %result.status,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "Execution finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> CodeExecutor {
        CodeExecutor::new(RuntimeRegistry::default(), Duration::from_secs(5))
    }

    #[test]
    fn test_prepare_joins_same_runtime_blocks() {
        let blocks = vec![
            CodeBlock::new("python", "def f():\n    return 1"),
            CodeBlock::new("bash", "ls"),
            CodeBlock::new("py", "assert f() == 1"),
        ];
        let request = executor().prepare(&blocks, "python").unwrap();
        assert_eq!(request.language, "python");
        assert_eq!(request.source, "def f():\n    return 1\n\nassert f() == 1");
        assert_eq!(request.command, vec!["python3", "-c"]);
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_prepare_rejects_unsupported_language() {
        let blocks = vec![CodeBlock::new("cobol", "DISPLAY 'HI'.")];
        assert_eq!(
            executor().prepare(&blocks, "cobol").unwrap_err(),
            ExecutorError::UnsupportedLanguage("cobol".into())
        );
    }

    #[test]
    fn test_prepare_rejects_empty_input() {
        assert_eq!(
            executor().prepare(&[], "python").unwrap_err(),
            ExecutorError::EmptyInput
        );
    }
}
