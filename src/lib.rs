//! Codevisor - instruction-driven code generation and sandboxed execution
//!
//! This library turns a natural-language instruction into code through an LLM,
//! extracts the fenced code blocks, and runs them inside an isolated,
//! ephemeral container that lives exactly as long as the session.
//!
//! # Modules
//!
//! - `agent` - Session state machine (generate → execute) with cleanup guarantees
//! - `environment` - Execution environment trait and the Docker implementation
//! - `executor` - Language runtime selection and run requests
//! - `extract` - Fenced code block extraction from messages
//! - `generator` - Prompt construction and reply parsing
//! - `ollama` - Completion collaborator backed by Ollama
//! - `message` - Messages and the append-only session memory
//! - `metrics` - Prometheus metrics for observability
//! - `config` - Environment-variable configuration for the binary
//!
//! # Quick Start
//!
//! ```ignore
//! use codevisor::{Config, Message};
//!
//! let config = Config::from_env()?;
//! let mut agent = codevisor::build_agent(&config)?;
//! let reply = agent.run(Message::user("```python\nprint(sum(range(10)))\n```")).await?;
//! println!("{}", reply.content());
//! ```

pub mod agent;
pub mod config;
pub mod environment;
pub mod executor;
pub mod extract;
pub mod generator;
pub mod message;
pub mod metrics;
pub mod ollama;
pub mod tracing;

use std::sync::Arc;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentError, SessionAgent, SessionConfig, SessionState};
pub use config::{Config, ConfigError};
pub use environment::{DockerEnvironment, ExecutionEnvironment, ExecutionResult, ExecutionStatus};
pub use message::{Memory, Message, Role};
pub use ollama::{CompletionClient, OllamaClient};

/// Build a session agent wired to Docker and Ollama
pub fn build_agent(config: &Config) -> Result<SessionAgent, AgentError> {
    let environment = DockerEnvironment::new(config.docker.clone());
    let completion = OllamaClient::new(config.ollama_url.clone(), config.model.clone());

    SessionAgent::new(
        config.session.clone(),
        Box::new(environment),
        Arc::new(completion),
    )
}
