//! Ollama LLM integration module
//!
//! Provides the `CompletionClient` collaborator contract and an Ollama-backed
//! implementation used by the code generator.

pub mod client;

pub use client::{CompletionClient, CompletionError, GenerateResponse, OllamaClient};
