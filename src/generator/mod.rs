//! Code generator
//!
//! Builds a fixed prompt from an instruction and target language, asks the
//! completion collaborator once, and pulls the single code block out of the
//! reply.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::extract::find_fenced_block;
use crate::ollama::{CompletionClient, CompletionError};

/// What to do when the reply has no fenced block in the requested language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Return the whole raw reply
    #[default]
    Lenient,
    /// Fail with `GeneratorError::Parse`
    Strict,
}

/// Error type for generation
#[derive(Debug)]
pub enum GeneratorError {
    Completion(CompletionError),
    /// Strict parsing found no matching block; carries the raw reply
    Parse { language: String, reply: String },
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Completion(e) => write!(f, "Completion failed: {}", e),
            GeneratorError::Parse { language, .. } => {
                write!(f, "No ```{} block found in model reply", language)
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

impl From<CompletionError> for GeneratorError {
    fn from(e: CompletionError) -> Self {
        GeneratorError::Completion(e)
    }
}

/// Prompt sent to the completion collaborator
pub fn build_prompt(instruction: &str, language: &str) -> String {
    format!(
        "Write a {language} function that can {instruction}. \
         Return a single fenced {language} block and nothing else."
    )
}

/// Generates source code for an instruction
#[derive(Clone)]
pub struct CodeGenerator {
    client: Arc<dyn CompletionClient>,
    policy: ParsePolicy,
}

impl CodeGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, policy: ParsePolicy) -> Self {
        Self { client, policy }
    }

    /// Generate `language` source for `instruction`
    pub async fn generate(&self, instruction: &str, language: &str) -> Result<String, GeneratorError> {
        let prompt = build_prompt(instruction, language);
        debug!(language, prompt_len = prompt.len(), "Requesting code");

        let reply = self.client.complete(&prompt).await?;
        self.parse(reply, language)
    }

    /// Pull the `language` block out of `reply` according to the parse policy
    pub fn parse(&self, reply: String, language: &str) -> Result<String, GeneratorError> {
        if let Some(code) = find_fenced_block(&reply, language) {
            return Ok(code);
        }
        match self.policy {
            ParsePolicy::Lenient => {
                warn!(language, reply_len = reply.len(), "No code block in reply, returning raw reply");
                Ok(reply)
            }
            ParsePolicy::Strict => Err(GeneratorError::Parse {
                language: language.to_string(),
                reply,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_prompt_template() {
        assert_eq!(
            build_prompt("reverse a string", "python"),
            "Write a python function that can reverse a string. \
             Return a single fenced python block and nothing else."
        );
    }

    #[tokio::test]
    async fn test_generate_strips_fences() {
        let generator = CodeGenerator::new(
            Arc::new(Canned("Sure:\n```python\ndef rev(s):\n    return s[::-1]\n```\n")),
            ParsePolicy::Lenient,
        );
        let code = generator.generate("reverse a string", "python").await.unwrap();
        assert_eq!(code, "def rev(s):\n    return s[::-1]");
    }

    #[tokio::test]
    async fn test_lenient_returns_raw_reply() {
        let reply = "def rev(s): return s[::-1]";
        let generator = CodeGenerator::new(Arc::new(Canned(reply)), ParsePolicy::Lenient);
        assert_eq!(generator.generate("reverse", "python").await.unwrap(), reply);
    }

    #[tokio::test]
    async fn test_strict_rejects_wrong_language() {
        let generator = CodeGenerator::new(
            Arc::new(Canned("```javascript\nconsole.log(1)\n```")),
            ParsePolicy::Strict,
        );
        let err = generator.generate("log", "python").await.unwrap_err();
        assert!(matches!(err, GeneratorError::Parse { ref language, .. } if language == "python"));
    }
}
