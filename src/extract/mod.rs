//! Code block extraction
//!
//! Turns session messages into an ordered list of language-tagged code blocks.
//! Extraction is a pure function of its input: no side effects, and the only
//! "failure" is an empty result, which callers must handle themselves.

pub mod markdown;

pub use markdown::{find_fenced_block, MarkdownCodeExtractor};

use crate::message::Message;

/// A language-tagged snippet of source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }
}

/// Scans messages for code blocks
pub trait CodeExtractor: Send + Sync {
    /// Return every code block in `messages`, in document order
    fn extract(&self, messages: &[Message]) -> Vec<CodeBlock>;
}
