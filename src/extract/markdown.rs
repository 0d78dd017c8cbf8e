//! Markdown fenced code block scanner

use lazy_static::lazy_static;
use regex::Regex;

use super::{CodeBlock, CodeExtractor};
use crate::message::Message;

lazy_static! {
    /// A fence opener with a language tag, the body, and the closing fence.
    ///
    /// The body is lazy so adjacent blocks are not merged. Untagged fences do
    /// not match.
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+#.\-]+)[ \t]*\r?\n(.*?)```")
            .expect("fenced block pattern is valid");
}

/// Extracts fenced blocks from message content
///
/// A message that already carries bare code (see [`Message::code`]) is
/// returned as a single block of its recorded language.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCodeExtractor;

impl MarkdownCodeExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Scan a single piece of text
    pub fn extract_text(&self, text: &str) -> Vec<CodeBlock> {
        FENCED_BLOCK
            .captures_iter(text)
            .map(|caps| CodeBlock::new(&caps[1], trim_body(&caps[2])))
            .collect()
    }
}

impl CodeExtractor for MarkdownCodeExtractor {
    fn extract(&self, messages: &[Message]) -> Vec<CodeBlock> {
        let mut blocks = Vec::new();
        for message in messages {
            match message.code_language() {
                Some(language) => blocks.push(CodeBlock::new(language, message.content())),
                None => blocks.extend(self.extract_text(message.content())),
            }
        }
        blocks
    }
}

/// Find the first fenced block tagged exactly `language` and return its body
///
/// The tag must be followed by the end of the opener line, so asking for
/// `python` does not match a `pythonic` fence.
pub fn find_fenced_block(text: &str, language: &str) -> Option<String> {
    let pattern = format!(
        r"(?s)```[ \t]*{}[ \t]*\r?\n(.*?)```",
        regex::escape(language)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(text).map(|caps| trim_body(&caps[1]))
}

/// Drop the newline that precedes the closing fence
fn trim_body(body: &str) -> String {
    let body = body.strip_suffix('\n').unwrap_or(body);
    let body = body.strip_suffix('\r').unwrap_or(body);
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Action;
    use crate::message::Role;

    #[test]
    fn test_extracts_blocks_in_document_order() {
        let text = "intro\n```python\nx = 1\n```\nmiddle\n```bash\necho hi\n```\n";
        let blocks = MarkdownCodeExtractor::new().extract_text(text);
        assert_eq!(
            blocks,
            vec![CodeBlock::new("python", "x = 1"), CodeBlock::new("bash", "echo hi")]
        );
    }

    #[test]
    fn test_language_tag_kept_verbatim() {
        let blocks = MarkdownCodeExtractor::new().extract_text("```TypeScript\nlet a = 1;\n```");
        assert_eq!(blocks[0].language, "TypeScript");
    }

    #[test]
    fn test_untagged_fence_is_ignored() {
        let blocks = MarkdownCodeExtractor::new().extract_text("```\nplain text\n```");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_empty_tagged_block() {
        let blocks = MarkdownCodeExtractor::new().extract_text("reverse a string\n```python\n```");
        assert_eq!(blocks, vec![CodeBlock::new("python", "")]);
    }

    #[test]
    fn test_multiline_body_preserved() {
        let text = "```python\ndef f(s):\n    return s[::-1]\n\nprint(f('ab'))\n```";
        let blocks = MarkdownCodeExtractor::new().extract_text(text);
        assert_eq!(blocks[0].code, "def f(s):\n    return s[::-1]\n\nprint(f('ab'))");
    }

    #[test]
    fn test_no_messages_no_blocks() {
        assert!(MarkdownCodeExtractor::new().extract(&[]).is_empty());
    }

    #[test]
    fn test_code_message_is_one_block() {
        let messages = vec![
            Message::user("do it\n```python\n# stub\n```"),
            Message::code(
                "def f():\n    pass",
                "python",
                Role::Agent("coder".into()),
                Action::GenerateCode,
            ),
        ];
        let blocks = MarkdownCodeExtractor::new().extract(&messages);
        assert_eq!(
            blocks,
            vec![
                CodeBlock::new("python", "# stub"),
                CodeBlock::new("python", "def f():\n    pass"),
            ]
        );
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let messages = vec![
            Message::user("```js\nconsole.log(1)\n```"),
            Message::user("```python\nprint(2)\n```\n```bash\nls\n```"),
        ];
        let extractor = MarkdownCodeExtractor::new();
        assert_eq!(extractor.extract(&messages), extractor.extract(&messages));
    }

    #[test]
    fn test_find_fenced_block_exact_tag() {
        let reply = "```pythonic\nnope\n```\n```python\nyes\n```";
        assert_eq!(find_fenced_block(reply, "python"), Some("yes".to_string()));
        assert_eq!(find_fenced_block(reply, "rust"), None);
    }

    #[test]
    fn test_find_fenced_block_escapes_tag() {
        let reply = "```c++\nint main() {}\n```";
        assert_eq!(find_fenced_block(reply, "c++"), Some("int main() {}".to_string()));
    }
}
