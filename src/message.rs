//! Session messages and the append-only memory log
//!
//! Every inbound instruction and every action output becomes a `Message`.
//! Messages are stored in a `Memory`, an arena-style log indexed by sequence
//! number. Entries are never reordered or modified once appended.

use std::fmt;

use crate::agent::Action;

/// Who authored a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The human (or host) that submitted the instruction
    User,
    /// The agent, identified by its profile string
    Agent(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent(profile) => write!(f, "{}", profile),
        }
    }
}

/// A single immutable entry in the session memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    content: String,
    role: Role,
    cause_by: Option<Action>,
    code_language: Option<String>,
}

impl Message {
    /// An inbound instruction from the user
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
            cause_by: None,
            code_language: None,
        }
    }

    /// A message produced by one of the agent's actions
    pub fn from_action(content: impl Into<String>, role: Role, cause_by: Action) -> Self {
        Self {
            content: content.into(),
            role,
            cause_by: Some(cause_by),
            code_language: None,
        }
    }

    /// A message whose entire content is bare source code in `language`
    ///
    /// GenerateCode stores generated code without fence markers, so the
    /// language travels alongside the content instead of inside it.
    pub fn code(
        content: impl Into<String>,
        language: impl Into<String>,
        role: Role,
        cause_by: Action,
    ) -> Self {
        Self {
            content: content.into(),
            role,
            cause_by: Some(cause_by),
            code_language: Some(language.into()),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The action that produced this message, `None` for inbound messages
    pub fn cause_by(&self) -> Option<Action> {
        self.cause_by
    }

    /// Language of the bare code this message carries, if any
    pub fn code_language(&self) -> Option<&str> {
        self.code_language.as_deref()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause_by {
            Some(action) => write!(f, "[{} via {}] {}", self.role, action, self.content),
            None => write!(f, "[{}] {}", self.role, self.content),
        }
    }
}

/// Append-only ordered log of messages
#[derive(Debug, Clone, Default)]
pub struct Memory {
    entries: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its sequence number
    pub fn append(&mut self, message: Message) -> usize {
        self.entries.push(message);
        self.entries.len() - 1
    }

    /// The most recently appended message
    pub fn latest(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Every message in append order
    pub fn all(&self) -> &[Message] {
        &self.entries
    }

    /// Look up a message by sequence number
    pub fn get(&self, seq: usize) -> Option<&Message> {
        self.entries.get(seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_sequence_numbers() {
        let mut memory = Memory::new();
        assert_eq!(memory.append(Message::user("first")), 0);
        assert_eq!(memory.append(Message::user("second")), 1);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.get(0).map(Message::content), Some("first"));
    }

    #[test]
    fn test_latest_and_all() {
        let mut memory = Memory::new();
        assert!(memory.latest().is_none());

        memory.append(Message::user("instruction"));
        memory.append(Message::code(
            "print(1)",
            "python",
            Role::Agent("coder".into()),
            Action::GenerateCode,
        ));

        let latest = memory.latest().unwrap();
        assert_eq!(latest.content(), "print(1)");
        assert_eq!(latest.code_language(), Some("python"));
        assert_eq!(latest.cause_by(), Some(Action::GenerateCode));

        let contents: Vec<&str> = memory.all().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["instruction", "print(1)"]);
    }

    #[test]
    fn test_message_display() {
        let msg = Message::from_action("ok", Role::Agent("coder".into()), Action::ExecuteCode);
        assert_eq!(msg.to_string(), "[coder via ExecuteCode] ok");
        assert_eq!(Message::user("hi").to_string(), "[user] hi");
    }
}
