use hagent_model::{Message, Role};

/// Ordered, append-only list of turns for one request.
///
/// Turns cannot be edited or removed once pushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation with a system prompt and the user's question.
    pub fn with_prompt(system: impl Into<String>, question: impl Into<String>) -> Self {
        Self { turns: vec![Message::system(system), Message::user(question)] }
    }

    pub fn push(&mut self, turn: Message) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// Most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.turns.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn into_turns(self) -> Vec<Message> {
        self.turns
    }
}
