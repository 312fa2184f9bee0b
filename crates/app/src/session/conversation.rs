use echohub_llm::Dialogue;

/// Ordered dialogue history for one session. Only the session loop
/// mutates it: the chat request runs on a snapshot and both entries of a
/// turn are committed together once the answer is in.
#[derive(Default)]
pub struct Conversation {
    dialogues: Vec<Dialogue>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the history plus the pending user entry, for the
    /// chat-completion request.
    pub fn with_user(&self, text: &str) -> Vec<Dialogue> {
        let mut dialogues = self.dialogues.clone();
        dialogues.push(Dialogue::user(text));
        dialogues
    }

    /// Commit one successful turn. A failed turn commits nothing.
    pub fn commit_turn(&mut self, user: String, assistant: String) {
        self.dialogues.push(Dialogue::user(user));
        self.dialogues.push(Dialogue::assistant(assistant));
    }

    pub fn history(&self) -> &[Dialogue] {
        &self.dialogues
    }

    pub fn len(&self) -> usize {
        self.dialogues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogues.is_empty()
    }
}
