//! Chat messages and the append-only log

// ----------------------------------------------------------------------------
// Messages
// ----------------------------------------------------------------------------

/// Which side of the link produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Local,
    Remote,
}

/// One chat message, immutable once created.
///
/// Two messages with the same text and origin compare equal; there is no
/// further identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub origin: MessageOrigin,
    pub text: String,
}

impl Message {
    /// Message typed on this device
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            origin: MessageOrigin::Local,
            text: text.into(),
        }
    }

    /// Message delivered by the connected peer
    pub fn remote(text: impl Into<String>) -> Self {
        Self {
            origin: MessageOrigin::Remote,
            text: text.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Chat Log
// ----------------------------------------------------------------------------

/// Arrival-ordered, append-only sequence of messages.
///
/// Owned by the consumer of a session. Entries are never deduplicated;
/// the same text sent twice appears twice.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<Message>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message in arrival order
    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
