use serde::Deserialize;
use serde::Serialize;

/// A unit of delivery between participants and the session.
///
/// Immutable once built. `receiver` names a single client, or
/// [`quiz_core::BROADCAST`] for everyone but the sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    sender: String,
    receiver: String,
    #[serde(default)]
    is_system: bool,
    #[serde(default)]
    is_private: bool,
}

impl Message {
    /// A public chat-level message.
    pub fn new(text: impl Into<String>, sender: &str, receiver: &str) -> Self {
        Self {
            text: text.into(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            is_system: false,
            is_private: false,
        }
    }
    /// A game-protocol message, never shown as chat.
    pub fn system(text: impl Into<String>, sender: &str, receiver: &str) -> Self {
        Self {
            is_system: true,
            ..Self::new(text, sender, receiver)
        }
    }
    /// A system message only the receiver may see.
    pub fn private(text: impl Into<String>, sender: &str, receiver: &str) -> Self {
        Self {
            is_private: true,
            ..Self::system(text, sender, receiver)
        }
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn sender(&self) -> &str {
        &self.sender
    }
    pub fn receiver(&self) -> &str {
        &self.receiver
    }
    pub fn is_system(&self) -> bool {
        self.is_system
    }
    pub fn is_private(&self) -> bool {
        self.is_private
    }
    pub fn is_broadcast(&self) -> bool {
        self.receiver == quiz_core::BROADCAST
    }
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize message")
    }
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.receiver, self.text)
    }
}
