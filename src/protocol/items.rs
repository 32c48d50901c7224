use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

/// One piece of a conversation item's content.
///
/// Audio parts carry base64-encoded PCM16 bytes (see [`crate::audio`]) and an
/// optional transcription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText {
        text: String,
    },
    InputAudio {
        audio: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::InputText { text: text.into() }
    }

    #[must_use]
    pub fn audio(audio: impl Into<String>, transcript: Option<String>) -> Self {
        Self::InputAudio {
            audio: audio.into(),
            transcript,
        }
    }
}

/// A message unit inside an event. Serialized with a `"type": "message"` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        role: Role,
        content: Vec<ContentPart>,
    },
}

impl ConversationItem {
    #[must_use]
    pub fn message(role: Role, content: Vec<ContentPart>) -> Self {
        Self::Message { role, content }
    }

    /// Single-text-part user message.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Single-text-part system message.
    #[must_use]
    pub fn system_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }
}
