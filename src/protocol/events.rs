use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::items::ConversationItem;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Audio,
}

/// Configuration block carried by a `response.create` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<Modality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A single message exchanged with the remote service.
///
/// Manual (de)serialization preserves unrecognized kinds as raw JSON while
/// keeping strong typing for the kinds this client produces itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConversationItemCreate {
        item: ConversationItem,
    },
    ResponseCreate {
        response: Option<ResponseConfig>,
    },
    Unknown(Value),
}

impl Event {
    /// Bare `response.create` trigger with no configuration.
    #[must_use]
    pub const fn response_trigger() -> Self {
        Self::ResponseCreate { response: None }
    }

    #[must_use]
    pub fn item(item: ConversationItem) -> Self {
        Self::ConversationItemCreate { item }
    }

    /// The wire discriminant, or whatever the raw payload claims it is.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::Unknown(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum EventRepr {
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl From<EventRepr> for Event {
    fn from(repr: EventRepr) -> Self {
        match repr {
            EventRepr::ConversationItemCreate { item } => Self::ConversationItemCreate { item },
            EventRepr::ResponseCreate { response } => Self::ResponseCreate { response },
        }
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown(value) => value.serialize(serializer),
            Self::ConversationItemCreate { item } => {
                let mut state = serializer.serialize_struct("Event", 2)?;
                state.serialize_field("type", "conversation.item.create")?;
                state.serialize_field("item", item)?;
                state.end()
            }
            Self::ResponseCreate { response } => {
                let fields = 1 + usize::from(response.is_some());
                let mut state = serializer.serialize_struct("Event", fields)?;
                state.serialize_field("type", "response.create")?;
                if let Some(config) = response {
                    state.serialize_field("response", config)?;
                }
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match EventRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::debug!("passing event through untyped: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}
