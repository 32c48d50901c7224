pub mod events;
pub mod items;
pub mod router;

pub use events::{Event, Modality, ResponseConfig};
pub use items::{ContentPart, ConversationItem, Role};
