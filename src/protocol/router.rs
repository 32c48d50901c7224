//! Translation between domain events and wire frames.
//!
//! One complete JSON frame per event, no partial frames. Only structural
//! validity is enforced here; unrecognized event kinds pass through opaquely
//! as [`Event::Unknown`].

use super::events::Event;
use crate::error::{Error, Result};

/// Encode an outbound event into a UTF-8 JSON frame.
///
/// # Errors
/// Returns [`Error::Serialization`] if the event cannot be serialized.
pub fn encode(event: &Event) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an inbound frame into an event.
///
/// # Errors
/// Returns [`Error::MalformedFrame`] if the frame is not valid JSON. The
/// caller decides whether to drop the frame; decode failures never tear down
/// the session.
pub fn decode(frame: &str) -> Result<Event> {
    serde_json::from_str(frame).map_err(Error::MalformedFrame)
}
