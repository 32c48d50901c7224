#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Resilient client for a persistent, JSON-event conversational protocol.
//!
//! The [`session`] module owns the connection lifecycle (connect, reconnect
//! with bounded backoff, journal, close); [`protocol`] defines the events on
//! the wire, [`audio`] the PCM16 payload conversions.

pub mod audio;
pub mod backoff;
pub mod config;
pub mod error;
pub mod journal;
pub mod protocol;
pub mod session;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use config::SessionConfig;
pub use error::{Error, Result, ServiceError};
pub use journal::{Direction, HistoryJournal, HistoryRecord};
pub use protocol::{ContentPart, ConversationItem, Event, Modality, ResponseConfig, Role};
pub use session::transport::{Connector, Transport};
pub use session::{ConnectionState, Session, SessionHandle};
pub use transport::rest::OneShotAdapter;
pub use transport::ws::WsConnector;
