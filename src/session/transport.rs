use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A persistent, full-duplex, message-oriented connection carrying UTF-8
/// JSON frames.
pub trait Transport: Send {
    fn send(&mut self, frame: String) -> BoxFuture<'_, Result<()>>;

    /// Wait for the next inbound frame. `Ok(None)` means the peer closed.
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>>>;

    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Opens transports. The session dials once at startup and again on every
/// reconnect attempt.
pub trait Connector: Send + 'static {
    fn connect(&mut self) -> BoxFuture<'_, Result<Box<dyn Transport>>>;
}
