//! WebSocket implementation of the session transport.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::transport::{BoxFuture, Connector, Transport};
use futures::{SinkExt, StreamExt};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

const PROTOCOL_HEADER: &str = "OpenAI-Beta";
const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the realtime endpoint with the configured URL and credential
/// headers. The session redials through the same connector on reconnect.
pub struct WsConnector {
    url: Url,
    auth: HeaderValue,
    protocol_version: HeaderValue,
}

impl WsConnector {
    /// # Errors
    /// Returns an error if the URL or either header value is invalid.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let url = Url::parse(&config.url)?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))?;
        let protocol_version = HeaderValue::from_str(&config.protocol_version)?;
        Ok(Self {
            url,
            auth,
            protocol_version,
        })
    }
}

impl Connector for WsConnector {
    fn connect(&mut self) -> BoxFuture<'_, Result<Box<dyn Transport>>> {
        Box::pin(async move {
            let mut request = IntoClientRequest::into_client_request(self.url.as_str())?;
            let headers = request.headers_mut();
            headers.insert(AUTHORIZATION, self.auth.clone());
            headers.insert(PROTOCOL_HEADER, self.protocol_version.clone());

            let (stream, _) = connect_async(request).await?;
            tracing::info!(url = %self.url, "connected to realtime endpoint");
            Ok(Box::new(WsTransport { stream }) as Box<dyn Transport>)
        })
    }
}

struct WsTransport {
    stream: WsStream,
}

impl Transport for WsTransport {
    fn send(&mut self, frame: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tracing::trace!(
                "sending frame: {}",
                safe_truncate(&frame, TRACE_LOG_MAX_BYTES)
            );
            self.stream.send(Message::Text(frame.into())).await?;
            Ok(())
        })
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move {
            while let Some(message) = self.stream.next().await {
                match message? {
                    Message::Text(text) => {
                        tracing::trace!(
                            "received frame: {}",
                            safe_truncate(&text, TRACE_LOG_MAX_BYTES)
                        );
                        return Ok(Some(text.to_string()));
                    }
                    Message::Close(_) => {
                        tracing::info!("connection closed by server");
                        return Ok(None);
                    }
                    Message::Ping(payload) => {
                        tracing::debug!("received Ping, sending Pong");
                        self.stream.send(Message::Pong(payload)).await?;
                    }
                    _ => (),
                }
            }
            Ok(None)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stream.close(None).await?;
            Ok(())
        })
    }
}

fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}
