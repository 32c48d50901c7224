//! The session connection manager.
//!
//! One spawned actor task owns the socket lifecycle and the state machine
//! `Idle → Connecting → Open ⇄ Reconnecting → Closed`. Caller commands,
//! transport events and the reconnect timer are multiplexed through a single
//! `tokio::select!` loop, so transitions are serialized and at most one
//! reconnect timer can ever be pending.

pub mod transport;

use crate::backoff::ReconnectPolicy;
use crate::config::SessionConfig;
use crate::error::{Error, Result, ServiceError};
use crate::journal::{Direction, HistoryJournal, HistoryRecord};
use crate::protocol::events::{Event, Modality, ResponseConfig};
use crate::protocol::items::ConversationItem;
use crate::protocol::router;
use serde_json::Value;
use std::path::PathBuf;
use self::transport::{Connector, Transport};
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 128;

const INIT_MARKER_TEXT: &str = "System initialized.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        write!(f, "{label}")
    }
}

type Respond = oneshot::Sender<Result<()>>;

enum Command {
    Send { event: Event, respond: Respond },
    Snapshot { respond: oneshot::Sender<Vec<HistoryRecord>> },
    LoadHistory { path: PathBuf, respond: Respond },
    End { respond: Respond },
}

/// Handle to a running session. Dropping every handle shuts the actor down
/// without persisting; call [`Session::end`] to close and save the journal.
pub struct Session {
    commands: mpsc::Sender<Command>,
    events: mpsc::Receiver<Event>,
    state: watch::Receiver<ConnectionState>,
    max_attempts: u32,
}

/// Clonable sending handle for use from other tasks.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl Session {
    /// Start a session over the default WebSocket transport.
    ///
    /// The actor dials in the background; use [`Self::wait_open`] to await
    /// the first open.
    ///
    /// # Errors
    /// Returns an error if the configured URL or credentials are invalid.
    pub fn start(config: SessionConfig) -> Result<Self> {
        let connector = crate::transport::ws::WsConnector::new(&config)?;
        Ok(Self::start_with(config, Box::new(connector)))
    }

    /// Start a session over a caller-supplied connector.
    #[must_use]
    pub fn start_with(config: SessionConfig, connector: Box<dyn Connector>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let max_attempts = config.max_attempts;

        let actor = SessionActor {
            policy: config.reconnect_policy(),
            config,
            connector,
            journal: HistoryJournal::new(),
            commands: command_rx,
            events: event_tx,
            state_tx,
            state: ConnectionState::Idle,
            attempt: 0,
        };
        tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            events: event_rx,
            state: state_rx,
            max_attempts,
        }
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            commands: self.commands.clone(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel observing every state transition, in order.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the session first reaches `Open`.
    ///
    /// # Errors
    /// Returns [`Error::ReconnectExhausted`] if the session closes before
    /// ever opening.
    pub async fn wait_open(&self) -> Result<()> {
        let mut states = self.state.clone();
        let reached = *states
            .wait_for(|state| {
                matches!(state, ConnectionState::Open | ConnectionState::Closed)
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        if reached == ConnectionState::Open {
            Ok(())
        } else {
            Err(Error::ReconnectExhausted(self.max_attempts))
        }
    }

    /// Send an event to the service.
    ///
    /// Legal only while `Open`; otherwise fails with [`Error::NotConnected`]
    /// and performs no side effect. On success the journal holds a `sent`
    /// record for the event by the time this returns, and the frame was
    /// followed by a bare `response.create` trigger.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] outside `Open`, or the transport or
    /// serialization failure otherwise.
    pub async fn send(&self, event: Event) -> Result<()> {
        send_command(&self.commands, event).await
    }

    /// Next inbound event, decoded and journaled. `None` once the session
    /// has closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Snapshot of the session journal.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session actor has shut down.
    pub async fn history(&self) -> Result<Vec<HistoryRecord>> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { respond: tx })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Replace the session journal with the contents of a previously
    /// persisted file.
    ///
    /// # Errors
    /// Returns [`Error::Persistence`] if the file is missing or malformed,
    /// or [`Error::ConnectionClosed`] if the actor has shut down.
    pub async fn restore_history(&self, path: impl Into<PathBuf>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::LoadHistory {
                path: path.into(),
                respond: tx,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Close the session: cancel any pending reconnect, close the transport,
    /// and persist the journal to the configured path.
    ///
    /// # Errors
    /// Returns [`Error::Persistence`] if the journal could not be written;
    /// the session is closed regardless.
    pub async fn end(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self
            .commands
            .send(Command::End { respond: tx })
            .await
            .is_err()
        {
            // Actor already gone; nothing left to close.
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }
}

impl SessionHandle {
    /// Send an event to the service. See [`Session::send`].
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] outside `Open`, or the transport or
    /// serialization failure otherwise.
    pub async fn send(&self, event: Event) -> Result<()> {
        send_command(&self.commands, event).await
    }
}

async fn send_command(commands: &mpsc::Sender<Command>, event: Event) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    commands
        .send(Command::Send { event, respond: tx })
        .await
        .map_err(|_| Error::NotConnected)?;
    rx.await.map_err(|_| Error::NotConnected)?
}

enum Phase {
    Connect,
    Backoff,
    Close { respond: Option<Respond> },
}

struct SessionActor {
    config: SessionConfig,
    policy: ReconnectPolicy,
    connector: Box<dyn Connector>,
    journal: HistoryJournal,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    state_tx: watch::Sender<ConnectionState>,
    state: ConnectionState,
    attempt: u32,
}

impl SessionActor {
    async fn run(mut self) {
        let mut phase = Phase::Connect;
        loop {
            phase = match phase {
                Phase::Connect => self.connect_phase().await,
                Phase::Backoff => self.backoff_phase().await,
                Phase::Close { respond } => {
                    self.shutdown(respond).await;
                    return;
                }
            };
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "connection state");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Dial the transport, servicing commands while the dial is in flight.
    async fn connect_phase(&mut self) -> Phase {
        self.set_state(ConnectionState::Connecting);

        enum Dialed {
            Opened(Box<dyn Transport>),
            Failed(Error),
            Shutdown(Option<Respond>),
        }

        let dialed = {
            let dial = self.connector.connect();
            tokio::pin!(dial);
            loop {
                let step = tokio::select! {
                    result = &mut dial => match result {
                        Ok(transport) => Dialed::Opened(transport),
                        Err(err) => Dialed::Failed(err),
                    },
                    cmd = self.commands.recv() => match cmd {
                        None => Dialed::Shutdown(None),
                        Some(cmd) => {
                            match answer_while_disconnected(&mut self.journal, cmd).await {
                                Some(respond) => Dialed::Shutdown(Some(respond)),
                                None => continue,
                            }
                        }
                    },
                };
                break step;
            }
        };

        match dialed {
            Dialed::Opened(transport) => self.open_phase(transport).await,
            Dialed::Failed(err) => {
                tracing::warn!(attempt = self.attempt, error = %err, "connect attempt failed");
                self.disconnect_decision()
            }
            Dialed::Shutdown(respond) => Phase::Close { respond },
        }
    }

    async fn open_phase(&mut self, mut transport: Box<dyn Transport>) -> Phase {
        self.attempt = 0;
        self.set_state(ConnectionState::Open);

        if let Err(err) = self.perform_handshake(&mut transport).await {
            tracing::warn!(error = %err, "handshake failed");
            let _ = transport.close().await;
            return self.disconnect_decision();
        }

        self.serve(transport).await
    }

    /// Connecting→Open side effects: announce the session and leave a marker
    /// in the journal.
    async fn perform_handshake(&mut self, transport: &mut Box<dyn Transport>) -> Result<()> {
        let handshake = Event::ResponseCreate {
            response: Some(ResponseConfig {
                modalities: Some(vec![Modality::Text]),
                instructions: Some(self.config.handshake_instructions.clone()),
            }),
        };
        let frame = router::encode(&handshake)?;
        self.journal
            .append(Direction::Sent, serde_json::to_value(&handshake)?);
        transport.send(frame).await?;

        // Journal-only marker; never transmitted.
        let marker = Event::item(ConversationItem::system_text(INIT_MARKER_TEXT));
        self.journal
            .append(Direction::Sent, serde_json::to_value(&marker)?);
        Ok(())
    }

    /// Serve an open connection until it closes or the caller ends.
    async fn serve(&mut self, mut transport: Box<dyn Transport>) -> Phase {
        enum Step {
            Cmd(Option<Command>),
            Frame(Result<Option<String>>),
        }

        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Cmd(cmd),
                frame = transport.next_frame() => Step::Frame(frame),
            };

            match step {
                Step::Cmd(None) => {
                    let _ = transport.close().await;
                    return Phase::Close { respond: None };
                }
                Step::Cmd(Some(Command::End { respond })) => {
                    let _ = transport.close().await;
                    return Phase::Close {
                        respond: Some(respond),
                    };
                }
                Step::Cmd(Some(Command::Send { event, respond })) => {
                    let result = self.transmit(&mut transport, event).await;
                    let transport_failed =
                        matches!(result, Err(Error::Transport(_) | Error::ConnectionClosed));
                    let _ = respond.send(result);
                    if transport_failed {
                        tracing::warn!("send failed at the transport layer");
                        let _ = transport.close().await;
                        return self.disconnect_decision();
                    }
                }
                Step::Cmd(Some(Command::Snapshot { respond })) => {
                    let _ = respond.send(self.journal.all());
                }
                Step::Cmd(Some(Command::LoadHistory { path, respond })) => {
                    let _ = respond.send(self.journal.restore(&path).await);
                }
                Step::Frame(Ok(Some(frame))) => self.deliver(&frame).await,
                Step::Frame(Ok(None)) => {
                    tracing::warn!("connection closed by peer");
                    return self.disconnect_decision();
                }
                Step::Frame(Err(err)) => {
                    tracing::warn!(error = %err, "transport receive error");
                    let _ = transport.close().await;
                    return self.disconnect_decision();
                }
            }
        }
    }

    /// Journal the outbound event, transmit it, then transmit the trigger.
    /// The service only starts generating once a `response.create` follows
    /// the event, so every send is chased by a bare trigger frame; the
    /// trigger is frame-level plumbing and is not journaled.
    async fn transmit(
        &mut self,
        transport: &mut Box<dyn Transport>,
        event: Event,
    ) -> Result<()> {
        let frame = router::encode(&event)?;
        self.journal
            .append(Direction::Sent, serde_json::to_value(&event)?);
        transport.send(frame).await?;

        let trigger = router::encode(&Event::response_trigger())?;
        transport.send(trigger).await?;
        Ok(())
    }

    /// Decode, journal and deliver one inbound frame. Undecodable frames are
    /// logged and dropped; the connection stays open.
    async fn deliver(&mut self, frame: &str) {
        match router::decode(frame) {
            Ok(event) => {
                tracing::debug!(kind = %event.kind(), "received event");
                log_service_error(&event);
                match serde_json::to_value(&event) {
                    Ok(raw) => {
                        self.journal.append(Direction::Received, raw);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to journal received event");
                    }
                }
                let _ = self.events.send(event).await;
            }
            Err(err) => tracing::warn!(error = %err, "dropping undecodable frame"),
        }
    }

    /// Open→Reconnecting or →Closed, per the backoff policy.
    fn disconnect_decision(&mut self) -> Phase {
        if self.policy.should_retry(self.attempt) {
            Phase::Backoff
        } else {
            tracing::error!(
                attempts = self.attempt,
                "max reconnect attempts exceeded, closing session"
            );
            Phase::Close { respond: None }
        }
    }

    /// Wait out the backoff delay, servicing commands. `end()` cancels the
    /// pending timer and closes directly.
    async fn backoff_phase(&mut self) -> Phase {
        self.set_state(ConnectionState::Reconnecting);
        let delay = self.policy.next_delay(self.attempt);
        tracing::info!(attempt = self.attempt, ?delay, "scheduling reconnect");

        enum Waited {
            Elapsed,
            Cmd(Option<Command>),
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            let waited = tokio::select! {
                () = &mut sleep => Waited::Elapsed,
                cmd = self.commands.recv() => Waited::Cmd(cmd),
            };
            match waited {
                Waited::Elapsed => {
                    self.attempt += 1;
                    return Phase::Connect;
                }
                Waited::Cmd(None) => return Phase::Close { respond: None },
                Waited::Cmd(Some(cmd)) => {
                    if let Some(respond) = answer_while_disconnected(&mut self.journal, cmd).await
                    {
                        return Phase::Close {
                            respond: Some(respond),
                        };
                    }
                }
            }
        }
    }

    async fn shutdown(&mut self, respond: Option<Respond>) {
        self.set_state(ConnectionState::Closed);
        if let Some(respond) = respond {
            // Explicit end() is the only transition that persists the journal.
            let result = self.journal.persist(&self.config.journal_path).await;
            if let Err(err) = &result {
                tracing::error!(error = %err, "failed to persist session history");
            }
            let _ = respond.send(result);
        }
    }
}

/// Answer a command received outside `Open`. Returns the responder if the
/// command was `End`, signalling the phase to close.
async fn answer_while_disconnected(
    journal: &mut HistoryJournal,
    cmd: Command,
) -> Option<Respond> {
    match cmd {
        Command::End { respond } => Some(respond),
        Command::Send { respond, .. } => {
            let _ = respond.send(Err(Error::NotConnected));
            None
        }
        Command::Snapshot { respond } => {
            let _ = respond.send(journal.all());
            None
        }
        Command::LoadHistory { path, respond } => {
            let _ = respond.send(journal.restore(&path).await);
            None
        }
    }
}

/// The original client logs the service's structured error payloads in full;
/// keep that visibility for `error` events that pass through untyped.
fn log_service_error(event: &Event) {
    let Event::Unknown(value) = event else {
        return;
    };
    if value.get("type").and_then(Value::as_str) != Some("error") {
        return;
    }
    match value
        .get("error")
        .cloned()
        .map(serde_json::from_value::<ServiceError>)
    {
        Some(Ok(err)) => tracing::warn!(
            code = ?err.code,
            param = ?err.param,
            event_id = ?err.event_id,
            "service error: {}",
            err.message
        ),
        _ => tracing::warn!("service error event with unrecognized payload"),
    }
}
