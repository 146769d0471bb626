//! Websocket transport and gateway run loop.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::error::{GatewayError, GatewayResult};
use super::heartbeat::{Heartbeat, HeartbeatEvent};
use super::protocol::{ClientMessage, ServerEvent, decode_event, encode_message};
use super::state::{ConnectionSignal, ConnectionState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A transport capable of exchanging gateway frames.
#[async_trait]
pub trait GatewayConnection: Send + Sync {
    /// Opens the connection.
    async fn connect(&mut self, url: &str) -> GatewayResult<()>;
    /// Closes the connection.
    async fn disconnect(&mut self) -> GatewayResult<()>;
    /// Sends a client message.
    async fn send(&mut self, message: &ClientMessage) -> GatewayResult<()>;
    /// Receives the next event. `None` means a frame was skipped.
    async fn receive(&mut self) -> GatewayResult<Option<ServerEvent>>;
    /// Whether the transport believes it is connected.
    fn is_connected(&self) -> bool;
}

/// Production transport backed by `tokio-tungstenite`.
pub struct WebSocketConnection {
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    connected: bool,
}

impl WebSocketConnection {
    /// Creates a disconnected transport.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: None,
            reader: None,
            connected: false,
        }
    }
}

impl Default for WebSocketConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayConnection for WebSocketConnection {
    async fn connect(&mut self, url: &str) -> GatewayResult<()> {
        let (ws_stream, _) = timeout(CONNECTION_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| GatewayError::timeout("connect"))?
            .map_err(|e| GatewayError::connection_failed(e.to_string()))?;

        let (writer, reader) = ws_stream.split();
        self.writer = Some(writer);
        self.reader = Some(reader);
        self.connected = true;

        debug!(%url, "websocket established");
        Ok(())
    }

    async fn disconnect(&mut self) -> GatewayResult<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        self.connected = false;
        debug!("websocket closed");
        Ok(())
    }

    async fn send(&mut self, message: &ClientMessage) -> GatewayResult<()> {
        let writer = self.writer.as_mut().ok_or(GatewayError::NotConnected)?;

        let json =
            encode_message(message).map_err(|e| GatewayError::serialization(e.to_string()))?;

        writer
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| GatewayError::websocket(e.to_string()))?;

        Ok(())
    }

    async fn receive(&mut self) -> GatewayResult<Option<ServerEvent>> {
        let reader = self.reader.as_mut().ok_or(GatewayError::NotConnected)?;

        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    // Undecodable frames are dropped inside decode_event.
                    if let Some(event) = decode_event(&text) {
                        return Ok(Some(event));
                    }
                }
                Some(Ok(WsMessage::Binary(_))) => {
                    trace!("ignoring binary frame");
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    self.connected = false;
                    let (code, reason) = frame.map_or((None, String::new()), |f| {
                        (Some(f.code.into()), f.reason.to_string())
                    });
                    return Err(GatewayError::ConnectionClosed { code, reason });
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Some(writer) = self.writer.as_mut() {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                }
                Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    self.connected = false;
                    return Err(GatewayError::websocket(e.to_string()));
                }
                None => {
                    self.connected = false;
                    return Err(GatewayError::ConnectionClosed {
                        code: None,
                        reason: "stream ended".to_owned(),
                    });
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Owns a transport and drives connect, authenticate, and the event loop.
///
/// Decoded events flow out through `event_tx`; outbound messages from the
/// facade arrive through `outbound_rx`. Keepalive frames never leave the
/// handler in either direction.
pub struct GatewayHandler {
    connection: Box<dyn GatewayConnection>,
    token: String,
    heartbeat: Heartbeat,
    signal: ConnectionSignal,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    outbound_rx: mpsc::Receiver<ClientMessage>,
}

impl GatewayHandler {
    /// Creates a handler over the given transport.
    pub fn new(
        connection: Box<dyn GatewayConnection>,
        token: String,
        signal: ConnectionSignal,
        event_tx: mpsc::UnboundedSender<ServerEvent>,
        outbound_rx: mpsc::Receiver<ClientMessage>,
    ) -> Self {
        Self {
            connection,
            token,
            heartbeat: Heartbeat::new(),
            signal,
            event_tx,
            outbound_rx,
        }
    }

    /// Connects, authenticates, and pumps events until the connection ends.
    ///
    /// On return the state signal has already been set to `Disconnected`.
    pub async fn run(&mut self, url: &str) -> GatewayResult<()> {
        self.signal.set(ConnectionState::Connecting);

        let result = self.run_inner(url).await;

        let _ = self.connection.disconnect().await;
        self.signal.set(ConnectionState::Disconnected);
        result
    }

    async fn run_inner(&mut self, url: &str) -> GatewayResult<()> {
        self.connection.connect(url).await?;

        self.connection
            .send(&ClientMessage::Authenticate {
                token: self.token.clone(),
            })
            .await?;
        self.await_authenticated().await?;

        info!("gateway authenticated");
        self.signal.set(ConnectionState::Connected);

        self.event_loop().await
    }

    async fn await_authenticated(&mut self) -> GatewayResult<()> {
        loop {
            let event = timeout(AUTHENTICATION_TIMEOUT, self.connection.receive())
                .await
                .map_err(|_| GatewayError::timeout("authentication"))?
                .map_err(|e| {
                    GatewayError::authentication_failed(format!("handshake failed: {e}"))
                })?;

            match event {
                Some(ServerEvent::Authenticated) => return Ok(()),
                Some(ServerEvent::Error { error }) => {
                    return Err(GatewayError::Server { code: error });
                }
                Some(ServerEvent::NotFound) => return Err(GatewayError::SessionExpired),
                // Ready can arrive in the same burst as Authenticated.
                Some(other) => {
                    let _ = self.event_tx.send(other);
                }
                None => {}
            }
        }
    }

    async fn event_loop(&mut self) -> GatewayResult<()> {
        loop {
            tokio::select! {
                result = self.connection.receive() => {
                    match result {
                        Ok(Some(event)) => self.handle_event(event).await?,
                        Ok(None) => {}
                        Err(e) => return Err(e),
                    }
                }

                event = self.heartbeat.wait() => match event {
                    HeartbeatEvent::PingDue => {
                        self.connection.send(&Heartbeat::ping()).await?;
                        self.heartbeat.arm_deadline();
                    }
                    HeartbeatEvent::DeadlineMissed => {
                        warn!("pong deadline missed, tearing down connection");
                        return Err(GatewayError::HeartbeatTimeout);
                    }
                },

                Some(message) = self.outbound_rx.recv() => {
                    self.connection.send(&message).await?;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ServerEvent) -> GatewayResult<()> {
        match event {
            ServerEvent::Pong { data } => {
                if self.heartbeat.disarm() {
                    let latency = chrono::Utc::now().timestamp_millis() - data;
                    debug!(latency_ms = latency, "pong received");
                } else {
                    trace!("unsolicited pong");
                }
            }
            ServerEvent::Ping { data } => {
                self.connection.send(&ClientMessage::Pong { data }).await?;
            }
            ServerEvent::Error { error } => {
                return Err(GatewayError::Server { code: error });
            }
            ServerEvent::NotFound => return Err(GatewayError::SessionExpired),
            other => {
                trace!(event = other.name(), "forwarding event");
                self.event_tx
                    .send(other)
                    .map_err(|_| GatewayError::ChannelClosed)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::infrastructure::gateway::protocol::ServerErrorId;

    /// Transport serving a script of canned results.
    struct ScriptedConnection {
        script: Mutex<VecDeque<GatewayResult<Option<ServerEvent>>>>,
        sent: std::sync::Arc<Mutex<Vec<ClientMessage>>>,
        connected: bool,
    }

    impl ScriptedConnection {
        fn new(script: Vec<GatewayResult<Option<ServerEvent>>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                sent: std::sync::Arc::new(Mutex::new(Vec::new())),
                connected: false,
            }
        }
    }

    #[async_trait]
    impl GatewayConnection for ScriptedConnection {
        async fn connect(&mut self, _url: &str) -> GatewayResult<()> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> GatewayResult<()> {
            self.connected = false;
            Ok(())
        }

        async fn send(&mut self, message: &ClientMessage) -> GatewayResult<()> {
            self.sent.lock().push(message.clone());
            Ok(())
        }

        async fn receive(&mut self) -> GatewayResult<Option<ServerEvent>> {
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                // Script exhausted: hang forever like a quiet socket.
                None => std::future::pending().await,
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    type SentLog = std::sync::Arc<Mutex<Vec<ClientMessage>>>;

    fn handler_over(
        script: Vec<GatewayResult<Option<ServerEvent>>>,
    ) -> (GatewayHandler, mpsc::UnboundedReceiver<ServerEvent>, SentLog) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (_outbound_tx, outbound_rx) = mpsc::channel(8);
        let connection = ScriptedConnection::new(script);
        let sent = std::sync::Arc::clone(&connection.sent);
        let handler = GatewayHandler::new(
            Box::new(connection),
            "token".to_owned(),
            ConnectionSignal::new(),
            event_tx,
            outbound_rx,
        );
        (handler, event_rx, sent)
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_surfaces_server_error() {
        let (mut handler, _events, sent) = handler_over(vec![Ok(Some(ServerEvent::Error {
            error: ServerErrorId::InvalidSession,
        }))]);

        let error = handler.run("ws://test").await.unwrap_err();
        assert!(matches!(
            error,
            GatewayError::Server {
                code: ServerErrorId::InvalidSession
            }
        ));
        assert_eq!(handler.signal.current(), ConnectionState::Disconnected);
        // The token was presented before the error came back.
        assert!(matches!(
            sent.lock().first(),
            Some(ClientMessage::Authenticate { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_forwarded_after_authentication() {
        let (mut handler, mut events, _sent) = handler_over(vec![
            Ok(Some(ServerEvent::Authenticated)),
            Ok(Some(ServerEvent::Ready {
                users: Vec::new(),
                servers: Vec::new(),
                channels: Vec::new(),
                members: Vec::new(),
                emojis: Vec::new(),
            })),
            Err(GatewayError::ConnectionClosed {
                code: Some(1000),
                reason: "done".to_owned(),
            }),
        ]);

        let error = handler.run("ws://test").await.unwrap_err();
        assert!(matches!(error, GatewayError::ConnectionClosed { .. }));

        let forwarded = events.recv().await.unwrap();
        assert_eq!(forwarded.name(), "Ready");
    }

    #[tokio::test(start_paused = true)]
    async fn missed_pong_tears_down_the_connection() {
        let (mut handler, _events, sent) =
            handler_over(vec![Ok(Some(ServerEvent::Authenticated))]);

        // Quiet socket: the first tick sends a ping, then the deadline passes
        // with no pong in the script.
        let error = handler.run("ws://test").await.unwrap_err();
        assert!(matches!(error, GatewayError::HeartbeatTimeout));
        assert!(
            sent.lock()
                .iter()
                .any(|m| matches!(m, ClientMessage::Ping { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_not_found_during_handshake() {
        let (mut handler, _events, _sent) = handler_over(vec![Ok(Some(ServerEvent::NotFound))]);

        let error = handler.run("ws://test").await.unwrap_err();
        assert!(matches!(error, GatewayError::SessionExpired));
    }
}
