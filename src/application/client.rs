//! Client facade tying the gateway, the REST port, and local state together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::reducer::Reducer;
use crate::domain::entities::{
    Channel, ChannelId, Member, MemberKey, Message, Server, ServerId, User, UserId,
};
use crate::domain::errors::ApiError;
use crate::domain::ports::{ApiPort, MessageQuery};
use crate::domain::state::ClientState;
use crate::infrastructure::gateway::{
    ClientMessage, ConnectionSignal, ConnectionState, GatewayError, GatewayHandler, GatewayResult,
    ServerErrorId, ServerEvent, WebSocketConnection,
};

const EVENT_CHANNEL_CAPACITY: usize = 512;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Endpoints the client talks to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base URL.
    pub api_url: String,
    /// Realtime gateway URL.
    pub gateway_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.revolt.chat".to_owned(),
            gateway_url: "wss://ws.revolt.chat".to_owned(),
        }
    }
}

/// Notifications surfaced to the embedding application.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A state-bearing event, already folded into the local mirror.
    Event(ServerEvent),
    /// The gateway reported a fatal error frame.
    ServerError(ServerErrorId),
    /// The stored session is no longer valid.
    SessionExpired,
    /// The connection ended.
    Disconnected {
        /// Human-readable cause.
        reason: String,
    },
}

/// The synchronization client.
///
/// Owns the state mirror and the gateway tasks. All methods take `&self`;
/// the client is shared behind an `Arc` between the connection tasks and
/// the embedding application.
pub struct ChatClient {
    config: ClientConfig,
    state: Arc<ClientState>,
    reducer: Arc<Reducer>,
    api: Arc<dyn ApiPort>,
    token: RwLock<Option<String>>,
    /// Incremented on teardown so late REST responses are not merged into
    /// a cleared or re-authenticated state.
    epoch: AtomicU64,
    events: broadcast::Sender<ClientEvent>,
    signal: ConnectionSignal,
    outbound: RwLock<Option<mpsc::Sender<ClientMessage>>>,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl ChatClient {
    /// Creates a client over the given REST port.
    #[must_use]
    pub fn new(config: ClientConfig, api: Arc<dyn ApiPort>) -> Self {
        let state = Arc::new(ClientState::new());
        let reducer = Arc::new(Reducer::new(Arc::clone(&state)));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            state,
            reducer,
            api,
            token: RwLock::new(None),
            epoch: AtomicU64::new(0),
            events,
            signal: ConnectionSignal::new(),
            outbound: RwLock::new(None),
            tasks: RwLock::new(Vec::new()),
        }
    }

    /// Adopts a session: the token used by both transports and the id of
    /// the user it belongs to.
    pub fn authenticate(&self, token: impl Into<String>, user_id: UserId) {
        let token = token.into();
        self.api.set_token(Some(&token));
        self.state.set_current_user(Some(user_id));
        *self.token.write() = Some(token);
    }

    /// Opens the gateway connection and starts folding events into state.
    ///
    /// # Errors
    ///
    /// Returns an error when already connected or no session is set.
    pub fn connect(self: &Arc<Self>) -> GatewayResult<()> {
        if self.signal.current().is_active() {
            return Err(GatewayError::AlreadyConnected);
        }
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(|| GatewayError::authentication_failed("no session token set"))?;

        // Claim the connection slot before the task gets a chance to run.
        self.signal.set(ConnectionState::Connecting);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        *self.outbound.write() = Some(outbound_tx);

        let mut handler = GatewayHandler::new(
            Box::new(WebSocketConnection::new()),
            token,
            self.signal.clone(),
            event_tx,
            outbound_rx,
        );

        let url = self.config.gateway_url.clone();
        let client = Arc::clone(self);
        let gateway_task = tokio::spawn(async move {
            let result = handler.run(&url).await;
            client.publish_outcome(result);
        });

        let client = Arc::clone(self);
        let pump_task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                for surfaced in client.reducer.apply(event) {
                    let _ = client.events.send(ClientEvent::Event(surfaced));
                }
            }
        });

        let mut tasks = self.tasks.write();
        tasks.push(gateway_task);
        tasks.push(pump_task);

        info!(url = %self.config.gateway_url, "gateway connection started");
        Ok(())
    }

    fn publish_outcome(&self, result: GatewayResult<()>) {
        let event = match result {
            Ok(()) => ClientEvent::Disconnected {
                reason: "connection closed".to_owned(),
            },
            Err(GatewayError::Server { code }) => {
                warn!(%code, "gateway reported server error");
                ClientEvent::ServerError(code)
            }
            Err(GatewayError::SessionExpired) => ClientEvent::SessionExpired,
            Err(e) => {
                warn!(error = %e, "gateway connection ended");
                ClientEvent::Disconnected {
                    reason: e.to_string(),
                }
            }
        };
        let _ = self.events.send(event);
    }

    /// Subscribes to client notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Observes connection state transitions.
    #[must_use]
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.signal.subscribe()
    }

    /// Local state mirror.
    #[must_use]
    pub fn state(&self) -> &Arc<ClientState> {
        &self.state
    }

    /// The REST port, for calls the facade does not wrap.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn ApiPort> {
        &self.api
    }

    async fn send_gateway(&self, message: ClientMessage) -> GatewayResult<()> {
        let sender = self
            .outbound
            .read()
            .clone()
            .ok_or(GatewayError::NotConnected)?;
        sender
            .send(message)
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    /// Announces that the local user started typing.
    ///
    /// # Errors
    ///
    /// Returns an error when not connected.
    pub async fn begin_typing(&self, channel: ChannelId) -> GatewayResult<()> {
        self.send_gateway(ClientMessage::BeginTyping { channel }).await
    }

    /// Announces that the local user stopped typing.
    ///
    /// # Errors
    ///
    /// Returns an error when not connected.
    pub async fn end_typing(&self, channel: ChannelId) -> GatewayResult<()> {
        self.send_gateway(ClientMessage::EndTyping { channel }).await
    }

    /// Sends a message over REST.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn send_message(
        &self,
        channel: &ChannelId,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.api.send_message(channel, content).await
    }

    /// Queries message history.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn query_messages(
        &self,
        channel: &ChannelId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, ApiError> {
        self.api.query_messages(channel, query).await
    }

    /// Fetches a user and merges it into the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn fetch_user(&self, id: &UserId) -> Result<User, ApiError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let user = self.api.fetch_user(id).await?;
        if self.same_epoch(epoch) {
            self.state.users.insert(user.id.clone(), user.clone());
        }
        Ok(user)
    }

    /// Fetches a channel and merges it into the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn fetch_channel(&self, id: &ChannelId) -> Result<Channel, ApiError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let channel = self.api.fetch_channel(id).await?;
        if self.same_epoch(epoch) {
            self.state
                .channels
                .insert(channel.id().clone(), channel.clone());
        }
        Ok(channel)
    }

    /// Fetches a server and merges it into the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn fetch_server(&self, id: &ServerId) -> Result<Server, ApiError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let server = self.api.fetch_server(id).await?;
        if self.same_epoch(epoch) {
            self.state.servers.insert(server.id.clone(), server.clone());
        }
        Ok(server)
    }

    /// Fetches a member and merges it into the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn fetch_member(&self, key: &MemberKey) -> Result<Member, ApiError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let member = self.api.fetch_member(key).await?;
        if self.same_epoch(epoch) {
            self.state.members.insert(member.id.clone(), member.clone());
        }
        Ok(member)
    }

    /// Fetches unread state for every channel and loads it into the tracker.
    ///
    /// # Errors
    ///
    /// Returns the API error on failure.
    pub async fn fetch_unreads(&self) -> Result<(), ApiError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let unreads = self.api.fetch_unreads().await?;
        if self.same_epoch(epoch) {
            debug!(entries = unreads.len(), "loaded unread state");
            self.state.unreads.load(unreads);
        }
        Ok(())
    }

    fn same_epoch(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }

    /// Tears everything down: aborts the connection tasks, discards state,
    /// and forgets the session.
    pub fn destroy(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);

        for task in self.tasks.write().drain(..) {
            task.abort();
        }
        *self.outbound.write() = None;

        self.signal.set(ConnectionState::Disconnected);
        self.state.clear_all();
        self.api.set_token(None);
        *self.token.write() = None;

        info!("client destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ChannelUnread;
    use crate::domain::ports::mock::MockApiPort;

    fn client_with_mock() -> (Arc<ChatClient>, Arc<MockApiPort>) {
        let api = Arc::new(MockApiPort::new());
        let client = Arc::new(ChatClient::new(
            ClientConfig::default(),
            Arc::clone(&api) as Arc<dyn ApiPort>,
        ));
        (client, api)
    }

    #[tokio::test]
    async fn fetch_user_merges_into_cache() {
        let (client, api) = client_with_mock();
        api.add_user(MockApiPort::user("01USER", "alice"));

        let user = client.fetch_user(&UserId::from("01USER")).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(client.state().users.contains(&UserId::from("01USER")));
    }

    #[tokio::test]
    async fn fetch_unreads_feeds_the_tracker() {
        let (client, api) = client_with_mock();
        api.set_unreads(vec![ChannelUnread::new(
            ChannelId::from("01CHAN"),
            UserId::from("01ME"),
            None,
        )]);

        client.fetch_unreads().await.unwrap();
        assert_eq!(client.state().unreads.len(), 1);
    }

    #[tokio::test]
    async fn destroy_discards_state_and_session() {
        let (client, api) = client_with_mock();
        client.authenticate("tok", UserId::from("01ME"));
        api.add_user(MockApiPort::user("01USER", "alice"));
        client.fetch_user(&UserId::from("01USER")).await.unwrap();

        client.destroy();

        assert!(client.state().users.is_empty());
        assert_eq!(client.state().current_user(), None);
        // A stale fetch completed before destroy must not resurrect state.
        assert!(client.token.read().is_none());
    }

    #[tokio::test]
    async fn late_response_from_previous_epoch_is_dropped() {
        let (client, api) = client_with_mock();
        api.add_user(MockApiPort::user("01USER", "alice"));

        // Simulate a response that raced with destroy: capture the epoch,
        // destroy, then attempt the merge path.
        let epoch = client.epoch.load(Ordering::Acquire);
        client.destroy();

        let user = client.api.fetch_user(&UserId::from("01USER")).await.unwrap();
        if client.same_epoch(epoch) {
            client.state.users.insert(user.id.clone(), user);
        }
        assert!(client.state().users.is_empty());
    }

    #[tokio::test]
    async fn connect_without_session_fails() {
        let (client, _api) = client_with_mock();
        let error = client.connect().unwrap_err();
        assert!(matches!(error, GatewayError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn typing_without_connection_fails() {
        let (client, _api) = client_with_mock();
        let error = client
            .begin_typing(ChannelId::from("01CHAN"))
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::NotConnected));
    }
}
