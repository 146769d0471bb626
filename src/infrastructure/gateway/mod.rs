//! Realtime gateway: websocket transport, wire protocol, and keepalive.

mod connection;
mod error;
mod heartbeat;
mod protocol;
mod state;

pub use connection::{GatewayConnection, GatewayHandler, WebSocketConnection};
pub use error::{GatewayError, GatewayResult};
pub use heartbeat::{HEARTBEAT_INTERVAL, Heartbeat, HeartbeatEvent, PONG_DEADLINE};
pub use protocol::{ClientMessage, ServerErrorId, ServerEvent, decode_event, encode_message};
pub use state::{ConnectionSignal, ConnectionState};
