//! Infrastructure layer.
//!
//! Concrete adapters: the websocket gateway, the REST client,
//! configuration, and session persistence.

pub mod api;
pub mod config;
pub mod gateway;
pub mod session_store;

pub use session_store::{Session, SessionStore};
