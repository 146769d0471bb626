//! Application layer.
//!
//! The event reducer and the client facade orchestrating domain state,
//! the gateway, and the REST port.

mod client;
mod reducer;

pub use client::{ChatClient, ClientConfig, ClientEvent};
pub use reducer::Reducer;
