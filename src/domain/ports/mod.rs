//! External collaborator interfaces.
//!
//! Ports are trait seams between the state engine and the outside world;
//! infrastructure provides concrete adapters.

mod api_port;

pub use api_port::{ApiPort, MessageQuery, UserSettings};

#[cfg(test)]
pub use api_port::mock;
