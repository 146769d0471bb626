//! Rivulet - a headless chat state synchronization engine.
//!
//! This crate maintains a live local mirror of a remote chat service with
//! clean architecture: a websocket gateway feeds an event reducer that folds
//! the stream into identity-keyed entity caches, with REST responses merged
//! through the same primitives.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the reducer and the client facade.
pub mod application;
/// Domain layer containing entities, state, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "rivulet";
