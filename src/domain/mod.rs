//! Core domain layer.
//!
//! Entities, state containers, error types, and port traits with no
//! dependency on transport or storage details.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod state;
