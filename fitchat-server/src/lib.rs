//! FitChat messaging server library.
//!
//! The real-time direct-messaging subsystem of the FitChat backend: an axum
//! server carrying a WebSocket event channel for live chat plus a small REST
//! facade over the same durable message store. Account, exercise and
//! food-log endpoints live in the main application service; this crate only
//! consumes the user directory it maintains.

pub mod config;
pub mod directory;
pub mod http;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
