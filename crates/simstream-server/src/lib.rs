//! # simstream-server
//!
//! Axum HTTP + `WebSocket` server streaming simulation frames.
//!
//! - `GET /sim/{name}`: manifest; creates a session and sets the `key` cookie
//! - `GET /sim/{key}/pos`, `GET /sim/pos`: binary frame streaming endpoint
//! - `GET /health`, `GET /metrics`: liveness and Prometheus exposition
//!
//! Each streaming connection is one task owning its session's frame cursor
//! and keepalive timers; the [`registry::SessionRegistry`] is the only shared
//! structure.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod loader;
pub mod manifest;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use registry::{CreatedSession, Session, SessionRegistry};
pub use server::StreamServer;
