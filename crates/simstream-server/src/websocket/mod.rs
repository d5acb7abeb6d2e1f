//! Streaming `WebSocket` connections: keepalive, frame request handling and
//! the per-connection loop.

pub mod handler;
pub mod keepalive;
pub mod session;

/// Close code sent when the requested session does not exist.
pub const CLOSE_NO_SESSION: u16 = 4404;
/// Close reason paired with [`CLOSE_NO_SESSION`].
pub const CLOSE_NO_SESSION_REASON: &str = "no sim";
