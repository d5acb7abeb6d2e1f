//! Per-connection streaming loop.
//!
//! One task per connection owns the attached [`Session`] and its keepalive.
//! Inbound messages, keepalive deadlines and shutdown are multiplexed in a
//! single `select!`, so the cursor is never touched concurrently and the
//! session is released exactly once when the loop ends.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use simstream_core::SessionId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::handler::handle_message;
use super::keepalive::{Keepalive, KeepaliveAction};
use super::{CLOSE_NO_SESSION, CLOSE_NO_SESSION_REASON};
use crate::metrics::{KEEPALIVE_TIMEOUTS_TOTAL, STREAMS_ACTIVE, STREAMS_REJECTED_TOTAL};
use crate::registry::{Session, SessionRegistry};

/// Shared handles a streaming connection needs.
#[derive(Clone)]
pub struct StreamContext {
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Keepalive TTL.
    pub keepalive_ttl: Duration,
    /// Fires on server shutdown.
    pub shutdown: CancellationToken,
}

/// Why a streaming loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    ClientClosed,
    /// No pong within the keepalive window.
    KeepaliveTimeout,
    /// Writing to the socket failed.
    SendFailed,
    /// Reading from the socket failed.
    ReceiveFailed,
    /// Server shutting down.
    Shutdown,
}

/// Serve an upgraded socket for session `id`.
///
/// Unknown, missing or already-attached sessions get a `4404 "no sim"` close.
pub async fn serve_connection(mut socket: WebSocket, id: Option<SessionId>, ctx: StreamContext) {
    let attached = id
        .ok_or_else(|| "no session key".to_string())
        .and_then(|id| ctx.registry.attach(&id).map_err(|e| e.to_string()));

    let session = match attached {
        Ok(session) => session,
        Err(reason) => {
            info!(reason = %reason, "rejecting streaming connection");
            counter!(STREAMS_REJECTED_TOTAL).increment(1);
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_NO_SESSION,
                    reason: CLOSE_NO_SESSION_REASON.into(),
                })))
                .await;
            return;
        }
    };

    run_stream(socket, session, ctx).await;
}

#[instrument(
    name = "stream",
    skip_all,
    fields(session_id = %session.id, dataset = %session.descriptor.name)
)]
async fn run_stream(socket: WebSocket, mut session: Session, ctx: StreamContext) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut keepalive = Keepalive::new(ctx.keepalive_ttl);
    keepalive.open(Instant::now());

    gauge!(STREAMS_ACTIVE).increment(1.0);
    info!("streaming connection opened");

    let reason = loop {
        let deadline = keepalive.next_deadline();
        tokio::select! {
            msg = ws_rx.next() => {
                let data: Bytes = match msg {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                    Some(Ok(Message::Pong(_))) => {
                        keepalive.on_pong(Instant::now());
                        continue;
                    }
                    // Pings are answered by axum.
                    Some(Ok(Message::Ping(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket receive failed");
                        break CloseReason::ReceiveFailed;
                    }
                };
                if let Some(frame) = handle_message(&data, &mut session.cursor).into_reply() {
                    if ws_tx.send(Message::Binary(frame)).await.is_err() {
                        break CloseReason::SendFailed;
                    }
                }
            }
            () = sleep_until(deadline) => {
                match keepalive.poll(Instant::now()) {
                    Some(KeepaliveAction::SendPing) => {
                        debug!("keepalive ping");
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break CloseReason::SendFailed;
                        }
                    }
                    Some(KeepaliveAction::Close) => {
                        warn!(ttl = ?ctx.keepalive_ttl, "no pong within keepalive window, closing");
                        counter!(KEEPALIVE_TIMEOUTS_TOTAL).increment(1);
                        let _ = ws_tx.send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "keepalive timeout".into(),
                        }))).await;
                        break CloseReason::KeepaliveTimeout;
                    }
                    None => {}
                }
            }
            () = ctx.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                }))).await;
                break CloseReason::Shutdown;
            }
        }
    };

    keepalive.close();
    let _ = ctx.registry.release(&session.id);
    gauge!(STREAMS_ACTIVE).decrement(1.0);

    let stats = session.cursor.stats();
    info!(
        ?reason,
        hits = stats.hits,
        advances = stats.advances,
        resets = stats.resets,
        replay_steps = stats.replay_steps,
        out_of_range = stats.out_of_range,
        "streaming connection closed"
    );
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
