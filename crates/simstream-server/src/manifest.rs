//! `GET /sim/{name}`: create a session and describe how to stream it.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use simstream_core::codec::{FRAME_INDEX_BYTES, LENGTH_BYTES};
use simstream_core::{DatasetDescriptor, SessionId, StreamError};
use tracing::{error, info};

use crate::server::AppState;

/// Cookie carrying the session key for `/sim/pos`.
pub const SESSION_COOKIE: &str = "key";

/// Manifest body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Dataset name.
    pub name: String,
    /// Session key.
    pub id: SessionId,
    /// Streaming endpoint for this session.
    pub ws_url: String,
    /// Bytes of the frame index header.
    pub key_bytes: usize,
    /// Bytes of the payload length header.
    pub len_bytes: usize,
    /// Largest payload a frame message can carry.
    pub max_buffer_size: usize,
    /// Per-element labels.
    pub elements: Vec<String>,
    /// Elements per frame.
    pub atom_number: u32,
    /// Frames in the dataset.
    pub frame_number: u32,
}

impl Manifest {
    /// Manifest for a fresh session on `descriptor`.
    pub fn new(id: SessionId, descriptor: &DatasetDescriptor, ws_url: String) -> Self {
        Self {
            name: descriptor.name.clone(),
            id,
            ws_url,
            key_bytes: FRAME_INDEX_BYTES,
            len_bytes: LENGTH_BYTES,
            max_buffer_size: descriptor.max_buffer_size(),
            elements: descriptor.element_labels.clone(),
            atom_number: descriptor.element_count,
            frame_number: descriptor.frame_count,
        }
    }
}

/// `{protocol}{host}/sim/{id}/pos`
pub fn stream_url(protocol: &str, host: &str, id: &SessionId) -> String {
    format!("{protocol}{host}/sim/{id}/pos")
}

/// Handler for `GET /sim/{name}`.
pub async fn manifest_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let created = match state.registry.create(&name).await {
        Ok(created) => created,
        Err(StreamError::DatasetNotFound { name }) => {
            info!(dataset = %name, "manifest requested for unknown dataset");
            return (
                StatusCode::NOT_FOUND,
                format!("Could not find dataset {name}"),
            )
                .into_response();
        }
        Err(e) => {
            error!(dataset = %name, error = %e, kind = e.error_kind(), "failed to create session");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map_or_else(
            || format!("{}:{}", state.config.host, state.config.port),
            str::to_owned,
        );
    let ws_url = stream_url(&state.config.ws_protocol, &host, &created.id);
    let manifest = Manifest::new(created.id.clone(), &created.descriptor, ws_url);

    let cookie = Cookie::build((SESSION_COOKIE, created.id.to_string())).path("/");
    (jar.add(cookie), Json(manifest)).into_response()
}
