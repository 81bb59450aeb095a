use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{error::PlaylistError, playlist::PlaylistAssembler};

impl IntoResponse for PlaylistError {
    fn into_response(self) -> Response {
        error!("[/m3u] fatal: {self}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {self}")).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct M3uQuery {
    group: Option<String>,
}

pub fn router(assembler: Arc<PlaylistAssembler>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/m3u", get(m3u))
        .layer(TraceLayer::new_for_http())
        .with_state(assembler)
}

async fn index() -> &'static str {
    concat!(
        env!("CARGO_PKG_NAME"),
        " ",
        env!("CARGO_PKG_VERSION"),
        " is running. Get the playlist from /m3u (optionally /m3u?group=<name>)"
    )
}

async fn health() -> &'static str {
    "OK"
}

async fn m3u(
    State(assembler): State<Arc<PlaylistAssembler>>,
    Query(query): Query<M3uQuery>,
) -> Result<String, PlaylistError> {
    assembler.build_playlist(query.group.as_deref()).await
}
