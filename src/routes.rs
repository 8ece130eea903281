use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::{
    error::PlaylistInfoError,
    form_verification::Submission,
    playlist::{PlaylistInfo, PlaylistInfoHandler},
};

pub fn app(handler: PlaylistInfoHandler) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/playlist/info", post(playlist_info))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the YouTube Playlist Downloader proxy" }))
}

async fn playlist_info(
    State(handler): State<PlaylistInfoHandler>,
    submission: Submission,
) -> Result<Json<PlaylistInfo>, PlaylistInfoError> {
    handler.handle(&submission).await.map(Json)
}
