use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{InternalCause, PlaylistInfoError},
    form_verification::{verify_submission, Submission},
    preferences::Preferences,
};

const INFO_PATH: &str = "playlist/info";

/// What a successful lookup sends back: the backend body, untouched, under `data`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlaylistInfo {
    pub success: bool,
    pub data: Value,
}

impl PlaylistInfo {
    pub fn new(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
struct InfoRequest<'a> {
    url: &'a str,
}

// The backend documents this shape, but it is only read for the log line. Responses that don't
// match are still passed through.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct PlaylistSummary {
    title: Option<String>,
    channel_name: Option<String>,
    video_count: Option<u64>,
}

/// Validates form submissions and forwards them to the playlist-info backend.
///
/// Cloning is cheap; the inner `reqwest::Client` shares its connection pool.
#[derive(Clone, Debug)]
pub struct PlaylistInfoHandler {
    client: Client,
    endpoint: String,
    preserve_upstream_status: bool,
}

impl PlaylistInfoHandler {
    /// `backend_url` is the base of the backend, `api_prefix` the versioned API root under it.
    /// No request timeout is set; a call runs until the backend answers or the connection fails.
    pub fn new(
        backend_url: &str,
        api_prefix: &str,
        preserve_upstream_status: bool,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = format!("playlist-proxy/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            endpoint: info_endpoint(backend_url, api_prefix),
            preserve_upstream_status,
        })
    }

    pub fn from_preferences(prefs: &Preferences) -> Result<Self, reqwest::Error> {
        Self::new(
            prefs.backend_url(),
            prefs.api_prefix(),
            prefs.preserve_upstream_status(),
        )
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    #[instrument(skip(self, submission))]
    pub async fn handle(&self, submission: &Submission) -> Result<PlaylistInfo, PlaylistInfoError> {
        let url = verify_submission(submission)?;

        match self.fetch_info(url).await {
            Ok(data) => {
                let summary = PlaylistSummary::deserialize(&data).unwrap_or_default();
                info!(
                    title = ?summary.title,
                    channel = ?summary.channel_name,
                    videos = ?summary.video_count,
                    "Fetched playlist info"
                );
                Ok(PlaylistInfo::new(data))
            }
            Err(err) => Err(self.classify_failure(err)),
        }
    }

    async fn fetch_info(&self, url: &str) -> Result<Value, PlaylistInfoError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InfoRequest { url })
            .send()
            .await
            .map_err(InternalCause::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaylistInfoError::Upstream { status });
        }

        let body = response.bytes().await.map_err(InternalCause::from)?;
        let data = serde_json::from_slice(&body).map_err(InternalCause::from)?;
        Ok(data)
    }

    /// Upstream failures collapse into a 500 unless `preserve_upstream_status` is set
    fn classify_failure(&self, err: PlaylistInfoError) -> PlaylistInfoError {
        match err {
            PlaylistInfoError::Upstream { status } if !self.preserve_upstream_status => {
                let err = PlaylistInfoError::from(InternalCause::UpstreamStatus(status));
                error!("Error fetching playlist info: {err}");
                err
            }
            PlaylistInfoError::Upstream { status } => {
                warn!("Backend rejected playlist lookup with {status}");
                err
            }
            err => {
                error!("Error fetching playlist info: {err}");
                err
            }
        }
    }
}

fn info_endpoint(backend_url: &str, api_prefix: &str) -> String {
    let base = backend_url.trim_end_matches('/');
    match api_prefix.trim_matches('/') {
        "" => format!("{base}/{INFO_PATH}"),
        prefix => format!("{base}/{prefix}/{INFO_PATH}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::{FETCH_FAILED, INVALID_PLAYLIST_URL, URL_REQUIRED};

    pub const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=ABC123";

    /// Serves `router` on an ephemeral port and returns its base URL
    pub async fn spawn_backend(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn backend_route<H, T>(handler: H) -> Router
    where
        H: axum::handler::Handler<T, ()>,
        T: 'static,
    {
        Router::new().route("/api/v1/playlist/info", post(handler))
    }

    async fn echo(Json(body): Json<Value>) -> Json<Value> {
        Json(body)
    }

    fn submission(url: &str) -> Submission {
        Submission::from_pairs(vec![("url", url)])
    }

    async fn handler_for(router: Router, preserve_upstream_status: bool) -> PlaylistInfoHandler {
        let base = spawn_backend(router).await;
        PlaylistInfoHandler::new(&base, "/api/v1", preserve_upstream_status).unwrap()
    }

    #[test]
    fn endpoint_joins_base_and_prefix() {
        assert_eq!(
            info_endpoint("http://backend:8000", "/api/v1"),
            "http://backend:8000/api/v1/playlist/info"
        );
        assert_eq!(
            info_endpoint("http://backend:8000/", "api/v1/"),
            "http://backend:8000/api/v1/playlist/info"
        );
        assert_eq!(
            info_endpoint("http://backend:8000", ""),
            "http://backend:8000/playlist/info"
        );
    }

    #[tokio::test]
    async fn wraps_backend_json() {
        let handler = handler_for(
            backend_route(|| async { Json(json!({"title": "My Mix", "items": 3})) }),
            false,
        )
        .await;

        let info = handler.handle(&submission(PLAYLIST_URL)).await.unwrap();
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"success": true, "data": {"title": "My Mix", "items": 3}})
        );
    }

    #[tokio::test]
    async fn forwards_url_unchanged_as_json() {
        let handler = handler_for(backend_route(echo), false).await;

        let url = "http://evil.example/x?ref=youtube.com/playlist";
        let info = handler.handle(&submission(url)).await.unwrap();
        assert_eq!(info.data, json!({ "url": url }));
    }

    #[tokio::test]
    async fn upstream_status_collapses_to_500() {
        let handler = handler_for(
            backend_route(|| async { (StatusCode::NOT_FOUND, "no such playlist") }),
            false,
        )
        .await;

        let err = handler.handle(&submission(PLAYLIST_URL)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), FETCH_FAILED);
    }

    #[tokio::test]
    async fn upstream_status_kept_when_configured() {
        let handler = handler_for(
            backend_route(|| async { (StatusCode::NOT_FOUND, "no such playlist") }),
            true,
        )
        .await;

        let err = handler.handle(&submission(PLAYLIST_URL)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), FETCH_FAILED);
    }

    #[tokio::test]
    async fn unreachable_backend_is_internal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handler =
            PlaylistInfoHandler::new(&format!("http://{addr}"), "/api/v1", true).unwrap();
        let err = handler.handle(&submission(PLAYLIST_URL)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), FETCH_FAILED);
    }

    #[tokio::test]
    async fn non_json_body_is_internal() {
        let handler = handler_for(backend_route(|| async { "<html>oops</html>" }), false).await;

        let err = handler.handle(&submission(PLAYLIST_URL)).await.unwrap_err();
        assert!(matches!(
            err,
            PlaylistInfoError::Internal(InternalCause::Decode(_))
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_backend() {
        // Nothing listens here, so any request would surface as a 500
        let handler = PlaylistInfoHandler::new("http://127.0.0.1:9", "/api/v1", false).unwrap();

        let err = handler.handle(&Submission::default()).await.unwrap_err();
        assert_eq!((err.status(), err.message()), (StatusCode::BAD_REQUEST, URL_REQUIRED));

        let err = handler
            .handle(&submission("https://example.com/list"))
            .await
            .unwrap_err();
        assert_eq!(
            (err.status(), err.message()),
            (StatusCode::BAD_REQUEST, INVALID_PLAYLIST_URL)
        );
    }

    #[tokio::test]
    async fn data_shape_is_not_enforced() {
        let handler = handler_for(backend_route(|| async { Json(json!([1, 2, 3])) }), false).await;

        let info = handler.handle(&submission(PLAYLIST_URL)).await.unwrap();
        assert!(info.success);
        assert_eq!(info.data, json!([1, 2, 3]));
    }
}
