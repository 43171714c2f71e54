//! HTTP API server.
//!
//! Every request runs inside the credential scope taken from its
//! `X-API-Key` header. Errors are returned as `{"detail": "..."}`.

use crate::cli::Output;
use crate::config::Settings;
use crate::credential::{with_credential, Credential};
use crate::error::{ErrorKind, SmartEdError};
use crate::orchestrator::{ContentOrchestrator, ConversationTurn};
use crate::quiz::Quiz;
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state.
struct AppState {
    orchestrator: ContentOrchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = ContentOrchestrator::new(&settings)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("SmartEd API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Status", "GET    /");
    Output::kv("Transcript", "POST   /transcript");
    Output::kv("Summarize", "POST   /summarize");
    Output::kv("Quiz", "POST   /quiz");
    Output::kv("Chat", "POST   /chat");
    Output::kv("Complete Analysis", "POST   /complete-analysis");
    Output::kv("Preload", "POST   /preload");
    Output::kv("Cache", "GET    /cache");
    Output::kv("Clear Cache", "DELETE /cache");
    Output::kv("Invalidate", "DELETE /cache/{video_id}");
    println!();
    Output::info("Send your API key in the X-API-Key header. Press Ctrl+C to stop the server.");

    axum::serve(listener, router(orchestrator)).await?;

    Ok(())
}

/// Build the API router around an orchestrator.
pub fn router(orchestrator: ContentOrchestrator) -> Router {
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status))
        .route("/transcript", post(transcript))
        .route("/summarize", post(summarize))
        .route("/quiz", post(quiz))
        .route("/chat", post(chat))
        .route("/complete-analysis", post(complete_analysis))
        .route("/preload", post(preload))
        .route("/cache", get(list_cache).delete(clear_cache))
        .route("/cache/{video_id}", delete(invalidate))
        .layer(middleware::from_fn(credential_scope))
        .layer(cors)
        .with_state(state)
}

/// Run the rest of the request with the caller's key as the active credential.
async fn credential_scope(request: Request, next: Next) -> Response {
    let credential = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::new);

    match credential {
        Some(credential) => with_credential(credential, next.run(request)).await,
        None => {
            debug!("Request without {} header", API_KEY_HEADER);
            next.run(request).await
        }
    }
}

// === Errors ===

struct ApiError(SmartEdError);

impl From<SmartEdError> for ApiError {
    fn from(err: SmartEdError) -> Self {
        Self(err)
    }
}

/// Unreadable bodies get the same `{"detail": ...}` shape as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(SmartEdError::InvalidRequest(rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

fn status_for(err: &SmartEdError) -> StatusCode {
    match (err, err.kind()) {
        (SmartEdError::MalformedGenerationOutput(_), _) => StatusCode::BAD_GATEWAY,
        (_, ErrorKind::BadInput) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Unauthenticated) => StatusCode::UNAUTHORIZED,
        (_, ErrorKind::ContentUnavailable) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::GenerationUnavailable) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        (status, Json(ErrorResponse { detail: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// === Request/Response Types ===

#[derive(Deserialize)]
struct VideoRequest {
    url: String,
}

#[derive(Deserialize)]
struct SummarizeRequest {
    url: String,
    #[serde(default)]
    max_length: Option<u32>,
}

#[derive(Deserialize)]
struct QuizRequest {
    url: String,
    #[serde(default)]
    num_questions: Option<u32>,
}

#[derive(Deserialize)]
struct ChatRequest {
    url: String,
    question: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    transcript: String,
    strategy: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Serialize)]
struct QuizResponse {
    quiz: Quiz,
}

#[derive(Serialize)]
struct ChatResponse {
    question: String,
    answer: String,
}

#[derive(Serialize)]
struct AnalysisResponse {
    summary: String,
    quiz: Quiz,
    cached: bool,
}

#[derive(Serialize)]
struct PreloadResponse {
    message: String,
    url: String,
    cached: bool,
}

#[derive(Serialize)]
struct CacheResponse {
    videos: Vec<String>,
    total: usize,
}

#[derive(Serialize)]
struct InvalidateResponse {
    video_id: String,
    removed: bool,
}

// === Handlers ===

async fn status() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "online", "service": "SmartEd API" }))
}

async fn transcript(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> ApiResult<TranscriptResponse> {
    let Json(req) = payload?;
    let record = state.orchestrator.transcript(&req.url).await?;
    Ok(Json(TranscriptResponse {
        transcript: record.content.clone(),
        strategy: record.strategy.as_ref().map(|s| s.to_string()),
    }))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<SummaryResponse> {
    let Json(req) = payload?;
    let max_length = req
        .max_length
        .unwrap_or(state.orchestrator.defaults().summary_max_length);
    let summary = state.orchestrator.summarize(&req.url, max_length).await?;
    Ok(Json(SummaryResponse { summary }))
}

async fn quiz(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> ApiResult<QuizResponse> {
    let Json(req) = payload?;
    let count = req
        .num_questions
        .unwrap_or(state.orchestrator.defaults().quiz_questions);
    let quiz = state.orchestrator.quiz(&req.url, count).await?;
    Ok(Json(QuizResponse { quiz }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(req) = payload?;
    let answer = state
        .orchestrator
        .ask(&req.url, &req.question, &req.history)
        .await?;
    Ok(Json(ChatResponse {
        question: req.question,
        answer,
    }))
}

async fn complete_analysis(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> ApiResult<AnalysisResponse> {
    let Json(req) = payload?;
    let analysis = state.orchestrator.complete_analysis(&req.url).await?;
    Ok(Json(AnalysisResponse {
        summary: analysis.summary,
        quiz: analysis.quiz,
        cached: true,
    }))
}

async fn preload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    match state.orchestrator.preload(&req.url).await {
        Ok(true) => Json(PreloadResponse {
            message: "Video content preloaded successfully".to_string(),
            url: req.url,
            cached: true,
        })
        .into_response(),
        Ok(false) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                detail: "Failed to preload video content".to_string(),
            }),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn list_cache(State(state): State<Arc<AppState>>) -> Json<CacheResponse> {
    let videos: Vec<String> = state
        .orchestrator
        .cached_references()
        .into_iter()
        .map(|r| r.to_string())
        .collect();
    Json(CacheResponse {
        total: videos.len(),
        videos,
    })
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.orchestrator.clear_cache();
    StatusCode::NO_CONTENT
}

async fn invalidate(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> ApiResult<InvalidateResponse> {
    let removed = state.orchestrator.invalidate(&video_id).await?;
    Ok(Json(InvalidateResponse { video_id, removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureDefaults, Prompts};
    use crate::content::{ContentCache, FetchPolicy};
    use crate::generation::Feature;
    use crate::testing::{ScriptedCaptions, ScriptedGenerator};
    use axum::body::Body;
    use axum::http::{header, Method};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(captions: ScriptedCaptions, generator: ScriptedGenerator) -> Router {
        let policy = FetchPolicy {
            languages: vec!["en".to_string()],
            max_retries: 0,
            retry_base_delay: Duration::from_millis(1),
            caption_timeout: Duration::from_secs(5),
            transcription_timeout: Duration::from_secs(5),
        };
        router(ContentOrchestrator::with_components(
            Arc::new(captions),
            Arc::new(generator),
            Prompts::default(),
            policy,
            ContentCache::new(Duration::from_secs(300), None),
            FeatureDefaults::default(),
        ))
    }

    fn post(uri: &str, key: Option<&str>, body: serde_json::Value) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let response = app(ScriptedCaptions::empty(), ScriptedGenerator::new())
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "online");
    }

    #[tokio::test]
    async fn test_summarize_with_key() {
        let app = app(
            ScriptedCaptions::empty().with_language("en", "lecture"),
            ScriptedGenerator::new().respond(Feature::Summarize, "short summary"),
        );
        let response = app
            .oneshot(post(
                "/summarize",
                Some("user-key"),
                serde_json::json!({ "url": "https://youtu.be/dQw4w9WgXcQ", "max_length": 200 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["summary"], "short summary");
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let app = app(
            ScriptedCaptions::empty().with_language("en", "lecture"),
            ScriptedGenerator::new().respond(Feature::Summarize, "s"),
        );
        let response = app
            .oneshot(post("/summarize", None, serde_json::json!({ "url": "dQw4w9WgXcQ" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("No API key"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_bad_request() {
        let response = app(ScriptedCaptions::empty(), ScriptedGenerator::new())
            .oneshot(post(
                "/chat",
                Some("k"),
                serde_json::json!({ "url": "https://example.com/video", "question": "why?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_json_bad_request() {
        let app = app(ScriptedCaptions::empty(), ScriptedGenerator::new());

        let response = app
            .clone()
            .oneshot(post("/summarize", Some("k"), serde_json::json!({ "max_length": 10 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("url"));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/preload")
                    .header("X-API-Key", "k")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_quiz_is_bad_gateway() {
        let app = app(
            ScriptedCaptions::empty().with_language("en", "lecture"),
            ScriptedGenerator::new().respond(Feature::Quiz, "not json"),
        );
        let response = app
            .oneshot(post(
                "/quiz",
                Some("k"),
                serde_json::json!({ "url": "dQw4w9WgXcQ", "num_questions": 2 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_failed_preload_then_cache_admin() {
        let app = app(
            ScriptedCaptions::empty(),
            ScriptedGenerator::new().fail(Feature::Transcribe, "private video"),
        );

        let response = app
            .clone()
            .oneshot(post("/preload", Some("k"), serde_json::json!({ "url": "abc12345678" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["videos"], serde_json::json!(["abc12345678"]));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/cache/abc12345678")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["removed"], true);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&SmartEdError::AcquisitionFailed {
                reference: "x".into(),
                causes: vec![]
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SmartEdError::GenerationFailed("quota".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SmartEdError::Upstream("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
