use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use providers::{
    AudioSearch, ChatMessage, ChatProvider, ElevenLabsSpeech, FreesoundConfig, FreesoundSearch,
    OpenAiChat, OpenAiConfig, ProviderError, ReplicateConfig, ReplicateVideo, SpeechConfig,
    SpeechProvider, SpeechRequest, VideoProvider, VideoRequest,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn openai_chat_returns_content_and_usage() {
    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})));
        }
        let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": format!("saw {count} messages")}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
            })),
        )
    }
    let base = serve(Router::new().route("/v1/chat/completions", post(completions))).await;

    let chat = OpenAiChat::new(OpenAiConfig {
        api_key: "sk-test".into(),
        api_base: format!("{base}/v1"),
        ..OpenAiConfig::default()
    })
    .unwrap();
    let reply = chat
        .complete(&[ChatMessage::system("be brief"), ChatMessage::user("hello")])
        .await
        .unwrap();
    assert_eq!(reply.content, "saw 2 messages");
    let telemetry = reply.telemetry.unwrap();
    assert_eq!(telemetry.total_tokens, Some(16));
    assert!(telemetry.latency.is_some());

    let wrong = OpenAiChat::new(OpenAiConfig {
        api_key: "sk-wrong".into(),
        api_base: format!("{base}/v1"),
        ..OpenAiConfig::default()
    })
    .unwrap();
    let err = wrong.complete(&[ChatMessage::user("hello")]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Authentication(msg) if msg.contains("bad key")));
}

#[derive(Default)]
struct PredictionState {
    polls: AtomicUsize,
}

async fn create_prediction(
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    assert_eq!(format!("{owner}/{name}"), "minimax/video-01");
    assert!(body["input"]["prompt"].is_string());
    (
        StatusCode::CREATED,
        Json(json!({"id": "pred-1", "status": "starting", "output": null})),
    )
}

#[tokio::test]
async fn replicate_polls_until_succeeded() {
    async fn poll(
        State(state): State<Arc<PredictionState>>,
        Path(id): Path<String>,
    ) -> Json<Value> {
        let n = state.polls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Json(json!({"id": id, "status": "processing"}))
        } else {
            Json(json!({"id": id, "status": "succeeded", "output": "https://cdn.example.com/out.mp4"}))
        }
    }
    let state = Arc::new(PredictionState::default());
    let app = Router::new()
        .route("/v1/models/:owner/:name/predictions", post(create_prediction))
        .route("/v1/predictions/:id", get(poll))
        .with_state(Arc::clone(&state));
    let base = serve(app).await;

    let mut config = ReplicateConfig::new("r8_test");
    config.api_base = base;
    config.poll_interval = Duration::from_millis(10);
    let video = ReplicateVideo::new(config).unwrap();

    let out = video
        .generate(&VideoRequest::new("a lighthouse at dusk", 5.0))
        .await
        .unwrap();
    assert_eq!(out.url, "https://cdn.example.com/out.mp4");
    assert_eq!(out.prediction_id.as_deref(), Some("pred-1"));
    assert_eq!(state.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn replicate_failure_status_is_reported() {
    async fn poll(Path(id): Path<String>) -> Json<Value> {
        Json(json!({"id": id, "status": "failed", "error": "NSFW content detected"}))
    }
    let app = Router::new()
        .route("/v1/models/:owner/:name/predictions", post(create_prediction))
        .route("/v1/predictions/:id", get(poll));
    let base = serve(app).await;

    let mut config = ReplicateConfig::new("r8_test");
    config.api_base = base;
    config.poll_interval = Duration::from_millis(5);
    let err = ReplicateVideo::new(config)
        .unwrap()
        .generate(&VideoRequest::new("x", 5.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Failed(msg) if msg.contains("NSFW")));
}

#[tokio::test]
async fn replicate_gives_up_after_timeout() {
    async fn poll(Path(id): Path<String>) -> Json<Value> {
        Json(json!({"id": id, "status": "processing"}))
    }
    let app = Router::new()
        .route("/v1/models/:owner/:name/predictions", post(create_prediction))
        .route("/v1/predictions/:id", get(poll));
    let base = serve(app).await;

    let mut config = ReplicateConfig::new("r8_test");
    config.api_base = base;
    config.poll_interval = Duration::from_millis(20);
    config.timeout = Duration::from_millis(200);
    let err = ReplicateVideo::new(config)
        .unwrap()
        .generate(&VideoRequest::new("x", 5.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Timeout { provider: "Replicate", .. }
    ));
}

#[tokio::test]
async fn elevenlabs_speech_returns_audio_bytes() {
    async fn tts(Path(voice): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        if headers.get("xi-api-key").and_then(|v| v.to_str().ok()) != Some("xi-test") {
            return (StatusCode::UNAUTHORIZED, Vec::<u8>::new()).into_response();
        }
        (
            [(header::CONTENT_TYPE, "audio/mpeg")],
            format!("mp3-for-{voice}").into_bytes(),
        )
            .into_response()
    }
    let base = serve(Router::new().route("/v1/text-to-speech/:voice", post(tts))).await;

    let mut config = SpeechConfig::new("xi-test");
    config.api_base = base.clone();
    config.voice_id = "rachel".into();
    let speech = ElevenLabsSpeech::new(config).unwrap();
    let audio = speech
        .synthesize(&SpeechRequest::new("Hello there"))
        .await
        .unwrap();
    assert_eq!(audio.bytes, b"mp3-for-rachel");
    assert_eq!(audio.content_type, "audio/mpeg");

    let mut bad = SpeechConfig::new("xi-wrong");
    bad.api_base = base;
    let err = ElevenLabsSpeech::new(bad)
        .unwrap()
        .synthesize(&SpeechRequest::new("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Authentication(_)));
}

#[tokio::test]
async fn freesound_search_maps_previews() {
    async fn search(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        if params.get("token").map(String::as_str) != Some("fs-test") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token"})));
        }
        if params.get("query").map(String::as_str) == Some("busy") {
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"detail": "throttled"})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "count": 2,
                "results": [
                    {"id": 11, "name": "rain.wav", "duration": 30.0,
                     "previews": {"preview-hq-mp3": "https://f/11-hq.mp3"}, "license": "CC0", "username": "ana"},
                    {"id": 12, "name": "drizzle.wav", "duration": 8.5, "previews": {}}
                ]
            })),
        )
    }
    let base = serve(Router::new().route("/apiv2/search/text/", get(search))).await;

    let mut config = FreesoundConfig::new("fs-test");
    config.api_base = base;
    let freesound = FreesoundSearch::new(config).unwrap();
    let results = freesound.search("rain", 10).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].preview_url.as_deref(), Some("https://f/11-hq.mp3"));
    assert!(results[1].preview_url.is_none());

    let limited = freesound.search("rain", 1).await.unwrap();
    assert_eq!(limited.len(), 1);

    let err = freesound.search("busy", 5).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(_)));
}
