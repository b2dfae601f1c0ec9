//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    api_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/documents", post(http::http_post_document))
        .route("/api/v1/documents/:id", delete(http::http_delete_document))
        .route("/api/v1/documents/:id/pools", post(http::http_post_pool))
        .route("/api/v1/documents/:id/tests", post(http::http_post_test))
        .route("/api/v1/documents/:id/grades", post(http::http_post_grades))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::tests::{doc, StubGenerator};
    use crate::config::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value as JsonValue};
    use tower::ServiceExt;

    fn app(stub: Arc<StubGenerator>) -> Router {
        api_router(Arc::new(AppState::new(stub, AppConfig::default())))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { JsonValue::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    async fn open(app: &Router) -> String {
        let (status, body) = call(app, "POST", "/api/v1/documents", Some(json!({ "text": doc(2120) }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["targetSize"], 10);
        assert_eq!(body["length"], 2120);
        body["documentId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_generator() {
        let app = app(Arc::new(StubGenerator::new()));
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "generator": "stub", "sessions": 0 }));
    }

    #[tokio::test]
    async fn short_document_is_rejected() {
        let app = app(Arc::new(StubGenerator::new()));
        let (status, body) = call(&app, "POST", "/api/v1/documents", Some(json!({ "text": "tiny" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("too short"));
    }

    #[tokio::test]
    async fn build_pool_then_draw_without_repeats() {
        let stub = Arc::new(StubGenerator::returning(
            (1..=10).map(|i| format!("{i}. Question {i}?\na) yes\nb) no\nDifficulty: Easy")).collect(),
        ));
        let app = app(stub.clone());
        let id = open(&app).await;

        let (status, body) = call(&app, "POST", &format!("/api/v1/documents/{id}/tests"), Some(json!({ "kind": "mcq", "count": 4 }))).await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        for _ in 0..2 {
            let (status, body) = call(&app, "POST", &format!("/api/v1/documents/{id}/pools"), Some(json!({ "kind": "multiple_choice" }))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "kind": "multiple_choice", "size": 10, "unseen": 10 }));
        }
        assert_eq!(stub.call_count(), 1);

        let uri = format!("/api/v1/documents/{id}/tests");
        let (status, first) = call(&app, "POST", &uri, Some(json!({ "kind": "mcq", "count": 6, "allowRepeats": false }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["questions"].as_array().unwrap().len(), 6);
        assert_eq!(first["signals"], json!([]));
        assert_eq!(first["questions"][0]["options"], json!(["a) yes", "b) no"]));
        assert_eq!(first["questions"][0]["difficulty"], "Easy");

        let (_, second) = call(&app, "POST", &uri, Some(json!({ "kind": "mcq", "count": 6 }))).await;
        assert_eq!(second["questions"].as_array().unwrap().len(), 4);
        assert_eq!(second["signals"], json!([{ "signal": "partial_result", "requested": 6, "served": 4 }]));

        let (_, third) = call(&app, "POST", &uri, Some(json!({ "kind": "mcq", "count": 2 }))).await;
        assert_eq!(third["signals"], json!([{ "signal": "set_exhausted_reset" }]));
    }

    #[tokio::test]
    async fn custom_pool_requires_prompt() {
        let app = app(Arc::new(StubGenerator::new()));
        let id = open(&app).await;
        let uri = format!("/api/v1/documents/{id}/pools");

        let (status, _) = call(&app, "POST", &uri, Some(json!({ "kind": "custom" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", &uri, Some(json!({ "kind": "custom", "customPrompt": "True/false questions only" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["size"], 10);

        let (status, _) = call(&app, "POST", &uri, Some(json!({ "kind": "essay" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mixed_test_and_session_teardown() {
        let stub = Arc::new(StubGenerator::new());
        let app = app(stub.clone());
        let id = open(&app).await;

        let (status, body) = call(&app, "POST", &format!("/api/v1/documents/{id}/tests"), Some(json!({ "kind": "mixed", "count": 3, "allowRepeats": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "mixed");
        assert_eq!(body["questions"].as_array().unwrap().len(), 3);
        assert_eq!(stub.call_count(), 2);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/documents/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", &format!("/api/v1/documents/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_generation_is_bad_gateway() {
        let app = app(Arc::new(StubGenerator::returning(vec![])));
        let id = open(&app).await;
        let (status, body) = call(&app, "POST", &format!("/api/v1/documents/{id}/pools"), Some(json!({ "kind": "short_answer" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("no questions"));
    }

    #[tokio::test]
    async fn grades_submitted_answers() {
        let stub = Arc::new(StubGenerator::returning(vec![
            "1. Capital of France?\na) Lyon\nb) Paris".into(),
            "2. Largest planet?\na) Mars\nb) Jupiter".into(),
        ]));
        let app = app(stub.clone());
        let (_, body) = call(&app, "POST", "/api/v1/documents", Some(json!({ "text": doc(424) }))).await;
        let id = body["documentId"].as_str().unwrap().to_string();
        call(&app, "POST", &format!("/api/v1/documents/{id}/pools"), Some(json!({ "kind": "mcq" }))).await;
        let (_, test) = call(&app, "POST", &format!("/api/v1/documents/{id}/tests"), Some(json!({ "kind": "mcq", "count": 2 }))).await;
        assert_eq!(test["kind"], "multiple_choice");

        let answers: Vec<JsonValue> = test["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| json!({ "question": q["text"], "answer": "b" }))
            .collect();
        let uri = format!("/api/v1/documents/{id}/grades");
        let (status, report) = call(&app, "POST", &uri, Some(json!({ "answers": answers }))).await;
        assert_eq!(status, StatusCode::OK, "{report}");
        assert_eq!(report["correct"], 2);
        assert_eq!(report["graded"], 2);
        assert_eq!(report["percent"], 100.0);
        assert_eq!(report["answers"][0]["correctOption"], "b");
        assert_eq!(report["answers"][0]["kind"], "multiple_choice");

        let (status, body) = call(&app, "POST", &uri, Some(json!({ "answers": [{ "question": "Not served?", "answer": "a" }] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Not served?"));
        let (status, _) = call(&app, "POST", &uri, Some(json!({ "answers": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
