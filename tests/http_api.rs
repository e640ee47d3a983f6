//! HTTP boundary tests: multipart handling and status mapping.

mod common;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::{EchoProvider, ScriptedProvider};
use flashgen::server::{ErrorResponse, LIVENESS_MESSAGE};
use flashgen::{router, CompletionProvider, ErrorKind, Pipeline, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;

fn server_with(provider: Arc<dyn CompletionProvider>) -> TestServer {
    let pipeline = Pipeline::with_provider(common::config(), provider);
    let app = router(Arc::new(pipeline), &ServerConfig::default());
    TestServer::new(app).expect("Failed to create test server")
}

fn text_part(text: &str) -> Part {
    Part::bytes(bytes::Bytes::from(text.to_string()))
        .file_name("notes.txt")
        .mime_type("text/plain")
}

#[tokio::test]
async fn liveness_route() {
    let server = server_with(Arc::new(EchoProvider));
    let response = server.get("/").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>(), json!({ "message": LIVENESS_MESSAGE }));
}

#[tokio::test]
async fn fenced_reply_becomes_clean_result() {
    let reply = "```json\n{\"flashcards\":[{\"question\":\"What is the capital of France?\",\"answer\":\"Paris\"}]}\n```";
    let server = server_with(Arc::new(ScriptedProvider::always(reply)));

    let form = MultipartForm::new()
        .add_text("mode", "flashcards")
        .add_part("file", text_part("Paris is the capital of France."));
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "result": {
                "flashcards": [{"question": "What is the capital of France?", "answer": "Paris"}]
            }
        })
    );
}

#[tokio::test]
async fn quiz_mode_returns_quiz_key() {
    let reply = r#"Here you go: {"quiz":[{"question":"2+2?","options":["3","4","5","6"],"correct":"4"}]}"#;
    let server = server_with(Arc::new(ScriptedProvider::always(reply)));

    let form = MultipartForm::new()
        .add_part("file", text_part("Arithmetic basics."))
        .add_text("mode", "quiz");
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["result"]["quiz"][0]["correct"], "4");
}

async fn assert_bad_request(form: MultipartForm, needle: &str) {
    let provider = Arc::new(ScriptedProvider::always("{}"));
    let server = server_with(provider.clone());
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    let body: ErrorResponse = response.json();
    assert!(body.error.contains(needle), "{:?} should mention {needle:?}", body.error);
    assert!(!body.recoverable);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn missing_file_is_bad_request() {
    assert_bad_request(MultipartForm::new().add_text("mode", "quiz"), "No file").await;
}

#[tokio::test]
async fn empty_file_part_is_bad_request() {
    let form = MultipartForm::new()
        .add_text("mode", "quiz")
        .add_part("file", Part::bytes(bytes::Bytes::new()).file_name("notes.txt"));
    assert_bad_request(form, "No file").await;
}

#[tokio::test]
async fn missing_mode_is_bad_request() {
    let form = MultipartForm::new().add_part("file", text_part("notes"));
    assert_bad_request(form, "mode").await;
}

#[tokio::test]
async fn unknown_mode_is_bad_request() {
    let form = MultipartForm::new()
        .add_text("mode", "summary")
        .add_part("file", text_part("notes"));
    assert_bad_request(form, "summary").await;
}

#[tokio::test]
async fn whitespace_file_is_bad_request() {
    let form = MultipartForm::new()
        .add_text("mode", "flashcards")
        .add_part("file", text_part(" \n \t "));
    assert_bad_request(form, "No text could be extracted").await;
}

#[tokio::test]
async fn unsupported_type_is_bad_request() {
    let form = MultipartForm::new().add_text("mode", "flashcards").add_part(
        "file",
        Part::bytes(bytes::Bytes::from_static(b"GIF89a"))
            .file_name("cat.gif")
            .mime_type("image/gif"),
    );
    assert_bad_request(form, "image/gif").await;
}

#[tokio::test]
async fn non_multipart_body_is_bad_request() {
    let server = server_with(Arc::new(EchoProvider));
    let response = server.post("/generate").json(&json!({"mode": "quiz"})).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<ErrorResponse>().code, ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn malformed_reply_is_server_error() {
    let server = server_with(Arc::new(ScriptedProvider::always(
        "Sure! Here's your quiz: not valid json",
    )));
    let form = MultipartForm::new()
        .add_text("mode", "quiz")
        .add_part("file", text_part("Photosynthesis converts light to energy."));
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 500);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, ErrorKind::MalformedResponse);
    assert!(body.recoverable);
    assert!(body.error.contains("Sure! Here's your quiz"));
}

#[tokio::test]
async fn schema_mismatch_is_server_error() {
    let server = server_with(Arc::new(ScriptedProvider::always(r#"{"notes": "irrelevant"}"#)));
    let form = MultipartForm::new()
        .add_text("mode", "flashcards")
        .add_part("file", text_part("notes"));
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(response.json::<ErrorResponse>().code, ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn missing_api_key_is_server_error() {
    let pipeline = Pipeline::new(common::config()).unwrap();
    let app = router(Arc::new(pipeline), &ServerConfig::default());
    let server = TestServer::new(app).expect("Failed to create test server");

    let form = MultipartForm::new()
        .add_text("mode", "flashcards")
        .add_part("file", text_part("notes"));
    let response = server.post("/generate").multipart(form).await;

    assert_eq!(response.status_code(), 500);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, ErrorKind::MissingCredential);
    assert!(body.error.contains("OPENROUTER_API_KEY"));
}

#[tokio::test]
async fn allowed_origin_gets_cors_header() {
    let server = server_with(Arc::new(EchoProvider));
    let response = server
        .get("/")
        .add_header("Origin", "http://localhost:5173")
        .await;
    assert_eq!(
        response.header("access-control-allow-origin"),
        "http://localhost:5173"
    );
}
