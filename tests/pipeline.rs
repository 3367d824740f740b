//! End-to-end tests: HTTP router → document service → index, with a mocked generation runtime.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use documind::api::create_router;
use documind::config::{Config, EmbeddingProvider, GenerationProvider};
use documind::processing::DocumentService;
use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "documind-pipeline-boundary";

fn config(upload_root: &Path, ollama_url: String) -> Config {
    Config {
        embedding_provider: EmbeddingProvider::Hashed,
        generation_provider: GenerationProvider::Ollama,
        embedding_dimension: 64,
        ollama_url,
        temp_upload_dir: upload_root.to_path_buf(),
        chunk_size: 120,
        chunk_overlap: 20,
        ..Config::default()
    }
}

fn router(config: &Config) -> Router {
    let service = DocumentService::new(config.clone()).expect("service");
    create_router(Arc::new(service), config)
}

fn upload_request(uri: &str, files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (filename, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).expect("read_dir").next().is_none()
}

#[tokio::test]
async fn ingest_then_query_returns_grounded_answer() {
    let server = MockServer::start_async().await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("Project Phoenix has a budget of four million dollars.");
            then.status(200).json_body(json!({
                "response": "The budget is four million dollars.",
                "done": true
            }));
        })
        .await;

    let uploads = tempfile::tempdir().expect("tempdir");
    let config = config(uploads.path(), server.base_url());
    let app = router(&config);

    let response = app
        .clone()
        .oneshot(upload_request(
            "/api/v1/ingest",
            &[("phoenix.txt", "Project Phoenix has a budget of four million dollars.")],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let ingest = body_json(response).await;
    assert_eq!(ingest["status"], "success");
    assert_eq!(ingest["embeddings_created"], 1);
    assert_eq!(ingest["total_embeddings"], 1);
    assert!(uploads.path().exists());
    assert!(is_empty_dir(uploads.path()), "upload survived the request");

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/v1/query",
            json!({"query": "What is the budget of Project Phoenix?", "cite": true}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let answer = body_json(response).await;
    generate.assert_async().await;
    assert_eq!(answer["answer"], "The budget is four million dollars.");
    assert_eq!(
        answer["cited_answer"],
        "The budget is four million dollars.\n\n*(Source: phoenix.txt · Page N/A)*"
    );
    assert_eq!(answer["sources"], json!([{"source": "phoenix.txt", "page": null}]));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let health = body_json(response).await;
    assert_eq!(health["index"]["vectors"], 1);
    assert_eq!(health["index"]["dimension"], 64);
}

#[tokio::test]
async fn failed_ingest_leaves_transient_directory_empty() {
    let server = MockServer::start_async().await;
    let uploads = tempfile::tempdir().expect("tempdir");
    let config = Config {
        pdftotext_bin: "definitely-not-a-real-pdftotext".into(),
        ..config(uploads.path(), server.base_url())
    };
    let app = router(&config);

    let response = app
        .oneshot(upload_request("/api/v1/ingest", &[("report.pdf", "%PDF-1.4 not really")]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(response).await;
    assert!(error["detail"].as_str().expect("detail").contains("pdftotext"));
    assert!(uploads.path().exists());
    assert!(is_empty_dir(uploads.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_pdf_is_a_client_error() {
    let server = MockServer::start_async().await;
    let uploads = tempfile::tempdir().expect("tempdir");
    let config = Config {
        pdftotext_bin: "false".into(),
        ..config(uploads.path(), server.base_url())
    };
    let app = router(&config);

    let response = app
        .oneshot(upload_request("/api/v1/ingest", &[("broken.pdf", "not a pdf at all")]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(is_empty_dir(uploads.path()));
}

#[tokio::test]
async fn query_before_ingest_is_rejected_without_provider_calls() {
    let server = MockServer::start_async().await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(json!({"response": "unused", "done": true}));
        })
        .await;
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = router(&config(uploads.path(), server.base_url()));

    let response = app
        .oneshot(json_request("/api/v1/query", json!({"query": "Anything?"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["detail"],
        "No documents have been indexed yet"
    );
    generate.assert_hits_async(0).await;
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(503).body("model loading");
        })
        .await;
    let uploads = tempfile::tempdir().expect("tempdir");
    let app = router(&config(uploads.path(), server.base_url()));

    let response = app
        .clone()
        .oneshot(upload_request("/api/v1/ingest", &[("a.txt", "Some indexed text.")]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request("/api/v1/query", json!({"query": "What text?"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let detail = body_json(response).await["detail"]
        .as_str()
        .expect("detail")
        .to_string();
    assert!(detail.contains("503"), "unexpected detail: {detail}");
}

#[tokio::test]
async fn multi_document_session_answers_per_document() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("alpha.txt");
            then.status(200)
                .json_body(json!({"response": "Alpha grew.", "done": true}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("beta.txt");
            then.status(200)
                .json_body(json!({"response": "Beta shrank.", "done": true}));
        })
        .await;

    let uploads = tempfile::tempdir().expect("tempdir");
    let app = router(&config(uploads.path(), server.base_url()));

    let response = app
        .clone()
        .oneshot(json_request("/api/v1/sessions", json!({"mode": "multi"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .expect("session id")
        .to_string();

    let response = app
        .clone()
        .oneshot(upload_request(
            &format!("/api/v1/sessions/{session_id}/documents"),
            &[
                ("alpha.txt", "Alpha revenue grew by ten percent."),
                ("beta.txt", "Beta revenue shrank by five percent."),
            ],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["documents"].as_array().expect("docs").len(), 2);
    assert!(is_empty_dir(uploads.path()));

    let response = app
        .clone()
        .oneshot(json_request(
            &format!("/api/v1/sessions/{session_id}/query"),
            json!({"query": "How did revenue change?"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let answers = body_json(response).await["answers"].clone();
    assert_eq!(answers[0]["document"], "alpha.txt");
    assert_eq!(
        answers[0]["cited_answer"],
        "Alpha grew.\n\n*(Source: alpha.txt · Page N/A)*"
    );
    assert_eq!(answers[1]["document"], "beta.txt");
    assert_eq!(answers[1]["answer"], "Beta shrank.");

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/v1/sessions/{session_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(json_request(
            &format!("/api/v1/sessions/{session_id}/query"),
            json!({"query": "Still there?"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
