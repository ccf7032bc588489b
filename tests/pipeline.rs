//! End-to-end tests of ingestion, asking and the HTTP API, wired in-process
//! with a text-file extractor, the hashing embedder and a canned generator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use docqa::config::Config;
use docqa::extract::{Extractor, TextExtraction};
use docqa::server::{router, AppState};
use docqa::state::AppContext;
use docqa_core::embedding::HashingEmbedder;
use docqa_core::generation::Generator;
use docqa_core::store::memory::InMemoryStore;

/// Reads the "PDF" as UTF-8; form feeds separate pages.
struct TextPages;

impl TextExtraction for TextPages {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract_pages(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let text = std::fs::read_to_string(path)?;
        Ok(text.split('\u{c}').map(str::to_string).collect())
    }
}

struct Canned(&'static str);

#[async_trait]
impl Generator for Canned {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

const MODULE_X: &str = "Module X is assessed by a written coursework portfolio.";
const MODULE_X_URL: &str = "https://x.example/module-x";

fn setup(answer: &'static str) -> (TempDir, Arc<AppContext>) {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("pdfs");
    std::fs::create_dir_all(&docs).unwrap();

    let mut config = Config::default();
    config.paths.documents_dir = docs.clone();
    config.paths.db = tmp.path().join("index.sqlite");
    config.paths.sources = tmp.path().join("links.json");

    std::fs::write(docs.join("Module X.pdf"), MODULE_X).unwrap();
    std::fs::write(
        docs.join("Module Y.pdf"),
        "Module Y covers laboratory safety training for new starters.\u{c}Practical sessions run weekly in the teaching laboratory.",
    )
    .unwrap();

    let ctx = AppContext::from_parts(
        config,
        Arc::new(InMemoryStore::new()),
        Arc::new(HashingEmbedder::new(1024)),
        Arc::new(Canned(answer)),
        Arc::new(Extractor::new(vec![Box::new(TextPages)], 50)),
    );
    ctx.sources.set("Module X.pdf", MODULE_X_URL).unwrap();
    (tmp, Arc::new(ctx))
}

#[tokio::test]
async fn test_ask_links_citation_to_source_url() {
    let (_tmp, ctx) = setup("It is assessed by coursework [1].");
    let report = ctx.indexer.rebuild_all().await.unwrap();
    assert_eq!(report.documents_indexed, 2);
    ctx.reload().await.unwrap();

    let answer = ctx.ask("How is it assessed?", Some(1)).await.unwrap();
    assert_eq!(
        answer.answer_text,
        format!("It is assessed by coursework [[1]]({}).", MODULE_X_URL)
    );
    assert_eq!(answer.citations.len(), 1);
    let c = &answer.citations[0];
    assert_eq!(c.n, 1);
    assert_eq!(c.url, MODULE_X_URL);
    assert_eq!(c.module, "Module X");
    assert_eq!(c.page, 1);
    assert!(c.excerpt.contains("assessed"));
}

#[tokio::test]
async fn test_uncited_document_never_gets_a_number() {
    let (_tmp, ctx) = setup("Safety training is covered [1].");
    ctx.indexer.rebuild_all().await.unwrap();
    ctx.reload().await.unwrap();

    let answer = ctx.ask("laboratory safety training", Some(4)).await.unwrap();
    // Module Y has no URL mapping, so at most Module X is numbered.
    assert!(answer.citations.len() <= 1);
    for c in &answer.citations {
        assert_eq!(c.url, MODULE_X_URL);
    }
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (_tmp, ctx) = setup("ok");
    let first = ctx.indexer.rebuild_all().await.unwrap();
    let docs_first = ctx.indexer.documents().await.unwrap();

    let second = ctx.indexer.rebuild_all().await.unwrap();
    let docs_second = ctx.indexer.documents().await.unwrap();

    assert_eq!(first.chunks, second.chunks);
    assert_eq!(docs_first, docs_second);
    assert_eq!(second.removed_chunks, first.chunks);
}

#[tokio::test]
async fn test_add_then_delete_restores_index() {
    let (tmp, ctx) = setup("ok");
    ctx.indexer.rebuild_all().await.unwrap();
    let before = ctx.indexer.documents().await.unwrap();

    let extra = tmp.path().join("Module Z.pdf");
    std::fs::write(&extra, "Module Z is an optional seminar series on green chemistry.").unwrap();
    let added = ctx.indexer.add_document(&extra).await.unwrap();
    assert_eq!(added.document_id, "Module Z.pdf");
    assert_eq!(ctx.indexer.documents().await.unwrap().len(), before.len() + 1);

    let deleted = ctx.indexer.delete_document("Module Z.pdf").await.unwrap();
    assert_eq!(deleted.removed_chunks, added.chunks);
    assert_eq!(ctx.indexer.documents().await.unwrap(), before);
}

#[tokio::test]
async fn test_ask_before_reload_is_unavailable() {
    let (_tmp, ctx) = setup("ok");
    let err = ctx.ask("How is it assessed?", None).await.unwrap_err();
    assert!(matches!(
        docqa::error::find_qa_error(&err),
        Some(docqa::error::QaError::IndexUnavailable(_))
    ));
}

// ============ HTTP ============

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_unloaded_index() {
    let (_tmp, ctx) = setup("ok");
    let app = router(AppState::new(ctx));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["index_loaded"], false);
    assert_eq!(body["chunks"], 0);
}

#[tokio::test]
async fn test_ask_rejects_empty_question() {
    let (_tmp, ctx) = setup("ok");
    let app = router(AppState::new(ctx));

    let response = app
        .oneshot(json_request("POST", "/ask", serde_json::json!({ "question": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_ask_without_index_is_503() {
    let (_tmp, ctx) = setup("ok");
    let app = router(AppState::new(ctx));

    let response = app
        .oneshot(json_request(
            "POST",
            "/ask",
            serde_json::json!({ "question": "How is it assessed?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "index_unavailable");
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let (_tmp, ctx) = setup("ok");
    let app = router(AppState::new(ctx));

    let response = app.oneshot(get("/jobs/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rebuild_job_then_ask_over_http() {
    let (_tmp, ctx) = setup("It is assessed by coursework [1].");
    let app = router(AppState::new(ctx));

    let response = app
        .clone()
        .oneshot(json_request("POST", "/rebuild", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut state = String::new();
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(get(&format!("/jobs/{}", job_id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        state = body["status"]["state"].as_str().unwrap().to_string();
        if state == "succeeded" || state == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state, "succeeded");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/ask",
            serde_json::json!({ "question": "How is it assessed?", "k": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["answer_text"]
        .as_str()
        .unwrap()
        .contains(&format!("[[1]]({})", MODULE_X_URL)));
    assert_eq!(body["citations"][0]["module"], "Module X");

    let response = app.oneshot(get("/documents")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["documents"].as_array().unwrap().len(), 2);
}
