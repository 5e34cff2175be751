//! End-to-end tests for the docintel HTTP API.
//!
//! Both providers are replaced by small axum servers bound to `127.0.0.1:0`,
//! so these tests exercise the real router, the real multipart OCR client and
//! the real chat-completions client without touching the network.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use docintel::{router, DocumentProcessor, ProcessorConfig, ServerConfig};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

const OCR_KEY: &str = "K-test-ocr";
const LLM_KEY: &str = "sk-test-llm";
const INVOICE_TEXT: &str = "INVOICE #123 Total: $50.00 Acme Corp";

// ── Fake OCR provider ────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct OcrCall {
    fields: Vec<(String, String)>,
    file_name: Option<String>,
    file_bytes: Vec<u8>,
}

struct FakeOcr {
    reply: Value,
    delay: Duration,
    calls: Mutex<Vec<OcrCall>>,
}

async fn fake_ocr_handler(
    State(state): State<Arc<FakeOcr>>,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut call = OcrCall::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            call.file_name = field.file_name().map(str::to_string);
            call.file_bytes = field.bytes().await.unwrap().to_vec();
        } else {
            call.fields.push((name, field.text().await.unwrap()));
        }
    }
    state.calls.lock().unwrap().push(call);
    tokio::time::sleep(state.delay).await;
    Json(state.reply.clone())
}

fn ocr_ok(text: &str) -> Value {
    json!({
        "ParsedResults": [{"ParsedText": text, "FileParseExitCode": 1}],
        "OCRExitCode": 1,
        "IsErroredOnProcessing": false,
        "ProcessingTimeInMilliseconds": "312"
    })
}

fn ocr_failed() -> Value {
    json!({
        "ParsedResults": null,
        "OCRExitCode": 99,
        "IsErroredOnProcessing": true,
        "ErrorMessage": ["Unable to recognize the file type", "E216:Unable to detect the file extension"]
    })
}

// ── Fake LLM provider ────────────────────────────────────────────────────────

struct FakeLlm {
    status: StatusCode,
    reply: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Option<String>, Value)>>,
}

async fn fake_llm_handler(
    State(state): State<Arc<FakeLlm>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push((auth, body));

    if !state.status.is_success() {
        return (
            state.status,
            Json(json!({"error": {"message": "Incorrect API key provided"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": state.reply},
                "finish_reason": "stop"
            }]
        })),
    )
}

// ── Harness ──────────────────────────────────────────────────────────────────

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Harness {
    base: String,
    ocr: Arc<FakeOcr>,
    llm: Arc<FakeLlm>,
    upload_dir: TempDir,
    client: reqwest::Client,
}

struct Setup {
    ocr_reply: Value,
    ocr_delay: Duration,
    ocr_timeout_secs: u64,
    llm_status: StatusCode,
    llm_reply: String,
    max_upload_bytes: usize,
    static_dir: Option<std::path::PathBuf>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            ocr_reply: ocr_ok(INVOICE_TEXT),
            ocr_delay: Duration::ZERO,
            ocr_timeout_secs: 10,
            llm_status: StatusCode::OK,
            llm_reply: "{}".into(),
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
            static_dir: None,
        }
    }
}

async fn harness(setup: Setup) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("docintel=debug")
        .with_test_writer()
        .try_init();

    let ocr = Arc::new(FakeOcr {
        reply: setup.ocr_reply,
        delay: setup.ocr_delay,
        calls: Mutex::new(Vec::new()),
    });
    let ocr_addr = spawn(
        Router::new()
            .route("/parse/image", post(fake_ocr_handler))
            .with_state(ocr.clone()),
    )
    .await;

    let llm = Arc::new(FakeLlm {
        status: setup.llm_status,
        reply: setup.llm_reply,
        calls: AtomicUsize::new(0),
        requests: Mutex::new(Vec::new()),
    });
    let llm_addr = spawn(
        Router::new()
            .route("/v1/chat/completions", post(fake_llm_handler))
            .with_state(llm.clone()),
    )
    .await;

    let config = ProcessorConfig::builder()
        .ocr_api_key(OCR_KEY)
        .ocr_endpoint(format!("http://{ocr_addr}/parse/image"))
        .ocr_timeout_secs(setup.ocr_timeout_secs)
        .llm_api_key(LLM_KEY)
        .llm_base_url(format!("http://{llm_addr}/v1"))
        .llm_timeout_secs(10)
        .build()
        .unwrap();
    let processor = DocumentProcessor::from_config(&config).unwrap();

    let upload_dir = tempfile::tempdir().unwrap();
    let server = ServerConfig {
        upload_dir: upload_dir.path().join("uploads"),
        static_dir: setup.static_dir,
        max_upload_bytes: setup.max_upload_bytes,
    };
    let app_addr = spawn(router(processor, &server)).await;

    Harness {
        base: format!("http://{app_addr}"),
        ocr,
        llm,
        upload_dir,
        client: reqwest::Client::new(),
    }
}

impl Harness {
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let form = Form::new().part(
            "file",
            Part::bytes(bytes.to_vec())
                .file_name(file_name.to_string())
                .mime_str("image/png")
                .unwrap(),
        );
        self.post_form("/upload-document/", form).await
    }

    async fn post_form(&self, path: &str, form: Form) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    fn llm_calls(&self) -> usize {
        self.llm.calls.load(Ordering::SeqCst)
    }
}

fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_liveness() {
    let h = harness(Setup::default()).await;
    let body: Value = h
        .client
        .get(format!("{}/", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"message": "Document Intelligence System is running!"}));
}

#[tokio::test]
async fn invoice_is_extracted_end_to_end() {
    let h = harness(Setup {
        llm_reply: json!({
            "document_type": "invoice",
            "company_name": "Acme Corp",
            "total_amount": "$50.00"
        })
        .to_string(),
        ..Default::default()
    })
    .await;

    let (status, body) = h.upload("invoice.png", b"\x89PNG fake image").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["file_name"], "invoice.png");
    assert_eq!(data["raw_text"], INVOICE_TEXT);
    assert_eq!(data["processing_status"], "success");
    assert_eq!(data["extracted_data"]["document_type"], "invoice");
    assert_eq!(data["extracted_data"]["company_name"], "Acme Corp");
    assert_eq!(data["extracted_data"]["total_amount"], "$50.00");
    // Keys the model left out are present as null.
    assert_eq!(data["extracted_data"]["emails"], Value::Null);
    assert!(data["extracted_data"].as_object().unwrap().contains_key("confidence_score"));
}

#[tokio::test]
async fn ocr_request_matches_wire_contract() {
    let h = harness(Setup::default()).await;
    h.upload("scan.png", b"image-bytes").await;

    let calls = h.ocr.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    let field = |name: &str| {
        call.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(field("apikey"), Some(OCR_KEY));
    assert_eq!(field("language"), Some("eng"));
    assert_eq!(field("isOverlayRequired"), Some("false"));
    assert_eq!(call.file_name.as_deref(), Some("scan.png"));
    assert_eq!(call.file_bytes, b"image-bytes");
}

#[tokio::test]
async fn llm_request_matches_wire_contract() {
    let h = harness(Setup::default()).await;
    h.upload("scan.png", b"img").await;

    let requests = h.llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some(format!("Bearer {LLM_KEY}").as_str()));
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["temperature"], 0.0);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    let content = messages[0]["content"].as_str().unwrap();
    assert!(content.contains(INVOICE_TEXT));
    assert!(content.contains("Return only valid JSON"));
}

#[tokio::test]
async fn ocr_error_flag_returns_500_and_skips_model() {
    let h = harness(Setup {
        ocr_reply: ocr_failed(),
        ..Default::default()
    })
    .await;

    let (status, body) = h.upload("broken.png", b"???").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "OCR processing failed"}));
    assert_eq!(h.llm_calls(), 0);
}

#[tokio::test]
async fn non_json_reply_returns_degraded_record() {
    let h = harness(Setup {
        ocr_reply: ocr_ok("Faded receipt text"),
        llm_reply: "not json".into(),
        ..Default::default()
    })
    .await;

    let (status, body) = h.upload("receipt.jpg", b"jpeg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processing_status"], "success");
    assert_eq!(
        body["data"]["extracted_data"],
        json!({
            "document_type": "unknown",
            "raw_text": "Faded receipt text",
            "error": "Could not parse AI response"
        })
    );
}

#[tokio::test]
async fn model_auth_failure_returns_500() {
    let h = harness(Setup {
        llm_status: StatusCode::UNAUTHORIZED,
        ..Default::default()
    })
    .await;

    let (status, body) = h.upload("a.png", b"a").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("Authentication error"), "detail: {detail}");
    assert!(!detail.contains(LLM_KEY));
}

#[tokio::test]
async fn ocr_timeout_returns_500() {
    let h = harness(Setup {
        ocr_delay: Duration::from_secs(3),
        ocr_timeout_secs: 1,
        ..Default::default()
    })
    .await;

    let (status, body) = h.upload("slow.png", b"s").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("timed out"));
    assert_eq!(h.llm_calls(), 0);
}

#[tokio::test]
async fn missing_file_field_is_422() {
    let h = harness(Setup::default()).await;
    let form = Form::new().text("note", "no file here");
    let (status, body) = h.post_form("/upload-document/", form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("'file'"));
    assert!(h.ocr.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let h = harness(Setup {
        max_upload_bytes: 256,
        ..Default::default()
    })
    .await;
    let (status, _) = h.upload("big.png", &[0u8; 4096]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn route_without_trailing_slash() {
    let h = harness(Setup::default()).await;
    let form = Form::new().part("file", Part::bytes(b"x".to_vec()).file_name("x.png"));
    let (status, _) = h.post_form("/upload-document", form).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn staged_uploads_are_removed() {
    let h = harness(Setup::default()).await;
    let uploads = h.upload_dir.path().join("uploads");

    let (status, _) = h.upload("one.png", b"1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(uploads.is_dir(), "upload dir should be created on demand");
    assert!(dir_is_empty(&uploads));

    // Failed requests clean up too.
    let h = harness(Setup {
        ocr_reply: ocr_failed(),
        ..Default::default()
    })
    .await;
    h.upload("two.png", b"2").await;
    assert!(dir_is_empty(&h.upload_dir.path().join("uploads")));
}

#[tokio::test]
async fn traversal_filename_is_reduced_to_base_name() {
    let h = harness(Setup::default()).await;
    let (status, body) = h.upload("../../etc/evil.png", b"e").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["file_name"], "evil.png");
}

#[tokio::test]
async fn long_filename_is_processed() {
    let h = harness(Setup::default()).await;
    let name = format!("{}.png", "a".repeat(250));
    let (status, body) = h.upload(&name, b"long").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["data"]["file_name"], name.as_str());
    assert!(dir_is_empty(&h.upload_dir.path().join("uploads")));
}

#[tokio::test]
async fn repeated_uploads_give_identical_results() {
    let h = harness(Setup {
        llm_reply: r#"{"document_type":"receipt","items":["coffee"]}"#.into(),
        ..Default::default()
    })
    .await;
    let (_, first) = h.upload("r.png", b"r").await;
    let (_, second) = h.upload("r.png", b"r").await;
    assert_eq!(first["data"], second["data"]);
    assert_eq!(h.llm_calls(), 2);
}

#[tokio::test]
async fn static_frontend_is_served() {
    let frontend = tempfile::tempdir().unwrap();
    std::fs::write(frontend.path().join("index.html"), "<h1>upload</h1>").unwrap();

    let h = harness(Setup {
        static_dir: Some(frontend.path().to_path_buf()),
        ..Default::default()
    })
    .await;
    let resp = h
        .client
        .get(format!("{}/static/index.html", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "<h1>upload</h1>");
}
