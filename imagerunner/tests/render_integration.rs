//! Integration tests for the on-demand render handler.
//!
//! The HTTP client and the transformer are replaced with synthetic
//! implementations at their trait seams, so every terminal branch of the
//! handler's state machine can be forced deliberately.

use imagerunner::fetch::{AsyncHttpClient, FetchError};
use imagerunner::render::{RenderHandler, RenderRequest, MAX_RESPONSE_SIZE};
use imagerunner::store::{JobDescriptor, JobStore};
use imagerunner::transform::{ImageTransformer, TransformError, TransformOp};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// HTTP client serving a scripted sequence of responses; the final entry
/// repeats forever.
struct ScriptedClient {
    responses: Mutex<Vec<Result<Vec<u8>, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<Vec<u8>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        })
    }

    fn always(response: Result<Vec<u8>, FetchError>) -> Arc<Self> {
        Self::new(vec![response])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for ScriptedClient {
    async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses[0].clone()
        }
    }
}

/// Transformer that writes a fixed number of bytes, or fails.
struct FixedOutputTransformer {
    output_size: usize,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FixedOutputTransformer {
    fn of_size(output_size: usize) -> Self {
        Self {
            output_size,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            output_size: 0,
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageTransformer for &FixedOutputTransformer {
    async fn transform(
        &self,
        _source: &Path,
        operations: &[TransformOp],
        _options: &serde_json::Value,
    ) -> Result<(), TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(TransformError::Encode(message.clone()));
        }
        for op in operations {
            if let Some(parent) = op.output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&op.output_path, vec![0u8; self.output_size])?;
        }
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    jobs_dir: PathBuf,
    scratch_dir: PathBuf,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let jobs_dir = dir.path().join("jobs");
    let scratch_dir = dir.path().join("scratch");
    std::fs::create_dir_all(&jobs_dir).unwrap();
    Harness {
        _dir: dir,
        jobs_dir,
        scratch_dir,
    }
}

async fn seed_descriptor(harness: &Harness, file_hash: &str, query_hash: &str) {
    let descriptor = JobDescriptor {
        source_image: format!("image-originals/feed/{file_hash}/d41d8.jpg"),
        plugin_options: serde_json::Value::Null,
        args: json!({"toFormat": "webp", "width": 200}),
    };
    JobStore::new(&harness.jobs_dir)
        .put(file_hash, query_hash, &descriptor)
        .await
        .unwrap();
}

fn handler<'a>(
    harness: &Harness,
    client: Arc<ScriptedClient>,
    transformer: &'a FixedOutputTransformer,
) -> RenderHandler<ScriptedClient, &'a FixedOutputTransformer> {
    RenderHandler::new(
        JobStore::new(&harness.jobs_dir),
        client,
        transformer,
        harness.scratch_dir.clone(),
    )
}

fn request(path: &str) -> RenderRequest {
    RenderRequest::new(format!("https://example.com{path}"))
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_missing_descriptor_is_not_found_without_fetch_or_transform() {
    let harness = harness();
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::of_size(16);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let response = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;

    assert_eq!(response.status_code, 404);
    assert_eq!(response.body, "Not found");
    assert_eq!(client.calls(), 0);
    assert_eq!(transformer.calls(), 0);
}

#[tokio::test]
async fn test_malformed_path_is_not_found() {
    let harness = harness();
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::of_size(16);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    for path in ["/static", "/static/abc123", "/", "/static//q1/x.webp"] {
        let response = handler.handle(&request(path)).await;
        assert_eq!(response.status_code, 404, "path {path:?}");
    }
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_success_round_trip() {
    let harness = harness();
    seed_descriptor(&harness, "abc123", "q1").await;
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::of_size(16);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let response = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type.as_deref(), Some("image/webp"));
    assert!(response.is_base64_encoded);
    assert_eq!(response.decoded_body().unwrap().len(), 16);

    // The original landed in scratch under its store-relative reference.
    let fetched = harness
        .scratch_dir
        .join("image-originals/feed/abc123/d41d8.jpg");
    assert_eq!(std::fs::read(fetched).unwrap(), b"original");
    assert_eq!(client.calls(), 1);
    assert_eq!(transformer.calls(), 1);
}

#[tokio::test]
async fn test_fetch_failure_is_a_retriable_server_error() {
    let harness = harness();
    seed_descriptor(&harness, "abc123", "q1").await;
    let client = ScriptedClient::new(vec![
        Err(FetchError::Status {
            status: 503,
            url: "https://example.com/static/image-originals/feed/abc123/d41d8.jpg".to_string(),
        }),
        Ok(b"original".to_vec()),
    ]);
    let transformer = FixedOutputTransformer::of_size(16);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let first = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;
    assert_eq!(first.status_code, 500);
    assert_eq!(first.content_type.as_deref(), Some("application/json"));
    let detail: serde_json::Value = serde_json::from_str(&first.body).unwrap();
    assert!(detail["error"].as_str().unwrap().contains("503"));
    assert_eq!(transformer.calls(), 0);

    // The failed fetch was evicted, so a retry issues a new request.
    let second = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;
    assert_eq!(second.status_code, 200);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_transform_failure_returns_json_detail() {
    let harness = harness();
    seed_descriptor(&harness, "abc123", "q1").await;
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::failing("encode exploded");
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let response = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;

    assert_eq!(response.status_code, 500);
    assert_eq!(response.content_type.as_deref(), Some("application/json"));
    let detail: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert!(detail["error"].as_str().unwrap().contains("encode exploded"));
    assert!(!response.is_base64_encoded);
}

#[tokio::test]
async fn test_oversize_output_is_withheld() {
    let harness = harness();
    seed_descriptor(&harness, "abc123", "q1").await;
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::of_size(MAX_RESPONSE_SIZE as usize + 1);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let response = handler
        .handle(&request("/static/abc123/q1/photo.webp"))
        .await;

    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("too large"));
    assert!(!response.is_base64_encoded);
    assert!(response.content_type.is_none());
}

#[tokio::test]
async fn test_concurrent_requests_share_one_download() {
    let harness = harness();
    seed_descriptor(&harness, "abc123", "q1").await;
    let client = ScriptedClient::always(Ok(b"original".to_vec()));
    let transformer = FixedOutputTransformer::of_size(16);
    let handler = handler(&harness, Arc::clone(&client), &transformer);

    let request_a = request("/static/abc123/q1/photo.webp");
    let request_b = request("/static/abc123/q1/photo.webp");
    let (first, second) = tokio::join!(handler.handle(&request_a), handler.handle(&request_b));

    assert_eq!(first.status_code, 200);
    assert_eq!(second.status_code, 200);
    assert_eq!(client.calls(), 1);
}
