//! Common Test Infrastructure
//!
//! Provides a stateful fake upload server on top of wiremock. It stores
//! chunks per file id, answers status queries from that store, and
//! assembles files on completion. Individual chunk numbers or the
//! completion step can be made to fail.

#![allow(dead_code)]

use chunked_uploadr::client::{HttpTransport, HttpTransportConfig};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path prefix the fake server mounts its endpoints under
pub const UPLOAD_PREFIX: &str = "/upload";

#[derive(Debug, Default)]
pub struct ServerState {
    /// file id -> chunk number -> bytes
    pub chunks: HashMap<String, BTreeMap<u32, Vec<u8>>>,
    /// file name -> assembled bytes
    pub assembled: HashMap<String, Vec<u8>>,
    /// Chunk numbers the check endpoint rejects with 500
    pub failing_chunks: HashSet<u32>,
    /// Reject completion with 500
    pub fail_complete: bool,
    /// Every accepted chunk number, in arrival order
    pub received: Vec<u32>,
    pub status_calls: usize,
    pub complete_calls: usize,
}

/// Handle to a running fake upload server
pub struct FakeUploadServer {
    pub server: MockServer,
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeUploadServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(ServerState::default()));

        Mock::given(method("GET"))
            .and(path(format!("{}/status", UPLOAD_PREFIX)))
            .respond_with(StatusResponder(Arc::clone(&state)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/check", UPLOAD_PREFIX)))
            .respond_with(ChunkResponder(Arc::clone(&state)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/complete", UPLOAD_PREFIX)))
            .respond_with(CompleteResponder(Arc::clone(&state)))
            .mount(&server)
            .await;

        Self { server, state }
    }

    pub fn base_url(&self) -> String {
        format!("{}{}", self.server.uri(), UPLOAD_PREFIX)
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            base_url: self.base_url(),
            timeout: Some(Duration::from_secs(5)),
        })
        .expect("valid fake server url")
    }

    /// Pretend chunks already arrived in an earlier attempt
    pub fn seed_chunks(&self, file_id: &str, chunks: impl IntoIterator<Item = (u32, Vec<u8>)>) {
        let mut state = self.state.lock();
        let stored = state.chunks.entry(file_id.to_string()).or_default();
        for (number, bytes) in chunks {
            stored.insert(number, bytes);
        }
    }

    pub fn fail_chunk(&self, chunk_number: u32) {
        self.state.lock().failing_chunks.insert(chunk_number);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_chunks.clear();
        state.fail_complete = false;
    }

    pub fn fail_completion(&self) {
        self.state.lock().fail_complete = true;
    }

    pub fn stored_chunks(&self, file_id: &str) -> Vec<u32> {
        self.state
            .lock()
            .chunks
            .get(file_id)
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn assembled(&self, file_name: &str) -> Option<Vec<u8>> {
        self.state.lock().assembled.get(file_name).cloned()
    }

    pub fn received(&self) -> Vec<u32> {
        self.state.lock().received.clone()
    }
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Extract the first part's payload from a multipart/form-data body
pub fn multipart_payload(request: &Request) -> Option<Vec<u8>> {
    let content_type = header(request, "content-type")?;
    let boundary = content_type.split("boundary=").nth(1)?.trim_matches('"');

    let body = &request.body;
    let opening = format!("--{}", boundary);
    let start = find(body, opening.as_bytes())?;
    let headers_end = start + find(&body[start..], b"\r\n\r\n")? + 4;

    let closing = format!("\r\n--{}", boundary);
    let end = headers_end + find(&body[headers_end..], closing.as_bytes())?;
    Some(body[headers_end..end].to_vec())
}

struct StatusResponder(Arc<Mutex<ServerState>>);

impl Respond for StatusResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.0.lock();
        state.status_calls += 1;

        let Some(file_id) = header(request, "x-file-id") else {
            return ResponseTemplate::new(400).set_body_string("missing X-File-Id");
        };

        // An unknown file reports null, not an empty list
        let uploaded = state
            .chunks
            .get(&file_id)
            .map(|c| serde_json::json!(c.keys().collect::<Vec<_>>()))
            .unwrap_or(serde_json::Value::Null);

        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "uploaded": uploaded }))
    }
}

struct ChunkResponder(Arc<Mutex<ServerState>>);

impl Respond for ChunkResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let file_id = header(request, "x-file-id");
        let chunk_number = header(request, "x-chunk-number").and_then(|v| v.parse::<u32>().ok());
        let (Some(file_id), Some(chunk_number)) = (file_id, chunk_number) else {
            return ResponseTemplate::new(400).set_body_string("missing chunk headers");
        };

        let mut state = self.0.lock();
        if state.failing_chunks.contains(&chunk_number) {
            return ResponseTemplate::new(500).set_body_string("disk full");
        }

        let Some(payload) = multipart_payload(request) else {
            return ResponseTemplate::new(400).set_body_string("no file part");
        };

        state
            .chunks
            .entry(file_id)
            .or_default()
            .insert(chunk_number, payload);
        state.received.push(chunk_number);

        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message": "chunk received" }))
    }
}

struct CompleteResponder(Arc<Mutex<ServerState>>);

impl Respond for CompleteResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.0.lock();
        state.complete_calls += 1;

        if state.fail_complete {
            return ResponseTemplate::new(500).set_body_string("merge failed");
        }

        let file_id = header(request, "x-file-id").unwrap_or_default();
        let file_name = header(request, "x-file-name")
            .and_then(|n| {
                percent_encoding::percent_decode_str(&n)
                    .decode_utf8()
                    .ok()
                    .map(|s| s.into_owned())
            })
            .unwrap_or_default();
        let total: i64 = header(request, "x-total-chunks")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        if total <= 0 {
            return ResponseTemplate::new(400).set_body_string("invalid total chunks");
        }

        let Some(chunks) = state.chunks.get(&file_id) else {
            return ResponseTemplate::new(400).set_body_string("chunks count mismatch");
        };
        if chunks.len() as i64 != total {
            return ResponseTemplate::new(400).set_body_string("chunks count mismatch");
        }

        let assembled: Vec<u8> = chunks.values().flatten().copied().collect();
        state.assembled.insert(file_name.clone(), assembled);

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "file merged",
            "path": format!("uploads/{}", file_name),
        }))
    }
}
