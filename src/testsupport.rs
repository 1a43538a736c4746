//! Shared test fixtures for connector and config test modules.
//!
//! Keeping the scripted connector and the one-shot HTTP server here prevents
//! each test module from rebuilding its own fakes.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::connector::{ConnectorConfiguration, HttpConnector, HttpRequest, HttpResponse};
use crate::error::{ConnectorFailure, ServerError};
use crate::lock::Locked;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("payconnect-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// `{"success": true, ...}` response with the given extra fields.
pub fn ok_response(fields: Value) -> HttpResponse {
    let mut value = json!({ "success": true });
    if let (Some(target), Value::Object(extra)) = (value.as_object_mut(), fields) {
        target.extend(extra);
    }
    HttpResponse { status: 200, value }
}

/// Structured server failure with the given status and error type.
pub fn server_failure(status: u16, error_type: &str) -> ConnectorFailure {
    ConnectorFailure::Server {
        error: ServerError {
            error_type: error_type.to_string(),
            message: Some(format!("{error_type} happened")),
            invalid_fields: None,
        },
        status,
    }
}

type Outcome = Result<HttpResponse, ConnectorFailure>;

/// Connector that replays scripted outcomes and records every request.
///
/// Once the script runs out the last outcome repeats.
pub struct ScriptedConnector {
    script: Locked<VecDeque<Outcome>>,
    fallback: Outcome,
    delay: Duration,
    requests: Locked<Vec<HttpRequest>>,
    configurations: Locked<Vec<ConnectorConfiguration>>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Outcome>) -> Self {
        let fallback = script
            .last()
            .cloned()
            .unwrap_or(Err(ConnectorFailure::Internal(None)));
        Self {
            script: Locked::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            requests: Locked::new(Vec::new()),
            configurations: Locked::new(Vec::new()),
        }
    }

    pub fn always(outcome: Outcome) -> Self {
        Self::new(vec![outcome])
    }

    /// Sleep this long inside every call before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.with_lock(|requests| requests.len())
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.snapshot()
    }

    pub fn configurations(&self) -> Vec<ConnectorConfiguration> {
        self.configurations.snapshot()
    }
}

#[async_trait]
impl HttpConnector for ScriptedConnector {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectorFailure> {
        self.requests.with_lock(|requests| requests.push(request.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .with_lock(|script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn replace(&self, configuration: ConnectorConfiguration) {
        self.configurations
            .with_lock(|configurations| configurations.push(configuration));
    }
}

/// Raw HTTP/1.1 response with `Connection: close`.
pub fn http_response(status_line: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serve the given raw responses to consecutive connections, then return
/// the raw requests received.
pub async fn serve_responses(responses: Vec<String>) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut received = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.expect("accept");
            received.push(read_request(&mut stream).await);
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        received
    });
    (addr, server)
}

/// Read one request: headers, then `Content-Length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = stream.read(&mut buf).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Header value from a raw request, matched case-insensitively.
pub fn raw_header<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split("\r\n\r\n").next()?.lines().find_map(|line| {
        let (field, value) = line.split_once(':')?;
        field
            .trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

/// JSON body of a raw request.
pub fn raw_body(raw: &str) -> Option<Value> {
    let (_, body) = raw.split_once("\r\n\r\n")?;
    serde_json::from_str(body).ok()
}
