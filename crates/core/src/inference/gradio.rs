//! Gradio inference client.
//!
//! Speaks the Gradio 4+ HTTP API of a hosted space:
//!
//! 1. `POST /gradio_api/upload` for every file parameter,
//! 2. `POST /gradio_api/call/{api}` with the positional `data` array, which
//!    answers with an `event_id`,
//! 3. `GET /gradio_api/call/{api}/{event_id}`, a server-sent event stream
//!    ending in `complete` (carrying the outputs) or `error`,
//! 4. a download of every file output into `download_dir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::InferenceConfig;
use crate::temp::TempFiles;

use super::error::InferenceError;
use super::traits::InferenceClient;
use super::types::{Param, RemoteCall, RemoteOutput, Session};

/// Upper bound for the `/start_session` call.
const SESSION_TIMEOUT: Duration = Duration::from_secs(120);

const FILE_DATA_TYPE: &str = "gradio.FileData";

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    event_id: String,
}

/// Gradio client implementation.
pub struct GradioClient {
    client: Client,
    config: InferenceConfig,
}

impl GradioClient {
    /// Create a new Gradio client.
    ///
    /// No overall request timeout is set on the HTTP client: each call is
    /// bounded by the per-stage timeout given to [`InferenceClient::predict`].
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn endpoint(api_name: &str) -> &str {
        api_name.trim_start_matches('/')
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.hf_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(InferenceError::ApiError {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }

    fn new_session_hash() -> String {
        Uuid::new_v4().simple().to_string()[..11].to_string()
    }

    /// Upload a local file and return its FileData reference.
    async fn upload_file(&self, path: &Path) -> Result<Value, InferenceError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let form = multipart::Form::new().part(
            "files",
            multipart::Part::bytes(bytes).file_name(file_name.clone()),
        );

        let url = format!("{}/gradio_api/upload", self.base_url());
        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        let server_paths: Vec<String> = response
            .json()
            .await
            .map_err(|e| InferenceError::unexpected_output("upload", e.to_string()))?;
        let server_path = server_paths
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::unexpected_output("upload", "no path returned"))?;

        debug!("Uploaded {} as {}", path.display(), server_path);
        Ok(json!({
            "path": server_path,
            "orig_name": file_name,
            "meta": { "_type": FILE_DATA_TYPE },
        }))
    }

    /// Turn keyword parameters into the positional `data` array.
    async fn encode_params(&self, call: &RemoteCall) -> Result<Vec<Value>, InferenceError> {
        let mut data = Vec::with_capacity(call.params.len());
        for (_, param) in &call.params {
            match param {
                Param::Value(value) => data.push(value.clone()),
                Param::File(path) => data.push(self.upload_file(path).await?),
            }
        }
        Ok(data)
    }

    async fn submit(
        &self,
        session: &Session,
        api_name: &str,
        data: Vec<Value>,
    ) -> Result<String, InferenceError> {
        let url = format!(
            "{}/gradio_api/call/{}",
            self.base_url(),
            Self::endpoint(api_name)
        );
        let response = self
            .authorize(self.client.post(&url))
            .json(&json!({ "data": data, "session_hash": session.hash }))
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::unexpected_output(api_name, e.to_string()))?;
        debug!("{} submitted as event {}", api_name, submitted.event_id);
        Ok(submitted.event_id)
    }

    /// Follow the event stream until the call completes or fails.
    async fn await_result(&self, api_name: &str, event_id: &str) -> Result<Vec<Value>, InferenceError> {
        let url = format!(
            "{}/gradio_api/call/{}/{}",
            self.base_url(),
            Self::endpoint(api_name),
            event_id
        );
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(InferenceError::from_reqwest)?;
            for event in parser.push(&chunk) {
                match event.event.as_str() {
                    "complete" => {
                        return serde_json::from_str::<Vec<Value>>(&event.data).map_err(|e| {
                            InferenceError::unexpected_output(api_name, e.to_string())
                        });
                    }
                    "error" => {
                        return Err(InferenceError::remote(api_name, error_message(&event.data)));
                    }
                    other => debug!("{} event: {}", api_name, other),
                }
            }
        }

        Err(InferenceError::StreamEnded {
            api: api_name.to_string(),
        })
    }

    /// Download one FileData output into the download directory.
    async fn download_file(
        &self,
        session: &Session,
        file: &Value,
        staged: &mut TempFiles,
    ) -> Result<PathBuf, InferenceError> {
        let server_path = file.get("path").and_then(Value::as_str).unwrap_or_default();
        let url = match file.get("url").and_then(Value::as_str) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
            _ => format!("{}/gradio_api/file={}", self.base_url(), server_path),
        };

        let name = file
            .get("orig_name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(server_path);
        let name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output.bin");
        let short_id = Uuid::new_v4().simple().to_string();
        let local = self
            .config
            .download_dir
            .join(format!("{}_{}_{}", session.hash, &short_id[..8], name));

        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        staged.register(&local);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        let mut out = tokio::fs::File::create(&local).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(InferenceError::from_reqwest)?;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        debug!("Saved output {} to {}", url, local.display());
        Ok(local)
    }

    /// Save every file output locally and shape the result.
    async fn save_outputs(
        &self,
        session: &Session,
        values: Vec<Value>,
    ) -> Result<RemoteOutput, InferenceError> {
        let shape = classify_outputs(&values);

        // Files already saved are removed if a later download fails or the
        // call is abandoned on timeout.
        let mut staged = TempFiles::new();
        let output = match shape {
            OutputShape::Empty => RemoteOutput::Empty,
            OutputShape::Single(file) => {
                RemoteOutput::Single(self.download_file(session, file, &mut staged).await?)
            }
            OutputShape::Sequence(files) => {
                let mut paths = Vec::with_capacity(files.len());
                for file in files {
                    paths.push(self.download_file(session, file, &mut staged).await?);
                }
                RemoteOutput::Sequence(paths)
            }
            OutputShape::Record(fields) => {
                let mut saved = Vec::with_capacity(fields.len());
                for (name, file) in fields {
                    saved.push((name, self.download_file(session, file, &mut staged).await?));
                }
                RemoteOutput::Record(saved)
            }
        };

        // Ownership moves to the caller.
        staged.release();
        Ok(output)
    }

    async fn run_call(&self, session: &Session, call: RemoteCall) -> Result<RemoteOutput, InferenceError> {
        let data = self.encode_params(&call).await?;
        let event_id = self.submit(session, &call.api_name, data).await?;
        let values = self.await_result(&call.api_name, &event_id).await?;
        self.save_outputs(session, values).await
    }
}

#[async_trait]
impl InferenceClient for GradioClient {
    fn name(&self) -> &str {
        "gradio"
    }

    async fn start_session(&self) -> Result<Session, InferenceError> {
        let session = Session::new(Self::new_session_hash());
        info!("Starting session {} on {}", session.hash, self.base_url());

        let output = self
            .predict(&session, RemoteCall::start_session(), SESSION_TIMEOUT)
            .await?;
        // `/start_session` has no file outputs; drop any that show up.
        let mut stray = TempFiles::new();
        for path in output.paths() {
            stray.register(path);
        }
        stray.sweep();

        Ok(session)
    }

    async fn predict(
        &self,
        session: &Session,
        call: RemoteCall,
        timeout: Duration,
    ) -> Result<RemoteOutput, InferenceError> {
        let api_name = call.api_name.clone();
        debug!("Calling {} (session {})", api_name, session.hash);

        tokio::time::timeout(timeout, self.run_call(session, call))
            .await
            .map_err(|_| InferenceError::Timeout {
                api: api_name,
                timeout_secs: timeout.as_secs(),
            })?
    }
}

// =============================================================================
// Server-sent events
// =============================================================================

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Incremental parser for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line arrives, so a UTF-8 sequence split
/// across chunks decodes intact.
#[derive(Debug, Default)]
struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk; returns every event completed by it.
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.event.is_some() || !self.data.is_empty() {
                    events.push(SseEvent {
                        event: self.event.take().unwrap_or_else(|| "message".to_string()),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }
}

/// Best-effort human-readable message from an `error` event payload.
fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(message)) => message,
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Ok(Value::Null) | Err(_) if data.trim().is_empty() || data.trim() == "null" => {
            "unknown error".to_string()
        }
        _ => data.to_string(),
    }
}

// =============================================================================
// Output shapes
// =============================================================================

#[derive(Debug, PartialEq)]
enum OutputShape<'a> {
    Empty,
    Single(&'a Value),
    Sequence(Vec<&'a Value>),
    Record(Vec<(String, &'a Value)>),
}

fn is_file_data(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let has_location = object.get("path").is_some_and(Value::is_string)
        || object.get("url").is_some_and(Value::is_string);
    let tagged = object
        .get("meta")
        .and_then(|meta| meta.get("_type"))
        .and_then(Value::as_str)
        == Some(FILE_DATA_TYPE);
    has_location && (tagged || object.contains_key("orig_name") || object.contains_key("url"))
}

/// File outputs of one output component.
fn component_files(value: &Value) -> OutputShape<'_> {
    if is_file_data(value) {
        return OutputShape::Single(value);
    }
    match value {
        Value::Array(items) => {
            OutputShape::Sequence(items.iter().filter(|v| is_file_data(v)).collect())
        }
        Value::Object(fields) => OutputShape::Record(
            fields
                .iter()
                .filter(|(_, v)| is_file_data(v))
                .map(|(name, v)| (name.clone(), v))
                .collect(),
        ),
        _ => OutputShape::Empty,
    }
}

/// Decide the result shape from the `complete` payload.
///
/// A single output component keeps its own shape; several components are
/// flattened into one sequence in output order.
fn classify_outputs(values: &[Value]) -> OutputShape<'_> {
    if let [only] = values {
        return match component_files(only) {
            OutputShape::Sequence(files) if files.is_empty() => OutputShape::Empty,
            OutputShape::Record(fields) if fields.is_empty() => OutputShape::Empty,
            shape => shape,
        };
    }

    let mut files = Vec::new();
    for value in values {
        match component_files(value) {
            OutputShape::Empty => {}
            OutputShape::Single(file) => files.push(file),
            OutputShape::Sequence(items) => files.extend(items),
            OutputShape::Record(fields) => files.extend(fields.into_iter().map(|(_, v)| v)),
        }
    }
    if files.is_empty() {
        OutputShape::Empty
    } else {
        OutputShape::Sequence(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    fn file_data(path: &str) -> Value {
        json!({
            "path": path,
            "url": null,
            "orig_name": null,
            "meta": { "_type": "gradio.FileData" }
        })
    }

    #[test]
    fn test_sse_parser_complete_event() {
        let mut parser = SseParser::default();
        let events = parser.push(b"event: generating\ndata: null\n\nevent: complete\ndata: [1, 2]\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "generating".to_string(),
                    data: "null".to_string()
                },
                SseEvent {
                    event: "complete".to_string(),
                    data: "[1, 2]".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_sse_parser_handles_split_chunks_and_crlf() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: compl").is_empty());
        assert!(parser.push(b"ete\r\ndata: [\"a\"]\r\n").is_empty());
        let events = parser.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "complete");
        assert_eq!(events[0].data, "[\"a\"]");
    }

    #[test]
    fn test_sse_parser_keeps_multibyte_chars_split_across_chunks() {
        let body = "event: complete\ndata: [{\"orig_name\": \"ch\u{e2}teau.glb\"}]\n\n".as_bytes();
        // Split inside the two-byte encoding of the accented character.
        let split = body.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut parser = SseParser::default();
        assert!(parser.push(&body[..split]).is_empty());
        let events = parser.push(&body[split..]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[{\"orig_name\": \"ch\u{e2}teau.glb\"}]");
        assert!(!events[0].data.contains('\u{fffd}'));
    }

    #[test]
    fn test_sse_parser_ignores_comments_and_heartbeats() {
        let mut parser = SseParser::default();
        let events = parser.push(b": keep-alive\n\nevent: heartbeat\ndata: null\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "heartbeat");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message("\"CUDA out of memory\""), "CUDA out of memory");
        assert_eq!(error_message("{\"message\": \"queue full\"}"), "queue full");
        assert_eq!(error_message("null"), "unknown error");
        assert_eq!(error_message(""), "unknown error");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_classify_single_image() {
        let values = vec![file_data("/tmp/gradio/a/image.png")];
        assert_eq!(classify_outputs(&values), OutputShape::Single(&values[0]));
    }

    #[test]
    fn test_classify_video_record() {
        let values = vec![json!({
            "video": file_data("/tmp/gradio/a/sample.mp4"),
            "subtitles": null
        })];
        match classify_outputs(&values) {
            OutputShape::Record(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].0, "video");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_classify_multiple_components_flattened() {
        let values = vec![
            file_data("/tmp/gradio/a/sample.glb"),
            file_data("/tmp/gradio/a/sample_download.glb"),
        ];
        match classify_outputs(&values) {
            OutputShape::Sequence(files) => assert_eq!(files.len(), 2),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_classify_no_files() {
        assert_eq!(classify_outputs(&[]), OutputShape::Empty);
        assert_eq!(classify_outputs(&[json!(null)]), OutputShape::Empty);
        assert_eq!(classify_outputs(&[json!("text"), json!(3)]), OutputShape::Empty);
    }

    #[test]
    fn test_is_file_data() {
        assert!(is_file_data(&file_data("/x.png")));
        assert!(is_file_data(&json!({"path": "/x.png", "url": "http://h/file=/x.png"})));
        assert!(!is_file_data(&json!({"path": "/x.png"})));
        assert!(!is_file_data(&json!("/x.png")));
    }

    // -------------------------------------------------------------------------
    // Fake Gradio server
    // -------------------------------------------------------------------------

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&received).to_string()
    }

    async fn respond(socket: &mut TcpStream, status: &str, content_type: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    }

    /// Minimal space exposing `/preprocess_image` and `/image_to_3d`.
    /// `/image_to_3d` fails remotely.
    async fn spawn_fake_space() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let file_url = format!("{}/gradio_api/file=/tmp/gradio/out/processed.png", base);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let request = read_request(&mut socket).await;
                let request_line = request.lines().next().unwrap_or_default().to_string();

                if request_line.starts_with("POST /gradio_api/upload") {
                    respond(&mut socket, "200 OK", "application/json", "[\"/tmp/gradio/in/cat.png\"]").await;
                } else if request_line.starts_with("POST /gradio_api/call/preprocess_image") {
                    assert!(request.contains("/tmp/gradio/in/cat.png"));
                    assert!(request.contains("\"session_hash\""));
                    respond(&mut socket, "200 OK", "application/json", "{\"event_id\": \"ev1\"}").await;
                } else if request_line.starts_with("GET /gradio_api/call/preprocess_image/ev1") {
                    let body = format!(
                        "event: generating\ndata: null\n\nevent: complete\ndata: [{{\"path\": \"/tmp/gradio/out/processed.png\", \"url\": \"{}\", \"orig_name\": \"processed.png\", \"meta\": {{\"_type\": \"gradio.FileData\"}}}}]\n\n",
                        file_url
                    );
                    respond(&mut socket, "200 OK", "text/event-stream", &body).await;
                } else if request_line.starts_with("GET /gradio_api/file=/tmp/gradio/out/processed.png") {
                    respond(&mut socket, "200 OK", "image/png", "processed-bytes").await;
                } else if request_line.starts_with("POST /gradio_api/call/image_to_3d") {
                    respond(&mut socket, "200 OK", "application/json", "{\"event_id\": \"ev2\"}").await;
                } else if request_line.starts_with("GET /gradio_api/call/image_to_3d/ev2") {
                    respond(&mut socket, "200 OK", "text/event-stream", "event: error\ndata: \"GPU quota exceeded\"\n\n").await;
                } else {
                    respond(&mut socket, "404 Not Found", "text/plain", "not found").await;
                }
            }
        });

        base
    }

    fn client(base: &str, download_dir: &Path) -> GradioClient {
        let mut config = InferenceConfig::new(base);
        config.download_dir = download_dir.to_path_buf();
        GradioClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_predict_uploads_input_and_downloads_output() {
        let base = spawn_fake_space().await;
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("cat.png");
        std::fs::write(&input, b"cat").unwrap();
        let client = client(&base, &dir.path().join("downloads"));
        let session = Session::new("abc123");

        let output = client
            .predict(&session, RemoteCall::preprocess_image(&input), Duration::from_secs(10))
            .await
            .unwrap();

        let path = output.first_path().unwrap();
        assert!(path.starts_with(dir.path().join("downloads")));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("processed.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"processed-bytes");
    }

    #[tokio::test]
    async fn test_predict_remote_error() {
        let base = spawn_fake_space().await;
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("cat.png");
        std::fs::write(&input, b"cat").unwrap();
        let client = client(&base, dir.path());

        let err = client
            .predict(
                &Session::new("abc123"),
                RemoteCall::image_to_3d(&input, &GenerationConfig::default()),
                Duration::from_secs(10),
            )
            .await
            .unwrap_err();

        match err {
            InferenceError::RemoteError { api, message } => {
                assert_eq!(api, "/image_to_3d");
                assert_eq!(message, "GPU quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_predict_times_out() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dir = TempDir::new().unwrap();
        let client = client(&base, dir.path());
        let err = client
            .predict(
                &Session::new("abc123"),
                RemoteCall::extract_glb(&Default::default()),
                Duration::from_millis(200),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceError::Timeout { ref api, .. } if api == "/extract_glb"));
    }
}
