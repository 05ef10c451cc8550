//! Minimal S3 endpoint for exercising the remote backend over HTTP.
//!
//! Objects live in memory keyed by request path (`/{bucket}/{key}`). Every
//! response closes the connection.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

#[derive(Default)]
struct MockState {
    objects: HashMap<String, Bytes>,
    requests: Vec<String>,
    forced_status: Option<u16>,
}

/// Handle to a running mock; the server task is aborted on drop.
pub struct MockS3 {
    pub endpoint: String,
    state: Arc<Mutex<MockState>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockS3 {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock S3 listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let state = Arc::new(Mutex::new(MockState::default()));

        let server_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let state = Arc::clone(&server_state);
                tokio::spawn(async move {
                    let _ = handle(socket, state).await;
                });
            }
        });

        MockS3 {
            endpoint: addr.to_string(),
            state,
            task,
        }
    }

    /// Answer every request with `status` from now on.
    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().forced_status = Some(status);
    }

    pub fn object(&self, path: &str) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    /// `"METHOD /path"` for every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Drop for MockS3 {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(mut socket: TcpStream, state: Arc<Mutex<MockState>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    let response = respond(&state, &method, &path, Bytes::from(body));
    socket.write_all(&response).await?;
    socket.shutdown().await
}

fn respond(state: &Mutex<MockState>, method: &str, path: &str, body: Bytes) -> Vec<u8> {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, path));

    if let Some(status) = state.forced_status {
        return response(status, &[], error_body(status), true);
    }

    match method {
        "PUT" => {
            let etag = format!("\"etag-{}\"", body.len());
            state.objects.insert(path.to_string(), body);
            response(200, &[("ETag", etag)], Bytes::new(), true)
        }
        "GET" | "HEAD" => match state.objects.get(path) {
            Some(object) => {
                let headers = [
                    ("ETag", format!("\"etag-{}\"", object.len())),
                    ("Last-Modified", LAST_MODIFIED.to_string()),
                    ("Content-Type", "application/octet-stream".to_string()),
                ];
                response(200, &headers, object.clone(), method == "GET")
            }
            None => response(404, &[], error_body(404), method == "GET"),
        },
        "DELETE" => {
            state.objects.remove(path);
            response(204, &[], Bytes::new(), false)
        }
        _ => response(405, &[], Bytes::new(), true),
    }
}

fn error_body(status: u16) -> Bytes {
    let code = match status {
        403 => "AccessDenied",
        404 => "NoSuchKey",
        _ => "InternalError",
    };
    Bytes::from(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code></Error>",
        code
    ))
}

fn response(status: u16, headers: &[(&str, String)], body: Bytes, send_body: bool) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };

    let mut out = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", status, reason);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    if status != 204 {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    if send_body {
        bytes.extend_from_slice(&body);
    }
    bytes
}
