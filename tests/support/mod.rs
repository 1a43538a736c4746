//! Local HTTP/1.1 fixtures shared by the integration tests.

use serde_json::Value;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub enum Reply {
    Respond(String),
    /// Close the connection without answering.
    Drop,
}

impl Reply {
    pub fn json(status_line: &str, body: &Value) -> Self {
        let body = body.to_string();
        Self::Respond(format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    pub async fn send(self, mut stream: TcpStream) {
        match self {
            Self::Respond(response) => {
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            Self::Drop => drop(stream),
        }
    }
}

/// Read one request: headers, then `Content-Length` bytes of body.
pub async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = stream.read(&mut buf).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        let text = String::from_utf8_lossy(&data).into_owned();
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = header(&text, "content-length")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Answer consecutive connections with `replies`, then return the raw
/// requests received.
pub async fn serve(replies: Vec<Reply>) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut received = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().await.expect("accept");
            received.push(read_request(&mut stream).await);
            reply.send(stream).await;
        }
        received
    });
    (addr, server)
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Header value from a raw request, matched case-insensitively.
pub fn header<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split("\r\n\r\n").next()?.lines().find_map(|line| {
        let (field, value) = line.split_once(':')?;
        field.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}
