//! Bare-bones WebSocket client for driving the transport over a real socket

use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::BroadcastHub;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) const OPCODE_TEXT: u8 = 0x1;
pub(crate) const OPCODE_CLOSE: u8 = 0x8;

/// Serve `router` on an ephemeral local port
pub(crate) async fn serve_local(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Wait until the hub holds exactly `expected` subscribers
pub(crate) async fn wait_for_subscribers(hub: &BroadcastHub, expected: usize) {
    timeout(READ_TIMEOUT, async {
        while hub.subscriber_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Plain `GET`, returning the whole response as text
pub(crate) async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(READ_TIMEOUT, stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

pub(crate) struct RawClient {
    stream: TcpStream,
}

impl RawClient {
    /// Send an upgrade request for `path`; returns the response head and the client
    pub(crate) async fn connect(addr: SocketAddr, path: &str) -> (String, RawClient) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            timeout(READ_TIMEOUT, stream.read_exact(&mut byte))
                .await
                .unwrap()
                .unwrap();
            head.push(byte[0]);
        }

        (String::from_utf8(head).unwrap(), RawClient { stream })
    }

    /// Next server frame as (opcode, payload). Server frames are never masked.
    pub(crate) async fn next_frame(&mut self) -> (u8, Vec<u8>) {
        timeout(READ_TIMEOUT, read_frame(&mut self.stream))
            .await
            .unwrap()
    }

    /// Next server frame, which must be a JSON text frame
    pub(crate) async fn next_json(&mut self) -> serde_json::Value {
        let (opcode, payload) = self.next_frame().await;
        assert_eq!(opcode, OPCODE_TEXT);
        serde_json::from_slice(&payload).unwrap()
    }
}

async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    let opcode = header[0] & 0x0f;

    let len = match header[1] & 0x7f {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).await.unwrap();
            u16::from_be_bytes(ext) as usize
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).await.unwrap();
            u64::from_be_bytes(ext) as usize
        }
        n => n as usize,
    };

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    (opcode, payload)
}
