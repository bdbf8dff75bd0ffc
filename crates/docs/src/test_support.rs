use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

/// Serve a single canned HTTP response and hand back what the client sent.
pub async fn one_shot_server(
    status_line: &'static str,
    response_body: &'static str,
) -> (SocketAddr, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
    let address = listener.local_addr().expect("stub address");

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        answer(socket, status_line, response_body).await
    });

    (address, handle)
}

/// Answer successive connections with `responses`, in order.
pub async fn scripted_server(
    responses: Vec<(&'static str, &'static str)>,
) -> (SocketAddr, JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
    let address = listener.local_addr().expect("stub address");

    let handle = tokio::spawn(async move {
        let mut captured = Vec::with_capacity(responses.len());
        for (status_line, response_body) in responses {
            let (socket, _) = listener.accept().await.expect("accept");
            captured.push(answer(socket, status_line, response_body).await);
        }
        captured
    });

    (address, handle)
}

/// Accept one connection and never answer it.
pub async fn silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
    let address = listener.local_addr().expect("stub address");
    let handle = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    });
    (address, handle)
}

async fn answer(
    mut socket: TcpStream,
    status_line: &str,
    response_body: &str,
) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        let read = socket.read(&mut chunk).await.expect("read request");
        assert!(read > 0, "client closed before sending headers");
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find(&buffer, b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0_usize);
    while buffer.len() < header_end + content_length {
        let read = socket.read(&mut chunk).await.expect("read body");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body = String::from_utf8_lossy(&buffer[header_end..]).into_owned();

    let response = format!(
        "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response_body}",
        response_body.len()
    );
    socket.write_all(response.as_bytes()).await.expect("write response");
    socket.shutdown().await.ok();

    CapturedRequest { head, body }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
