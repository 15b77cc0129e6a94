//! A minimal echo server. The upgrade handshake itself is out of this
//! crate's scope (core spec §1 "server-side handshake" is a Non-goal) — this
//! demo plays the role of the external HTTP collaborator, parsing just
//! enough of the request to compute `Sec-WebSocket-Accept` and hand the
//! upgraded stream to `Session::from_upgraded`.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use frameflow::{Incoming, MessageKind, Role, Session, WebSocketConfig};
use log::*;
use sha1::{Digest, Sha1};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

async fn accept_handshake(stream: &mut TcpStream) -> io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed during handshake"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut request = httparse::Request::new(&mut headers);
    request
        .parse(&buf)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed handshake request"))?;

    let key = request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Key"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Sec-WebSocket-Key"))?
        .to_string();

    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(GUID.as_bytes());
    let accept = BASE64_STANDARD.encode(sha1.finalize());

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

async fn handle_connection(peer: SocketAddr, mut stream: TcpStream) {
    if let Err(err) = accept_handshake(&mut stream).await {
        error!("handshake with {peer} failed: {err}");
        return;
    }

    let mut session = Session::from_upgraded(stream, Role::Server, WebSocketConfig::server());

    loop {
        match session.next_message().await {
            Ok(Incoming::Message(MessageKind::Text, payload)) => {
                let text = String::from_utf8_lossy(&payload).into_owned();
                if session.send_text(text).await.is_err() {
                    error!("failed to echo text message to {peer}");
                    break;
                }
            }
            Ok(Incoming::Message(MessageKind::Binary, payload)) => {
                if session.send_binary(payload).await.is_err() {
                    error!("failed to echo binary message to {peer}");
                    break;
                }
            }
            Ok(Incoming::Control(_)) => continue,
            Err(err) => {
                info!("connection with {peer} ended: {err}");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(addr).await.expect("can't listen");
    info!("listening on: {addr}");

    while let Ok((stream, peer)) = listener.accept().await {
        info!("peer address: {peer}");
        tokio::spawn(handle_connection(peer, stream));
    }
}
