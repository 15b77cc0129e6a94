//! C8: the client-side opening handshake state machine (core §4.8). Builds
//! the upgrade request, drives it to completion, and hands back an `Open`
//! session with any trailing bytes preserved for the frame reader.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::config::{Role, WebSocketConfig};
use crate::error::{Error, HandshakeFailure};
use crate::session::Session;
use crate::utils::{generate_websocket_accept_value, generate_websocket_key};

/// Named per core §4.8, tracked internally for introspection/tests. The
/// public API drives all four states to completion in one `async fn` rather
/// than exposing a re-enterable `upgrade()` — see DESIGN.md for why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Invalid,
    Sending,
    Receiving,
    Established,
}

struct WsUrl {
    host: String,
    request_host: String,
    path: String,
}

impl WsUrl {
    fn parse(raw: &str) -> Result<Self, Error> {
        let url = Url::parse(raw)?;
        let default_port = match url.scheme() {
            "ws" => 80,
            "wss" => 443,
            _ => return Err(Error::HandshakeFailed(HandshakeFailure::InvalidUrl)),
        };
        let host = url
            .host_str()
            .ok_or(Error::HandshakeFailed(HandshakeFailure::InvalidUrl))?
            .to_string();
        let request_host = match url.port() {
            Some(port) if port != default_port => format!("{host}:{port}"),
            _ => host.clone(),
        };
        let path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => {
                let p = url.path();
                if p.is_empty() {
                    "/".to_string()
                } else {
                    p.to_string()
                }
            }
        };
        Ok(Self {
            host,
            request_host,
            path,
        })
    }
}

fn build_request(url: &WsUrl, key: &str) -> Vec<u8> {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n",
        path = url.path,
        host = url.request_host,
        key = key,
    )
    .into_bytes()
}

fn header_eq_ci(headers: &[httparse::Header], name: &str, expected: &str) -> bool {
    headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case(name)
            && std::str::from_utf8(h.value)
                .map(|v| v.trim().eq_ignore_ascii_case(expected))
                .unwrap_or(false)
    })
}

fn connection_contains_upgrade(headers: &[httparse::Header]) -> bool {
    headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case("Connection")
            && std::str::from_utf8(h.value)
                .map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")))
                .unwrap_or(false)
    })
}

fn header_value<'a>(headers: &'a [httparse::Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
}

const MAX_HANDSHAKE_HEAD: usize = 16 * 1024;

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Runs the client handshake to completion over `transport` and, on
/// success, returns an `Open` session with `Role::Client`.
pub async fn connect_async<S>(transport: S, url: &str) -> Result<Session<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    connect_async_with_config(transport, url, WebSocketConfig::client()).await
}

pub async fn connect_async_with_config<S>(
    mut transport: S,
    url: &str,
    config: WebSocketConfig,
) -> Result<Session<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    log::trace!("handshake state: {:?}", HandshakeState::Invalid);
    let parsed = WsUrl::parse(url)?;
    let key = generate_websocket_key();
    let request = build_request(&parsed, &key);

    // Sending phase: short-write looping, tracking offset (core §4.8).
    log::trace!("handshake state: {:?}", HandshakeState::Sending);
    let mut offset = 0;
    while offset < request.len() {
        let n = transport.write(&request[offset..]).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        offset += n;
    }
    transport.flush().await?;

    // Receiving phase: read until a complete HTTP response head arrives.
    log::trace!("handshake state: {:?}", HandshakeState::Receiving);
    let mut buf = BytesMut::with_capacity(1024);
    let head_end = loop {
        let n = transport.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HANDSHAKE_HEAD {
            return Err(Error::HandshakeFailed(HandshakeFailure::MalformedResponse));
        }
    };

    let head = buf.split_to(head_end + 4);
    let trailing = buf; // first bytes of the WebSocket stream proper

    let mut header_storage = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut header_storage);
    response
        .parse(&head)
        .map_err(|_| Error::HandshakeFailed(HandshakeFailure::MalformedResponse))?;

    let status = response
        .code
        .ok_or(Error::HandshakeFailed(HandshakeFailure::MalformedResponse))?;
    if status != 101 {
        return Err(Error::HandshakeFailed(HandshakeFailure::InvalidStatus(status)));
    }

    if !header_eq_ci(response.headers, "Upgrade", "websocket") {
        return Err(Error::HandshakeFailed(HandshakeFailure::MissingUpgradeHeader));
    }
    if !connection_contains_upgrade(response.headers) {
        return Err(Error::HandshakeFailed(HandshakeFailure::MissingConnectionHeader));
    }

    let accept = header_value(response.headers, "Sec-WebSocket-Accept")
        .ok_or(Error::HandshakeFailed(HandshakeFailure::MissingAcceptHeader))?;
    let expected = generate_websocket_accept_value(key);
    if accept != expected {
        return Err(Error::HandshakeFailed(HandshakeFailure::AcceptMismatch));
    }

    log::debug!("handshake state: {:?}, established with {}", HandshakeState::Established, parsed.host);

    Ok(Session::from_upgraded_with_trailing(
        transport,
        Role::Client,
        config,
        trailing,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;

    #[test]
    fn s6_accept_value_matches_known_answer() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==".to_string();
        let accept = generate_websocket_accept_value(key);
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn parses_default_ws_port_and_path() {
        let url = WsUrl::parse("ws://example.com/chat").unwrap();
        assert_eq!(url.request_host, "example.com");
        assert_eq!(url.path, "/chat");
    }

    #[test]
    fn parses_non_default_port() {
        let url = WsUrl::parse("ws://example.com:9000/chat").unwrap();
        assert_eq!(url.request_host, "example.com:9000");
    }

    #[test]
    fn defaults_missing_path_to_root() {
        let url = WsUrl::parse("wss://example.com").unwrap();
        assert_eq!(url.path, "/");
    }

    #[tokio::test]
    async fn full_handshake_succeeds_over_an_in_memory_duplex() {
        use tokio::io::duplex;

        let (client_io, mut server_io) = duplex(4096);

        let server = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let n = server_io.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]);
            let key_line = request
                .lines()
                .find(|l| l.to_ascii_lowercase().starts_with("sec-websocket-key"))
                .unwrap();
            let key = key_line.split(':').nth(1).unwrap().trim().to_string();
            let accept = generate_websocket_accept_value(key);
            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
            );
            server_io.write_all(response.as_bytes()).await.unwrap();
        });

        let session = connect_async(client_io, "ws://example.com/").await.unwrap();
        drop(session);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_fails_on_accept_mismatch() {
        use tokio::io::duplex;

        let (client_io, mut server_io) = duplex(4096);

        let server = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let _ = server_io.read(&mut buf).await.unwrap();
            let bogus_accept = BASE64_STANDARD.encode(b"not-the-right-digest");
            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {bogus_accept}\r\n\r\n"
            );
            server_io.write_all(response.as_bytes()).await.unwrap();
        });

        let err = connect_async(client_io, "ws://example.com/").await.unwrap_err();
        assert!(matches!(
            err,
            Error::HandshakeFailed(HandshakeFailure::AcceptMismatch)
        ));
        server.await.unwrap();
    }
}
