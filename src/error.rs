use std::io;
use thiserror::Error;
use tokio::time::error::Elapsed;
use url::ParseError;

/// Sub-reason for a failed client opening handshake (core spec §4.8/§7: "a
/// specific sub-reason").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    #[error("server responded with status {0}, expected 101")]
    InvalidStatus(u16),

    #[error("Upgrade: websocket header missing or mismatched in response")]
    MissingUpgradeHeader,

    #[error("Connection: Upgrade header missing or mismatched in response")]
    MissingConnectionHeader,

    #[error("Sec-WebSocket-Accept header missing from response")]
    MissingAcceptHeader,

    #[error("Sec-WebSocket-Accept value does not match the expected digest")]
    AcceptMismatch,

    #[error("HTTP response head could not be parsed")]
    MalformedResponse,

    #[error("WebSocket URL is invalid")]
    InvalidUrl,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("transport error: {source}")]
    TransportError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("receive timed out")]
    RecvTimeout,

    #[error("send timed out")]
    SendTimeout,

    // Frame-level (C1/C4) violations
    #[error("reserved bit is set")]
    ReservedBitSet,

    #[error("reserved or unknown opcode {0:#x}")]
    ReservedOpcode(u8),

    #[error("control frame must not be fragmented")]
    FragmentedControl,

    #[error("control frame payload exceeds 125 bytes")]
    OversizedControl,

    #[error("length field uses a non-minimal encoding")]
    InvalidLength,

    #[error("frame masking violates the role's masking policy")]
    RoleMaskViolation,

    #[error("frame payload exceeds max_frame_size")]
    FrameTooLarge,

    // Assembler (C6) violations
    #[error("unexpected continuation frame")]
    UnexpectedContinuation,

    #[error("data frame received while a fragmented message is in progress")]
    ProtocolError(&'static str),

    #[error("reassembled message exceeds max_message_size")]
    MessageTooLarge,

    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,

    // Close protocol (C7)
    #[error("close frame payload is invalid")]
    CloseFrameInvalid,

    #[error("no pong received within pong_timeout")]
    PingTimeout,

    // Handshake (C8)
    #[error("handshake failed: {0}")]
    HandshakeFailed(HandshakeFailure),

    #[error("{source}")]
    UrlParseError {
        #[from]
        source: ParseError,
    },
}

impl Error {
    /// Maps an error kind to the close code the session MUST emit when it
    /// initiates a best-effort close because of this error (core spec §7).
    /// Grounded on `WsError::toWsCloseCode` in
    /// `examples/original_source/galay-http/protoc/websocket/WsError.cc`.
    /// Returns `None` for errors that are terminal without a close frame
    /// (transport already gone, or the handshake never reached a session).
    pub fn close_code(&self) -> Option<u16> {
        use Error::*;
        match self {
            ReservedBitSet
            | ReservedOpcode(_)
            | FragmentedControl
            | OversizedControl
            | InvalidLength
            | RoleMaskViolation
            | UnexpectedContinuation
            | ProtocolError(_) => Some(1002),
            FrameTooLarge | MessageTooLarge => Some(1009),
            InvalidUtf8 | CloseFrameInvalid => Some(1007),
            PingTimeout => Some(1011),
            ConnectionClosed
            | TransportError { .. }
            | Timeout { .. }
            | RecvTimeout
            | SendTimeout
            | HandshakeFailed(_)
            | UrlParseError { .. } => None,
        }
    }
}
