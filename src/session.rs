//! C9: the public session facade. Ties the frame reader/writer and message
//! assembler together behind `send_*`/`next_message`/`close`, and runs the
//! liveness and close-handshake logic from core §4.7/§6.

use bytes::BytesMut;
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::time::{self, Instant};

use crate::assembler::{AssemblerEvent, MessageAssembler};
use crate::close;
use crate::config::{Role, WebSocketConfig};
use crate::error::Error;
use crate::frame::Frame;
use crate::message::{to_frames, ControlFrame, Incoming, MessageKind};
use crate::writer::FrameWriter;

/// Session lifecycle, named per core §3 "Session state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    ClosingLocal,
    ClosingRemote,
    Closed,
}

pub struct Session<S> {
    assembler: MessageAssembler<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    config: WebSocketConfig,
    state: State,
    /// Set when an auto-ping has gone unanswered; cleared on any Pong.
    /// Drives `pong_timeout` → `PingTimeout` (core §6/§7).
    pong_deadline: Option<Instant>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Server-side entry point (core §6): wraps an already-upgraded
    /// transport with no leftover bytes to seed.
    pub fn from_upgraded(transport: S, role: Role, config: WebSocketConfig) -> Self {
        Self::from_upgraded_with_trailing(transport, role, config, BytesMut::new())
    }

    pub(crate) fn from_upgraded_with_trailing(
        transport: S,
        role: Role,
        config: WebSocketConfig,
        trailing: BytesMut,
    ) -> Self {
        let (read_half, write_half) = split(transport);
        let mut assembler = MessageAssembler::new(
            read_half,
            role,
            config.recv_buffer_size,
            config.max_frame_size,
            config.max_message_size,
            config.validate_utf8,
        );
        if !trailing.is_empty() {
            assembler.reader_mut().seed(trailing);
        }
        let writer = FrameWriter::new(write_half, role);
        Self {
            assembler,
            writer,
            config,
            state: State::Open,
            pong_deadline: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Splits into independently owned halves (C13), for concurrent
    /// read/write tasks. Used internally by `split()`.
    pub(crate) fn into_parts(self) -> (MessageAssembler<ReadHalf<S>>, FrameWriter<WriteHalf<S>>, WebSocketConfig) {
        (self.assembler, self.writer, self.config)
    }

    pub async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.send_message(MessageKind::Text, text.into_bytes()).await
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(MessageKind::Binary, data).await
    }

    async fn send_message(&mut self, kind: MessageKind, payload: Vec<u8>) -> Result<(), Error> {
        self.require_open()?;
        if payload.len() > self.config.max_message_size {
            return Err(Error::MessageTooLarge);
        }
        for frame in to_frames(kind, payload, self.config.max_frame_size) {
            self.writer.send_frame(frame, self.config.send_timeout).await?;
        }
        Ok(())
    }

    pub async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.require_open()?;
        self.writer
            .send_frame(Frame::ping(payload), self.config.send_timeout)
            .await
    }

    pub async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.require_open()?;
        self.writer
            .send_frame(Frame::pong(payload), self.config.send_timeout)
            .await
    }

    /// Once a session has left `Open` (either close direction, or terminal),
    /// further application sends are rejected (core §4.7 "application sends
    /// are rejected with ConnectionClosed").
    fn require_open(&self) -> Result<(), Error> {
        if self.state == State::Open {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    /// Produces the next application-visible message or control frame.
    /// Implements core §4.7/C7: auto-pongs incoming pings, drives the
    /// optional ping ticker, and converts a peer Close frame into the
    /// reciprocal close handshake.
    pub async fn next_message(&mut self) -> Result<Incoming, Error> {
        loop {
            if self.state == State::Closed {
                return Err(Error::ConnectionClosed);
            }

            let event = match (self.config.ping_interval, self.pong_deadline) {
                (_, Some(deadline)) => {
                    tokio::select! {
                        biased;
                        event = self.assembler.next_event(self.config.recv_timeout) => event,
                        _ = time::sleep_until(deadline) => {
                            log::warn!("no pong within pong_timeout, closing with PingTimeout");
                            return self.handle_error(Error::PingTimeout).await;
                        }
                    }
                }
                (Some(interval), None) => {
                    tokio::select! {
                        biased;
                        event = self.assembler.next_event(self.config.recv_timeout) => event,
                        _ = time::sleep(interval) => {
                            self.writer.send_frame(Frame::ping(Vec::new()), self.config.send_timeout).await?;
                            self.pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                            continue;
                        }
                    }
                }
                (None, None) => self.assembler.next_event(self.config.recv_timeout).await,
            };

            let event = match event {
                Ok(event) => event,
                Err(err) => return self.handle_error(err).await,
            };

            match event {
                AssemblerEvent::Incoming(Incoming::Control(ControlFrame::Ping(payload))) => {
                    if self.config.auto_pong {
                        self.writer
                            .send_frame(Frame::pong(payload.clone()), self.config.send_timeout)
                            .await?;
                    }
                    return Ok(Incoming::Control(ControlFrame::Ping(payload)));
                }
                AssemblerEvent::Incoming(Incoming::Control(ControlFrame::Pong(payload))) => {
                    self.pong_deadline = None;
                    return Ok(Incoming::Control(ControlFrame::Pong(payload)));
                }
                AssemblerEvent::Incoming(msg @ Incoming::Message(..)) => {
                    return Ok(msg);
                }
                AssemblerEvent::Close(info) => {
                    self.state = State::ClosingRemote;
                    // Echo only the code, never the peer's reason text (core
                    // §4.7: "same code or 1000 if none; reason empty").
                    let code = info.code_and_reason.map_or(close::NORMAL, |(code, _)| code);
                    log::debug!("peer closed with code {code}, echoing close and shutting down");
                    let _ = self
                        .writer
                        .send_frame(Frame::close(code, ""), self.config.send_timeout)
                        .await;
                    self.state = State::Closed;
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    /// Best-effort close on a locally-detected error (core §7: "Errors that
    /// map to a defined close code cause the core to emit a Close frame
    /// ...and transition to Closed"). Errors with no mapped code (timeouts,
    /// an already-dead transport) propagate without forcing a fresh write;
    /// `RecvTimeout`/`SendTimeout` leave the session `Open` so the caller
    /// may retry, per core §7.
    async fn handle_error(&mut self, err: Error) -> Result<Incoming, Error> {
        match err.close_code() {
            Some(code) => {
                log::warn!("local error {err:?} maps to close code {code}, closing session");
                self.state = State::ClosingLocal;
                let _ = self
                    .writer
                    .send_frame(Frame::close(code, ""), self.config.send_timeout)
                    .await;
                self.state = State::Closed;
                let _ = self.writer.shutdown().await;
            }
            None => {
                if matches!(
                    err,
                    Error::ConnectionClosed | Error::TransportError { .. } | Error::Timeout { .. }
                ) {
                    log::debug!("session closed: {err:?}");
                    self.state = State::Closed;
                }
            }
        }
        Err(err)
    }

    /// Local-initiated close handshake (core §4.7): sends a Close frame,
    /// then drains and discards incoming frames until the peer's Close
    /// arrives or `close_timeout` elapses.
    pub async fn close(&mut self, code: u16, reason: String) -> Result<(), Error> {
        if self.state == State::Closed {
            return Ok(());
        }
        log::debug!("closing session locally with code {code}");
        self.state = State::ClosingLocal;
        self.writer
            .send_frame(Frame::close(code, &reason), self.config.send_timeout)
            .await?;

        let deadline = Instant::now() + self.config.close_timeout;
        loop {
            if Instant::now() >= deadline {
                break;
            }
            let remaining = deadline - Instant::now();
            match time::timeout(remaining, self.assembler.next_event(None)).await {
                Ok(Ok(AssemblerEvent::Close(_))) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(_)) | Err(_) => break,
            }
        }
        self.state = State::Closed;
        let _ = self.writer.shutdown().await;
        Ok(())
    }
}
