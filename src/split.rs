//! C13: splits a `Session` into an independently ownable reader and writer,
//! so a task can drive `next_message` while another task sends concurrently.
//! Grounded on the `WSReader`/`WSWriter` split in the teacher's split.rs,
//! adapted to the new reader/writer/assembler types.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::assembler::{AssemblerEvent, MessageAssembler};
use crate::close;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::Frame;
use crate::message::{to_frames, ControlFrame, Incoming, MessageKind};
use crate::session::Session;
use crate::writer::FrameWriter;

pub struct SessionReader<S> {
    assembler: MessageAssembler<ReadHalf<S>>,
    writer: Arc<Mutex<FrameWriter<WriteHalf<S>>>>,
    config: WebSocketConfig,
}

pub struct SessionWriter<S> {
    writer: Arc<Mutex<FrameWriter<WriteHalf<S>>>>,
    config: WebSocketConfig,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Splits into a reader/writer pair that can be driven from separate
    /// tasks (core §4.8/§9: "split" entry for full-duplex usage).
    pub fn split(self) -> (SessionReader<S>, SessionWriter<S>) {
        let (assembler, writer, config) = self.into_parts();
        let writer = Arc::new(Mutex::new(writer));
        (
            SessionReader {
                assembler,
                writer: writer.clone(),
                config: config.clone(),
            },
            SessionWriter {
                writer,
                config,
            },
        )
    }
}

impl<S: AsyncRead + Unpin> SessionReader<S> {
    /// Mirrors `Session::next_message`'s auto-pong and peer-close handling,
    /// without the ping ticker (owned by whichever side holds the writer).
    pub async fn next_message(&mut self) -> Result<Incoming, Error> {
        loop {
            let event = match self.assembler.next_event(self.config.recv_timeout).await {
                Ok(event) => event,
                Err(err) => {
                    if let Some(code) = err.close_code() {
                        let mut writer = self.writer.lock().await;
                        let _ = writer
                            .send_frame(Frame::close(code, ""), self.config.send_timeout)
                            .await;
                    }
                    return Err(err);
                }
            };
            match event {
                AssemblerEvent::Incoming(Incoming::Control(ControlFrame::Ping(payload))) => {
                    if self.config.auto_pong {
                        let mut writer = self.writer.lock().await;
                        writer
                            .send_frame(Frame::pong(payload.clone()), self.config.send_timeout)
                            .await?;
                    }
                    return Ok(Incoming::Control(ControlFrame::Ping(payload)));
                }
                AssemblerEvent::Incoming(Incoming::Control(ControlFrame::Pong(payload))) => {
                    return Ok(Incoming::Control(ControlFrame::Pong(payload)));
                }
                AssemblerEvent::Incoming(msg @ Incoming::Message(..)) => {
                    return Ok(msg);
                }
                AssemblerEvent::Close(info) => {
                    // Echo only the code, never the peer's reason text (core
                    // §4.7: "same code or 1000 if none; reason empty").
                    let code = info.code_and_reason.map_or(close::NORMAL, |(code, _)| code);
                    let mut writer = self.writer.lock().await;
                    let _ = writer
                        .send_frame(Frame::close(code, ""), self.config.send_timeout)
                        .await;
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> SessionWriter<S> {
    pub async fn send_text(&self, text: String) -> Result<(), Error> {
        self.send_message(MessageKind::Text, text.into_bytes()).await
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(MessageKind::Binary, data).await
    }

    async fn send_message(&self, kind: MessageKind, payload: Vec<u8>) -> Result<(), Error> {
        if payload.len() > self.config.max_message_size {
            return Err(Error::MessageTooLarge);
        }
        let mut writer = self.writer.lock().await;
        for frame in to_frames(kind, payload, self.config.max_frame_size) {
            writer.send_frame(frame, self.config.send_timeout).await?;
        }
        Ok(())
    }

    pub async fn send_ping(&self, payload: Vec<u8>) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        writer.send_frame(Frame::ping(payload), self.config.send_timeout).await
    }

    pub async fn send_close(&self, code: u16, reason: String) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        writer
            .send_frame(Frame::close(code, &reason), self.config.send_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Role, WebSocketConfig};

    #[tokio::test]
    async fn split_halves_can_send_and_receive_independently() {
        let (client_io, server_io) = tokio::io::duplex(4096);

        let mut server_session =
            Session::from_upgraded(server_io, Role::Server, WebSocketConfig::server());
        let client_session =
            Session::from_upgraded(client_io, Role::Client, WebSocketConfig::client());
        let (_reader, writer) = client_session.split();

        let send_task = tokio::spawn(async move {
            writer.send_text("hi".to_string()).await.unwrap();
        });

        let server_msg = server_session.next_message().await.unwrap();
        assert_eq!(
            server_msg,
            Incoming::Message(MessageKind::Text, b"hi".to_vec())
        );

        send_task.await.unwrap();
    }
}
