//! C6: reassembles continuation frames into messages and routes control
//! frames without disturbing in-progress fragmentation (core §4.6).
//!
//! Per core spec §9 ("Open question: interleaved control during fragmented
//! binary"), control frames are routed to the caller in every state,
//! including mid-fragment — unlike the reference implementation's reader,
//! which comments that it "temporarily ignores" controls seen mid-message.

use std::time::Duration;

use tokio::io::AsyncRead;

use crate::close;
use crate::config::Role;
use crate::error::Error;
use crate::frame::OpCode;
use crate::message::{ControlFrame, Incoming, MessageKind};
use crate::reader::FrameReader;
use crate::utf8::Utf8Validator;

enum FragmentState {
    Idle,
    Fragmenting {
        head: MessageKind,
        accumulated: Vec<u8>,
        utf8: Utf8Validator,
    },
}

/// A parsed Close frame, handed up to the session so it can run the close
/// handshake (C7). `None` reason/code means the payload was empty.
pub struct CloseInfo {
    pub code_and_reason: Option<(u16, String)>,
}

pub enum AssemblerEvent {
    Incoming(Incoming),
    Close(CloseInfo),
}

pub struct MessageAssembler<S> {
    reader: FrameReader<S>,
    max_message_size: usize,
    max_frame_size: usize,
    validate_utf8: bool,
    state: FragmentState,
}

impl<S: AsyncRead + Unpin> MessageAssembler<S> {
    pub fn new(
        transport: S,
        role: Role,
        recv_buffer_size: usize,
        max_frame_size: usize,
        max_message_size: usize,
        validate_utf8: bool,
    ) -> Self {
        Self {
            reader: FrameReader::new(transport, role, recv_buffer_size),
            max_message_size,
            max_frame_size,
            validate_utf8,
            state: FragmentState::Idle,
        }
    }

    pub fn reader_mut(&mut self) -> &mut FrameReader<S> {
        &mut self.reader
    }

    /// Produces the next application-visible event: a reassembled message,
    /// a control frame, or a parsed Close. Internally may read several wire
    /// frames (e.g. while a fragmented message is in progress).
    pub async fn next_event(&mut self, timeout: Option<Duration>) -> Result<AssemblerEvent, Error> {
        loop {
            let frame = self.reader.next_frame(timeout, self.max_frame_size).await?;

            match frame.opcode {
                OpCode::Text | OpCode::Binary => {
                    let kind = if frame.opcode == OpCode::Text {
                        MessageKind::Text
                    } else {
                        MessageKind::Binary
                    };

                    if matches!(self.state, FragmentState::Fragmenting { .. }) {
                        return Err(Error::ProtocolError(
                            "data frame received while a fragmented message is in progress",
                        ));
                    }

                    if frame.fin {
                        if frame.payload.len() > self.max_message_size {
                            return Err(Error::MessageTooLarge);
                        }
                        if kind == MessageKind::Text && self.validate_utf8 {
                            let mut v = Utf8Validator::new();
                            v.feed(&frame.payload)?;
                            v.finalize()?;
                        }
                        return Ok(AssemblerEvent::Incoming(Incoming::Message(
                            kind,
                            frame.payload,
                        )));
                    }

                    let mut utf8 = Utf8Validator::new();
                    if kind == MessageKind::Text && self.validate_utf8 {
                        utf8.feed(&frame.payload)?;
                    }
                    if frame.payload.len() > self.max_message_size {
                        return Err(Error::MessageTooLarge);
                    }
                    self.state = FragmentState::Fragmenting {
                        head: kind,
                        accumulated: frame.payload,
                        utf8,
                    };
                }

                OpCode::Continuation => match &mut self.state {
                    FragmentState::Idle => return Err(Error::UnexpectedContinuation),
                    FragmentState::Fragmenting {
                        head,
                        accumulated,
                        utf8,
                    } => {
                        if *head == MessageKind::Text && self.validate_utf8 {
                            utf8.feed(&frame.payload)?;
                        }
                        accumulated.extend_from_slice(&frame.payload);
                        if accumulated.len() > self.max_message_size {
                            return Err(Error::MessageTooLarge);
                        }

                        if frame.fin {
                            if *head == MessageKind::Text && self.validate_utf8 {
                                utf8.finalize()?;
                            }
                            let head = *head;
                            let FragmentState::Fragmenting { accumulated, .. } =
                                std::mem::replace(&mut self.state, FragmentState::Idle)
                            else {
                                unreachable!()
                            };
                            return Ok(AssemblerEvent::Incoming(Incoming::Message(
                                head, accumulated,
                            )));
                        }
                    }
                },

                OpCode::Ping => {
                    return Ok(AssemblerEvent::Incoming(Incoming::Control(
                        ControlFrame::Ping(frame.payload),
                    )));
                }
                OpCode::Pong => {
                    return Ok(AssemblerEvent::Incoming(Incoming::Control(
                        ControlFrame::Pong(frame.payload),
                    )));
                }
                OpCode::Close => {
                    let parsed = close::parse_payload(&frame.payload, self.validate_utf8)?;
                    return Ok(AssemblerEvent::Close(CloseInfo {
                        code_and_reason: parsed,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(bytes: Vec<u8>) -> MessageAssembler<std::io::Cursor<Vec<u8>>> {
        MessageAssembler::new(
            std::io::Cursor::new(bytes),
            Role::Client,
            256,
            1 << 20,
            1 << 20,
            true,
        )
    }

    #[tokio::test]
    async fn s3_reassembles_fragmented_text() {
        let bytes = vec![0x01u8, 0x03, b'H', b'e', b'l', 0x80, 0x02, b'l', b'o'];
        let mut asm = run(bytes).await;
        match asm.next_event(None).await.unwrap() {
            AssemblerEvent::Incoming(Incoming::Message(MessageKind::Text, payload)) => {
                assert_eq!(payload, b"Hello");
            }
            _ => panic!("expected a text message"),
        }
    }

    #[tokio::test]
    async fn s4_control_interleaved_during_fragmentation() {
        let mut bytes = vec![0x01u8, 0x03, b'H', b'e', b'l']; // head, fin=false
        bytes.extend_from_slice(&[0x89, 0x04, b'p', b'i', b'n', b'g']); // Ping mid-fragment
        bytes.extend_from_slice(&[0x80, 0x02, b'l', b'o']); // continuation, fin=true

        let mut asm = run(bytes).await;

        match asm.next_event(None).await.unwrap() {
            AssemblerEvent::Incoming(Incoming::Control(ControlFrame::Ping(p))) => {
                assert_eq!(p, b"ping");
            }
            _ => panic!("expected the interleaved ping first"),
        }

        match asm.next_event(None).await.unwrap() {
            AssemblerEvent::Incoming(Incoming::Message(MessageKind::Text, payload)) => {
                assert_eq!(payload, b"Hello");
            }
            _ => panic!("expected the fragmented message to still complete"),
        }
    }

    #[tokio::test]
    async fn unexpected_continuation_is_an_error() {
        let bytes = vec![0x80u8, 0x02, b'h', b'i'];
        let mut asm = run(bytes).await;
        let err = asm.next_event(None).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedContinuation));
    }

    #[tokio::test]
    async fn data_frame_mid_fragment_is_protocol_error() {
        let mut bytes = vec![0x01u8, 0x03, b'H', b'e', b'l']; // head, fin=false
        bytes.extend_from_slice(&[0x01, 0x01, b'x']); // illegal: another Text head mid-fragment
        let mut asm = run(bytes).await;
        let err = asm.next_event(None).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[tokio::test]
    async fn s5_oversize_control_surfaces_error() {
        let bytes = vec![0x89u8, 0x7e, 0x00, 0x7e];
        let mut asm = run(bytes).await;
        let err = asm.next_event(None).await.unwrap_err();
        assert!(matches!(err, Error::OversizedControl));
    }

    #[tokio::test]
    async fn invalid_utf8_text_is_rejected() {
        let bytes = vec![0x81u8, 0x02, 0xff, 0xfe];
        let mut asm = run(bytes).await;
        let err = asm.next_event(None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8));
    }

    #[tokio::test]
    async fn unfragmented_frame_over_max_message_size_is_rejected() {
        // fin=true Binary frame with a 5-byte payload, but max_message_size
        // is set to 4 while max_frame_size stays large enough to admit it —
        // the two caps are independent (core §6), so this must still fail.
        let bytes = vec![0x82u8, 0x05, 1, 2, 3, 4, 5];
        let mut asm = MessageAssembler::new(
            std::io::Cursor::new(bytes),
            Role::Client,
            256,
            1 << 20,
            4,
            true,
        );
        let err = asm.next_event(None).await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge));
    }
}
