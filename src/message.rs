//! Application-level message types exchanged across a `Session` (core §3
//! "Message" entity), plus the events the message assembler (C6) surfaces.

use crate::frame::{Frame, OpCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// A control frame surfaced to the application by the assembler (core §4.6
/// "hand to §4.7 without disturbing fragmentation"). `Close` is not included
/// here — it is terminal and handled entirely inside the session (C7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Ping(Vec<u8>),
    Pong(Vec<u8>),
}

/// One event produced by `next_message` (core §6: `next_message() -> (kind,
/// bytes) | Control | Err`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Message(MessageKind, Vec<u8>),
    Control(ControlFrame),
}

/// Splits a complete application message into one or more frames no larger
/// than `max_frame_size`, the head frame carrying the real opcode and every
/// subsequent frame carrying `Continuation`, with `fin=true` only on the
/// last.
pub fn to_frames(kind: MessageKind, payload: Vec<u8>, max_frame_size: usize) -> Vec<Frame> {
    let opcode = match kind {
        MessageKind::Text => OpCode::Text,
        MessageKind::Binary => OpCode::Binary,
    };

    if payload.is_empty() {
        return vec![Frame::new(true, opcode, payload)];
    }

    let mut frames = Vec::new();
    for chunk in payload.chunks(max_frame_size.max(1)) {
        let this_opcode = if frames.is_empty() {
            opcode
        } else {
            OpCode::Continuation
        };
        frames.push(Frame::new(false, this_opcode, chunk.to_vec()));
    }
    if let Some(last) = frames.last_mut() {
        last.fin = true;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_when_payload_fits() {
        let frames = to_frames(MessageKind::Text, b"Hello".to_vec(), 1024);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Text);
    }

    #[test]
    fn splits_into_continuation_frames() {
        let frames = to_frames(MessageKind::Binary, vec![0u8; 10], 4);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].opcode, OpCode::Binary);
        assert!(!frames[0].fin);
        assert_eq!(frames[1].opcode, OpCode::Continuation);
        assert!(!frames[1].fin);
        assert_eq!(frames[2].opcode, OpCode::Continuation);
        assert!(frames[2].fin);
        let total: usize = frames.iter().map(|f| f.payload.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn empty_payload_is_a_single_final_frame() {
        let frames = to_frames(MessageKind::Text, Vec::new(), 16);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert!(frames[0].payload.is_empty());
    }
}
