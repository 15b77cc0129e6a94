//! C5: serializes a frame and drains it to the byte sink, honoring timeouts
//! and the role's masking policy.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::config::Role;
use crate::error::Error;
use crate::frame::Frame;
use crate::mask;

pub struct FrameWriter<S> {
    transport: S,
    role: Role,
}

impl<S: AsyncWrite + Unpin> FrameWriter<S> {
    pub fn new(transport: S, role: Role) -> Self {
        Self { transport, role }
    }

    /// Serializes `frame` and writes it to the transport. Clients get a
    /// fresh masking key per frame; servers never mask (core §4.5).
    pub async fn send_frame(&mut self, mut frame: Frame, deadline: Option<Duration>) -> Result<(), Error> {
        match self.role {
            Role::Client => {
                frame.masked = true;
                frame.masking_key = Some(mask::generate_key());
            }
            Role::Server => {
                frame.masked = false;
                frame.masking_key = None;
            }
        }

        let bytes = frame.serialize();
        let write = self.transport.write_all(&bytes);
        match deadline {
            None => write.await?,
            Some(d) => match timeout(d, write).await {
                Ok(res) => res?,
                Err(_) => return Err(Error::SendTimeout),
            },
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.transport.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{self, Decoded, OpCode};

    #[tokio::test]
    async fn client_frames_are_masked_with_fresh_keys() {
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out, Role::Client);
            writer
                .send_frame(Frame::text(b"Hi".to_vec(), true), None)
                .await
                .unwrap();
        }
        match frame::decode(&out, usize::MAX).unwrap() {
            Decoded::Frame(decoded, consumed) => {
                assert_eq!(consumed, out.len());
                assert!(decoded.masked);
                assert!(decoded.masking_key.is_some());
                assert_eq!(decoded.payload, b"Hi");
            }
            Decoded::Incomplete(_) => panic!("expected complete frame"),
        }
    }

    #[tokio::test]
    async fn server_frames_are_never_masked() {
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out, Role::Server);
            writer
                .send_frame(Frame::binary(vec![1, 2, 3], true), None)
                .await
                .unwrap();
        }
        match frame::decode(&out, usize::MAX).unwrap() {
            Decoded::Frame(decoded, _) => {
                assert!(!decoded.masked);
                assert_eq!(decoded.opcode, OpCode::Binary);
            }
            Decoded::Incomplete(_) => panic!("expected complete frame"),
        }
    }
}
