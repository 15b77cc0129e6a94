//! C4: pulls complete frames from a byte source, honoring timeouts, size
//! caps, and role-mask enforcement.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncRead;
use tokio::time::{timeout_at, Instant};

use crate::config::Role;
use crate::error::Error;
use crate::frame::{self, Decoded, Frame};

pub struct FrameReader<S> {
    transport: S,
    buf: BytesMut,
    role: Role,
}

impl<S: AsyncRead + Unpin> FrameReader<S> {
    pub fn new(transport: S, role: Role, recv_buffer_size: usize) -> Self {
        Self {
            transport,
            buf: BytesMut::with_capacity(recv_buffer_size),
            role,
        }
    }

    /// Adopts bytes that were already read off the transport by a previous
    /// owner (the client handshake's trailing bytes, core §4.8) so they are
    /// not lost.
    pub fn seed(&mut self, bytes: BytesMut) {
        let mut combined = BytesMut::with_capacity(bytes.len() + self.buf.len());
        combined.extend_from_slice(&bytes);
        combined.extend_from_slice(&self.buf);
        self.buf = combined;
    }

    /// Reads until at least `needed` bytes are buffered, or the deadline
    /// expires, or the transport reports EOF. Bytes already read remain in
    /// `self.buf` even if this call later errors — nothing is lost on
    /// timeout (core §4.4, §5 "preservation of partial progress").
    async fn fill_at_least(&mut self, needed: usize, deadline: Option<Instant>) -> Result<(), Error> {
        use tokio::io::AsyncReadExt;

        while self.buf.len() < needed {
            self.buf.reserve(needed - self.buf.len());
            let read = self.transport.read_buf(&mut self.buf);
            let n = match deadline {
                None => read.await?,
                Some(d) => {
                    if Instant::now() >= d {
                        return Err(Error::RecvTimeout);
                    }
                    match timeout_at(d, read).await {
                        Ok(res) => res?,
                        Err(_) => return Err(Error::RecvTimeout),
                    }
                }
            };
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
        Ok(())
    }

    /// Reads one complete frame, enforcing the role's masking policy and the
    /// frame-size cap (core §4.4). `timeout` bounds the aggregate wait
    /// across however many underlying reads this frame needs.
    pub async fn next_frame(
        &mut self,
        timeout: Option<Duration>,
        max_frame_size: usize,
    ) -> Result<Frame, Error> {
        let deadline = timeout.map(|d| Instant::now() + d);

        self.fill_at_least(2, deadline).await?;
        loop {
            // `decode` itself rejects payload_length > max_frame_size as soon
            // as the header is parsed, so an attacker-declared multi-gigabyte
            // length never reaches `fill_at_least` below (core §4.4: surface
            // `FrameTooLarge` before attempting to read payload).
            match frame::decode(&self.buf, max_frame_size)? {
                Decoded::Frame(decoded_frame, consumed) => {
                    self.buf.advance(consumed);

                    let expect_masked = self.role == Role::Server;
                    if decoded_frame.masked != expect_masked {
                        return Err(Error::RoleMaskViolation);
                    }

                    return Ok(decoded_frame);
                }
                Decoded::Incomplete(needed) => {
                    self.fill_at_least(needed, deadline).await?;
                }
            }
        }
    }
}
