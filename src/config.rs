use std::time::Duration;

/// Which side of the connection this session is. Determines masking policy
/// (core spec §3): clients MUST mask outbound frames and only accept
/// unmasked inbound frames; servers are the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Per-session tunables (core spec §6), plus `recv_buffer_size` and
/// `close_timeout` recovered from the original's `WsParams.hpp`.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub role: Role,
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub max_frame_size: usize,
    pub max_message_size: usize,
    pub recv_buffer_size: usize,
    pub ping_interval: Option<Duration>,
    pub pong_timeout: Duration,
    pub auto_pong: bool,
    pub validate_utf8: bool,
    pub close_timeout: Duration,
}

impl WebSocketConfig {
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            ..Self::default()
        }
    }

    pub fn server() -> Self {
        Self {
            role: Role::Server,
            ..Self::default()
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            role: Role::Client,
            recv_timeout: Some(Duration::from_secs(30)),
            send_timeout: Some(Duration::from_secs(30)),
            max_frame_size: 10 << 20,
            max_message_size: 64 << 20,
            recv_buffer_size: 4096,
            ping_interval: Some(Duration::from_secs(30)),
            pong_timeout: Duration::from_secs(10),
            auto_pong: true,
            validate_utf8: true,
            close_timeout: Duration::from_secs(5),
        }
    }
}
