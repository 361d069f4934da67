use std::time::Duration;

/// Netlink protocol number of the ISG module (`MAX_LINKS - 1`).
pub const DEFAULT_NETLINK_PROTOCOL: i32 = 31;

/// Default receive buffer. Kernel events are 208 bytes; a datagram may batch many.
pub const DEFAULT_RECV_BUFFER: usize = 64 * 1024;

/// Configuration for a control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Netlink protocol number passed to `socket(2)`.
    pub protocol: i32,
    /// Size of the datagram receive buffer in bytes.
    pub recv_buffer_size: usize,
    /// Read timeout for blocking receives. `None` blocks forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_NETLINK_PROTOCOL,
            recv_buffer_size: DEFAULT_RECV_BUFFER,
            read_timeout: None,
        }
    }
}
