/// Errors that can occur on the control channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the netlink socket.
    #[error("failed to open netlink socket (protocol {protocol}): {source}")]
    Socket {
        protocol: i32,
        source: std::io::Error,
    },

    /// Failed to bind the netlink socket.
    #[error("failed to bind netlink socket: {0}")]
    Bind(std::io::Error),

    /// An I/O error occurred while sending or receiving.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No datagram arrived within the configured read timeout.
    #[error("receive timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The kernel answered with a netlink error message.
    #[error("kernel returned netlink error {errno}")]
    Kernel { errno: i32 },

    /// A netlink header disagrees with the datagram it arrived in.
    #[error("malformed netlink message: {0}")]
    Malformed(String),

    /// The peer end of the channel has gone away.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
