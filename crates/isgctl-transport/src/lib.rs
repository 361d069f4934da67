//! Control channel to the ISG kernel module.
//!
//! The codec produces and consumes whole messages; this crate moves them:
//! - [`EventChannel`] — the send/receive seam the rest of the toolkit uses
//! - [`NetlinkChannel`] — `AF_NETLINK` datagram socket (Linux)
//! - [`MemoryChannel`] — connected in-process pair for tests
//!
//! Request/response matching and retries belong to the caller.

pub mod config;
pub mod error;
pub mod memory;
pub mod netlink;
pub mod traits;

pub use config::{ChannelConfig, DEFAULT_NETLINK_PROTOCOL, DEFAULT_RECV_BUFFER};
pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use traits::EventChannel;

#[cfg(target_os = "linux")]
pub use netlink::NetlinkChannel;
