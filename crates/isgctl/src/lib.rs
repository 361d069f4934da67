//! Userspace control toolkit for the ISG subscriber-session kernel module.
//!
//! # Crate Structure
//!
//! - [`wire`] — Fixed-layout codec for user requests and kernel events
//! - [`transport`] — Control channel abstraction (netlink, in-memory)
//!
//! The `isgctl` binary (behind the `cli` feature) builds on both.

/// Re-export wire codec types.
pub mod wire {
    pub use isgctl_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use isgctl_transport::*;
}

pub use isgctl_transport::EventChannel;
pub use isgctl_wire::{decode_kernel_event, encode_user_event, KernelEvent, UserEvent, WireError};
