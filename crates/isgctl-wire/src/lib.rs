//! Binary codec for the ISG kernel control protocol.
//!
//! Userspace talks to the ISG subscriber-session module over a netlink
//! datagram channel. Every message is a fixed layout:
//! - A 4-byte big-endian event code
//! - A shape-specific body (session descriptor, network entry, ...)
//! - No alignment padding between fields
//!
//! User requests are encoded with [`encode_user_event`]; kernel notifications
//! are decoded with [`decode_kernel_event`]. Both are pure functions over one
//! self-contained buffer and return either a complete record or an error.

pub mod error;
pub mod event;
pub mod event_type;
pub mod field;
pub mod session;
pub mod stats;

pub use error::{Result, UnknownEventName, WireError};
pub use event::{
    decode_kernel_event, encode_user_event, EncodeUserEvent, EventHeader, FlagOp, KernelEvent,
    UserEvent, UserEventNetworkEntry, UserEventServiceDescription, UserEventSessionInfo,
    EVENT_HEADER_SIZE, KERNEL_EVENT_SIZE, KERNEL_SERVICE_NAME_LEN, SERVICE_DESC_IS_DYNAMIC,
    SERVICE_NAME_LEN, TC_NAME_LEN, USER_NETWORK_ENTRY_SIZE, USER_SERVICE_DESCRIPTION_SIZE,
    USER_SESSION_INFO_SIZE,
};
pub use event_type::{classify, Direction, EventType};
pub use field::{check_fixed, trim_nul, WireReader, WireWriter};
pub use session::{
    decode_session_descriptor, encode_session_descriptor, SessionDescriptor, SessionFlags,
    SessionRate, COOKIE_LEN, SESSION_DESCRIPTOR_SIZE,
};
pub use stats::{decode_session_statistics, SessionStatistics, SESSION_STATISTICS_SIZE};
