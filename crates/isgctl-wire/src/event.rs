//! Event shapes exchanged with the ISG module.
//!
//! Userspace sends one of three request shapes ([`UserEventSessionInfo`],
//! [`UserEventNetworkEntry`], [`UserEventServiceDescription`]) and receives
//! a single notification shape, [`KernelEvent`]. Encoders check the event
//! code's direction before writing; the kernel decoder checks it before
//! reading the body.

use std::borrow::Cow;
use std::net::Ipv4Addr;

use bytes::Bytes;

use crate::error::{Result, WireError};
use crate::event_type::{Direction, EventType};
use crate::field::{trim_nul, WireReader, WireWriter};
use crate::session::{
    decode_session_descriptor, encode_session_descriptor, SessionDescriptor,
    SESSION_DESCRIPTOR_SIZE,
};
use crate::stats::{decode_session_statistics, SessionStatistics, SESSION_STATISTICS_SIZE};

/// Event header: a single big-endian event code.
pub const EVENT_HEADER_SIZE: usize = 4;

/// Service name width in user requests.
pub const SERVICE_NAME_LEN: usize = 32;

/// Traffic-class name width.
pub const TC_NAME_LEN: usize = 32;

/// Service name width in kernel events.
pub const KERNEL_SERVICE_NAME_LEN: usize = 64;

pub const USER_SESSION_INFO_SIZE: usize =
    EVENT_HEADER_SIZE + SESSION_DESCRIPTOR_SIZE + SERVICE_NAME_LEN + 1;

pub const USER_NETWORK_ENTRY_SIZE: usize = EVENT_HEADER_SIZE + 4 + 4 + TC_NAME_LEN;

pub const USER_SERVICE_DESCRIPTION_SIZE: usize = TC_NAME_LEN + SERVICE_NAME_LEN + 1;

pub const KERNEL_EVENT_SIZE: usize = EVENT_HEADER_SIZE
    + SESSION_DESCRIPTOR_SIZE
    + SESSION_STATISTICS_SIZE
    + 8
    + KERNEL_SERVICE_NAME_LEN;

/// Values of [`UserEventSessionInfo::flags`] for change requests.
pub struct FlagOp;

impl FlagOp {
    pub const SET: u8 = 0x01;
    pub const UNSET: u8 = 0x02;
}

/// Bits of [`UserEventServiceDescription::flags`].
pub const SERVICE_DESC_IS_DYNAMIC: u8 = 1 << 0;

/// Common prefix of every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub event_type: EventType,
}

impl EventHeader {
    pub const fn new(event_type: EventType) -> Self {
        Self { event_type }
    }

    pub fn encode(&self, dst: &mut WireWriter) {
        dst.put_u32(self.event_type.code());
    }

    /// Read the header and require its code to flow in `expected` direction.
    ///
    /// Unknown codes are reported as [`WireError::SchemaMismatch`] with
    /// `found: Direction::Unknown`.
    pub fn decode(src: &mut WireReader<'_>, expected: Direction) -> Result<Self> {
        let code = src.get_u32()?;
        let event_type = EventType::from_code(code);
        let found = event_type.map_or(Direction::Unknown, EventType::direction);
        match event_type {
            Some(event_type) if found == expected => Ok(Self { event_type }),
            _ => Err(WireError::SchemaMismatch {
                code,
                expected,
                found,
            }),
        }
    }

    fn require(&self, expected: Direction) -> Result<()> {
        let found = self.event_type.direction();
        if found != expected {
            return Err(WireError::SchemaMismatch {
                code: self.event_type.code(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

/// Approve or change a session; also the shape of header-only control requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventSessionInfo {
    pub header: EventHeader,
    pub session: SessionDescriptor,
    pub service_name: String,
    /// [`FlagOp`] value for change requests.
    pub flags: u8,
}

impl UserEventSessionInfo {
    pub fn new(event_type: EventType, session: SessionDescriptor) -> Self {
        Self {
            header: EventHeader::new(event_type),
            session,
            service_name: String::new(),
            flags: 0,
        }
    }

    /// A request that carries only its code (get-list, listener register, ...).
    pub fn control(event_type: EventType) -> Self {
        Self::new(event_type, SessionDescriptor::default())
    }
}

/// Queue a prefix/mask to traffic-class mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventNetworkEntry {
    pub header: EventHeader,
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub tc_name: String,
}

/// Bind a traffic class to a service.
///
/// Has no header of its own; the wrapping layer supplies the event code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEventServiceDescription {
    pub tc_name: String,
    pub service_name: String,
    pub flags: u8,
}

/// A user-originated event shape with a fixed wire layout.
pub trait EncodeUserEvent {
    /// Exact encoded size.
    fn encoded_len(&self) -> usize;

    /// Append the wire form to `dst`.
    ///
    /// On error `dst` holds exactly what it held before the call.
    fn encode_to(&self, dst: &mut WireWriter) -> Result<()>;
}

/// Run `write` against `dst`, dropping its partial output if it fails.
fn write_whole<F>(dst: &mut WireWriter, write: F) -> Result<()>
where
    F: FnOnce(&mut WireWriter) -> Result<()>,
{
    let start = dst.len();
    let result = write(dst);
    if result.is_err() {
        dst.truncate(start);
    }
    result
}

impl EncodeUserEvent for UserEventSessionInfo {
    fn encoded_len(&self) -> usize {
        USER_SESSION_INFO_SIZE
    }

    fn encode_to(&self, dst: &mut WireWriter) -> Result<()> {
        self.header.require(Direction::UserToKernel)?;
        write_whole(dst, |dst| {
            self.header.encode(dst);
            encode_session_descriptor(&self.session, dst)?;
            dst.put_fixed("service_name", self.service_name.as_bytes(), SERVICE_NAME_LEN)?;
            dst.put_u8(self.flags);
            Ok(())
        })
    }
}

impl EncodeUserEvent for UserEventNetworkEntry {
    fn encoded_len(&self) -> usize {
        USER_NETWORK_ENTRY_SIZE
    }

    fn encode_to(&self, dst: &mut WireWriter) -> Result<()> {
        self.header.require(Direction::UserToKernel)?;
        write_whole(dst, |dst| {
            self.header.encode(dst);
            dst.put_u32(u32::from(self.prefix))
                .put_u32(u32::from(self.mask));
            dst.put_fixed("tc_name", self.tc_name.as_bytes(), TC_NAME_LEN)?;
            Ok(())
        })
    }
}

impl EncodeUserEvent for UserEventServiceDescription {
    fn encoded_len(&self) -> usize {
        USER_SERVICE_DESCRIPTION_SIZE
    }

    fn encode_to(&self, dst: &mut WireWriter) -> Result<()> {
        write_whole(dst, |dst| {
            dst.put_fixed("tc_name", self.tc_name.as_bytes(), TC_NAME_LEN)?;
            dst.put_fixed("service_name", self.service_name.as_bytes(), SERVICE_NAME_LEN)?;
            dst.put_u8(self.flags);
            Ok(())
        })
    }
}

/// Any user-originated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    SessionInfo(UserEventSessionInfo),
    NetworkEntry(UserEventNetworkEntry),
    ServiceDescription(UserEventServiceDescription),
}

impl EncodeUserEvent for UserEvent {
    fn encoded_len(&self) -> usize {
        match self {
            UserEvent::SessionInfo(ev) => ev.encoded_len(),
            UserEvent::NetworkEntry(ev) => ev.encoded_len(),
            UserEvent::ServiceDescription(ev) => ev.encoded_len(),
        }
    }

    fn encode_to(&self, dst: &mut WireWriter) -> Result<()> {
        match self {
            UserEvent::SessionInfo(ev) => ev.encode_to(dst),
            UserEvent::NetworkEntry(ev) => ev.encode_to(dst),
            UserEvent::ServiceDescription(ev) => ev.encode_to(dst),
        }
    }
}

impl From<UserEventSessionInfo> for UserEvent {
    fn from(ev: UserEventSessionInfo) -> Self {
        UserEvent::SessionInfo(ev)
    }
}

impl From<UserEventNetworkEntry> for UserEvent {
    fn from(ev: UserEventNetworkEntry) -> Self {
        UserEvent::NetworkEntry(ev)
    }
}

impl From<UserEventServiceDescription> for UserEvent {
    fn from(ev: UserEventServiceDescription) -> Self {
        UserEvent::ServiceDescription(ev)
    }
}

/// Serialize a user event into one complete message.
///
/// On error no bytes are produced.
pub fn encode_user_event<E: EncodeUserEvent + ?Sized>(event: &E) -> Result<Bytes> {
    let mut dst = WireWriter::with_capacity(event.encoded_len());
    event.encode_to(&mut dst)?;
    debug_assert_eq!(dst.len(), event.encoded_len());
    Ok(dst.freeze())
}

/// A session lifecycle notification (or acknowledgement) from the kernel.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────┬──────────────────┬────────────┬──────────────────┐
/// │ Type (4) │ Session (92)     │ Statistics (40)  │ Parent (8) │ ServiceName (64) │
/// └──────────┴──────────────────┴──────────────────┴────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEvent {
    pub header: EventHeader,
    pub session: SessionDescriptor,
    pub stats: SessionStatistics,
    /// Zero when the session has no parent.
    pub parent_session_id: u64,
    /// Raw NUL-padded field as the kernel sent it; see
    /// [`service_name_bytes`](Self::service_name_bytes) and
    /// [`service_name_str`](Self::service_name_str).
    pub service_name: [u8; KERNEL_SERVICE_NAME_LEN],
}

impl KernelEvent {
    pub fn event_type(&self) -> EventType {
        self.header.event_type
    }

    pub fn is_ack(&self) -> bool {
        self.header.event_type == EventType::KernelAck
    }

    pub fn is_nack(&self) -> bool {
        self.header.event_type == EventType::KernelNack
    }

    pub fn parent(&self) -> Option<u64> {
        (self.parent_session_id != 0).then_some(self.parent_session_id)
    }

    /// Service name bytes up to the first NUL.
    pub fn service_name_bytes(&self) -> &[u8] {
        trim_nul(&self.service_name)
    }

    /// Service name as text. Invalid UTF-8 sequences are shown as U+FFFD;
    /// the exact bytes stay available in [`service_name`](Self::service_name).
    pub fn service_name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.service_name_bytes())
    }
}

/// Decode one kernel-originated message.
///
/// Any short read fails the whole decode. Bytes past [`KERNEL_EVENT_SIZE`]
/// are ignored.
pub fn decode_kernel_event(bytes: &[u8]) -> Result<KernelEvent> {
    let mut src = WireReader::new(bytes);
    let header = EventHeader::decode(&mut src, Direction::KernelToUser)?;
    let session = decode_session_descriptor(&mut src)?;
    let stats = decode_session_statistics(&mut src)?;
    let parent_session_id = src.get_u64()?;
    let service_name = src.get_array::<KERNEL_SERVICE_NAME_LEN>()?;

    Ok(KernelEvent {
        header,
        session,
        stats,
        parent_session_id,
        service_name,
    })
}
