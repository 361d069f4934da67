//! Event codes and their direction.
//!
//! Codes 0x01-0x20 (plus the v1 listener registration) flow from userspace
//! to the kernel. Session notifications and the two acknowledgement codes
//! flow the other way.

use std::fmt;
use std::str::FromStr;

use crate::error::UnknownEventName;

/// Which side of the control channel originates an event code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    UserToKernel,
    KernelToUser,
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::UserToKernel => "user-to-kernel",
            Direction::KernelToUser => "kernel-to-user",
            Direction::Unknown => "unknown",
        })
    }
}

/// 32-bit ISG event code; always the first field of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    ListenerReg = 0x01,
    ListenerRegV1 = 0x101,
    ListenerUnreg = 0x02,
    SessApprove = 0x04,
    SessChange = 0x05,
    SessClear = 0x09,
    SessGetlist = 0x10,
    SessGetcount = 0x12,
    NeAddQueue = 0x14,
    NeSweepQueue = 0x15,
    NeCommit = 0x16,
    ServApply = 0x17,
    SdescAdd = 0x18,
    SdescSweepTc = 0x19,
    ServGetlist = 0x20,

    SessCreate = 0x03,
    SessStart = 0x06,
    SessUpdate = 0x07,
    SessStop = 0x08,
    SessInfo = 0x11,
    SessCount = 0x13,

    KernelAck = 0x98,
    KernelNack = 0x99,
}

impl EventType {
    /// Every known event code.
    pub const ALL: [EventType; 23] = [
        EventType::ListenerReg,
        EventType::ListenerRegV1,
        EventType::ListenerUnreg,
        EventType::SessApprove,
        EventType::SessChange,
        EventType::SessClear,
        EventType::SessGetlist,
        EventType::SessGetcount,
        EventType::NeAddQueue,
        EventType::NeSweepQueue,
        EventType::NeCommit,
        EventType::ServApply,
        EventType::SdescAdd,
        EventType::SdescSweepTc,
        EventType::ServGetlist,
        EventType::SessCreate,
        EventType::SessStart,
        EventType::SessUpdate,
        EventType::SessStop,
        EventType::SessInfo,
        EventType::SessCount,
        EventType::KernelAck,
        EventType::KernelNack,
    ];

    /// The wire code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Look up a wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.code() == code)
    }

    pub const fn direction(self) -> Direction {
        match self {
            EventType::SessCreate
            | EventType::SessStart
            | EventType::SessUpdate
            | EventType::SessStop
            | EventType::SessInfo
            | EventType::SessCount
            | EventType::KernelAck
            | EventType::KernelNack => Direction::KernelToUser,
            _ => Direction::UserToKernel,
        }
    }

    /// Stable lowercase name, also accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            EventType::ListenerReg => "listener-reg",
            EventType::ListenerRegV1 => "listener-reg-v1",
            EventType::ListenerUnreg => "listener-unreg",
            EventType::SessApprove => "sess-approve",
            EventType::SessChange => "sess-change",
            EventType::SessClear => "sess-clear",
            EventType::SessGetlist => "sess-getlist",
            EventType::SessGetcount => "sess-getcount",
            EventType::NeAddQueue => "ne-add-queue",
            EventType::NeSweepQueue => "ne-sweep-queue",
            EventType::NeCommit => "ne-commit",
            EventType::ServApply => "serv-apply",
            EventType::SdescAdd => "sdesc-add",
            EventType::SdescSweepTc => "sdesc-sweep-tc",
            EventType::ServGetlist => "serv-getlist",
            EventType::SessCreate => "sess-create",
            EventType::SessStart => "sess-start",
            EventType::SessUpdate => "sess-update",
            EventType::SessStop => "sess-stop",
            EventType::SessInfo => "sess-info",
            EventType::SessCount => "sess-count",
            EventType::KernelAck => "kernel-ack",
            EventType::KernelNack => "kernel-nack",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

/// Classify a raw wire code.
pub fn classify(code: u32) -> Direction {
    EventType::from_code(code).map_or(Direction::Unknown, EventType::direction)
}
