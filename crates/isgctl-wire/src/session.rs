//! The session descriptor shared by approve/change requests and kernel
//! lifecycle notifications.
//!
//! Wire layout (92 bytes):
//! ```text
//! ┌────────┬────────────┬────────┬───────────┬─────────┬─────────┬───────┬──────┐
//! │ Id (8) │ Cookie(32) │ Ip (4) │ NatIp (4) │ Mac (6) │ Pad (2) │ Flags │ Port │
//! ├────────┴─────┬──────┴────────┴──┬────────┴─────┬───┴─────────┴───────┴──────┤
//! │ Export (4 s) │ Idle (4 s)       │ MaxDur (4 s) │ Rate[0], Rate[1]           │
//! │              │                  │              │ (rate, burst) x 2          │
//! └──────────────┴──────────────────┴──────────────┴────────────────────────────┘
//! ```
//!
//! The two bytes after the MAC mirror the kernel's `pad0[2]`: always written
//! as zero, skipped on decode. No other padding exists in the record.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Result, WireError};
use crate::field::{WireReader, WireWriter};

/// Wire size of an encoded [`SessionDescriptor`].
pub const SESSION_DESCRIPTOR_SIZE: usize = 8 + 32 + 4 + 4 + 6 + MAC_PAD_LEN + 4 + 4 + 4 + 4 + 4 + 4 * 4;

/// Width of the opaque correlation cookie.
pub const COOKIE_LEN: usize = 32;

const MAC_PAD_LEN: usize = 2;

/// Bit positions in [`SessionDescriptor::flags`].
pub struct SessionFlags;

impl SessionFlags {
    pub const APPROVED: u32 = 1 << 0;
    pub const SERVICE: u32 = 1 << 1;
    pub const SERVICE_STATUS_ON: u32 = 1 << 2;
    pub const SERVICE_ONLINE: u32 = 1 << 3;
    pub const NO_ACCOUNTING: u32 = 1 << 4;
    pub const DYING: u32 = 1 << 5;
    pub const SERVICE_TAGGER: u32 = 1 << 6;
    /// Bits userspace may set or clear with a change request.
    pub const USER_WRITABLE: u32 = 0x54;
}

/// One policing descriptor (kbit/s).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionRate {
    pub rate: u32,
    pub burst: u32,
}

impl SessionRate {
    pub const fn new(rate: u32, burst: u32) -> Self {
        Self { rate, burst }
    }
}

/// Identity, addressing and policy of one subscriber session.
///
/// Durations travel as whole seconds; sub-second precision is dropped on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub id: u64,
    pub cookie: [u8; COOKIE_LEN],
    pub ip_addr: Ipv4Addr,
    pub nat_ip_addr: Ipv4Addr,
    pub mac_addr: [u8; 6],
    pub flags: u32,
    pub port_number: u32,
    pub export_interval: Duration,
    pub idle_timeout: Duration,
    pub max_duration: Duration,
    pub rate: [SessionRate; 2],
}

impl Default for SessionDescriptor {
    fn default() -> Self {
        Self {
            id: 0,
            cookie: [0; COOKIE_LEN],
            ip_addr: Ipv4Addr::UNSPECIFIED,
            nat_ip_addr: Ipv4Addr::UNSPECIFIED,
            mac_addr: [0; 6],
            flags: 0,
            port_number: 0,
            export_interval: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            max_duration: Duration::ZERO,
            rate: [SessionRate::default(); 2],
        }
    }
}

impl SessionDescriptor {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    /// Colon-separated lowercase MAC address.
    pub fn mac_string(&self) -> String {
        self.mac_addr
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Append the 92-byte wire form of `desc`.
///
/// Fails with [`WireError::DurationOverflow`] if a duration needs more than
/// 32 bits of seconds. Nothing is written on failure.
pub fn encode_session_descriptor(desc: &SessionDescriptor, dst: &mut WireWriter) -> Result<()> {
    let export = duration_to_secs("export_interval", desc.export_interval)?;
    let idle = duration_to_secs("idle_timeout", desc.idle_timeout)?;
    let max = duration_to_secs("max_duration", desc.max_duration)?;

    dst.put_u64(desc.id);
    dst.put_fixed("cookie", &desc.cookie, COOKIE_LEN)?;
    dst.put_u32(u32::from(desc.ip_addr))
        .put_u32(u32::from(desc.nat_ip_addr));
    dst.put_fixed("mac_addr", &desc.mac_addr, 6 + MAC_PAD_LEN)?;
    dst.put_u32(desc.flags)
        .put_u32(desc.port_number)
        .put_u32(export)
        .put_u32(idle)
        .put_u32(max);
    for rate in &desc.rate {
        dst.put_u32(rate.rate).put_u32(rate.burst);
    }
    Ok(())
}

/// Read a session descriptor from the cursor.
///
/// Fails with [`WireError::InsufficientData`] if fewer than
/// [`SESSION_DESCRIPTOR_SIZE`] bytes remain; the cursor is left untouched then.
pub fn decode_session_descriptor(src: &mut WireReader<'_>) -> Result<SessionDescriptor> {
    src.ensure(SESSION_DESCRIPTOR_SIZE)?;

    let id = src.get_u64()?;
    let cookie = src.get_array::<COOKIE_LEN>()?;
    let ip_addr = Ipv4Addr::from(src.get_u32()?);
    let nat_ip_addr = Ipv4Addr::from(src.get_u32()?);
    let mac_addr = src.get_array::<6>()?;
    src.get_slice(MAC_PAD_LEN)?;
    let flags = src.get_u32()?;
    let port_number = src.get_u32()?;
    let export_interval = secs_to_duration(src.get_u32()?);
    let idle_timeout = secs_to_duration(src.get_u32()?);
    let max_duration = secs_to_duration(src.get_u32()?);
    let mut rate = [SessionRate::default(); 2];
    for slot in &mut rate {
        slot.rate = src.get_u32()?;
        slot.burst = src.get_u32()?;
    }

    Ok(SessionDescriptor {
        id,
        cookie,
        ip_addr,
        nat_ip_addr,
        mac_addr,
        flags,
        port_number,
        export_interval,
        idle_timeout,
        max_duration,
        rate,
    })
}

fn duration_to_secs(field: &'static str, value: Duration) -> Result<u32> {
    let secs = value.as_secs();
    u32::try_from(secs).map_err(|_| WireError::DurationOverflow { field, secs })
}

fn secs_to_duration(secs: u32) -> Duration {
    Duration::from_secs(u64::from(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionDescriptor {
        let mut cookie = [0u8; COOKIE_LEN];
        cookie[..6].copy_from_slice(b"radius");
        SessionDescriptor {
            id: 0x0102_0304_0506_0708,
            cookie,
            ip_addr: Ipv4Addr::new(192, 168, 0, 1),
            nat_ip_addr: Ipv4Addr::new(10, 0, 0, 1),
            mac_addr: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
            flags: SessionFlags::APPROVED | SessionFlags::SERVICE,
            port_number: 77,
            export_interval: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
            max_duration: Duration::from_secs(86_400),
            rate: [SessionRate::new(1024, 16), SessionRate::new(2048, 32)],
        }
    }

    fn encode(desc: &SessionDescriptor) -> Vec<u8> {
        let mut w = WireWriter::new();
        encode_session_descriptor(desc, &mut w).unwrap();
        w.as_slice().to_vec()
    }

    #[test]
    fn descriptor_size_is_92() {
        assert_eq!(SESSION_DESCRIPTOR_SIZE, 92);
        assert_eq!(encode(&sample()).len(), 92);
        assert_eq!(encode(&SessionDescriptor::default()).len(), 92);
    }

    #[test]
    fn field_offsets() {
        let bytes = encode(&sample());
        assert_eq!(&bytes[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[8..14], b"radius");
        assert_eq!(&bytes[40..44], &[192, 168, 0, 1]);
        assert_eq!(&bytes[44..48], &[10, 0, 0, 1]);
        assert_eq!(&bytes[48..54], &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        assert_eq!(&bytes[54..56], &[0, 0]);
        assert_eq!(&bytes[56..60], &[0, 0, 0, 3]);
        assert_eq!(&bytes[60..64], &77u32.to_be_bytes());
        assert_eq!(&bytes[64..68], &300u32.to_be_bytes());
        assert_eq!(&bytes[68..72], &60u32.to_be_bytes());
        assert_eq!(&bytes[72..76], &86_400u32.to_be_bytes());
        assert_eq!(&bytes[76..80], &1024u32.to_be_bytes());
        assert_eq!(&bytes[80..84], &16u32.to_be_bytes());
        assert_eq!(&bytes[84..88], &2048u32.to_be_bytes());
        assert_eq!(&bytes[88..92], &32u32.to_be_bytes());
    }

    #[test]
    fn whole_second_roundtrip() {
        let desc = sample();
        let bytes = encode(&desc);
        let mut r = WireReader::new(&bytes);
        assert_eq!(decode_session_descriptor(&mut r).unwrap(), desc);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let mut desc = sample();
        desc.idle_timeout = Duration::from_millis(2_999);
        let bytes = encode(&desc);
        assert_eq!(&bytes[68..72], &2u32.to_be_bytes());

        let decoded = decode_session_descriptor(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(decoded.idle_timeout, Duration::from_secs(2));
    }

    #[test]
    fn duration_overflow_reported() {
        let mut desc = sample();
        desc.max_duration = Duration::from_secs(u64::from(u32::MAX) + 1);
        let mut w = WireWriter::new();
        let err = encode_session_descriptor(&desc, &mut w).unwrap_err();
        assert_eq!(
            err,
            WireError::DurationOverflow {
                field: "max_duration",
                secs: u64::from(u32::MAX) + 1
            }
        );
        assert!(w.is_empty());
    }

    #[test]
    fn max_seconds_fits() {
        let mut desc = sample();
        desc.export_interval = Duration::from_secs(u64::from(u32::MAX));
        let bytes = encode(&desc);
        let decoded = decode_session_descriptor(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(decoded.export_interval.as_secs(), u64::from(u32::MAX));
    }

    #[test]
    fn truncated_descriptor_rejected() {
        let bytes = encode(&sample());
        let mut r = WireReader::new(&bytes[..91]);
        let err = decode_session_descriptor(&mut r).unwrap_err();
        assert_eq!(
            err,
            WireError::InsufficientData {
                needed: 92,
                remaining: 91
            }
        );
        assert_eq!(r.remaining(), 91);
    }

    #[test]
    fn mac_padding_ignored_on_decode() {
        let mut bytes = encode(&sample());
        bytes[54] = 0xaa;
        bytes[55] = 0x55;
        let decoded = decode_session_descriptor(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn flag_helpers() {
        let desc = sample();
        assert!(desc.has_flag(SessionFlags::APPROVED));
        assert!(!desc.has_flag(SessionFlags::DYING));
        assert_eq!(desc.mac_string(), "de:ad:be:ef:00:01");
    }
}
