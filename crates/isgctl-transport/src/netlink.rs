//! Netlink framing and the `AF_NETLINK` datagram channel.
//!
//! Every ISG event travels as the payload of one netlink message:
//! ```text
//! ┌────────────┬──────────┬───────────┬─────────┬─────────┬─────────────────┐
//! │ Length (4) │ Type (2) │ Flags (2) │ Seq (4) │ Pid (4) │ Payload (+pad)  │
//! │ host order │          │           │         │         │ 4-byte aligned  │
//! └────────────┴──────────┴───────────┴─────────┴─────────┴─────────────────┘
//! ```
//! The netlink header is host byte order; the ISG payload inside it is
//! big-endian and opaque to this layer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Netlink message header size.
pub const NLMSG_HDRLEN: usize = 16;

/// Request flag set on every outgoing message.
pub const NLM_F_REQUEST: u16 = 0x01;

/// Lowest message type not reserved for netlink control messages.
pub const NLMSG_MIN_TYPE: u16 = 0x10;

/// Message type stamped on ISG requests.
pub const ISG_MSG_TYPE: u16 = 32;

const NLMSG_NOOP: u16 = 0x01;
const NLMSG_ERROR: u16 = 0x02;
const NLMSG_DONE: u16 = 0x03;

/// Round `len` up to netlink's 4-byte alignment.
pub const fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}

/// Parsed netlink message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetlinkHeader {
    pub len: u32,
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

impl NetlinkHeader {
    fn parse(src: &[u8]) -> Self {
        let u32_at = |at: usize| u32::from_ne_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]]);
        let u16_at = |at: usize| u16::from_ne_bytes([src[at], src[at + 1]]);
        Self {
            len: u32_at(0),
            kind: u16_at(4),
            flags: u16_at(6),
            seq: u32_at(8),
            pid: u32_at(12),
        }
    }
}

/// Header for the `seq`-th request sent from port `pid`.
pub fn request_header(seq: u32, pid: u32) -> NetlinkHeader {
    NetlinkHeader {
        len: 0,
        kind: ISG_MSG_TYPE,
        flags: NLM_F_REQUEST,
        seq,
        pid,
    }
}

/// Wrap `payload` in a netlink header and append it to `dst`.
pub fn encode_message(header: NetlinkHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = NLMSG_HDRLEN + payload.len();
    let wire_len = u32::try_from(len)
        .map_err(|_| TransportError::Malformed(format!("payload too large ({len} bytes)")))?;
    let aligned = nlmsg_align(len);

    dst.reserve(aligned);
    dst.put_slice(&wire_len.to_ne_bytes());
    dst.put_slice(&header.kind.to_ne_bytes());
    dst.put_slice(&header.flags.to_ne_bytes());
    dst.put_slice(&header.seq.to_ne_bytes());
    dst.put_slice(&header.pid.to_ne_bytes());
    dst.put_slice(payload);
    dst.put_bytes(0, aligned - len);
    Ok(())
}

/// Split one received datagram into the payloads it carries.
///
/// `NOOP`, `DONE` and zero-code `ERROR` (plain acks) carry nothing and are
/// dropped. A non-zero `ERROR` fails with [`TransportError::Kernel`].
pub fn split_datagram(datagram: &Bytes) -> Result<Vec<Bytes>> {
    let mut payloads = Vec::new();
    let mut offset = 0usize;

    while datagram.len() - offset >= NLMSG_HDRLEN {
        let header = NetlinkHeader::parse(&datagram[offset..]);
        let len = header.len as usize;
        if len < NLMSG_HDRLEN || len > datagram.len() - offset {
            return Err(TransportError::Malformed(format!(
                "message length {len} at offset {offset} in {}-byte datagram",
                datagram.len()
            )));
        }

        let body = datagram.slice(offset + NLMSG_HDRLEN..offset + len);
        match header.kind {
            NLMSG_NOOP | NLMSG_DONE => {}
            NLMSG_ERROR => {
                if body.len() < 4 {
                    return Err(TransportError::Malformed(
                        "truncated netlink error message".to_string(),
                    ));
                }
                let code = i32::from_ne_bytes([body[0], body[1], body[2], body[3]]);
                if code != 0 {
                    return Err(TransportError::Kernel {
                        errno: code.saturating_neg(),
                    });
                }
            }
            _ => payloads.push(body),
        }

        offset += nlmsg_align(len).min(datagram.len() - offset);
    }

    Ok(payloads)
}

#[cfg(target_os = "linux")]
pub use socket::NetlinkChannel;

#[cfg(target_os = "linux")]
mod socket {
    use std::collections::VecDeque;
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::time::Duration;

    use bytes::{Bytes, BytesMut};
    use tracing::{debug, info, warn};

    use super::{encode_message, request_header, split_datagram};
    use crate::config::ChannelConfig;
    use crate::error::{Result, TransportError};
    use crate::traits::EventChannel;

    /// `AF_NETLINK` raw socket bound to the ISG protocol.
    pub struct NetlinkChannel {
        fd: OwnedFd,
        config: ChannelConfig,
        local_pid: u32,
        seq: u32,
        buf: Vec<u8>,
        pending: VecDeque<Bytes>,
    }

    impl NetlinkChannel {
        /// Open a channel with default configuration.
        pub fn open() -> Result<Self> {
            Self::open_with_config(ChannelConfig::default())
        }

        /// Open and bind a netlink socket for `config.protocol`.
        pub fn open_with_config(config: ChannelConfig) -> Result<Self> {
            // SAFETY: plain syscall with constant arguments; the result is checked below.
            let raw = unsafe {
                libc::socket(
                    libc::AF_NETLINK,
                    libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                    config.protocol,
                )
            };
            if raw < 0 {
                return Err(TransportError::Socket {
                    protocol: config.protocol,
                    source: io::Error::last_os_error(),
                });
            }
            // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let mut addr = kernel_addr();
            let mut addr_len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
            // SAFETY: `addr` is a valid sockaddr_nl and `addr_len` matches its size.
            let rc = unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    (&addr as *const libc::sockaddr_nl).cast::<libc::sockaddr>(),
                    addr_len,
                )
            };
            if rc < 0 {
                return Err(TransportError::Bind(io::Error::last_os_error()));
            }

            // SAFETY: `addr` and `addr_len` are valid writable locations of the right size.
            let rc = unsafe {
                libc::getsockname(
                    fd.as_raw_fd(),
                    (&mut addr as *mut libc::sockaddr_nl).cast::<libc::sockaddr>(),
                    &mut addr_len,
                )
            };
            if rc < 0 {
                return Err(TransportError::Bind(io::Error::last_os_error()));
            }

            let mut channel = Self {
                fd,
                local_pid: addr.nl_pid,
                seq: 0,
                buf: vec![0u8; config.recv_buffer_size.max(super::NLMSG_HDRLEN)],
                pending: VecDeque::new(),
                config,
            };
            channel.set_read_timeout(channel.config.read_timeout)?;

            info!(
                protocol = channel.config.protocol,
                pid = channel.local_pid,
                "opened netlink channel"
            );
            Ok(channel)
        }

        /// Set the receive timeout. `None` blocks until a datagram arrives.
        pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
            let timeout = timeout.map(|t| t.max(Duration::from_micros(1)));
            let tv = match timeout {
                Some(t) => libc::timeval {
                    tv_sec: t.as_secs() as libc::time_t,
                    tv_usec: t.subsec_micros() as libc::suseconds_t,
                },
                None => libc::timeval {
                    tv_sec: 0,
                    tv_usec: 0,
                },
            };
            // SAFETY: `tv` is a valid timeval and the length matches its size.
            let rc = unsafe {
                libc::setsockopt(
                    self.fd.as_raw_fd(),
                    libc::SOL_SOCKET,
                    libc::SO_RCVTIMEO,
                    (&tv as *const libc::timeval).cast::<libc::c_void>(),
                    mem::size_of::<libc::timeval>() as libc::socklen_t,
                )
            };
            if rc < 0 {
                return Err(TransportError::Io(io::Error::last_os_error()));
            }
            self.config.read_timeout = timeout;
            Ok(())
        }

        /// Port id the kernel assigned to this socket.
        pub fn local_pid(&self) -> u32 {
            self.local_pid
        }

        /// Current channel configuration.
        pub fn config(&self) -> &ChannelConfig {
            &self.config
        }

        fn recv_datagram(&mut self) -> Result<Bytes> {
            loop {
                // SAFETY: `buf` is a valid writable buffer of `buf.len()` bytes.
                let n = unsafe {
                    libc::recv(
                        self.fd.as_raw_fd(),
                        self.buf.as_mut_ptr().cast::<libc::c_void>(),
                        self.buf.len(),
                        0,
                    )
                };
                if n < 0 {
                    let err = io::Error::last_os_error();
                    return match err.kind() {
                        io::ErrorKind::Interrupted => continue,
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Err(
                            TransportError::Timeout(self.config.read_timeout.unwrap_or_default()),
                        ),
                        _ => Err(TransportError::Io(err)),
                    };
                }
                if n == 0 {
                    return Err(TransportError::Closed);
                }
                return Ok(Bytes::copy_from_slice(&self.buf[..n as usize]));
            }
        }
    }

    impl EventChannel for NetlinkChannel {
        fn send(&mut self, msg: &[u8]) -> Result<()> {
            self.seq = self.seq.wrapping_add(1);
            let header = request_header(self.seq, self.local_pid);
            let mut wire = BytesMut::new();
            encode_message(header, msg, &mut wire)?;

            let addr = kernel_addr();
            loop {
                // SAFETY: `wire` and `addr` outlive the call and lengths match.
                let n = unsafe {
                    libc::sendto(
                        self.fd.as_raw_fd(),
                        wire.as_ptr().cast::<libc::c_void>(),
                        wire.len(),
                        0,
                        (&addr as *const libc::sockaddr_nl).cast::<libc::sockaddr>(),
                        mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
                    )
                };
                if n < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(TransportError::Io(err));
                }
                debug!(seq = self.seq, len = msg.len(), "sent netlink message");
                return Ok(());
            }
        }

        fn receive(&mut self) -> Result<Bytes> {
            loop {
                if let Some(payload) = self.pending.pop_front() {
                    return Ok(payload);
                }
                let datagram = self.recv_datagram()?;
                match split_datagram(&datagram) {
                    Ok(payloads) => self.pending.extend(payloads),
                    Err(err) => {
                        warn!(error = %err, "dropping netlink datagram");
                        return Err(err);
                    }
                }
            }
        }
    }

    impl std::fmt::Debug for NetlinkChannel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("NetlinkChannel")
                .field("protocol", &self.config.protocol)
                .field("pid", &self.local_pid)
                .finish()
        }
    }

    impl Drop for NetlinkChannel {
        fn drop(&mut self) {
            debug!(pid = self.local_pid, "closing netlink channel");
        }
    }

    /// Zeroed netlink address: pid 0 is the kernel, groups 0 is unicast.
    fn kernel_addr() -> libc::sockaddr_nl {
        // SAFETY: sockaddr_nl is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr
    }

}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    fn header(kind: u16) -> NetlinkHeader {
        NetlinkHeader {
            len: 0,
            kind,
            flags: NLM_F_REQUEST,
            seq: 1,
            pid: 1234,
        }
    }

    #[test]
    fn encode_aligns_and_fills_length() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_MIN_TYPE), b"abcde", &mut wire).unwrap();

        assert_eq!(wire.len(), nlmsg_align(NLMSG_HDRLEN + 5));
        let parsed = NetlinkHeader::parse(&wire);
        assert_eq!(parsed.len as usize, NLMSG_HDRLEN + 5);
        assert_eq!(parsed.kind, NLMSG_MIN_TYPE);
        assert_eq!(parsed.pid, 1234);
        assert_eq!(&wire[NLMSG_HDRLEN..NLMSG_HDRLEN + 5], b"abcde");
        assert_eq!(&wire[NLMSG_HDRLEN + 5..], &[0, 0, 0]);
    }

    #[test]
    fn request_header_uses_isg_type() {
        let mut wire = BytesMut::new();
        encode_message(request_header(7, 4242), &[0u8; 129], &mut wire).unwrap();

        let parsed = NetlinkHeader::parse(&wire);
        assert_eq!(parsed.kind, ISG_MSG_TYPE);
        assert!(parsed.kind >= NLMSG_MIN_TYPE);
        assert_eq!(parsed.flags, NLM_F_REQUEST);
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.pid, 4242);
        assert_eq!(parsed.len as usize, NLMSG_HDRLEN + 129);
        assert_eq!(wire.len(), nlmsg_align(NLMSG_HDRLEN + 129));
    }

    #[test]
    fn split_multiple_payloads() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_MIN_TYPE), b"first", &mut wire).unwrap();
        encode_message(header(NLMSG_NOOP), b"", &mut wire).unwrap();
        encode_message(header(NLMSG_MIN_TYPE), b"second!!", &mut wire).unwrap();
        encode_message(header(NLMSG_DONE), &0i32.to_ne_bytes(), &mut wire).unwrap();

        let payloads = split_datagram(&wire.freeze()).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].as_ref(), b"first");
        assert_eq!(payloads[1].as_ref(), b"second!!");
    }

    #[test]
    fn zero_error_is_ack() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_ERROR), &0i32.to_ne_bytes(), &mut wire).unwrap();
        assert!(split_datagram(&wire.freeze()).unwrap().is_empty());
    }

    #[test]
    fn negative_error_is_kernel_errno() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_ERROR), &(-22i32).to_ne_bytes(), &mut wire).unwrap();
        let err = split_datagram(&wire.freeze()).unwrap_err();
        assert!(matches!(err, TransportError::Kernel { errno: 22 }));
    }

    #[test]
    fn overlong_length_is_malformed() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_MIN_TYPE), b"payload", &mut wire).unwrap();
        wire[0..4].copy_from_slice(&1000u32.to_ne_bytes());
        let err = split_datagram(&wire.freeze()).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[test]
    fn undersized_length_is_malformed() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_MIN_TYPE), b"", &mut wire).unwrap();
        wire[0..4].copy_from_slice(&8u32.to_ne_bytes());
        assert!(split_datagram(&wire.freeze()).is_err());
    }

    #[test]
    fn short_trailer_ignored() {
        let mut wire = BytesMut::new();
        encode_message(header(NLMSG_MIN_TYPE), b"only", &mut wire).unwrap();
        wire.put_slice(&[0, 0, 0]);
        let payloads = split_datagram(&wire.freeze()).unwrap();
        assert_eq!(payloads.len(), 1);
    }
}
