use isgctl_transport::{EventChannel, TransportError};
use isgctl_wire::{decode_kernel_event, encode_user_event, EncodeUserEvent, KernelEvent};
use tracing::{debug, warn};

use crate::exit::{transport_error, wire_error, CliError, CliResult, KERNEL_REJECTED};

/// When to stop reading kernel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamUntil {
    /// Stop at the first kernel ack.
    pub ack: bool,
    /// Stop after this many session events.
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub events: usize,
    pub skipped: usize,
    pub acked: bool,
    pub timed_out: bool,
}

/// Encode `request` and send it as one message.
pub fn send_request<C, E>(channel: &mut C, request: &E) -> CliResult<()>
where
    C: EventChannel + ?Sized,
    E: EncodeUserEvent + ?Sized,
{
    let bytes = encode_user_event(request).map_err(|err| wire_error("encode failed", err))?;
    channel
        .send(&bytes)
        .map_err(|err| transport_error("send failed", err))
}

/// Read kernel events, handing each session event to `on_event`.
///
/// Undecodable messages are logged and skipped. A kernel nack fails the
/// stream; a receive timeout ends it normally.
pub fn stream_events<C, F>(channel: &mut C, until: StreamUntil, mut on_event: F) -> CliResult<StreamSummary>
where
    C: EventChannel + ?Sized,
    F: FnMut(&KernelEvent),
{
    let mut summary = StreamSummary::default();

    loop {
        if until.limit.is_some_and(|limit| summary.events >= limit) {
            return Ok(summary);
        }

        let msg = match channel.receive() {
            Ok(msg) => msg,
            Err(TransportError::Timeout(after)) => {
                debug!(?after, events = summary.events, "no more kernel events");
                summary.timed_out = true;
                return Ok(summary);
            }
            Err(err) => return Err(transport_error("receive failed", err)),
        };

        let event = match decode_kernel_event(&msg) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, len = msg.len(), "skipping undecodable kernel message");
                summary.skipped += 1;
                continue;
            }
        };

        if event.is_nack() {
            return Err(CliError::new(
                KERNEL_REJECTED,
                format!("kernel rejected request (session {})", event.session.id),
            ));
        }
        if event.is_ack() {
            summary.acked = true;
            if until.ack {
                return Ok(summary);
            }
            continue;
        }

        on_event(&event);
        summary.events += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use isgctl_transport::MemoryChannel;
    use isgctl_wire::{
        encode_session_descriptor, EventType, SessionDescriptor, UserEventSessionInfo, WireWriter,
        KERNEL_SERVICE_NAME_LEN,
    };

    use super::*;

    fn kernel_event(event_type: EventType, id: u64) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u32(event_type.code());
        let desc = SessionDescriptor {
            id,
            ..SessionDescriptor::default()
        };
        encode_session_descriptor(&desc, &mut w).unwrap();
        w.put_fixed("stats", &[], 40).unwrap();
        w.put_u64(0);
        w.put_fixed("service_name", b"", KERNEL_SERVICE_NAME_LEN)
            .unwrap();
        w.as_slice().to_vec()
    }

    fn fake_kernel(replies: Vec<Vec<u8>>) -> (MemoryChannel, std::thread::JoinHandle<Vec<u8>>) {
        let (mut user, mut kernel) = MemoryChannel::pair();
        user.set_read_timeout(Some(Duration::from_millis(200)));
        let handle = std::thread::spawn(move || {
            let request = kernel.receive().unwrap().to_vec();
            for reply in replies {
                kernel.send(&reply).unwrap();
            }
            request
        });
        (user, handle)
    }

    #[test]
    fn getlist_until_ack() {
        let (mut user, kernel) = fake_kernel(vec![
            kernel_event(EventType::SessInfo, 1),
            kernel_event(EventType::SessInfo, 2),
            kernel_event(EventType::KernelAck, 0),
            kernel_event(EventType::SessInfo, 3),
        ]);

        send_request(&mut user, &UserEventSessionInfo::control(EventType::SessGetlist)).unwrap();
        let mut ids = Vec::new();
        let summary = stream_events(
            &mut user,
            StreamUntil {
                ack: true,
                limit: None,
            },
            |ev| ids.push(ev.session.id),
        )
        .unwrap();

        assert_eq!(ids, vec![1, 2]);
        assert!(summary.acked);
        assert!(!summary.timed_out);

        let request = kernel.join().unwrap();
        assert_eq!(&request[0..4], &EventType::SessGetlist.code().to_be_bytes());
    }

    #[test]
    fn garbage_is_skipped() {
        let (mut user, kernel) = fake_kernel(vec![
            vec![0, 0],
            kernel_event(EventType::SessApprove, 9),
            kernel_event(EventType::SessStart, 4),
        ]);
        send_request(&mut user, &UserEventSessionInfo::control(EventType::ListenerReg)).unwrap();

        let mut seen = 0;
        let summary = stream_events(
            &mut user,
            StreamUntil {
                ack: false,
                limit: Some(1),
            },
            |_| seen += 1,
        )
        .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(summary.skipped, 2);
        kernel.join().unwrap();
    }

    #[test]
    fn nack_fails_stream() {
        let (mut user, kernel) = fake_kernel(vec![kernel_event(EventType::KernelNack, 5)]);
        send_request(&mut user, &UserEventSessionInfo::control(EventType::SessClear)).unwrap();

        let err = stream_events(
            &mut user,
            StreamUntil {
                ack: true,
                limit: None,
            },
            |_| {},
        )
        .unwrap_err();
        assert_eq!(err.code, KERNEL_REJECTED);
        kernel.join().unwrap();
    }

    #[test]
    fn timeout_ends_stream() {
        let (mut user, mut kernel) = MemoryChannel::pair();
        user.set_read_timeout(Some(Duration::from_millis(20)));
        kernel
            .send(&kernel_event(EventType::SessUpdate, 8))
            .unwrap();

        let summary = stream_events(
            &mut user,
            StreamUntil {
                ack: true,
                limit: None,
            },
            |_| {},
        )
        .unwrap();
        assert_eq!(summary.events, 1);
        assert!(summary.timed_out);
        drop(kernel);
    }

    #[test]
    fn encode_errors_are_not_sent() {
        let (mut user, mut kernel) = MemoryChannel::pair();
        kernel.set_read_timeout(Some(Duration::from_millis(10)));
        let mut request = UserEventSessionInfo::control(EventType::SessApprove);
        request.service_name = "x".repeat(33);

        assert!(send_request(&mut user, &request).is_err());
        assert!(matches!(kernel.receive(), Err(TransportError::Timeout(_))));
    }
}
