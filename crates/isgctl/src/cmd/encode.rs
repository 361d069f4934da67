use std::net::Ipv4Addr;
use std::time::Duration;

use isgctl_wire::{
    encode_user_event, EventHeader, EventType, FlagOp, SessionDescriptor, SessionRate,
    UserEvent, UserEventNetworkEntry, UserEventServiceDescription, UserEventSessionInfo,
    WireError, COOKIE_LEN, SERVICE_DESC_IS_DYNAMIC,
};
use tracing::info;

use crate::cmd::stream::{send_request, stream_events, StreamUntil};
use crate::cmd::{open_channel, parse_duration, EncodeArgs, EncodeRequest, FlagOpArg, SessionArgs};
use crate::exit::{wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, print_events, OutputFormat};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Codes whose body is a network entry.
const NETWORK_ENTRY_CODES: &[EventType] = &[
    EventType::NeAddQueue,
    EventType::NeSweepQueue,
    EventType::NeCommit,
];

/// Codes that carry nothing beyond their header (plus an optional session id).
const CONTROL_CODES: &[EventType] = &[
    EventType::ListenerReg,
    EventType::ListenerRegV1,
    EventType::ListenerUnreg,
    EventType::SessGetlist,
    EventType::SessGetcount,
    EventType::SessClear,
    EventType::NeSweepQueue,
    EventType::NeCommit,
    EventType::ServApply,
    EventType::SdescSweepTc,
    EventType::ServGetlist,
];

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.send && matches!(args.request, EncodeRequest::ServiceDesc(_)) {
        return Err(CliError::new(
            USAGE,
            "service descriptions have no event code and cannot be sent on their own",
        ));
    }

    let event = build_event(args.request)?;
    let bytes = encode_user_event(&event).map_err(|err| wire_error("encode failed", err))?;

    if !args.send {
        print_encoded(&bytes, format);
        return Ok(SUCCESS);
    }

    let mut channel = open_channel(args.channel.config(Some(SEND_TIMEOUT))?)?;
    send_request(channel.as_mut(), &event)?;

    let mut replies = Vec::new();
    let summary = stream_events(
        channel.as_mut(),
        StreamUntil {
            ack: true,
            limit: None,
        },
        |ev| replies.push(ev.clone()),
    )?;
    info!(
        acked = summary.acked,
        replies = replies.len(),
        "request delivered"
    );
    if !replies.is_empty() {
        print_events(&replies, format);
    }

    Ok(SUCCESS)
}

fn build_event(request: EncodeRequest) -> CliResult<UserEvent> {
    let event = match request {
        EncodeRequest::Approve(args) => {
            let mut ev = session_info(EventType::SessApprove, &args)?;
            ev.service_name = args.service.unwrap_or_default();
            UserEvent::from(ev)
        }
        EncodeRequest::Change(args) => {
            let mut ev = session_info(EventType::SessChange, &args.session)?;
            ev.service_name = args.session.service.unwrap_or_default();
            ev.flags = match args.flag_op {
                Some(FlagOpArg::Set) => FlagOp::SET,
                Some(FlagOpArg::Unset) => FlagOp::UNSET,
                None => 0,
            };
            UserEvent::from(ev)
        }
        EncodeRequest::NetworkEntry(args) => {
            require_code("network-entry", args.event, NETWORK_ENTRY_CODES)?;
            UserEvent::from(UserEventNetworkEntry {
                header: EventHeader::new(args.event),
                prefix: args.prefix,
                mask: args.mask,
                tc_name: args.tc,
            })
        }
        EncodeRequest::ServiceDesc(args) => UserEvent::from(UserEventServiceDescription {
            tc_name: args.tc,
            service_name: args.service,
            flags: if args.dynamic {
                SERVICE_DESC_IS_DYNAMIC
            } else {
                0
            },
        }),
        EncodeRequest::Control(args) => {
            require_code("control", args.event, CONTROL_CODES)?;
            let mut ev = UserEventSessionInfo::control(args.event);
            ev.session.id = args.id;
            UserEvent::from(ev)
        }
    };
    Ok(event)
}

fn require_code(request: &str, event_type: EventType, allowed: &[EventType]) -> CliResult<()> {
    if allowed.contains(&event_type) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(|ty| ty.name()).collect();
    Err(CliError::new(
        USAGE,
        format!(
            "{event_type} cannot be encoded as a {request} request (expected one of: {})",
            names.join(", ")
        ),
    ))
}

fn session_info(event_type: EventType, args: &SessionArgs) -> CliResult<UserEventSessionInfo> {
    let mut desc = SessionDescriptor {
        id: args.id,
        ip_addr: args.ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
        nat_ip_addr: args.nat_ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
        flags: args.flags.unwrap_or_default(),
        port_number: args.port.unwrap_or_default(),
        export_interval: optional_duration(args.export_interval.as_deref())?,
        idle_timeout: optional_duration(args.idle_timeout.as_deref())?,
        max_duration: optional_duration(args.max_duration.as_deref())?,
        ..SessionDescriptor::default()
    };

    if let Some(cookie) = &args.cookie {
        desc.cookie = parse_cookie(cookie)?;
    }
    if let Some(mac) = &args.mac {
        desc.mac_addr = parse_mac(mac)?;
    }
    if args.rates.len() > desc.rate.len() {
        return Err(CliError::new(
            USAGE,
            format!("at most {} --rate values are allowed", desc.rate.len()),
        ));
    }
    for (slot, raw) in desc.rate.iter_mut().zip(&args.rates) {
        *slot = parse_rate(raw)?;
    }

    Ok(UserEventSessionInfo::new(event_type, desc))
}

fn optional_duration(raw: Option<&str>) -> CliResult<Duration> {
    raw.map_or(Ok(Duration::ZERO), parse_duration)
}

fn parse_cookie(input: &str) -> CliResult<[u8; COOKIE_LEN]> {
    let bytes = hex::decode(input.trim())
        .map_err(|err| CliError::new(USAGE, format!("--cookie is not valid hex: {err}")))?;
    if bytes.len() > COOKIE_LEN {
        return Err(wire_error(
            "invalid --cookie",
            WireError::FieldTooLong {
                field: "cookie",
                len: bytes.len(),
                max: COOKIE_LEN,
            },
        ));
    }
    let mut cookie = [0u8; COOKIE_LEN];
    cookie[..bytes.len()].copy_from_slice(&bytes);
    Ok(cookie)
}

fn parse_mac(input: &str) -> CliResult<[u8; 6]> {
    let invalid = || CliError::new(USAGE, format!("invalid MAC address: {input}"));
    let mut mac = [0u8; 6];
    let mut parts = input.split([':', '-']);
    for octet in &mut mac {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(mac)
}

fn parse_rate(input: &str) -> CliResult<SessionRate> {
    let invalid = || CliError::new(USAGE, format!("--rate expects RATE:BURST, got {input}"));
    let (rate, burst) = input.split_once(':').ok_or_else(invalid)?;
    let rate = rate.trim().parse().map_err(|_| invalid())?;
    let burst = burst.trim().parse().map_err(|_| invalid())?;
    Ok(SessionRate::new(rate, burst))
}
