use std::borrow::Cow;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use isgctl_wire::KernelEvent;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RateOutput {
    rate: u32,
    burst: u32,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event_type: &'a str,
    code: u32,
    session_id: u64,
    cookie: String,
    ip_addr: String,
    nat_ip_addr: String,
    mac_addr: String,
    flags: u32,
    port_number: u32,
    export_interval_secs: u64,
    idle_timeout_secs: u64,
    max_duration_secs: u64,
    rate: [RateOutput; 2],
    duration_secs: u64,
    in_packets: u64,
    in_bytes: u64,
    out_packets: u64,
    out_bytes: u64,
    parent_session_id: Option<u64>,
    service_name: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name_hex: Option<String>,
}

impl<'a> From<&'a KernelEvent> for EventOutput<'a> {
    fn from(ev: &'a KernelEvent) -> Self {
        let s = &ev.session;
        Self {
            event_type: ev.event_type().name(),
            code: ev.event_type().code(),
            session_id: s.id,
            cookie: cookie_hex(&s.cookie),
            ip_addr: s.ip_addr.to_string(),
            nat_ip_addr: s.nat_ip_addr.to_string(),
            mac_addr: s.mac_string(),
            flags: s.flags,
            port_number: s.port_number,
            export_interval_secs: s.export_interval.as_secs(),
            idle_timeout_secs: s.idle_timeout.as_secs(),
            max_duration_secs: s.max_duration.as_secs(),
            rate: s.rate.map(|r| RateOutput {
                rate: r.rate,
                burst: r.burst,
            }),
            duration_secs: ev.stats.duration.as_secs(),
            in_packets: ev.stats.in_packets,
            in_bytes: ev.stats.in_bytes,
            out_packets: ev.stats.out_packets,
            out_bytes: ev.stats.out_bytes,
            parent_session_id: ev.parent(),
            service_name: ev.service_name_str(),
            service_name_hex: std::str::from_utf8(ev.service_name_bytes())
                .is_err()
                .then(|| hex::encode(ev.service_name_bytes())),
        }
    }
}

/// Print decoded kernel events. `Raw` is not meaningful here and falls back to pretty.
pub fn print_events(events: &[KernelEvent], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for ev in events {
                println!(
                    "{}",
                    serde_json::to_string(&EventOutput::from(ev)).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "EVENT", "ID", "IP", "MAC", "FLAGS", "DURATION", "IN", "OUT", "PARENT",
                    "SERVICE",
                ]);
            for ev in events {
                table.add_row(vec![
                    ev.event_type().name().to_string(),
                    ev.session.id.to_string(),
                    ev.session.ip_addr.to_string(),
                    ev.session.mac_string(),
                    format!("{:#x}", ev.session.flags),
                    format!("{}s", ev.stats.duration.as_secs()),
                    format!("{}/{}", ev.stats.in_packets, ev.stats.in_bytes),
                    format!("{}/{}", ev.stats.out_packets, ev.stats.out_bytes),
                    ev.parent().map(|p| p.to_string()).unwrap_or_default(),
                    ev.service_name_str().into_owned(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for ev in events {
                println!("{}", pretty_line(ev));
            }
        }
    }
}

/// Print an encoded message: raw bytes for `Raw`, hex otherwise.
pub fn print_encoded(bytes: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Raw => print_raw(bytes),
        OutputFormat::Json => {
            let out = serde_json::json!({ "len": bytes.len(), "hex": hex::encode(bytes) });
            println!("{out}");
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", hex::encode(bytes)),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn pretty_line(ev: &KernelEvent) -> String {
    let mut line = format!(
        "{} id={} ip={} mac={} flags={:#x} duration={}s in={}/{} out={}/{}",
        ev.event_type(),
        ev.session.id,
        ev.session.ip_addr,
        ev.session.mac_string(),
        ev.session.flags,
        ev.stats.duration.as_secs(),
        ev.stats.in_packets,
        ev.stats.in_bytes,
        ev.stats.out_packets,
        ev.stats.out_bytes,
    );
    if let Some(parent) = ev.parent() {
        line.push_str(&format!(" parent={parent}"));
    }
    if !ev.service_name_bytes().is_empty() {
        line.push_str(&format!(" service={}", ev.service_name_str()));
    }
    line
}

/// Hex of the cookie up to its first NUL byte.
fn cookie_hex(cookie: &[u8]) -> String {
    let end = cookie.iter().position(|&b| b == 0).unwrap_or(cookie.len());
    hex::encode(&cookie[..end])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use isgctl_wire::{
        EventHeader, EventType, SessionDescriptor, SessionStatistics, KERNEL_SERVICE_NAME_LEN,
    };

    use super::*;

    fn service_name(name: &[u8]) -> [u8; KERNEL_SERVICE_NAME_LEN] {
        let mut field = [0u8; KERNEL_SERVICE_NAME_LEN];
        field[..name.len()].copy_from_slice(name);
        field
    }

    fn event() -> KernelEvent {
        KernelEvent {
            header: EventHeader::new(EventType::SessStop),
            session: SessionDescriptor {
                id: 11,
                ..SessionDescriptor::default()
            },
            stats: SessionStatistics {
                duration: Duration::from_secs(90),
                ..SessionStatistics::default()
            },
            parent_session_id: 3,
            service_name: service_name(b"internet"),
        }
    }

    #[test]
    fn json_output_shape() {
        let ev = event();
        let value = serde_json::to_value(EventOutput::from(&ev)).unwrap();
        assert_eq!(value["event_type"], "sess-stop");
        assert_eq!(value["session_id"], 11);
        assert_eq!(value["duration_secs"], 90);
        assert_eq!(value["parent_session_id"], 3);
        assert_eq!(value["mac_addr"], "00:00:00:00:00:00");
        assert_eq!(value["cookie"], "");
        assert_eq!(value["service_name"], "internet");
        assert!(value.get("service_name_hex").is_none());
    }

    #[test]
    fn json_keeps_non_utf8_service_name_as_hex() {
        let mut ev = event();
        ev.service_name = service_name(b"tv\xff");
        let value = serde_json::to_value(EventOutput::from(&ev)).unwrap();
        assert_eq!(value["service_name"], "tv\u{fffd}");
        assert_eq!(value["service_name_hex"], "7476ff");
    }

    #[test]
    fn pretty_line_includes_parent_and_service() {
        let line = pretty_line(&event());
        assert!(line.starts_with("sess-stop id=11"));
        assert!(line.contains("parent=3"));
        assert!(line.ends_with("service=internet"));
    }

    #[test]
    fn cookie_hex_stops_at_nul() {
        assert_eq!(cookie_hex(&[0xab, 0xcd, 0, 0xff]), "abcd");
    }
}
