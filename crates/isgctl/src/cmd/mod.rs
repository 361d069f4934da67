use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use isgctl_transport::{ChannelConfig, EventChannel, DEFAULT_NETLINK_PROTOCOL};
use isgctl_wire::EventType;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod sessions;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a user request and print it (optionally send it).
    Encode(EncodeArgs),
    /// Decode a kernel event from hex or a file.
    Decode(DecodeArgs),
    /// Ask the kernel for its session list and print it.
    Sessions(SessionsArgs),
    /// Register as the event listener and print kernel notifications.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Sessions(args) => sessions::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct ChannelArgs {
    /// Netlink protocol number of the ISG module.
    #[arg(long, env = "ISGCTL_NETLINK_PROTOCOL", default_value_t = DEFAULT_NETLINK_PROTOCOL)]
    pub protocol: i32,
    /// Receive timeout (e.g. 5s, 500ms).
    #[arg(long, env = "ISGCTL_TIMEOUT")]
    pub timeout: Option<String>,
}

impl ChannelArgs {
    /// Channel configuration, using `fallback` when no timeout was given.
    pub fn config(&self, fallback: Option<Duration>) -> CliResult<ChannelConfig> {
        let read_timeout = match &self.timeout {
            Some(raw) => Some(parse_timeout(raw)?),
            None => fallback,
        };
        Ok(ChannelConfig {
            protocol: self.protocol,
            read_timeout,
            ..ChannelConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Send the request to the kernel and wait for its acknowledgement.
    #[arg(long)]
    pub send: bool,
    #[command(flatten)]
    pub channel: ChannelArgs,
    #[command(subcommand)]
    pub request: EncodeRequest,
}

#[derive(Subcommand, Debug)]
pub enum EncodeRequest {
    /// Approve a session (sess-approve).
    Approve(SessionArgs),
    /// Change a session's policy or flags (sess-change).
    Change(ChangeArgs),
    /// Queue or commit a network entry.
    NetworkEntry(NetworkEntryArgs),
    /// Bind a traffic class to a service (headerless record).
    ServiceDesc(ServiceDescArgs),
    /// Header-only request such as sess-getlist or ne-commit.
    Control(ControlArgs),
}

#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Session id.
    #[arg(long, default_value_t = 0)]
    pub id: u64,
    /// Correlation cookie as hex (up to 32 bytes).
    #[arg(long)]
    pub cookie: Option<String>,
    /// Subscriber IP address.
    #[arg(long)]
    pub ip: Option<Ipv4Addr>,
    /// 1-to-1 NAT IP address.
    #[arg(long)]
    pub nat_ip: Option<Ipv4Addr>,
    /// Subscriber MAC address (aa:bb:cc:dd:ee:ff).
    #[arg(long)]
    pub mac: Option<String>,
    /// Session flag bits (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u32)]
    pub flags: Option<u32>,
    /// Virtual port number.
    #[arg(long)]
    pub port: Option<u32>,
    /// Statistics export interval (e.g. 300s, 5m).
    #[arg(long)]
    pub export_interval: Option<String>,
    /// Idle timeout.
    #[arg(long)]
    pub idle_timeout: Option<String>,
    /// Maximum session duration.
    #[arg(long)]
    pub max_duration: Option<String>,
    /// Policing descriptor RATE:BURST in kbit/s; give up to two.
    #[arg(long = "rate", value_name = "RATE:BURST")]
    pub rates: Vec<String>,
    /// Service name.
    #[arg(long)]
    pub service: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FlagOpArg {
    Set,
    Unset,
}

#[derive(Args, Debug)]
pub struct ChangeArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Whether --flags bits are set or cleared.
    #[arg(long, value_name = "OP")]
    pub flag_op: Option<FlagOpArg>,
}

#[derive(Args, Debug)]
pub struct NetworkEntryArgs {
    /// Event code: ne-add-queue, ne-sweep-queue or ne-commit.
    #[arg(long, default_value = "ne-add-queue")]
    pub event: EventType,
    /// Network prefix.
    #[arg(long, default_value = "0.0.0.0")]
    pub prefix: Ipv4Addr,
    /// Network mask.
    #[arg(long, default_value = "0.0.0.0")]
    pub mask: Ipv4Addr,
    /// Traffic class name.
    #[arg(long, default_value = "")]
    pub tc: String,
}

#[derive(Args, Debug)]
pub struct ServiceDescArgs {
    /// Traffic class name.
    #[arg(long)]
    pub tc: String,
    /// Service name.
    #[arg(long)]
    pub service: String,
    /// Mark the description as dynamic.
    #[arg(long)]
    pub dynamic: bool,
}

#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Header-only code: listener-reg, listener-reg-v1, listener-unreg,
    /// sess-getlist, sess-getcount, sess-clear, ne-sweep-queue, ne-commit,
    /// serv-apply, sdesc-sweep-tc or serv-getlist.
    pub event: EventType,
    /// Session id, for requests that target one session (sess-clear).
    #[arg(long, default_value_t = 0)]
    pub id: u64,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Message bytes as hex.
    #[arg(conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read raw message bytes from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SessionsArgs {
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub channel: ChannelArgs,
    /// Exit after N session events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the kernel control channel.
#[cfg(target_os = "linux")]
pub fn open_channel(config: ChannelConfig) -> CliResult<Box<dyn EventChannel>> {
    let channel = isgctl_transport::NetlinkChannel::open_with_config(config)
        .map_err(|err| crate::exit::transport_error("open failed", err))?;
    Ok(Box::new(channel))
}

#[cfg(not(target_os = "linux"))]
pub fn open_channel(_config: ChannelConfig) -> CliResult<Box<dyn EventChannel>> {
    Err(CliError::new(
        crate::exit::TRANSPORT_ERROR,
        "the ISG netlink channel requires Linux",
    ))
}

/// Parse `300`, `300s`, `500ms`, `5m` or `1h`. Zero is allowed.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('h') {
        (num, "h")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| CliError::new(USAGE, format!("duration out of range: {input}")))
    };
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

/// Like [`parse_duration`] but rejects zero.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let timeout = parse_duration(input)?;
    if timeout.is_zero() {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }
    Ok(timeout)
}

fn parse_u32(input: &str) -> Result<u32, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid number {input}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(&format!("{}h", u64::MAX)).is_err());
        assert!(parse_timeout("0s").is_err());
    }

    #[test]
    fn parse_u32_accepts_hex() {
        assert_eq!(parse_u32("0x54").unwrap(), 0x54);
        assert_eq!(parse_u32("84").unwrap(), 84);
        assert!(parse_u32("0xzz").is_err());
    }

    #[test]
    fn channel_config_uses_fallback_timeout() {
        let args = ChannelArgs {
            protocol: 31,
            timeout: None,
        };
        let cfg = args.config(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(cfg.protocol, 31);
        assert_eq!(cfg.read_timeout, Some(Duration::from_secs(5)));

        let args = ChannelArgs {
            protocol: 31,
            timeout: Some("250ms".to_string()),
        };
        let cfg = args.config(None).unwrap();
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(250)));
    }
}
