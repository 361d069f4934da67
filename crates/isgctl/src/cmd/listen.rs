use isgctl_wire::{EventType, UserEventSessionInfo};
use tracing::info;

use crate::cmd::stream::{send_request, stream_events, StreamUntil};
use crate::cmd::{open_channel, ListenArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_events, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    // No fallback timeout: listen until interrupted unless one is configured.
    let mut channel = open_channel(args.channel.config(None)?)?;
    send_request(
        channel.as_mut(),
        &UserEventSessionInfo::control(EventType::ListenerReg),
    )?;
    info!(protocol = args.channel.protocol, "registered as session event listener");

    let summary = stream_events(
        channel.as_mut(),
        StreamUntil {
            ack: false,
            limit: args.count,
        },
        |ev| print_events(std::slice::from_ref(ev), format),
    )?;

    info!(
        events = summary.events,
        skipped = summary.skipped,
        timed_out = summary.timed_out,
        "listener finished"
    );
    Ok(SUCCESS)
}
