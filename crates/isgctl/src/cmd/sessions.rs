use std::time::Duration;

use isgctl_wire::{EventType, UserEventSessionInfo};
use tracing::{info, warn};

use crate::cmd::stream::{send_request, stream_events, StreamUntil};
use crate::cmd::{open_channel, SessionsArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_events, OutputFormat};

const LIST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(args: SessionsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut channel = open_channel(args.channel.config(Some(LIST_TIMEOUT))?)?;
    send_request(
        channel.as_mut(),
        &UserEventSessionInfo::control(EventType::SessGetlist),
    )?;

    let mut sessions = Vec::new();
    let summary = stream_events(
        channel.as_mut(),
        StreamUntil {
            ack: true,
            limit: None,
        },
        |ev| {
            if ev.event_type() == EventType::SessInfo {
                sessions.push(ev.clone());
            }
        },
    )?;

    if !summary.acked {
        warn!(
            sessions = sessions.len(),
            "session list ended without an acknowledgement"
        );
    }
    info!(sessions = sessions.len(), skipped = summary.skipped, "session list received");
    print_events(&sessions, format);
    Ok(SUCCESS)
}
