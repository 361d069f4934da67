use isgctl_transport::DEFAULT_NETLINK_PROTOCOL;
use isgctl_wire::{KERNEL_EVENT_SIZE, SESSION_DESCRIPTOR_SIZE, USER_SESSION_INFO_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("isgctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: isgctl");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("ISGCTL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("ISGCTL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("netlink_protocol: {DEFAULT_NETLINK_PROTOCOL}");
    println!(
        "layout: session={SESSION_DESCRIPTOR_SIZE} user_session_info={USER_SESSION_INFO_SIZE} kernel_event={KERNEL_EVENT_SIZE}"
    );
    println!("netlink_socket: {}", cfg!(target_os = "linux"));

    Ok(SUCCESS)
}
