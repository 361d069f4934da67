use std::fs;

use isgctl_wire::decode_kernel_event;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_events, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_input(&args)?;
    let event = decode_kernel_event(&bytes).map_err(|err| wire_error("decode failed", err))?;
    print_events(std::slice::from_ref(&event), format);
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    match &args.hex {
        Some(raw) => parse_hex(raw),
        None => Err(CliError::new(USAGE, "pass message bytes as hex or with --file")),
    }
}

/// Hex with optional whitespace, colons and a `0x` prefix.
fn parse_hex(raw: &str) -> CliResult<Vec<u8>> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::new(USAGE, format!("input is not valid hex: {err}")))
}
