use std::fmt;
use std::io;

use isgctl_transport::TransportError;
use isgctl_wire::WireError;

// Process exit codes. USAGE is sysexits(3) EX_USAGE, TIMEOUT matches timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const KERNEL_REJECTED: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Socket { source, .. }
        | TransportError::Bind(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Kernel { .. } => {
            CliError::new(KERNEL_REJECTED, format!("{context}: {err}"))
        }
        TransportError::Malformed(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::FieldTooLong { .. } | WireError::DurationOverflow { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        WireError::InsufficientData { .. } | WireError::SchemaMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_errors_are_usage() {
        let err = wire_error(
            "encode failed",
            WireError::FieldTooLong {
                field: "tc_name",
                len: 40,
                max: 32,
            },
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("encode failed: tc_name too long"));
    }

    #[test]
    fn decode_errors_are_data_invalid() {
        let err = wire_error(
            "decode failed",
            WireError::InsufficientData {
                needed: 4,
                remaining: 1,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn transport_errors_map_by_kind() {
        let perm = transport_error(
            "open failed",
            TransportError::Socket {
                protocol: 31,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(perm.code, PERMISSION_DENIED);

        let timeout = transport_error(
            "receive failed",
            TransportError::Timeout(std::time::Duration::from_secs(1)),
        );
        assert_eq!(timeout.code, TIMEOUT);

        let closed = transport_error("receive failed", TransportError::Closed);
        assert_eq!(closed.code, TRANSPORT_ERROR);
    }
}
