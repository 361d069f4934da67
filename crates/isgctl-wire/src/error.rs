use crate::event_type::Direction;

/// Errors that can occur while encoding or decoding ISG events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before the field or record being read.
    #[error("insufficient data ({needed} bytes needed, {remaining} remaining)")]
    InsufficientData { needed: usize, remaining: usize },

    /// The event code does not belong to the direction the decoder handles.
    #[error("event code {code:#06x} is {found}, expected {expected}")]
    SchemaMismatch {
        code: u32,
        expected: Direction,
        found: Direction,
    },

    /// A fixed-width field's value is wider than its wire slot.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A duration does not fit the 32-bit whole-seconds wire field.
    #[error("{field} overflows the 32-bit seconds field ({secs}s)")]
    DurationOverflow { field: &'static str, secs: u64 },
}

/// A textual event name that matches no known event code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type name: {0}")]
pub struct UnknownEventName(pub String);

pub type Result<T> = std::result::Result<T, WireError>;
