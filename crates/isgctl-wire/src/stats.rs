//! Accounting block embedded in kernel lifecycle events. Kernel-originated
//! only, so there is no encoder.

use std::time::Duration;

use crate::error::Result;
use crate::field::WireReader;

/// Wire size: duration (4) + padding (4) + four 64-bit counters.
pub const SESSION_STATISTICS_SIZE: usize = 4 + 4 + 8 * 4;

/// Traffic counters for one session as reported by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatistics {
    /// Session age, whole seconds on the wire.
    pub duration: Duration,
    /// Reserved word after the duration. Always zero after decode; the wire
    /// value is ignored.
    pub padding: u32,
    pub in_packets: u64,
    pub in_bytes: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
}

impl SessionStatistics {
    pub fn total_packets(&self) -> u64 {
        self.in_packets.saturating_add(self.out_packets)
    }

    pub fn total_bytes(&self) -> u64 {
        self.in_bytes.saturating_add(self.out_bytes)
    }
}

/// Read a statistics block; the padding word is skipped.
pub fn decode_session_statistics(src: &mut WireReader<'_>) -> Result<SessionStatistics> {
    src.ensure(SESSION_STATISTICS_SIZE)?;

    let duration = Duration::from_secs(u64::from(src.get_u32()?));
    src.get_u32()?;
    Ok(SessionStatistics {
        duration,
        padding: 0,
        in_packets: src.get_u64()?,
        in_bytes: src.get_u64()?,
        out_packets: src.get_u64()?,
        out_bytes: src.get_u64()?,
    })
}
