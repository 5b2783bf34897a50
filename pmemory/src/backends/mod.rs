pub mod filesystem;
pub mod sqlite;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::MemoryError;

pub(crate) fn encode_system_time(value: SystemTime) -> Result<(i64, i64), MemoryError> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        MemoryError::invalid_request(format!("timestamp predates unix epoch: {error}"))
    })?;
    let seconds = i64::try_from(duration.as_secs()).map_err(|_| {
        MemoryError::invalid_request("timestamp seconds overflow a signed 64-bit value")
    })?;
    Ok((seconds, i64::from(duration.subsec_nanos())))
}

pub(crate) fn decode_system_time(seconds: i64, nanos: i64) -> Result<SystemTime, MemoryError> {
    let seconds = u64::try_from(seconds).map_err(|_| {
        MemoryError::corrupt(format!(
            "timestamp seconds must be non-negative, got {seconds}"
        ))
    })?;
    let nanos = u32::try_from(nanos)
        .ok()
        .filter(|nanos| *nanos < 1_000_000_000)
        .ok_or_else(|| {
            MemoryError::corrupt(format!(
                "timestamp nanos must be in [0, 1_000_000_000), got {nanos}"
            ))
        })?;
    Ok(UNIX_EPOCH + Duration::new(seconds, nanos))
}
