use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Milliseconds elapsed from `since` to `now`, zero if `since` lies in the future.
pub fn elapsed_ms(now: Timestamp, since: Timestamp) -> u64 {
    now.saturating_sub(since)
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        assert_eq!(elapsed_ms(1_000, 4_000), 0);
        assert_eq!(elapsed_ms(4_000, 1_000), 3_000);
    }

    #[test]
    fn duration_conversion() {
        assert_eq!(duration_ms(Duration::from_secs(45)), 45_000);
    }
}
